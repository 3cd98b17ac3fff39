//! Activation and gradient capture.
//!
//! A [`CaptureContext`] is created per request and passed into a network's
//! observed forward pass. It records the stage outputs it was told to watch
//! and, for stages attached with [`CaptureContext::attach_gradient`], swaps
//! the stage output for a detached leaf that requires a gradient. After
//! `backward()`, [`CaptureContext::collect_gradients`] reads the gradient of
//! exactly that leaf.

use std::collections::{BTreeMap, HashMap};

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use visxai_models::{Activation, StageObserver};

use crate::error::{ExplainError, Result};

/// Values keyed by stage name, in the order stages were first recorded.
///
/// Stores overwrite in place, so a stage recorded twice keeps its original
/// position.
#[derive(Debug, Clone)]
pub struct StageTable<T> {
    entries: Vec<(String, T)>,
}

/// Forward outputs by stage.
pub type ActivationCapture<B> = StageTable<Activation<B>>;

/// Gradients with respect to retained stage outputs.
pub type GradientCapture<B> = StageTable<Tensor<B, 4>>;

impl<T> StageTable<T> {
    /// Empty table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Record `value` for `stage`.
    pub fn store(&mut self, stage: &str, value: T) {
        match self.entries.iter_mut().find(|(name, _)| name == stage) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((stage.to_string(), value)),
        }
    }

    /// Value recorded for `stage`.
    pub fn get(&self, stage: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, value)| value)
    }

    /// Stage names in recording order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// `(stage, value)` pairs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of stages recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for StageTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Which stages a context records regardless of attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Watch {
    /// Record every stage the network reports.
    All,
    /// Record only explicitly attached stages.
    #[default]
    Attached,
}

/// Registration returned by [`CaptureContext::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureHandle(u64);

#[derive(Debug, Clone)]
struct Attachment {
    stage: String,
    gradient: bool,
}

/// Per-request capture table.
///
/// Dropping the context releases every attachment and captured tensor.
#[derive(Debug)]
pub struct CaptureContext<B: Backend> {
    watch: Watch,
    attachments: BTreeMap<CaptureHandle, Attachment>,
    next_handle: u64,
    activations: ActivationCapture<B>,
    leaves: HashMap<String, Tensor<B, 4>>,
    gradients: GradientCapture<B>,
}

impl<B: Backend> CaptureContext<B> {
    /// Create a context.
    pub fn new(watch: Watch) -> Self {
        Self {
            watch,
            attachments: BTreeMap::new(),
            next_handle: 0,
            activations: ActivationCapture::new(),
            leaves: HashMap::new(),
            gradients: GradientCapture::new(),
        }
    }

    /// Context recording every stage.
    pub fn all() -> Self {
        Self::new(Watch::All)
    }

    fn register(&mut self, stage: &str, gradient: bool) -> CaptureHandle {
        let handle = CaptureHandle(self.next_handle);
        self.next_handle += 1;
        self.attachments.insert(
            handle,
            Attachment {
                stage: stage.to_string(),
                gradient,
            },
        );
        tracing::debug!(stage, gradient, "capture attached");
        handle
    }

    /// Record the forward output of `stage`.
    pub fn attach(&mut self, stage: &str) -> CaptureHandle {
        self.register(stage, false)
    }

    /// Record the forward output of `stage` and retain its gradient.
    pub fn attach_gradient(&mut self, stage: &str) -> CaptureHandle {
        self.register(stage, true)
    }

    /// Remove an attachment. Detaching twice is a no-op.
    pub fn detach(&mut self, handle: CaptureHandle) {
        if let Some(attachment) = self.attachments.remove(&handle) {
            tracing::debug!(stage = %attachment.stage, "capture detached");
        }
    }

    /// Remove every attachment, keeping captured values.
    pub fn detach_all(&mut self) {
        self.attachments.clear();
    }

    /// Number of live attachments.
    pub fn attached_count(&self) -> usize {
        self.attachments.len()
    }

    fn is_watched(&self, stage: &str) -> bool {
        self.watch == Watch::All || self.attachments.values().any(|a| a.stage == stage)
    }

    fn wants_gradient(&self, stage: &str) -> bool {
        self.attachments
            .values()
            .any(|a| a.gradient && a.stage == stage)
    }

    /// Captured activations.
    pub fn activations(&self) -> &ActivationCapture<B> {
        &self.activations
    }

    /// Activation of `stage`, or [`ExplainError::CaptureFailed`].
    pub fn activation(&self, stage: &str) -> Result<&Activation<B>> {
        self.activations
            .get(stage)
            .ok_or_else(|| {
                ExplainError::CaptureFailed(format!("no activation recorded for '{stage}'"))
            })
    }

    /// Gradient of `stage`, or [`ExplainError::CaptureFailed`].
    pub fn gradient(&self, stage: &str) -> Result<&Tensor<B, 4>> {
        self.gradients
            .get(stage)
            .ok_or_else(|| {
                ExplainError::CaptureFailed(format!("no gradient recorded for '{stage}'"))
            })
    }

    /// Captured gradients.
    pub fn gradients(&self) -> &GradientCapture<B> {
        &self.gradients
    }
}

impl<B: AutodiffBackend> CaptureContext<B> {
    /// Read the gradient of every retained leaf from a finished backward pass.
    ///
    /// Leaves the loss did not depend on get no entry.
    pub fn collect_gradients(&mut self, grads: &B::Gradients) {
        for (stage, leaf) in &self.leaves {
            match leaf.grad(grads) {
                Some(gradient) => self.gradients.store(stage, Tensor::from_inner(gradient)),
                None => tracing::debug!(stage = %stage, "no gradient reached leaf"),
            }
        }
    }
}

impl<B: Backend> StageObserver<B> for CaptureContext<B> {
    fn observe_spatial(&mut self, stage: &'static str, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = if self.wants_gradient(stage) {
            let leaf = x.detach().require_grad();
            self.leaves.insert(stage.to_string(), leaf.clone());
            leaf
        } else {
            x
        };
        if self.is_watched(stage) {
            self.activations.store(stage, Activation::Spatial(x.clone()));
        }
        x
    }

    fn observe_flat(&mut self, stage: &'static str, x: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.is_watched(stage) {
            self.activations.store(stage, Activation::Flat(x.clone()));
        }
        x
    }
}

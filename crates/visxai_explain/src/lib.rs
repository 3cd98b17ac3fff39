//! # visxai_explain
//!
//! Introspection tools for visxai: activation/gradient capture, feature-map
//! rendering, Grad-CAM and adversarial examples.
//!
//! This crate provides:
//! - [`CaptureContext`]: per-request activation and gradient capture
//! - [`FeatureMapAssembler`]: layer-ordered grayscale feature maps
//! - [`GradCamConfig`]: gradient-weighted class activation maps
//! - [`FgsmConfig`]: fast gradient sign perturbation

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod adversarial;
mod capture;
mod error;
mod features;
mod gradcam;

pub use adversarial::{perturb, AdversarialResult, FgsmConfig, DEFAULT_EPSILON};
pub use capture::{
    ActivationCapture, CaptureContext, CaptureHandle, GradientCapture, StageTable, Watch,
};
pub use error::{ExplainError, Result};
pub use features::{capture_all, FeatureMapAssembler, FeatureMaps, LayerMaps};
pub use gradcam::{finish_map, grad_cam, GradCamConfig, GradCamResult};

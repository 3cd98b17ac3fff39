//! Handler registry.
//!
//! Explicitly constructed and owned by the dispatcher. Names are
//! case-insensitive and may have aliases.
//!
//! # Example
//!
//! ```rust,ignore
//! use visxai_api::{build_registry, AppConfig};
//! use visxai_core::backend::AutodiffNdArray;
//!
//! let registry = build_registry::<AutodiffNdArray>(&AppConfig::default(), &Default::default())?;
//! let handler = registry.get("VGG16").expect("registered");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use burn::tensor::backend::AutodiffBackend;
use visxai_core::Seed;
use visxai_models::{
    maybe_load_weights, Architecture, ClassLabels, DigitCnnConfig, ResNet50Config, Vgg16Config,
};

use crate::config::{AppConfig, ModelSettings};
use crate::error::{ApiError, Result};
use crate::handlers::{
    DigitHandler, ImageNetHandler, ModelHandler, PlaceholderHandler, PLACEHOLDER_MODELS,
};

/// Number of ImageNet classes.
pub const IMAGENET_CLASSES: usize = 1000;

/// Name → handler map.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    handlers: BTreeMap<String, Arc<dyn ModelHandler>>,
    aliases: BTreeMap<String, String>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.list())
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ModelHandler>) {
        let name = handler.name().to_ascii_lowercase();
        tracing::debug!(model = %name, "handler registered");
        self.handlers.insert(name, handler);
    }

    /// Make `alias` resolve to `target`.
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(alias.to_ascii_lowercase(), target.to_ascii_lowercase());
    }

    /// Handler registered as `name` or an alias of it.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelHandler>> {
        let key = name.to_ascii_lowercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.handlers.get(key).cloned()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Whether `name` resolves to a handler.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn input_size(settings: &ModelSettings, architecture: Architecture) -> usize {
    settings.input_size.unwrap_or(match architecture {
        Architecture::DigitCnn => 28,
        Architecture::Vgg16 | Architecture::ResNet50 => 224,
    })
}

/// Each architecture draws from its own stream of the configured seed.
fn seed_for(settings: &ModelSettings, architecture: Architecture) -> Seed {
    Seed::new(settings.seed).derive(architecture.name())
}

fn warn_random_init(settings: &ModelSettings, architecture: Architecture) {
    if settings.weights.is_none() {
        tracing::warn!(
            model = %architecture,
            seed = settings.seed,
            "no weights configured, using random initialization"
        );
    }
}

/// Build the registry described by `config`: the enabled networks, the
/// placeholder names and the `voxelstack` alias.
pub fn build_registry<B: AutodiffBackend>(
    config: &AppConfig,
    device: &B::Device,
) -> Result<ModelRegistry> {
    config.validate()?;
    let mut registry = ModelRegistry::new();
    let labels = ClassLabels::load_or_generic(config.labels_path.as_deref(), IMAGENET_CLASSES);

    let settings = config.models.get(Architecture::Vgg16);
    if settings.enabled {
        seed_for(settings, Architecture::Vgg16).apply::<B>();
        let model_config = Vgg16Config::new(IMAGENET_CLASSES)
            .with_input_size(input_size(settings, Architecture::Vgg16))
            .with_width_divisor(settings.width_divisor);
        model_config.validate()?;
        warn_random_init(settings, Architecture::Vgg16);
        let model = model_config.init::<B>(device);
        let model = maybe_load_weights(model, settings.weights.as_deref(), device)?;
        let name = Architecture::Vgg16.name();
        let handler = ImageNetHandler::new(name, model, labels.clone(), device.clone())
            .with_top_k(config.top_k)
            .with_channel_cap(config.feature_channel_cap)
            .with_default_epsilon(config.default_epsilon);
        registry.register(Arc::new(handler));
        registry.alias("voxelstack", Architecture::Vgg16.name());
        tracing::info!(model = "vgg16", "model ready");
    }

    let settings = config.models.get(Architecture::ResNet50);
    if settings.enabled {
        seed_for(settings, Architecture::ResNet50).apply::<B>();
        let model_config = ResNet50Config::new(IMAGENET_CLASSES)
            .with_input_size(input_size(settings, Architecture::ResNet50))
            .with_width_divisor(settings.width_divisor);
        model_config.validate()?;
        warn_random_init(settings, Architecture::ResNet50);
        let model = model_config.init::<B>(device);
        let model = maybe_load_weights(model, settings.weights.as_deref(), device)?;
        let name = Architecture::ResNet50.name();
        let handler = ImageNetHandler::new(name, model, labels, device.clone())
            .with_top_k(config.top_k)
            .with_channel_cap(config.feature_channel_cap)
            .with_default_epsilon(config.default_epsilon);
        registry.register(Arc::new(handler));
        tracing::info!(model = "resnet50", "model ready");
    }

    let settings = config.models.get(Architecture::DigitCnn);
    if settings.enabled {
        if input_size(settings, Architecture::DigitCnn) != 28 {
            return Err(ApiError::Config("the digit classifier takes 28x28 input".to_string()));
        }
        seed_for(settings, Architecture::DigitCnn).apply::<B>();
        warn_random_init(settings, Architecture::DigitCnn);
        let model = maybe_load_weights(
            DigitCnnConfig::new().init::<B>(device),
            settings.weights.as_deref(),
            device,
        )?;
        registry.register(Arc::new(DigitHandler::with_adam(model, device.clone())));
        tracing::info!(model = "mnist", "model ready");
    }

    for name in PLACEHOLDER_MODELS {
        registry.register(Arc::new(PlaceholderHandler::new(name)));
    }

    Ok(registry)
}

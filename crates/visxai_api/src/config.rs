//! Application configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use visxai_models::Architecture;

use crate::error::{ApiError, Result};

/// Per-architecture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Whether the handler is registered.
    pub enabled: bool,
    /// Burn record to load; random initialization when absent.
    pub weights: Option<PathBuf>,
    /// Input side length; the architecture default when absent.
    pub input_size: Option<usize>,
    /// Divides channel widths of the ImageNet networks.
    pub width_divisor: usize,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            weights: None,
            input_size: None,
            width_divisor: 1,
            seed: 42,
        }
    }
}

impl ModelSettings {
    /// Set the input size.
    #[must_use]
    pub fn with_input_size(mut self, input_size: usize) -> Self {
        self.input_size = Some(input_size);
        self
    }

    /// Set the width divisor.
    #[must_use]
    pub fn with_width_divisor(mut self, width_divisor: usize) -> Self {
        self.width_divisor = width_divisor;
        self
    }

    /// Set the weight file.
    #[must_use]
    pub fn with_weights(mut self, weights: impl Into<PathBuf>) -> Self {
        self.weights = Some(weights.into());
        self
    }

    /// Disable the handler.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Settings of every built-in architecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// VGG16.
    pub vgg16: ModelSettings,
    /// ResNet50.
    pub resnet50: ModelSettings,
    /// Digit classifier.
    pub mnist: ModelSettings,
}

impl ModelsConfig {
    /// Settings for `architecture`.
    pub fn get(&self, architecture: Architecture) -> &ModelSettings {
        match architecture {
            Architecture::Vgg16 => &self.vgg16,
            Architecture::ResNet50 => &self.resnet50,
            Architecture::DigitCnn => &self.mnist,
        }
    }
}

/// Application configuration, loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Include error traces in error responses.
    pub debug: bool,
    /// Requests slower than this are logged as warnings. Passes are not
    /// preemptible, so the response is still returned.
    pub slow_request_warn_ms: Option<u64>,
    /// ImageNet class-index JSON.
    pub labels_path: Option<PathBuf>,
    /// Feature maps rendered per layer by `predict` and `features`.
    pub feature_channel_cap: usize,
    /// Probabilities returned by ImageNet `predict`.
    pub top_k: usize,
    /// Epsilon when the request gives none.
    pub default_epsilon: f32,
    /// Per-architecture settings.
    pub models: ModelsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            slow_request_warn_ms: None,
            labels_path: None,
            feature_channel_cap: 16,
            top_k: 5,
            default_epsilon: 0.01,
            models: ModelsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(ApiError::Config("top_k must be positive".to_string()));
        }
        if !self.default_epsilon.is_finite() || self.default_epsilon < 0.0 {
            return Err(ApiError::Config(format!(
                "default_epsilon must be finite and non-negative, got {}",
                self.default_epsilon
            )));
        }
        for settings in [&self.models.vgg16, &self.models.resnet50, &self.models.mnist] {
            if settings.width_divisor == 0 {
                return Err(ApiError::Config("width_divisor must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Turn on error traces.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Warn about requests slower than `millis`.
    #[must_use]
    pub fn with_slow_request_warn_ms(mut self, millis: u64) -> Self {
        self.slow_request_warn_ms = Some(millis);
        self
    }

    /// Shrink both ImageNet networks for low-resource runs and tests.
    #[must_use]
    pub fn with_small_networks(mut self, input_size: usize, width_divisor: usize) -> Self {
        for settings in [&mut self.models.vgg16, &mut self.models.resnet50] {
            settings.input_size = Some(input_size);
            settings.width_divisor = width_divisor;
        }
        self
    }
}

//! # visxai
//!
//! Visual introspection of image classification networks in Rust.
//!
//! - **Networks**: VGG16, ResNet50 and a small digit classifier, each
//!   evaluated stage by stage under a [`StageObserver`](models::StageObserver)
//! - **Capture**: per-request activation and gradient capture
//! - **Explainability**: feature maps, Grad-CAM and fast gradient sign
//!   adversarial examples
//! - **API**: capability-tagged handlers, an explicit registry and a
//!   transport-agnostic dispatcher
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use visxai::prelude::*;
//! use visxai::core::backend::AutodiffNdArray;
//!
//! let config = AppConfig::default();
//! let registry = build_registry::<AutodiffNdArray>(&config, &Default::default())?;
//! let dispatcher = Dispatcher::new(registry, config);
//!
//! let request = Request::post(serde_json::json!({ "image": data_uri, "layer_index": 12 }));
//! let response = dispatcher.dispatch("vgg16", "gradcam", &request);
//! println!("{}", response.body["layer_name"]);
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub use visxai_api as api;
pub use visxai_core as core;
pub use visxai_explain as explain;
pub use visxai_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use visxai::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use visxai_core::{codec, CoreError, PixelTensor, Seed};

    // Models
    pub use visxai_models::{
        Architecture, ClassLabels, DigitCnn, DigitCnnConfig, InspectableModel, ResNet50,
        ResNet50Config, StageObserver, Vgg16, Vgg16Config,
    };

    // Explain
    pub use visxai_explain::{
        capture_all, CaptureContext, FeatureMapAssembler, FeatureMaps, FgsmConfig, GradCamConfig,
        GradCamResult, Watch,
    };

    // API
    pub use visxai_api::{
        build_registry, ApiError, ApiResponse, AppConfig, Capability, Dispatcher, ModelHandler,
        ModelRegistry, Request,
    };
}

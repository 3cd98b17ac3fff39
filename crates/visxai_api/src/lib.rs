//! # visxai_api
//!
//! Request handling for visxai. Each built-in network is wrapped in a
//! [`ModelHandler`] advertising the actions it serves; handlers live in an
//! explicitly built [`ModelRegistry`] owned by a [`Dispatcher`], which maps
//! every outcome to an HTTP-equivalent [`ApiResponse`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use visxai_api::{build_registry, AppConfig, Dispatcher, Request};
//! use visxai_core::backend::AutodiffNdArray;
//!
//! let config = AppConfig::default();
//! let registry = build_registry::<AutodiffNdArray>(&config, &Default::default())?;
//! let dispatcher = Dispatcher::new(registry, config);
//!
//! let response = dispatcher.dispatch("vgg16", "predict", &Request::post(json!({ "image": uri })));
//! assert_eq!(response.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod config;
pub mod dispatch;
mod error;
pub mod handlers;
pub mod registry;
pub mod request;
pub mod response;

pub use capability::Capability;
pub use config::{AppConfig, ModelSettings, ModelsConfig};
pub use dispatch::{Dispatcher, ModelSummary};
pub use error::{ApiError, Result};
pub use handlers::{
    DigitHandler, ImageNetHandler, ModelHandler, PlaceholderHandler, KERNEL_CAP, PLACEHOLDER_MODELS,
};
pub use registry::{build_registry, ModelRegistry, IMAGENET_CLASSES};
pub use request::{Method, Request};
pub use response::ApiResponse;

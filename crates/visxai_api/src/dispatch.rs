//! Transport-agnostic request dispatch.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::capability::Capability;
use crate::config::AppConfig;
use crate::error::{ApiError, Result};
use crate::registry::ModelRegistry;
use crate::request::{Method, Request};
use crate::response::ApiResponse;

/// One registered model as listed by [`Dispatcher::models`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    /// Registry name.
    pub name: String,
    /// Served actions.
    pub capabilities: Vec<Capability>,
    /// Layer names in presentation order.
    pub layers: Vec<String>,
}

/// Routes `(model, action, request)` to a handler and maps the outcome to
/// an [`ApiResponse`].
#[derive(Debug)]
pub struct Dispatcher {
    registry: ModelRegistry,
    config: AppConfig,
}

impl Dispatcher {
    /// Own `registry`, answering according to `config`.
    pub fn new(registry: ModelRegistry, config: AppConfig) -> Self {
        Self { registry, config }
    }

    /// The handler registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The configuration in use.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Every registered model, sorted by name.
    pub fn models(&self) -> Vec<ModelSummary> {
        self.registry
            .list()
            .into_iter()
            .filter_map(|name| self.registry.get(name))
            .map(|handler| ModelSummary {
                name: handler.name().to_string(),
                capabilities: handler.capabilities().to_vec(),
                layers: handler.layers(),
            })
            .collect()
    }

    /// Write the current weights of `model` to `path`, for example after
    /// `train` steps. Reload them through `ModelSettings::weights`.
    pub fn save_weights(&self, model: &str, path: &Path) -> Result<()> {
        let handler = self
            .registry
            .get(model)
            .ok_or_else(|| ApiError::UnknownModel(model.to_string()))?;
        handler.save_weights(path)
    }

    /// Serve one request.
    pub fn dispatch(&self, model: &str, action: &str, request: &Request) -> ApiResponse {
        let start = Instant::now();
        let result = self.route(model, action, request);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if let Some(threshold) = self.config.slow_request_warn_ms {
            if elapsed_ms > threshold {
                tracing::warn!(model, action, elapsed_ms, threshold, "slow request");
            }
        }

        match result {
            Ok(body) => {
                tracing::info!(model, action, elapsed_ms, status = 200, "request served");
                ApiResponse::ok(body)
            }
            Err(error) => {
                let response = ApiResponse::from_error(&error, self.config.debug);
                if error.is_client_error() {
                    tracing::info!(
                        model,
                        action,
                        status = response.status,
                        error = %error,
                        "request rejected"
                    );
                } else {
                    tracing::error!(
                        model,
                        action,
                        status = response.status,
                        error = %error,
                        "request failed"
                    );
                }
                response
            }
        }
    }

    fn route(&self, model: &str, action: &str, request: &Request) -> Result<serde_json::Value> {
        let handler = self
            .registry
            .get(model)
            .ok_or_else(|| ApiError::UnknownModel(model.to_string()))?;

        let capability = match action.parse::<Capability>() {
            Ok(capability) => capability,
            Err(_) if request.method == Method::Get => {
                return Err(ApiError::MethodNotAllowed(action.to_string()))
            }
            Err(e) => return Err(e),
        };
        if request.method == Method::Get && !capability.allows_get() {
            return Err(ApiError::MethodNotAllowed(action.to_string()));
        }
        if !handler.supports(capability) {
            return Err(ApiError::unsupported(handler.name(), capability));
        }

        handler.handle(capability, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::handlers::PlaceholderHandler;

    fn dispatcher(debug: bool) -> Dispatcher {
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(PlaceholderHandler::new("patchflow")));
        Dispatcher::new(registry, AppConfig::default().with_debug(debug))
    }

    #[test]
    fn test_unknown_model() {
        let response = dispatcher(false).dispatch("alexnet", "predict", &Request::post(json!({})));
        assert_eq!(response.status, 404);
        assert_eq!(response.error_message(), Some("Model 'alexnet' not found."));
    }

    #[test]
    fn test_unknown_action() {
        let response =
            dispatcher(false).dispatch("patchflow", "explode", &Request::post(json!({})));
        assert_eq!(response.status, 400);
        assert_eq!(response.error_message(), Some("Action 'explode' not supported."));
    }

    #[test]
    fn test_get_only_for_features() {
        let dispatcher = dispatcher(false);
        assert_eq!(dispatcher.dispatch("patchflow", "predict", &Request::get()).status, 405);
        assert_eq!(dispatcher.dispatch("patchflow", "explode", &Request::get()).status, 405);
        // passes the method check, then fails the capability check
        assert_eq!(dispatcher.dispatch("patchflow", "features", &Request::get()).status, 400);
    }

    #[test]
    fn test_unsupported_capability() {
        let response = dispatcher(true).dispatch("PatchFlow", "train", &Request::post(json!({})));
        assert_eq!(response.status, 400);
        assert_eq!(
            response.error_message(),
            Some("Training not supported for model 'patchflow'.")
        );
        assert!(response.body.get("traceback").is_some());
    }

    #[test]
    fn test_slow_request_still_answered() {
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(PlaceholderHandler::new("patchflow")));
        let config = AppConfig::default().with_slow_request_warn_ms(0);
        let dispatcher = Dispatcher::new(registry, config);

        let response = dispatcher.dispatch("patchflow", "predict", &Request::post(json!({})));
        assert_eq!(response.status, 400);
        assert_eq!(dispatcher.config().slow_request_warn_ms, Some(0));
    }

    #[test]
    fn test_save_weights_needs_a_network() {
        let dispatcher = dispatcher(false);
        let unknown = dispatcher.save_weights("alexnet", Path::new("/tmp/alexnet"));
        assert!(matches!(unknown, Err(ApiError::UnknownModel(_))));
        let placeholder = dispatcher.save_weights("patchflow", Path::new("/tmp/patchflow"));
        assert!(matches!(placeholder, Err(ApiError::NoWeights(_))));
    }

    #[test]
    fn test_models_summary() {
        let models = dispatcher(false).models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "patchflow");
        assert!(models[0].capabilities.is_empty());
    }
}

//! Registered names without a network.

use crate::capability::Capability;

use super::ModelHandler;

/// Model names that are listed but not implemented.
pub const PLACEHOLDER_MODELS: [&str; 10] = [
    "patchflow",
    "latentmorph",
    "attentiocore",
    "chronocoil",
    "transflow",
    "hypersector",
    "fractallogic",
    "simplefit",
    "graphweaver",
    "gridwalker",
];

/// A handler with an empty capability set.
#[derive(Debug, Clone)]
pub struct PlaceholderHandler {
    name: String,
}

impl PlaceholderHandler {
    /// Create a placeholder named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl ModelHandler for PlaceholderHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &[]
    }
}

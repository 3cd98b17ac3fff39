//! Actions a handler can serve.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A client-facing action. A handler advertises the set it supports and the
/// dispatcher refuses the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Classify an input.
    Predict,
    /// Layer catalog or rendered feature maps.
    Features,
    /// Grad-CAM heatmap.
    GradCam,
    /// Fast gradient sign adversarial example.
    Adversarial,
    /// One optimizer step on a labelled sample.
    Train,
    /// Rendered convolution filters.
    Kernels,
}

impl Capability {
    /// All capabilities.
    pub const ALL: [Capability; 6] = [
        Self::Predict,
        Self::Features,
        Self::GradCam,
        Self::Adversarial,
        Self::Train,
        Self::Kernels,
    ];

    /// Action name as used in request paths.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::Features => "features",
            Self::GradCam => "gradcam",
            Self::Adversarial => "adversarial",
            Self::Train => "train",
            Self::Kernels => "kernels",
        }
    }

    /// Whether the action may be requested with GET. Both read only the
    /// network, never a request body.
    #[must_use]
    pub const fn allows_get(&self) -> bool {
        matches!(self, Self::Features | Self::Kernels)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Predict => "Prediction",
            Self::Features => "Features",
            Self::GradCam => "Grad-CAM",
            Self::Adversarial => "Adversarial generation",
            Self::Train => "Training",
            Self::Kernels => "Kernel visualization",
        };
        f.write_str(label)
    }
}

impl FromStr for Capability {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.action().eq_ignore_ascii_case(s))
            .ok_or_else(|| ApiError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!("predict".parse::<Capability>().unwrap(), Capability::Predict);
        assert_eq!("GradCAM".parse::<Capability>().unwrap(), Capability::GradCam);
        assert!(matches!("explode".parse::<Capability>(), Err(ApiError::UnknownAction(_))));
    }

    #[test]
    fn test_only_read_actions_allow_get() {
        let gettable: Vec<_> = Capability::ALL.into_iter().filter(Capability::allows_get).collect();
        assert_eq!(gettable, vec![Capability::Features, Capability::Kernels]);
    }

    #[test]
    fn test_action_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(capability.action().parse::<Capability>().unwrap(), capability);
        }
    }
}

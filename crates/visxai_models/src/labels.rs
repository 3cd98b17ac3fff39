//! Human-readable class labels.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ModelError, Result};

/// Class index to label lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    /// Labels `class_0`..`class_{n-1}`.
    #[must_use]
    pub fn generic(n_classes: usize) -> Self {
        Self {
            labels: (0..n_classes).map(|i| format!("class_{i}")).collect(),
        }
    }

    /// Labels `"0"`..`"9"` for the digit classifier.
    #[must_use]
    pub fn digits() -> Self {
        Self {
            labels: (0..10).map(|i| i.to_string()).collect(),
        }
    }

    /// Parse a class-index JSON document of the form
    /// `{"0": ["label", ...], "1": [...], ...}`. The first entry of each list
    /// is the label. Every index below `n_classes` must be present.
    pub fn from_json(json: &str, n_classes: usize) -> Result<Self> {
        let table: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        let labels = (0..n_classes)
            .map(|i| {
                table
                    .get(&i.to_string())
                    .and_then(|entries| entries.first())
                    .cloned()
                    .ok_or_else(|| ModelError::Labels(format!("no label for class {i}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { labels })
    }

    /// Read and parse a class-index JSON file.
    pub fn from_file(path: impl AsRef<Path>, n_classes: usize) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json, n_classes)
    }

    /// Load from `path` when given; on any failure fall back to
    /// [`ClassLabels::generic`] with a warning.
    #[must_use]
    pub fn load_or_generic(path: Option<&Path>, n_classes: usize) -> Self {
        let Some(path) = path else {
            return Self::generic(n_classes);
        };
        match Self::from_file(path, n_classes) {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load class labels");
                Self::generic(n_classes)
            }
        }
    }

    /// Label for `index`, or `class_{index}` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{index}"))
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

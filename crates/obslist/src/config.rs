#![forbid(unsafe_code)]

//! Collection configuration.

/// Configuration for an [`ObservableCollection`](crate::ObservableCollection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Name reported in tracing fields.
    pub label: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            label: "collection".to_string(),
        }
    }
}

impl CollectionConfig {
    /// Create the default config with a custom label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Set the tracing label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

//! Seam for delivering prompt text into another application.

use async_trait::async_trait;

/// Result reported by a [`TextInjector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionOutcome {
    success: bool,
    method: String,
}

impl InjectionOutcome {
    /// Successful delivery via `method`.
    #[must_use]
    pub fn delivered(method: impl Into<String>) -> Self {
        Self {
            success: true,
            method: method.into(),
        }
    }

    /// Failed delivery via `method`.
    #[must_use]
    pub fn failed(method: impl Into<String>) -> Self {
        Self {
            success: false,
            method: method.into(),
        }
    }

    /// Whether the text was delivered.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Delivery method, e.g. `clipboard` or `stdout`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Delivers text to whatever the user is currently editing.
#[async_trait]
pub trait TextInjector: Send + Sync {
    /// Inserts `text`. Failures are reported in the outcome, not raised.
    async fn insert(&self, text: &str) -> InjectionOutcome;
}

use serde::{Deserialize, Serialize};

/// Subject performing an administrative operation, recorded for audit attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    subject: String,
    display_name: Option<String>,
}

impl Actor {
    /// Creates an actor from a stable subject identifier.
    #[must_use]
    pub fn new(subject: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name,
        }
    }

    /// Actor used for operations triggered by the system itself.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", Some("System".to_owned()))
    }

    /// Returns the stable subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name, falling back to the subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.subject.as_str())
    }
}

//! Shared primitives for all Rust crates in orgperm.

#![forbid(unsafe_code)]

/// Actor attribution shared across services.
pub mod actor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use actor::Actor;

/// Result type used across orgperm crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
///
/// Hierarchy and template failures carry the offending identifiers so callers
/// can render a precise message without parsing strings.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Subject is blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Moving a department would make it its own ancestor.
    #[error(
        "circular reference: department '{department_id}' cannot be placed under '{target_parent_id}'"
    )]
    CircularReference {
        /// Department being moved.
        department_id: String,
        /// Requested parent.
        target_parent_id: String,
    },

    /// Target parent is missing or cannot accept children.
    #[error("invalid parent '{parent_id}': {reason}")]
    InvalidParent {
        /// Requested parent.
        parent_id: String,
        /// Why the parent was rejected.
        reason: String,
    },

    /// Resulting department level would exceed the hierarchy bound.
    #[error(
        "depth limit exceeded: department '{department_id}' would reach level {level} (max {max_level})"
    )]
    DepthLimitExceeded {
        /// Department whose level would be out of bounds.
        department_id: String,
        /// Level the department would reach.
        level: usize,
        /// Maximum allowed level.
        max_level: usize,
    },

    /// Reorder payload references a department outside the parent's children.
    #[error("department '{department_id}' is not a child of '{parent_id}'")]
    InvalidSiblingSet {
        /// Parent whose children were being reordered, `root` for top-level.
        parent_id: String,
        /// Offending department.
        department_id: String,
    },

    /// Subtree rows changed between read and write; the operation may be retried.
    #[error("concurrent modification of department '{department_id}'")]
    ConcurrentModification {
        /// Department row whose version no longer matched.
        department_id: String,
    },

    /// Requested permission template does not exist.
    #[error("permission template '{template_id}' was not found")]
    TemplateNotFound {
        /// Requested template.
        template_id: String,
    },

    /// Requested permission template is deactivated.
    #[error("permission template '{template_id}' is inactive")]
    TemplateInactive {
        /// Requested template.
        template_id: String,
    },

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether retrying the same operation can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::CircularReference { .. } => "circular_reference",
            Self::InvalidParent { .. } => "invalid_parent",
            Self::DepthLimitExceeded { .. } => "depth_limit_exceeded",
            Self::InvalidSiblingSet { .. } => "invalid_sibling_set",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::TemplateInactive { .. } => "template_inactive",
            Self::Internal(_) => "internal",
        }
    }
}

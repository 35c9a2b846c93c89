use std::str::FromStr;

use orgperm_core::AppError;
use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a department is created.
    DepartmentCreated,
    /// Emitted when a department subtree is moved under a new parent.
    DepartmentMoved,
    /// Emitted when a department code changes and its subtree is rewritten.
    DepartmentRenamed,
    /// Emitted when siblings are reordered.
    DepartmentsReordered,
    /// Emitted when a department is soft-deleted.
    DepartmentDisabled,
    /// Emitted when a permission template is created.
    TemplateCreated,
    /// Emitted when a permission template is activated or deactivated.
    TemplateStatusChanged,
    /// Emitted when a permission template is deleted.
    TemplateDeleted,
    /// Emitted when a permission template is applied to users.
    TemplateApplied,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepartmentCreated => "department.created",
            Self::DepartmentMoved => "department.moved",
            Self::DepartmentRenamed => "department.renamed",
            Self::DepartmentsReordered => "department.reordered",
            Self::DepartmentDisabled => "department.disabled",
            Self::TemplateCreated => "template.created",
            Self::TemplateStatusChanged => "template.status_changed",
            Self::TemplateDeleted => "template.deleted",
            Self::TemplateApplied => "template.applied",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "department.created" => Ok(Self::DepartmentCreated),
            "department.moved" => Ok(Self::DepartmentMoved),
            "department.renamed" => Ok(Self::DepartmentRenamed),
            "department.reordered" => Ok(Self::DepartmentsReordered),
            "department.disabled" => Ok(Self::DepartmentDisabled),
            "template.created" => Ok(Self::TemplateCreated),
            "template.status_changed" => Ok(Self::TemplateStatusChanged),
            "template.deleted" => Ok(Self::TemplateDeleted),
            "template.applied" => Ok(Self::TemplateApplied),
            _ => Err(AppError::Validation(format!(
                "unknown audit action value '{value}'"
            ))),
        }
    }
}

use std::collections::BTreeSet;
use std::str::FromStr;

use orgperm_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::ids::TemplateId;
use crate::permission::Capability;

/// How a template is applied to a user's existing direct grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOperation {
    /// Keep existing direct grants and add the template's.
    Add,
    /// Deactivate existing direct grants before adding the template's.
    Replace,
}

impl TemplateOperation {
    /// Returns a stable storage value for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
        }
    }
}

impl FromStr for TemplateOperation {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            _ => Err(AppError::Validation(format!(
                "template operation must be 'add' or 'replace', got '{value}'"
            ))),
        }
    }
}

/// Named bundle of capabilities applied to users in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTemplate {
    id: TemplateId,
    name: NonEmptyString,
    description: Option<String>,
    permissions: BTreeSet<Capability>,
    priority: i32,
    is_system: bool,
    is_active: bool,
}

impl PermissionTemplate {
    /// Creates an active template; a template must carry at least one capability.
    pub fn new(
        id: TemplateId,
        name: impl Into<String>,
        description: Option<String>,
        permissions: BTreeSet<Capability>,
        priority: i32,
        is_system: bool,
    ) -> AppResult<Self> {
        if permissions.is_empty() {
            return Err(AppError::Validation(
                "permission template must contain at least one capability".to_owned(),
            ));
        }

        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description,
            permissions,
            priority,
            is_system,
            is_active: true,
        })
    }

    /// Rehydrates a stored template with its persisted activation flag.
    pub fn from_storage(
        id: TemplateId,
        name: impl Into<String>,
        description: Option<String>,
        permissions: BTreeSet<Capability>,
        priority: i32,
        is_system: bool,
        is_active: bool,
    ) -> AppResult<Self> {
        Ok(Self {
            is_active,
            ..Self::new(id, name, description, permissions, priority, is_system)?
        })
    }

    /// Returns the template identifier.
    #[must_use]
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// Returns the unique template name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the capabilities granted by the template.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Capability> {
        &self.permissions
    }

    /// Returns the priority given to grants produced by the template.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns whether the template is system-managed and immutable.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns whether the template can currently be applied.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns a copy with the given activation flag.
    pub fn with_active(&self, is_active: bool) -> AppResult<Self> {
        if self.is_system {
            return Err(AppError::Conflict(format!(
                "system template '{}' cannot be modified",
                self.name
            )));
        }

        Ok(Self {
            is_active,
            ..self.clone()
        })
    }
}

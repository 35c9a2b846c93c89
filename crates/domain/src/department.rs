use std::str::FromStr;

use orgperm_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::ids::DepartmentId;
use crate::path::{DepartmentCode, DepartmentPath, MAX_DEPARTMENT_LEVEL, path_codec};

/// Lifecycle status of a department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentStatus {
    /// Department is in use.
    Active,
    /// Department is soft-deleted and cannot receive moved children.
    Disabled,
}

impl DepartmentStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for DepartmentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            _ => Err(AppError::Validation(format!(
                "unknown department status '{value}'"
            ))),
        }
    }
}

/// Node of the department tree.
///
/// `path` always ends in `code` and `level` is derived from it, so the two can
/// never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Department {
    id: DepartmentId,
    parent_id: Option<DepartmentId>,
    code: DepartmentCode,
    name: NonEmptyString,
    path: DepartmentPath,
    sort_order: i32,
    status: DepartmentStatus,
    version: i64,
}

impl Department {
    /// Creates a department placed under `parent`, validating the depth bound.
    pub fn new(
        id: DepartmentId,
        parent: Option<&Department>,
        code: DepartmentCode,
        name: impl Into<String>,
        sort_order: i32,
    ) -> AppResult<Self> {
        let path = path_codec::encode(parent.map(Department::path), &code);
        let level = path_codec::level(&path);
        if level > MAX_DEPARTMENT_LEVEL {
            return Err(AppError::DepthLimitExceeded {
                department_id: id.to_string(),
                level,
                max_level: MAX_DEPARTMENT_LEVEL,
            });
        }

        Ok(Self {
            id,
            parent_id: parent.map(Department::id),
            code,
            name: NonEmptyString::new(name)?,
            path,
            sort_order,
            status: DepartmentStatus::Active,
            version: 0,
        })
    }

    /// Rehydrates a stored department, checking the path/code invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: DepartmentId,
        parent_id: Option<DepartmentId>,
        code: DepartmentCode,
        name: impl Into<String>,
        path: DepartmentPath,
        sort_order: i32,
        status: DepartmentStatus,
        version: i64,
    ) -> AppResult<Self> {
        if path.leaf() != &code {
            return Err(AppError::Internal(format!(
                "department '{id}' has path '{path}' that does not end in code '{code}'"
            )));
        }

        if parent_id.is_none() != (path_codec::level(&path) == 1) {
            return Err(AppError::Internal(format!(
                "department '{id}' has path '{path}' inconsistent with its parent link"
            )));
        }

        Ok(Self {
            id,
            parent_id,
            code,
            name: NonEmptyString::new(name)?,
            path,
            sort_order,
            status,
            version,
        })
    }

    /// Returns the department identifier.
    #[must_use]
    pub fn id(&self) -> DepartmentId {
        self.id
    }

    /// Returns the parent identifier, `None` for a root.
    #[must_use]
    pub fn parent_id(&self) -> Option<DepartmentId> {
        self.parent_id
    }

    /// Returns the sibling-unique code.
    #[must_use]
    pub fn code(&self) -> &DepartmentCode {
        &self.code
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the materialized path.
    #[must_use]
    pub fn path(&self) -> &DepartmentPath {
        &self.path
    }

    /// Returns the depth, 1 for a root.
    #[must_use]
    pub fn level(&self) -> usize {
        path_codec::level(&self.path)
    }

    /// Returns the sibling display order.
    #[must_use]
    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> DepartmentStatus {
        self.status
    }

    /// Returns whether the department is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == DepartmentStatus::Active
    }

    /// Returns the row version read from storage.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns a copy placed at `path` with the given parent link.
    ///
    /// The copy keeps the version it was read with so the store can detect
    /// concurrent writers.
    pub fn relocated(&self, parent_id: Option<DepartmentId>, path: DepartmentPath) -> AppResult<Self> {
        let level = path_codec::level(&path);
        if level > MAX_DEPARTMENT_LEVEL {
            return Err(AppError::DepthLimitExceeded {
                department_id: self.id.to_string(),
                level,
                max_level: MAX_DEPARTMENT_LEVEL,
            });
        }

        Ok(Self {
            parent_id,
            code: path.leaf().clone(),
            path,
            ..self.clone()
        })
    }

    /// Returns a copy with a new sibling order.
    #[must_use]
    pub fn with_sort_order(&self, sort_order: i32) -> Self {
        Self {
            sort_order,
            ..self.clone()
        }
    }

    /// Returns a copy with a new status.
    #[must_use]
    pub fn with_status(&self, status: DepartmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// Returns a copy carrying the version assigned by a successful write.
    #[must_use]
    pub fn with_version(&self, version: i64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}

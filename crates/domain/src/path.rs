//! Materialized department paths.
//!
//! A path is the ordered list of ancestor codes ending in the department's own
//! code. It is parsed once at the storage boundary and handled as a typed value
//! everywhere else; `path_codec` holds the pure operations the hierarchy
//! manager relies on.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use orgperm_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Separator between segments in the canonical path string.
pub const PATH_SEPARATOR: char = '.';

/// Maximum department level (number of path segments).
pub const MAX_DEPARTMENT_LEVEL: usize = 5;

const MAX_CODE_LENGTH: usize = 64;

/// Short segment identifier of a department, unique among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepartmentCode(String);

impl DepartmentCode {
    /// Creates a validated department code.
    ///
    /// Codes are ASCII alphanumerics plus `_` and `-`, so they never contain
    /// the path separator.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "department code must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > MAX_CODE_LENGTH {
            return Err(AppError::Validation(format!(
                "department code '{trimmed}' exceeds {MAX_CODE_LENGTH} characters"
            )));
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|character| !(character.is_ascii_alphanumeric() || matches!(character, '_' | '-')))
        {
            return Err(AppError::Validation(format!(
                "department code '{trimmed}' contains invalid character '{invalid}'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DepartmentCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for DepartmentCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DepartmentCode> for String {
    fn from(value: DepartmentCode) -> Self {
        value.0
    }
}

/// Materialized path of a department: never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepartmentPath(Vec<DepartmentCode>);

impl DepartmentPath {
    /// Creates a single-segment path for a root department.
    #[must_use]
    pub fn root(code: DepartmentCode) -> Self {
        Self(vec![code])
    }

    /// Builds a path from segments, rejecting an empty list.
    pub fn from_segments(segments: Vec<DepartmentCode>) -> AppResult<Self> {
        if segments.is_empty() {
            return Err(AppError::Validation(
                "department path must contain at least one segment".to_owned(),
            ));
        }

        Ok(Self(segments))
    }

    /// Parses the canonical separator-joined string form.
    pub fn parse(value: &str) -> AppResult<Self> {
        let segments = value
            .split(PATH_SEPARATOR)
            .map(DepartmentCode::new)
            .collect::<AppResult<Vec<_>>>()
            .map_err(|error| {
                AppError::Validation(format!("invalid department path '{value}': {error}"))
            })?;

        Self::from_segments(segments)
    }

    /// Returns the path segments from the root down.
    #[must_use]
    pub fn segments(&self) -> &[DepartmentCode] {
        self.0.as_slice()
    }

    /// Returns the last segment, which is the department's own code.
    #[must_use]
    pub fn leaf(&self) -> &DepartmentCode {
        // Construction guarantees at least one segment.
        &self.0[self.0.len() - 1]
    }

    /// Returns the parent's path, or `None` for a root path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (self.0.len() > 1).then(|| Self(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl Display for DepartmentPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                write!(formatter, "{PATH_SEPARATOR}")?;
            }
            formatter.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for DepartmentPath {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for DepartmentPath {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<DepartmentPath> for String {
    fn from(value: DepartmentPath) -> Self {
        value.to_string()
    }
}

/// Pure conversions between parent paths, codes, paths and levels.
pub mod path_codec {
    use super::{DepartmentCode, DepartmentPath};

    /// Returns `parent + code`, or just `code` for a root department.
    #[must_use]
    pub fn encode(parent_path: Option<&DepartmentPath>, code: &DepartmentCode) -> DepartmentPath {
        match parent_path {
            Some(parent_path) => {
                let mut segments = parent_path.segments().to_vec();
                segments.push(code.clone());
                DepartmentPath(segments)
            }
            None => DepartmentPath::root(code.clone()),
        }
    }

    /// Number of segments in the path.
    #[must_use]
    pub fn level(path: &DepartmentPath) -> usize {
        path.segments().len()
    }

    /// True when `candidate` equals `of` or lies underneath it.
    #[must_use]
    pub fn is_descendant_or_self(candidate: &DepartmentPath, of: &DepartmentPath) -> bool {
        candidate.segments().starts_with(of.segments())
    }

    /// Segments of `path` below `ancestor`; empty when both are equal.
    ///
    /// Returns `None` when `path` is not inside `ancestor`'s subtree.
    #[must_use]
    pub fn relative_suffix<'a>(
        path: &'a DepartmentPath,
        ancestor: &DepartmentPath,
    ) -> Option<&'a [DepartmentCode]> {
        path.segments().strip_prefix(ancestor.segments())
    }

    /// Moves `path` from under `old_ancestor` to under `new_ancestor`, keeping its suffix.
    #[must_use]
    pub fn rebase(
        path: &DepartmentPath,
        old_ancestor: &DepartmentPath,
        new_ancestor: &DepartmentPath,
    ) -> Option<DepartmentPath> {
        let suffix = relative_suffix(path, old_ancestor)?;
        let mut segments = new_ancestor.segments().to_vec();
        segments.extend_from_slice(suffix);
        Some(DepartmentPath(segments))
    }
}

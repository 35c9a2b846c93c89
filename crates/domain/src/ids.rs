use std::str::FromStr;

use orgperm_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
                    AppError::Validation(format!("invalid {} '{value}': {error}", $label))
                })
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a department.
    DepartmentId,
    "department id"
);
uuid_identifier!(
    /// Unique identifier for a user.
    UserId,
    "user id"
);
uuid_identifier!(
    /// Unique identifier for a role.
    RoleId,
    "role id"
);
uuid_identifier!(
    /// Unique identifier for a user group.
    GroupId,
    "group id"
);
uuid_identifier!(
    /// Unique identifier for a permission grant row.
    GrantId,
    "grant id"
);
uuid_identifier!(
    /// Unique identifier for a permission template.
    TemplateId,
    "template id"
);

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{DepartmentId, UserId};

    #[test]
    fn identifier_parses_its_own_display() {
        let id = DepartmentId::new();
        let parsed = DepartmentId::from_str(id.to_string().as_str());
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap_or_default(), id);
    }

    #[test]
    fn malformed_identifier_is_rejected_with_label() {
        let parsed = UserId::from_str("not-a-uuid");
        let message = parsed.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("user id"));
    }
}

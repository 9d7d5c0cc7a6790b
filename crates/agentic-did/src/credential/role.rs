//! Agent roles.

use serde::{Deserialize, Serialize};

/// Role asserted by a credential and granted by policy.
///
/// Serialised as its plain name, so custom roles round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Banker,
    Traveler,
    Shopper,
    Admin,
    /// Fallback role for credentials without a specific entitlement.
    Agent,
    Custom(String),
}

impl Role {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Banker => "Banker",
            Self::Traveler => "Traveler",
            Self::Shopper => "Shopper",
            Self::Admin => "Admin",
            Self::Agent => "Agent",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Parse a role name; unrecognised names become [`Role::Custom`].
    pub fn parse(name: &str) -> Self {
        match name {
            "Banker" => Self::Banker,
            "Traveler" => Self::Traveler,
            "Shopper" => Self::Shopper,
            "Admin" => Self::Admin,
            "Agent" => Self::Agent,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

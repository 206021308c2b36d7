//! Tenant scope.

use serde::{Deserialize, Serialize};

use super::{EngineError, EngineResult};

/// The isolation boundary (an organization) for queries and recompute.
///
/// Tenant ids become part of cache keys, so glob and separator characters
/// are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant id.
    pub fn new(id: impl Into<String>) -> EngineResult<Self> {
        let id = id.into();
        let malformed = id.is_empty()
            || id
                .chars()
                .any(|c| c == '*' || c == ':' || c.is_whitespace() || c.is_control());
        if malformed {
            return Err(EngineError::InvalidTenant(id));
        }
        Ok(Self(id))
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = EngineError;

    fn try_from(value: String) -> EngineResult<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        Self::new(s)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

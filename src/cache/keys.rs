//! Cache key layout and glob matching.
//!
//! Keys are `{namespace}:{tenant}:{detail}`. Tenant ids never contain `:` or
//! `*`, so `{namespace}:{tenant}:*` selects exactly one tenant.

use crate::types::TenantId;

/// Families of cached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Graph views.
    Graph,
    /// Per-node propagation results.
    Scores,
    /// Analytics reports.
    Analytics,
    /// Top-influencer rankings.
    Top,
}

impl CacheNamespace {
    /// Every namespace, in invalidation order.
    pub const ALL: [CacheNamespace; 4] = [Self::Graph, Self::Scores, Self::Analytics, Self::Top];

    /// Key prefix for this namespace.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Scores => "scores",
            Self::Analytics => "analytics",
            Self::Top => "top",
        }
    }

    /// Build a key for one cached result.
    pub fn key(&self, tenant: &TenantId, detail: &str) -> String {
        format!("{}:{}:{}", self.prefix(), tenant, detail)
    }

    /// Glob covering all of a tenant's keys in this namespace.
    pub fn tenant_pattern(&self, tenant: &TenantId) -> String {
        format!("{}:{}:*", self.prefix(), tenant)
    }
}

/// Match `key` against `pattern`, where `*` matches any substring
/// (including the empty one) and every other character matches itself.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];
    if rest.len() < last.len() || !rest.ends_with(last) {
        return false;
    }
    rest = &rest[..rest.len() - last.len()];

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

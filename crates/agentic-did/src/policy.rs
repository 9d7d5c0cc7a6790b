//! Policy matching: the oracle's grant versus what the presenter disclosed.
//!
//! Scopes use a capability URI scheme `action:resource` with wildcards:
//!   - `bank:transfer`: exactly that scope
//!   - `bank:*`: anything under `bank:`
//!   - `storage/*`: anything under the `storage/` path
//!   - `*`: every scope
//!
//! The oracle's policy is the source of truth. A disclosed role that differs
//! from the policy role is a tampering signal, never a soft warning.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::credential::{DisclosedClaims, Role};
use crate::error::{Result, TrustError};

/// How disclosed scopes are reconciled with policy scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRule {
    /// Disclosed scopes must equal the policy scopes.
    Exact,
    /// Every disclosed scope must be covered by the policy.
    Subset,
    /// Uncovered disclosed scopes are dropped; nothing left is a mismatch.
    #[default]
    Narrow,
}

/// Authoritative grant for a credential, as returned by the state oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub role: Role,
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub scope_rule: ScopeRule,
}

impl Policy {
    /// Policy with the default [`ScopeRule::Narrow`] rule.
    pub fn new<I, S>(role: Role, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            scopes: scopes.into_iter().map(Into::into).collect(),
            scope_rule: ScopeRule::default(),
        }
    }

    /// Replace the scope rule.
    pub fn with_scope_rule(mut self, rule: ScopeRule) -> Self {
        self.scope_rule = rule;
        self
    }

    /// Whether some policy scope covers `requested`.
    pub fn covers(&self, requested: &str) -> bool {
        scopes_cover(&self.scopes, requested)
    }
}

/// Check whether a granted scope covers a requested scope.
pub fn scope_covers(granted: &str, requested: &str) -> bool {
    // Universal wildcard
    if granted == "*" {
        return true;
    }

    if granted == requested {
        return true;
    }

    // "read:*" covers "read:calendar" and "read" itself
    if let Some(prefix) = granted.strip_suffix(":*") {
        if requested == prefix {
            return true;
        }
        if requested.starts_with(prefix) && requested.as_bytes().get(prefix.len()) == Some(&b':') {
            return true;
        }
    }

    // "storage/*" covers "storage/files/readme.md"
    if let Some(prefix) = granted.strip_suffix("/*") {
        if requested == prefix {
            return true;
        }
        if requested.starts_with(prefix) && requested.as_bytes().get(prefix.len()) == Some(&b'/') {
            return true;
        }
    }

    false
}

/// Check if any scope in `granted` covers `requested`.
pub fn scopes_cover<'a, I>(granted: I, requested: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    granted.into_iter().any(|g| scope_covers(g, requested))
}

/// Disclosed scopes that the policy covers.
pub fn narrow_scopes(disclosed: &BTreeSet<String>, policy: &Policy) -> BTreeSet<String> {
    disclosed
        .iter()
        .filter(|s| policy.covers(s))
        .cloned()
        .collect()
}

/// Compare disclosed claims against the policy and return the granted scopes.
///
/// Fails with `PolicyMismatch` on any role divergence, and on scope
/// divergence as dictated by the policy's [`ScopeRule`].
pub fn cross_check(disclosed: &DisclosedClaims, policy: &Policy) -> Result<BTreeSet<String>> {
    if disclosed.role != policy.role {
        return Err(TrustError::PolicyMismatch(format!(
            "disclosed role {} but policy grants {}",
            disclosed.role, policy.role
        )));
    }

    let granted = narrow_scopes(&disclosed.scopes, policy);

    match policy.scope_rule {
        ScopeRule::Exact => {
            if disclosed.scopes != policy.scopes {
                return Err(TrustError::PolicyMismatch(
                    "disclosed scopes differ from policy scopes".into(),
                ));
            }
        }
        ScopeRule::Subset => {
            if let Some(extra) = disclosed.scopes.iter().find(|s| !policy.covers(s)) {
                return Err(TrustError::PolicyMismatch(format!(
                    "disclosed scope {extra} is outside policy"
                )));
            }
        }
        ScopeRule::Narrow => {
            let dropped = disclosed.scopes.len() - granted.len();
            if dropped > 0 {
                log::debug!("narrowed {dropped} disclosed scope(s) not covered by policy");
            }
        }
    }

    if granted.is_empty() {
        return Err(TrustError::PolicyMismatch(
            "no disclosed scope is covered by policy".into(),
        ));
    }

    Ok(granted)
}

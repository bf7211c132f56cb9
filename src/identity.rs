//! Operator identity.
//!
//! The current actor is always passed into an operation explicitly; nothing in
//! this crate keeps a "signed-in user" around between calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An authenticated operator of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    /// Human-readable label, usually an email address.
    pub label: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Synchronous lookup of the operator performing the current call.
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Option<Actor>;
}

/// Nobody is signed in.
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_actor(&self) -> Option<Actor> {
        None
    }
}

impl IdentityProvider for Actor {
    fn current_actor(&self) -> Option<Actor> {
        Some(self.clone())
    }
}

impl IdentityProvider for Option<Actor> {
    fn current_actor(&self) -> Option<Actor> {
        self.clone()
    }
}

/// Bearer tokens issued to admin operators, keyed by token.
#[derive(Debug, Clone, Default)]
pub struct AdminTokens {
    tokens: HashMap<String, Actor>,
}

impl AdminTokens {
    /// Parse `token:uid:label` entries separated by commas.
    ///
    /// Entries missing a token or uid are skipped; a missing label falls back
    /// to the uid.
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let mut parts = entry.splitn(3, ':');
                let token = parts.next()?.trim();
                let uid = parts.next()?.trim();
                if token.is_empty() || uid.is_empty() {
                    return None;
                }
                let label = parts
                    .next()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .unwrap_or(uid);
                Some((token.to_string(), Actor::new(uid, label)))
            })
            .collect();
        Self { tokens }
    }

    pub fn insert(&mut self, token: impl Into<String>, actor: Actor) {
        self.tokens.insert(token.into(), actor);
    }

    /// Resolve a bearer token into the identity it was issued to.
    pub fn identify(&self, token: Option<&str>) -> TokenIdentity {
        TokenIdentity(token.and_then(|t| self.tokens.get(t)).cloned())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Identity resolved from a request's bearer token.
#[derive(Debug, Clone)]
pub struct TokenIdentity(pub Option<Actor>);

impl IdentityProvider for TokenIdentity {
    fn current_actor(&self) -> Option<Actor> {
        self.0.clone()
    }
}

//! Identity resolver collaborator.
//!
//! The engine never sees raw credentials. The runtime hands the `auth`
//! payload of an inbound frame to a resolver, awaits it *before* taking the
//! driver lock (resolution is the only potentially slow step in the event
//! path), and dispatches the already-resolved [`Identity`] to the engine.
//!
//! Real deployments implement [`IdentityResolver`] against their
//! authentication service (phone OTP, device trust, and so on). This crate
//! only ships development stand-ins.

use async_trait::async_trait;
use palaver_core::{Identity, UserId};
use serde::{Deserialize, Serialize};

/// Opaque transport-layer credentials attached to a join/create frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Credential token, interpreted by the resolver.
    pub token: String,
}

/// Credential rejection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The credentials did not resolve to an identity.
    #[error("credentials rejected: {0}")]
    Rejected(String),
}

/// Turns transport-layer credentials into a stable `(userId, displayName)`
/// pair, or rejects them.
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    /// Resolve one credential payload.
    async fn resolve(&self, payload: &AuthPayload) -> Result<Identity, AuthError>;
}

/// Development resolver that trusts self-asserted `"<user-id>:<name>"`
/// tokens.
///
/// No verification whatsoever; suitable only for demos and tests, exactly
/// like anonymous guest access. Deployments replace this with a resolver
/// backed by their authentication service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfAssertedResolver;

#[async_trait]
impl IdentityResolver for SelfAssertedResolver {
    async fn resolve(&self, payload: &AuthPayload) -> Result<Identity, AuthError> {
        let (id, name) = payload
            .token
            .split_once(':')
            .ok_or_else(|| AuthError::Rejected("expected <user-id>:<name>".to_string()))?;

        let user_id: u64 = id
            .parse()
            .map_err(|_| AuthError::Rejected(format!("invalid user id: {id:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Rejected("display name must not be empty".to_string()));
        }

        Ok(Identity { user_id: UserId(user_id), display_name: name.to_string() })
    }
}

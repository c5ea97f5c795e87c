use crate::domains::identity::{Profile, PublicKey};
use crate::error::Result;

/// Turns mention tokens into public keys.
pub trait IdentityResolver: Send + Sync {
    fn resolve_direct(&self, token: &str) -> Result<PublicKey>;
    fn resolve_profile(&self, token: &str) -> Result<Profile>;
}

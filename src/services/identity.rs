use crate::domains::identity::{Profile, PublicKey};
use crate::error::Result;
use crate::interfaces::identity::IdentityResolver;

/// Offline NIP-19 decoding: `npub` and `nprofile` carry the key themselves,
/// so no network lookup is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nip19Resolver;

impl IdentityResolver for Nip19Resolver {
    fn resolve_direct(&self, token: &str) -> Result<PublicKey> {
        PublicKey::from_npub(token)
    }

    fn resolve_profile(&self, token: &str) -> Result<Profile> {
        Profile::from_nprofile(token)
    }
}

use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};

use crate::error::{RemindMeError, Result};

pub const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");
pub const NPROFILE_HRP: Hrp = Hrp::parse_unchecked("nprofile");

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;

/// 32-byte x-only public key identifying a Nostr account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let raw = hex::decode(value.trim())
            .map_err(|e| RemindMeError::Identity(format!("invalid hex public key: {e}")))?;
        Self::from_slice(&raw)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_npub(value: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(value)
            .map_err(|e| RemindMeError::Identity(format!("invalid bech32: {e}")))?;
        if hrp != NPUB_HRP {
            return Err(RemindMeError::Identity(format!(
                "expected npub prefix, got {}",
                hrp.as_str()
            )));
        }
        Self::from_slice(&data)
    }

    pub fn to_npub(&self) -> Result<String> {
        bech32::encode::<Bech32>(NPUB_HRP, &self.0)
            .map_err(|e| RemindMeError::Identity(e.to_string()))
    }

    /// Matches a hex key as it appears in event JSON, ignoring case.
    pub fn matches_hex(&self, value: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(value.trim())
    }

    fn from_slice(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = raw.try_into().map_err(|_| {
            RemindMeError::Identity(format!("public key must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = RemindMeError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let value = value.strip_prefix("nostr:").unwrap_or(value);
        if value.starts_with("npub1") {
            Self::from_npub(value)
        } else {
            Self::from_hex(value)
        }
    }
}

/// Decoded `nprofile` reference: a key plus the relays it was shared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub public_key: PublicKey,
    pub relays: Vec<String>,
}

impl Profile {
    pub fn from_nprofile(value: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(value)
            .map_err(|e| RemindMeError::Identity(format!("invalid bech32: {e}")))?;
        if hrp != NPROFILE_HRP {
            return Err(RemindMeError::Identity(format!(
                "expected nprofile prefix, got {}",
                hrp.as_str()
            )));
        }

        let mut public_key = None;
        let mut relays = Vec::new();
        let mut rest = data.as_slice();
        while let [kind, len, tail @ ..] = rest {
            let len = usize::from(*len);
            if tail.len() < len {
                return Err(RemindMeError::Identity("truncated nprofile TLV".to_string()));
            }
            let (value, remaining) = tail.split_at(len);
            match *kind {
                TLV_SPECIAL if public_key.is_none() => {
                    public_key = Some(PublicKey::from_slice(value)?);
                }
                TLV_RELAY => {
                    if let Ok(url) = std::str::from_utf8(value) {
                        relays.push(url.to_string());
                    }
                }
                // unknown TLV types are ignored per NIP-19
                _ => {}
            }
            rest = remaining;
        }

        let public_key = public_key
            .ok_or_else(|| RemindMeError::Identity("nprofile without public key".to_string()))?;
        Ok(Self { public_key, relays })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
    const NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";

    #[test]
    fn npub_and_hex_describe_the_same_key() {
        let from_npub = PublicKey::from_npub(NPUB).unwrap();
        let from_hex = PublicKey::from_hex(HEX).unwrap();
        assert_eq!(from_npub, from_hex);
        assert_eq!(from_hex.to_npub().unwrap(), NPUB);
        assert_eq!(from_hex.to_string(), HEX);
        assert!(from_hex.matches_hex(&HEX.to_uppercase()));
    }

    #[test]
    fn from_str_accepts_scheme_prefix() {
        let key: PublicKey = format!("nostr:{NPUB}").parse().unwrap();
        assert_eq!(key.to_hex(), HEX);
    }

    #[test]
    fn nprofile_decodes_key_and_relays() {
        let profile = Profile::from_nprofile(
            "nprofile1qqsrhuxx8l9ex335q7he0f09aej04zpazpl0ne2cgukyawd24mayt8gpp4mhxue69uhhytnc9e3k7mgpz4mhxue69uhkg6nzv9ejuumpv34kytnrdaksjlyr9p",
        )
        .unwrap();
        assert_eq!(profile.public_key.to_hex(), HEX);
        assert_eq!(
            profile.relays,
            vec!["wss://r.x.com".to_string(), "wss://djbas.sadkb.com".to_string()]
        );
    }

    #[test]
    fn wrong_prefix_is_rejected() {
        assert!(PublicKey::from_npub(
            "nprofile1qqsqzqsrqszsvpcgpy9qkrqdpc83qygjzv2p29shrqv35xcur50p7gqq8wn3k"
        )
        .is_err());
        assert!(Profile::from_nprofile(NPUB).is_err());
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut broken = NPUB.to_string();
        broken.pop();
        broken.push('q');
        assert!(PublicKey::from_npub(&broken).is_err());
    }
}

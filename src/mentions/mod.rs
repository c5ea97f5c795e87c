use once_cell::sync::Lazy;
use regex::Regex;

use crate::domains::identity::PublicKey;
use crate::interfaces::identity::IdentityResolver;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:nostr:)?(?:(?P<direct>npub1[qpzry9x8gf2tvdw0s3jn54khce6mua7l]{58})|(?P<profile>nprofile1[qpzry9x8gf2tvdw0s3jn54khce6mua7l]+))",
    )
    .expect("mention pattern compiles")
});

/// A mention token found in message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionToken<'a> {
    Direct(&'a str),
    Profile(&'a str),
}

/// Every syntactically valid mention token with the byte offset right after it.
pub fn mention_tokens(text: &str) -> impl Iterator<Item = (MentionToken<'_>, usize)> + '_ {
    MENTION_RE.captures_iter(text).filter_map(|caps| {
        let end = caps.get(0)?.end();
        if let Some(direct) = caps.name("direct") {
            return Some((MentionToken::Direct(direct.as_str()), end));
        }
        caps.name("profile")
            .map(|profile| (MentionToken::Profile(profile.as_str()), end))
    })
}

/// Byte offset just past the first mention of `target` in `text`.
///
/// Tokens the resolver rejects are skipped; the scan keeps going.
pub fn locate(target: &PublicKey, text: &str, resolver: &dyn IdentityResolver) -> Option<usize> {
    mention_tokens(text).find_map(|(token, end)| {
        let resolved = match token {
            MentionToken::Direct(token) => resolver.resolve_direct(token),
            MentionToken::Profile(token) => resolver
                .resolve_profile(token)
                .map(|profile| profile.public_key),
        };
        match resolved {
            Ok(key) if key == *target => Some(end),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("Skipping unresolvable mention: {}", err);
                None
            }
        }
    })
}

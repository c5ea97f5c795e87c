use sha2::{Digest, Sha256};

use crate::domains::identity::PublicKey;
use crate::error::Result;

const TEMPLATES: &[&str] = &[
    "⏰ Hey nostr:{author}, here's the reminder you asked for!",
    "nostr:{author} ⏰ Time's up! You asked me to remind you about this.",
    "Ding ding! nostr:{author}, this is your reminder.",
    "nostr:{author} you wanted a nudge about this one. Here it is 🫡",
    "Reminder for nostr:{author}: this is the note you wanted to come back to.",
];

/// Reply text for a due reminder. The template is picked from the source id
/// so a retried reminder always sends the same words.
pub fn reminder_text(source_id: &str, author: &PublicKey) -> Result<String> {
    let digest = Sha256::digest(source_id.as_bytes());
    let index = usize::from(digest[0]) % TEMPLATES.len();
    let mention = author.to_npub()?;
    Ok(TEMPLATES[index].replace("{author}", &mention))
}

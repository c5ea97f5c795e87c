//! Natural-language time extraction for reminder requests.
//!
//! The text after a mention is rarely a clean date expression ("please remind
//! me in 2 hours to call mom"). Resolution walks a bounded list of leading
//! candidates, each dropping another leading word; within a candidate the
//! longest parseable prefix wins. The first candidate with a hit decides.
//! All arithmetic happens in UTC.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_english::{parse_date_string, Dialect};
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on leading-word truncations tried per message.
pub const MAX_TRUNCATION_ATTEMPTS: usize = 10;

/// Longest time phrase considered, in words ("next friday at 3 pm").
pub const MAX_PHRASE_WORDS: usize = 6;

const FILLER_WORDS: &[&str] = &["at", "on", "in"];

const UNIT_WORDS: &[&str] = &[
    "second", "seconds", "sec", "secs", "minute", "minutes", "min", "mins", "hour", "hours",
    "day", "days", "week", "weeks",
];

static TIME_OF_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,2}(?::\d{2})?(?: ?(?:am|pm))?$").expect("time-of-day pattern compiles")
});

/// Candidate substrings of `text`, longest first. The first candidate is the
/// whole trimmed text; each following one drops one more leading word.
pub fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() && out.len() < MAX_TRUNCATION_ATTEMPTS {
        out.push(rest);
        rest = match rest.find(char::is_whitespace) {
            Some(split) => rest[split..].trim_start(),
            None => "",
        };
    }
    out
}

/// Leading word runs of `candidate`, longest first, capped at
/// [`MAX_PHRASE_WORDS`] words.
fn prefixes(candidate: &str) -> Vec<&str> {
    let mut ends = Vec::new();
    let mut in_word = false;
    for (index, ch) in candidate.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                ends.push(index);
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if in_word {
        ends.push(candidate.len());
    }
    ends.truncate(MAX_PHRASE_WORDS);
    ends.into_iter().rev().map(|end| &candidate[..end]).collect()
}

/// Resolves the first parseable candidate of `text` against `reference`.
///
/// Within a candidate only the longest parseable prefix counts, so
/// "5 minutes ago" is rejected as past instead of falling back to
/// "5 minutes".
pub fn resolve(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    candidates(text).into_iter().find_map(|candidate| {
        let (parsed, time_of_day) = prefixes(candidate)
            .into_iter()
            .find_map(|phrase| parse_phrase(phrase, reference))?;
        forward(parsed, reference, time_of_day)
    })
}

/// Millisecond form of [`resolve`], taking the reference as epoch millis.
pub fn resolve_ms(text: &str, reference_ms: i64) -> Option<i64> {
    let reference = Utc.timestamp_millis_opt(reference_ms).single()?;
    resolve(text, reference).map(|resolved| resolved.timestamp_millis())
}

/// Parsed time plus whether the phrase was a bare time of day.
fn parse_phrase(phrase: &str, reference: DateTime<Utc>) -> Option<(DateTime<Utc>, bool)> {
    let normalized = normalize(phrase);
    if normalized.is_empty() {
        return None;
    }
    let parsed = parse_date_string(&normalized, reference, Dialect::Uk).ok()?;
    Some((parsed, TIME_OF_DAY_RE.is_match(&normalized)))
}

/// Rolls a bare time-of-day that already passed today over to tomorrow.
/// Any other result in the past is not a usable reminder time.
fn forward(
    parsed: DateTime<Utc>,
    reference: DateTime<Utc>,
    time_of_day: bool,
) -> Option<DateTime<Utc>> {
    if parsed >= reference {
        return Some(parsed);
    }
    if time_of_day && reference - parsed < Duration::days(1) {
        return Some(parsed + Duration::days(1));
    }
    None
}

fn normalize(phrase: &str) -> String {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(|word| {
            word.trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';'))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty() && !FILLER_WORDS.contains(&word.as_str()))
        .collect();

    // "an hour" -> "1 hour", "noon" -> "12:00"
    let words: Vec<String> = words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let next = words.get(index + 1).map(String::as_str);
            match word.as_str() {
                "a" | "an" if next.is_some_and(|unit| UNIT_WORDS.contains(&unit)) => {
                    "1".to_string()
                }
                "noon" | "midday" => "12:00".to_string(),
                "midnight" => "00:00".to_string(),
                _ => word.clone(),
            }
        })
        .collect();

    // Weeks become days: "next week" -> "7 days", "2 weeks" -> "14 days".
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    let mut index = 0;
    while index < words.len() {
        let word = words[index].as_str();
        let next = words.get(index + 1).map(String::as_str);
        let count = match (word, next) {
            ("next", Some("week")) => Some(1),
            (count, Some("week" | "weeks")) => count.parse::<u32>().ok(),
            _ => None,
        };
        match count.and_then(|count| count.checked_mul(7)) {
            Some(days) => {
                out.push(days.to_string());
                out.push("days".to_string());
                index += 2;
            }
            None => {
                out.push(word.to_string());
                index += 1;
            }
        }
    }
    out.join(" ")
}

/// Coarse "in N units" description used in intake logs.
pub fn describe_delay(delay_ms: i64) -> String {
    let seconds = (delay_ms / 1000).abs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let (value, unit) = if days > 0 {
        (days, "day")
    } else if hours > 0 {
        (hours, "hour")
    } else if minutes > 0 {
        (minutes, "minute")
    } else {
        (seconds, "second")
    };
    format!("{value} {unit}{}", if value == 1 { "" } else { "s" })
}

//! Branch name generation.

use chrono::{DateTime, Local, TimeZone};
use rand::Rng;

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;

/// Prefix for branches created in single mode.
pub const SINGLE_MODE_PREFIX: &str = "auto-pr";

/// Prefix for branches created in collaborator mode.
pub const COLLABORATOR_MODE_PREFIX: &str = "collab-pr";

const SUFFIX_LENGTH: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates `<prefix>-<YYYYMMDDHHMMSS>-<6 random [a-z0-9]>` from the local time,
/// truncated to `max_length` characters.
pub fn generate_branch_name(prefix: &str, max_length: usize) -> String {
    branch_name_at(prefix, max_length, &Local::now(), &mut rand::thread_rng())
}

/// Same as [`generate_branch_name`] with an explicit clock and random source.
pub fn branch_name_at<Tz, R>(
    prefix: &str,
    max_length: usize,
    timestamp: &DateTime<Tz>,
    rng: &mut R,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    R: Rng + ?Sized,
{
    let suffix: String = (0..SUFFIX_LENGTH)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();

    let name = format!("{prefix}-{}-{suffix}", timestamp.format("%Y%m%d%H%M%S"));
    if name.chars().count() > max_length {
        name.chars().take(max_length).collect()
    } else {
        name
    }
}

//! Stable storage keys for type paths.
//!
//! Host storage layers cap identifier length (63 bytes in the editor we
//! target), while reflected type paths routinely run past that. Short names
//! keep their readable form; long ones collapse to a tagged MD5 digest.
use once_cell::sync::Lazy;
use regex::Regex;

/// Identifiers must stay strictly below this many bytes.
pub const STORAGE_KEY_LIMIT: usize = 64;

/// Prefix carried by every hashed key. Natural names never contain `_`,
/// so a hashed key can never equal a natural one.
pub const HASHED_KEY_PREFIX: &str = "SKEIN_";

static PATH_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:_]+").unwrap());

/// Title-case every `::`/`_` separated segment and glue them together.
///
/// Only the first character of each segment is upper-cased, so
/// `TeamMember` stays `TeamMember` rather than becoming `Teammember`.
pub fn natural_name(type_path: &str) -> String {
    PATH_SEPARATORS
        .split(type_path)
        .filter(|piece| !piece.is_empty())
        .map(capitalize_first)
        .collect()
}

/// `SKEIN_` + upper-case hex MD5 of `natural`.
pub fn hashed_key(natural: &str) -> String {
    let digest = md5::compute(natural.as_bytes());
    format!("{HASHED_KEY_PREFIX}{digest:X}")
}

/// Deterministic, length-bounded key for `type_path`.
pub fn stable_key(type_path: &str) -> String {
    let natural = natural_name(type_path);
    if natural.len() < STORAGE_KEY_LIMIT {
        natural
    } else {
        hashed_key(&natural)
    }
}

fn capitalize_first(piece: &str) -> String {
    let mut chars = piece.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ------------------------------- Tests ------------------------------------ //

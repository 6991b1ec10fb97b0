//! Maps a post URL to its short code and numeric media id.

use crate::constants::SHORT_CODE_ALPHABET;
use crate::error::{DecodeError, ExtractError, IdentifierError};
use crate::types::MediaId;
use once_cell::sync::Lazy;
use regex::Regex;

// Post, reel(s), tv and story links, optionally under a username segment.
static SHORT_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?instagram\.com/(?:[A-Za-z0-9._-]+/)?(?:p|reels?|tv|stories)/([A-Za-z0-9._-]+)",
    )
    .expect("short code pattern is valid")
});

/// Identifiers derived for one URL. The short code survives even when
/// decoding it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIds {
    pub short_code: Option<String>,
    pub media_id: Result<MediaId, IdentifierError>,
}

pub fn derive_short_code(url: &str) -> Result<String, ExtractError> {
    SHORT_CODE_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ExtractError {
            url: url.to_string(),
        })
}

/// Base-64 positional decode: `id = id * 64 + digit` per character.
pub fn derive_media_id(short_code: &str) -> Result<MediaId, DecodeError> {
    if short_code.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut id: u64 = 0;
    for (position, ch) in short_code.chars().enumerate() {
        let digit = SHORT_CODE_ALPHABET
            .find(ch)
            .ok_or(DecodeError::InvalidCharacter { ch, position })?;
        id = id
            .checked_mul(64)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or_else(|| DecodeError::Overflow {
                short_code: short_code.to_string(),
            })?;
    }
    Ok(MediaId(id))
}

/// Inverse of [`derive_media_id`]. Leading zero digits (`A`) are not
/// reproduced, so only codes without them round-trip exactly.
pub fn encode_media_id(media_id: MediaId) -> String {
    let alphabet = SHORT_CODE_ALPHABET.as_bytes();
    let mut value = media_id.0;
    if value == 0 {
        return "A".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(alphabet[(value % 64) as usize]);
        value /= 64;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Never fails past the row boundary: derivation errors are carried in
/// the result for the fetch stage to report.
pub fn derive_ids(url: &str) -> DerivedIds {
    match derive_short_code(url) {
        Ok(short_code) => {
            let media_id = derive_media_id(&short_code).map_err(IdentifierError::from);
            DerivedIds {
                short_code: Some(short_code),
                media_id,
            }
        }
        Err(e) => DerivedIds {
            short_code: None,
            media_id: Err(e.into()),
        },
    }
}

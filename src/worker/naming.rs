//! Storage key derivation for fetched media

use rand::RngCore;

/// Extension appended to synthesized names
pub const FALLBACK_EXTENSION: &str = ".jpg";

const RANDOM_NAME_BYTES: usize = 16;

/// Object name for `url`: its last path segment, or a random name when the
/// locator has no usable segment. Never empty.
pub fn object_name(url: &str) -> String {
    last_segment(url)
        .map(str::to_owned)
        .unwrap_or_else(random_name)
}

/// Final `/`-separated segment with any query or fragment removed
fn last_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let (_, last) = path.rsplit_once('/')?;

    (!last.is_empty()).then_some(last)
}

/// 128 bits from the thread-local CSPRNG, hex encoded, plus the fallback extension
pub fn random_name() -> String {
    let mut bytes = [0u8; RANDOM_NAME_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", hex::encode(bytes), FALLBACK_EXTENSION)
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Random bytes behind a public round identifier
const LONG_ID_BYTES: usize = 16;

/// Generate an unguessable, URL-safe round identifier
pub(super) fn generate_long_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; LONG_ID_BYTES];
    rng.fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

use rand::Rng;

/// Length of every generated short code.
pub const SHORT_CODE_LEN: usize = 8;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random 8-character alphanumeric short code.
///
/// Each character is an independent uniform draw from the 62-character
/// alphabet. No uniqueness check happens here: the UNIQUE constraint on
/// `content_links.short_code` is the only collision guard, and this never
/// retries.
pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

/// Same as [`generate`], drawing from the supplied RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHORT_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Whether `code` has the shape of a generated short code.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == SHORT_CODE_LEN && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

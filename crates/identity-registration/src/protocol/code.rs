//! One-time code issuance and matching.

use rand::Rng;

/// Smallest code ever issued.
pub const CODE_MIN: u32 = 100_000;

/// Largest code ever issued.
pub const CODE_MAX: u32 = 999_999;

/// Draw a fresh six-digit code.
pub fn generate_code() -> u32 {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX)
}

/// Exact match of a submitted code against the issued one.
///
/// No trimming or numeric parsing: `"0123456"` does not match `123456`.
pub fn code_matches(submitted: &str, issued: u32) -> bool {
    submitted == issued.to_string()
}

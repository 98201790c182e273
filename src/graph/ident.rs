//! Node identifier generation: a random 32-bit unsigned integer rendered
//! as an 8-character uppercase hexadecimal string.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Render a 32-bit id as exactly 8 uppercase hex digits, left-padded, with
/// no `0x` prefix.
pub fn render(id: u32) -> String {
    format!("{id:08X}")
}

/// Parse an 8-hex-digit string back into its 32-bit id. Returns `None` if
/// the string is not exactly 8 hex digits.
pub fn parse(text: &str) -> Option<u32> {
    if text.len() != 8 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

/// Generate a fresh random node identifier string.
pub fn generate() -> String {
    let value: u32 = RNG.with(|rng| rng.borrow_mut().gen());
    render(value)
}

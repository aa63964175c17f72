// encodings/mod.rs - Encoding registry
// The "C" single-byte locale and UTF-8.

pub mod ascii;
pub mod utf8;

pub use ascii::ENCODING_ASCII;
pub use utf8::ENCODING_UTF8;

use crate::regenc::Encoding;

/// Selects an encoding by charset name, the way a locale's codeset is
/// named (`"UTF-8"`, `"utf8"`, `"C"`, `"POSIX"`, `"ASCII"`).
pub fn encoding_by_name(name: &str) -> Option<&'static dyn Encoding> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "utf-8" | "utf8" => Some(&ENCODING_UTF8),
        "c" | "posix" | "ascii" | "us-ascii" => Some(&ENCODING_ASCII),
        _ => None,
    }
}

// regenc.rs - Port of the character-set layer of regex_internal.h
// Encoding trait, POSIX character classes, and shared ASCII tables.

/// A decoded character value.
pub type CodePoint = u32;

pub const NEWLINE_CODE: CodePoint = 0x0a;
pub const ASCII_LIMIT: CodePoint = 127;

// === Character classes ===

/// The POSIX bracket classes (`[:alpha:]` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Alpha,
    Upper,
    Lower,
    Digit,
    Xdigit,
    Space,
    Print,
    Punct,
    Graph,
    Cntrl,
    Blank,
    Alnum,
}

impl CharClass {
    pub const ALL: [CharClass; 12] = [
        CharClass::Alpha,
        CharClass::Upper,
        CharClass::Lower,
        CharClass::Digit,
        CharClass::Xdigit,
        CharClass::Space,
        CharClass::Print,
        CharClass::Punct,
        CharClass::Graph,
        CharClass::Cntrl,
        CharClass::Blank,
        CharClass::Alnum,
    ];

    /// Looks up a class by its bracket name, e.g. `b"alpha"`.
    pub fn from_name(name: &[u8]) -> Option<CharClass> {
        Some(match name {
            b"alpha" => CharClass::Alpha,
            b"upper" => CharClass::Upper,
            b"lower" => CharClass::Lower,
            b"digit" => CharClass::Digit,
            b"xdigit" => CharClass::Xdigit,
            b"space" => CharClass::Space,
            b"print" => CharClass::Print,
            b"punct" => CharClass::Punct,
            b"graph" => CharClass::Graph,
            b"cntrl" => CharClass::Cntrl,
            b"blank" => CharClass::Blank,
            b"alnum" => CharClass::Alnum,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CharClass::Alpha => "alpha",
            CharClass::Upper => "upper",
            CharClass::Lower => "lower",
            CharClass::Digit => "digit",
            CharClass::Xdigit => "xdigit",
            CharClass::Space => "space",
            CharClass::Print => "print",
            CharClass::Punct => "punct",
            CharClass::Graph => "graph",
            CharClass::Cntrl => "cntrl",
            CharClass::Blank => "blank",
            CharClass::Alnum => "alnum",
        }
    }

    fn ctype_bit(self) -> u16 {
        1 << match self {
            CharClass::Alpha => CTYPE_ALPHA,
            CharClass::Blank => CTYPE_BLANK,
            CharClass::Cntrl => CTYPE_CNTRL,
            CharClass::Digit => CTYPE_DIGIT,
            CharClass::Graph => CTYPE_GRAPH,
            CharClass::Lower => CTYPE_LOWER,
            CharClass::Print => CTYPE_PRINT,
            CharClass::Punct => CTYPE_PUNCT,
            CharClass::Space => CTYPE_SPACE,
            CharClass::Upper => CTYPE_UPPER,
            CharClass::Xdigit => CTYPE_XDIGIT,
            CharClass::Alnum => CTYPE_ALNUM,
        }
    }
}

// === Encoding Trait ===

/// Character encoding of patterns and subjects.
///
/// Invalid byte sequences are never an error: `mbc_to_code` returns `None`
/// and the byte is treated as a one-byte character with no code point.
pub trait Encoding: Send + Sync {
    /// Encoding name (e.g. "US-ASCII", "UTF-8")
    fn name(&self) -> &str;

    /// Maximum encoded character length in bytes
    fn max_enc_len(&self) -> usize;

    fn is_utf8(&self) -> bool {
        false
    }

    /// Byte length implied by the lead byte `p[0]`.
    fn mbc_enc_len(&self, p: &[u8]) -> usize;

    /// Decode the character at the start of `p`. Returns the code point and
    /// its byte length, or `None` for an invalid or truncated sequence.
    fn mbc_to_code(&self, p: &[u8]) -> Option<(CodePoint, usize)>;

    /// Encode `code` into `buf`, returning the number of bytes written.
    fn code_to_mbc(&self, code: CodePoint, buf: &mut [u8; 4]) -> usize;

    fn is_code_ctype(&self, code: CodePoint, class: CharClass) -> bool;

    fn to_upper(&self, code: CodePoint) -> CodePoint;

    fn to_lower(&self, code: CodePoint) -> CodePoint;

    /// Word characters are alphanumerics and `_`.
    fn is_word_code(&self, code: CodePoint) -> bool {
        code == '_' as CodePoint || self.is_code_ctype(code, CharClass::Alnum)
    }

    fn is_single_byte(&self) -> bool {
        self.max_enc_len() == 1
    }
}

// === Ctype bit positions ===

pub const CTYPE_NEWLINE: u16 = 0;
pub const CTYPE_ALPHA: u16 = 1;
pub const CTYPE_BLANK: u16 = 2;
pub const CTYPE_CNTRL: u16 = 3;
pub const CTYPE_DIGIT: u16 = 4;
pub const CTYPE_GRAPH: u16 = 5;
pub const CTYPE_LOWER: u16 = 6;
pub const CTYPE_PRINT: u16 = 7;
pub const CTYPE_PUNCT: u16 = 8;
pub const CTYPE_SPACE: u16 = 9;
pub const CTYPE_UPPER: u16 = 10;
pub const CTYPE_XDIGIT: u16 = 11;
pub const CTYPE_WORD: u16 = 12;
pub const CTYPE_ALNUM: u16 = 13;
pub const CTYPE_ASCII: u16 = 14;

// === ASCII Tables ===

pub static ASCII_CTYPE_TABLE: [u16; 128] = [
    0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x420c, 0x420c, 0x4209, 0x4208,
    0x4208, 0x4208, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008,
    0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4008, 0x4284, 0x41a0, 0x41a0, 0x41a0,
    0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0,
    0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x78b0, 0x41a0, 0x41a0,
    0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x7ca2, 0x7ca2, 0x7ca2, 0x7ca2, 0x7ca2, 0x7ca2, 0x74a2,
    0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2,
    0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x74a2, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x51a0,
    0x41a0, 0x78e2, 0x78e2, 0x78e2, 0x78e2, 0x78e2, 0x78e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2,
    0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2, 0x70e2,
    0x70e2, 0x70e2, 0x70e2, 0x41a0, 0x41a0, 0x41a0, 0x41a0, 0x4008,
];

#[inline]
pub fn is_ascii_code_ctype(code: CodePoint, class: CharClass) -> bool {
    code <= ASCII_LIMIT && (ASCII_CTYPE_TABLE[code as usize] & class.ctype_bit()) != 0
}

#[inline]
pub fn is_ascii_word(code: CodePoint) -> bool {
    code <= ASCII_LIMIT && (ASCII_CTYPE_TABLE[code as usize] & (1 << CTYPE_WORD)) != 0
}

#[inline]
pub fn ascii_to_upper(code: CodePoint) -> CodePoint {
    if (b'a' as CodePoint..=b'z' as CodePoint).contains(&code) {
        code - 0x20
    } else {
        code
    }
}

#[inline]
pub fn ascii_to_lower(code: CodePoint) -> CodePoint {
    if (b'A' as CodePoint..=b'Z' as CodePoint).contains(&code) {
        code + 0x20
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names() {
        for class in CharClass::ALL {
            assert_eq!(CharClass::from_name(class.name().as_bytes()), Some(class));
        }
        assert_eq!(CharClass::from_name(b"word"), None);
        assert_eq!(CharClass::from_name(b"ALPHA"), None);
    }

    #[test]
    fn ascii_ctype_table() {
        assert!(is_ascii_code_ctype(b'A' as u32, CharClass::Upper));
        assert!(is_ascii_code_ctype(b'f' as u32, CharClass::Xdigit));
        assert!(!is_ascii_code_ctype(b'g' as u32, CharClass::Xdigit));
        assert!(is_ascii_code_ctype(b'\t' as u32, CharClass::Blank));
        assert!(is_ascii_code_ctype(b'\n' as u32, CharClass::Space));
        assert!(!is_ascii_code_ctype(b'\n' as u32, CharClass::Blank));
        assert!(is_ascii_code_ctype(b'_' as u32, CharClass::Punct));
        assert!(!is_ascii_code_ctype(0xe9, CharClass::Alpha));
        assert!(is_ascii_word(b'_' as u32));
        assert!(!is_ascii_word(b'-' as u32));
    }

    #[test]
    fn ascii_case() {
        assert_eq!(ascii_to_upper(b'q' as u32), b'Q' as u32);
        assert_eq!(ascii_to_upper(b'[' as u32), b'[' as u32);
        assert_eq!(ascii_to_lower(b'Q' as u32), b'q' as u32);
    }
}

// encodings/utf8.rs - UTF-8 encoding (RFC 3629 range: U+0000 - U+10FFFF).
// Overlong forms, surrogates and truncated sequences decode as invalid.

use crate::regenc::*;

// === EncLen_UTF8 Table ===
// Maps first byte to character length (RFC 3629: max 4 bytes).

static ENC_LEN_UTF8: [u8; 256] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
];

pub struct Utf8Encoding;

pub static ENCODING_UTF8: Utf8Encoding = Utf8Encoding;

fn to_char(code: CodePoint) -> Option<char> {
    char::from_u32(code)
}

impl Encoding for Utf8Encoding {
    fn name(&self) -> &str {
        "UTF-8"
    }

    fn max_enc_len(&self) -> usize {
        4
    }

    fn is_utf8(&self) -> bool {
        true
    }

    fn mbc_enc_len(&self, p: &[u8]) -> usize {
        p.first().map_or(1, |&b| ENC_LEN_UTF8[b as usize] as usize)
    }

    fn mbc_to_code(&self, p: &[u8]) -> Option<(CodePoint, usize)> {
        let lead = *p.first()?;
        if lead < 0x80 {
            return Some((lead as CodePoint, 1));
        }
        let len = ENC_LEN_UTF8[lead as usize] as usize;
        if len == 1 || len > p.len() {
            return None;
        }
        let s = std::str::from_utf8(&p[..len]).ok()?;
        s.chars().next().map(|c| (c as CodePoint, len))
    }

    fn code_to_mbc(&self, code: CodePoint, buf: &mut [u8; 4]) -> usize {
        match to_char(code) {
            Some(c) => c.encode_utf8(buf).len(),
            None => {
                buf[0] = (code & 0xff) as u8;
                1
            }
        }
    }

    fn is_code_ctype(&self, code: CodePoint, class: CharClass) -> bool {
        if code <= ASCII_LIMIT {
            return is_ascii_code_ctype(code, class);
        }
        let Some(c) = to_char(code) else {
            return false;
        };
        match class {
            CharClass::Alpha => c.is_alphabetic(),
            CharClass::Upper => c.is_uppercase(),
            CharClass::Lower => c.is_lowercase(),
            CharClass::Digit | CharClass::Xdigit => false,
            CharClass::Space => c.is_whitespace(),
            CharClass::Blank => c.is_whitespace() && !matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}'),
            CharClass::Alnum => c.is_alphanumeric(),
            CharClass::Cntrl => c.is_control(),
            CharClass::Print => !c.is_control(),
            CharClass::Graph => !c.is_control() && !c.is_whitespace(),
            CharClass::Punct => !c.is_control() && !c.is_whitespace() && !c.is_alphanumeric(),
        }
    }

    fn to_upper(&self, code: CodePoint) -> CodePoint {
        if code <= ASCII_LIMIT {
            return ascii_to_upper(code);
        }
        let Some(c) = to_char(code) else {
            return code;
        };
        let mut up = c.to_uppercase();
        match (up.next(), up.next()) {
            (Some(u), None) => u as CodePoint,
            _ => code,
        }
    }

    fn to_lower(&self, code: CodePoint) -> CodePoint {
        if code <= ASCII_LIMIT {
            return ascii_to_lower(code);
        }
        let Some(c) = to_char(code) else {
            return code;
        };
        let mut low = c.to_lowercase();
        match (low.next(), low.next()) {
            (Some(l), None) => l as CodePoint,
            _ => code,
        }
    }
}

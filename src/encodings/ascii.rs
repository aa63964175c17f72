// encodings/ascii.rs - Single-byte "C" locale encoding.
// Every byte is one character; only 0x00-0x7f carry ctype properties.

use crate::regenc::*;

pub struct AsciiEncoding;

pub static ENCODING_ASCII: AsciiEncoding = AsciiEncoding;

impl Encoding for AsciiEncoding {
    fn name(&self) -> &str {
        "US-ASCII"
    }

    fn max_enc_len(&self) -> usize {
        1
    }

    fn mbc_enc_len(&self, _p: &[u8]) -> usize {
        1
    }

    fn mbc_to_code(&self, p: &[u8]) -> Option<(CodePoint, usize)> {
        p.first().map(|&b| (b as CodePoint, 1))
    }

    fn code_to_mbc(&self, code: CodePoint, buf: &mut [u8; 4]) -> usize {
        buf[0] = (code & 0xff) as u8;
        1
    }

    fn is_code_ctype(&self, code: CodePoint, class: CharClass) -> bool {
        is_ascii_code_ctype(code, class)
    }

    fn to_upper(&self, code: CodePoint) -> CodePoint {
        ascii_to_upper(code)
    }

    fn to_lower(&self, code: CodePoint) -> CodePoint {
        ascii_to_lower(code)
    }

    fn is_word_code(&self, code: CodePoint) -> bool {
        is_ascii_word(code)
    }
}

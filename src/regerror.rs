// regerror.rs - Port of the regerror() half of regcomp.c
// Error code to message conversion.

use crate::regex::{PatternBuffer, RegErrcode};

/// Message for an error code.
pub fn regerror_message(code: RegErrcode) -> &'static str {
    match code {
        RegErrcode::NoError => "Success",
        RegErrcode::NoMatch => "No match",
        RegErrcode::BadPat => "Invalid regular expression",
        RegErrcode::ECollate => "Invalid collation character",
        RegErrcode::ECtype => "Invalid character class name",
        RegErrcode::EEscape => "Trailing backslash",
        RegErrcode::ESubreg => "Invalid back reference",
        RegErrcode::EBrack => "Unmatched [, [^, [:, [., or [=",
        RegErrcode::EParen => "Unmatched ( or \\(",
        RegErrcode::EBrace => "Unmatched \\{",
        RegErrcode::BadBr => "Invalid content of \\{\\}",
        RegErrcode::ERange => "Invalid range end",
        RegErrcode::ESpace => "Memory exhausted",
        RegErrcode::BadRpt => "Invalid preceding regular expression",
        RegErrcode::EEnd => "Premature end of regular expression",
        RegErrcode::ESize => "Regular expression too big",
        RegErrcode::ERParen => "Unmatched ) or \\)",
        RegErrcode::EBracket => "Invalid interval bounds",
    }
}

/// POSIX `regerror`: copy the NUL-terminated message for `code` into
/// `errbuf`, truncating to fit, and return the size needed for the whole
/// message including its NUL. Raw codes outside the table are reported as
/// `BadPat` when converted by the caller; `preg` is accepted for
/// signature compatibility.
pub fn regerror(code: RegErrcode, _preg: Option<&PatternBuffer>, errbuf: &mut [u8]) -> usize {
    let msg = regerror_message(code).as_bytes();
    let needed = msg.len() + 1;
    if let Some(room) = errbuf.len().checked_sub(1) {
        let n = msg.len().min(room);
        errbuf[..n].copy_from_slice(&msg[..n]);
        errbuf[n] = 0;
    }
    needed
}

/// `regerror` for a raw numeric code; unknown codes map to `BadPat`.
pub fn regerror_code(code: i32, preg: Option<&PatternBuffer>, errbuf: &mut [u8]) -> usize {
    let code = RegErrcode::from_code(code).unwrap_or(RegErrcode::BadPat);
    regerror(code, preg, errbuf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(regerror_message(RegErrcode::NoMatch), "No match");
        assert_eq!(regerror_message(RegErrcode::EParen), "Unmatched ( or \\(");
        assert_eq!(RegErrcode::ESpace.to_string(), "Memory exhausted");
    }

    #[test]
    fn full_buffer() {
        let mut buf = [0xffu8; 64];
        let n = regerror(RegErrcode::EEscape, None, &mut buf);
        assert_eq!(n, "Trailing backslash".len() + 1);
        assert_eq!(&buf[..n], b"Trailing backslash\0");
    }

    #[test]
    fn truncated() {
        let mut buf = [0xffu8; 6];
        let n = regerror(RegErrcode::BadPat, None, &mut buf);
        assert_eq!(n, "Invalid regular expression".len() + 1);
        assert_eq!(&buf, b"Inval\0");
    }

    #[test]
    fn empty_buffer_only_reports_size() {
        let mut buf: [u8; 0] = [];
        assert_eq!(regerror(RegErrcode::NoError, None, &mut buf), 8);
    }

    #[test]
    fn unknown_raw_code() {
        let mut buf = [0u8; 64];
        let n = regerror_code(99, None, &mut buf);
        assert_eq!(&buf[..n], b"Invalid regular expression\0");
    }
}

// compat_utf8.rs - Integration tests for multibyte (UTF-8) subjects.
//
//   x2(pattern, string, from, to)       -> search, expect match at from..to
//   x3(pattern, string, from, to, mem)  -> search, expect group mem at from..to
//   n(pattern, string)                  -> search, expect no match
//
// Offsets are byte offsets into the raw subject.

use gnurex::encodings::utf8::ENCODING_UTF8;
use gnurex::regcomp::regcomp;
use gnurex::regex::*;
use gnurex::regexec::regexec;

fn run(cflags: CompileFlags, pattern: &[u8], input: &[u8], nmatch: usize) -> Option<Vec<RegMatch>> {
    let mut preg = PatternBuffer::with_encoding(&ENCODING_UTF8);
    let code = regcomp(&mut preg, pattern, cflags);
    assert_eq!(
        code,
        RegErrcode::NoError,
        "compile failed for {:?}",
        String::from_utf8_lossy(pattern)
    );
    let mut pmatch = vec![RegMatch::UNSET; nmatch];
    match regexec(&preg, input, &mut pmatch, ExecFlags::empty()) {
        RegErrcode::NoError => Some(pmatch),
        RegErrcode::NoMatch => None,
        other => panic!("regexec error {:?}", other),
    }
}

fn x3(pattern: &[u8], input: &[u8], from: RegOff, to: RegOff, mem: usize) {
    let m = run(CompileFlags::EXTENDED, pattern, input, mem + 1).unwrap_or_else(|| {
        panic!(
            "x3: expected match for {:?} against {:?}",
            String::from_utf8_lossy(pattern),
            String::from_utf8_lossy(input)
        )
    });
    assert_eq!(
        (m[mem].rm_so, m[mem].rm_eo),
        (from, to),
        "x3: wrong group {} for {:?} against {:?}",
        mem,
        String::from_utf8_lossy(pattern),
        String::from_utf8_lossy(input)
    );
}

fn x2(pattern: &[u8], input: &[u8], from: RegOff, to: RegOff) {
    x3(pattern, input, from, to, 0);
}

fn n(pattern: &[u8], input: &[u8]) {
    assert!(
        run(CompileFlags::EXTENDED, pattern, input, 1).is_none(),
        "n: expected no match for {:?} against {:?}",
        String::from_utf8_lossy(pattern),
        String::from_utf8_lossy(input)
    );
}

#[test]
fn test_literals() {
    x2("é".as_bytes(), "café".as_bytes(), 3, 5);
    x2("あい".as_bytes(), "xあいう".as_bytes(), 1, 7);
    x2("é+".as_bytes(), "ééx".as_bytes(), 0, 4);
    n("é".as_bytes(), "e".as_bytes());
}

#[test]
fn test_period_consumes_whole_characters() {
    x2(b".", "é".as_bytes(), 0, 2);
    x2(b"a.c", "aあc".as_bytes(), 0, 5);
    x2(b"^.$", "あ".as_bytes(), 0, 3);
    x2(b"..", "éa".as_bytes(), 0, 3);
    n(b"^..$", "é".as_bytes());
}

#[test]
fn test_brackets() {
    x2("[é]".as_bytes(), "aé".as_bytes(), 1, 3);
    x2("[àé]+".as_bytes(), "xéàé".as_bytes(), 1, 7);
    x2(b"[^a]", "aé".as_bytes(), 1, 3);
    x2("[^é]".as_bytes(), "éb".as_bytes(), 2, 3);
    x2("[à-ï]".as_bytes(), "aé".as_bytes(), 1, 3);
    x2("[a-z]+".as_bytes(), "éab".as_bytes(), 2, 4);
    n("[à-è]".as_bytes(), "é".as_bytes());
    n("[é]".as_bytes(), "e".as_bytes());
}

#[test]
fn test_groups_report_byte_offsets() {
    x3("(é+)(a)".as_bytes(), "xééa".as_bytes(), 1, 5, 1);
    x3("(é+)(a)".as_bytes(), "xééa".as_bytes(), 5, 6, 2);
    x3("(.)\\1".as_bytes(), "aéé".as_bytes(), 1, 3, 1);
}

#[test]
fn test_invalid_bytes() {
    // A stray byte is consumed as one character by '.' and negated lists.
    x2(b"a.b", b"a\xffb", 0, 3);
    x2(b"[^x]", b"\xff", 0, 1);
    x2(b"a.b", b"a\xc3b", 0, 3);
    n(b"a..b", b"a\xffb");
}

#[test]
fn test_icase() {
    let m = run(
        CompileFlags::EXTENDED | CompileFlags::ICASE,
        b"abc",
        "éABC".as_bytes(),
        1,
    )
    .unwrap();
    assert_eq!(m[0], RegMatch::new(2, 5));
}

#[test]
fn test_newline_with_multibyte() {
    let f = CompileFlags::EXTENDED | CompileFlags::NEWLINE;
    let m = run(f, b"^.$", "a\né".as_bytes(), 1).unwrap();
    assert_eq!(m[0], RegMatch::new(0, 1));
    let m = run(f, b"^..?$", "a\né".as_bytes(), 1).unwrap();
    assert_eq!(m[0], RegMatch::new(0, 1));
}

#[test]
fn test_anchored_multibyte_start() {
    x2("^é".as_bytes(), "éa".as_bytes(), 0, 2);
    n("^é".as_bytes(), "aé".as_bytes());
    x2("é$".as_bytes(), "aé".as_bytes(), 1, 3);
}

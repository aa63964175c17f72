// compat_syntax.rs - Integration tests for the syntax presets.
//
// Each helper receives the syntax bits explicitly and goes through
// re_compile_pattern + re_search with UTF-8 encoding:
//   x2_syn(syntax, pattern, string, from, to)
//   x3_syn(syntax, pattern, string, from, to, mem)
//   n_syn(syntax, pattern, string)
//   e_syn(syntax, pattern, code)

use gnurex::encodings::utf8::ENCODING_UTF8;
use gnurex::regcomp::re_compile_pattern;
use gnurex::regex::*;
use gnurex::regexec::re_search;

fn compile_syn(syntax: Syntax, pattern: &[u8]) -> PatternBuffer {
    let mut buf = PatternBuffer::with_encoding(&ENCODING_UTF8);
    re_compile_pattern(pattern, syntax, &mut buf).unwrap_or_else(|e| {
        panic!(
            "compile failed for {:?}: {}",
            String::from_utf8_lossy(pattern),
            e
        )
    });
    buf
}

fn search_syn(syntax: Syntax, pattern: &[u8], input: &[u8]) -> Option<Registers> {
    let mut buf = compile_syn(syntax, pattern);
    let mut regs = Registers::new();
    let r = re_search(&mut buf, input, 0, input.len() as RegOff, Some(&mut regs));
    assert!(r != RE_SEARCH_ERROR, "search error for {:?}", String::from_utf8_lossy(pattern));
    (r >= 0).then_some(regs)
}

fn x3_syn(syntax: Syntax, pattern: &[u8], input: &[u8], from: RegOff, to: RegOff, mem: usize) {
    let regs = search_syn(syntax, pattern, input).unwrap_or_else(|| {
        panic!(
            "x3: expected match for {:?} against {:?}",
            String::from_utf8_lossy(pattern),
            String::from_utf8_lossy(input)
        )
    });
    assert_eq!(
        (regs.start[mem], regs.end[mem]),
        (from, to),
        "x3: wrong group {} for {:?} against {:?}",
        mem,
        String::from_utf8_lossy(pattern),
        String::from_utf8_lossy(input)
    );
}

fn x2_syn(syntax: Syntax, pattern: &[u8], input: &[u8], from: RegOff, to: RegOff) {
    x3_syn(syntax, pattern, input, from, to, 0);
}

fn n_syn(syntax: Syntax, pattern: &[u8], input: &[u8]) {
    assert!(
        search_syn(syntax, pattern, input).is_none(),
        "n: expected no match for {:?} against {:?}",
        String::from_utf8_lossy(pattern),
        String::from_utf8_lossy(input)
    );
}

fn e_syn(syntax: Syntax, pattern: &[u8], code: RegErrcode) {
    let mut buf = PatternBuffer::with_encoding(&ENCODING_UTF8);
    assert_eq!(
        re_compile_pattern(pattern, syntax, &mut buf),
        Err(code),
        "e: wrong result for {:?}",
        String::from_utf8_lossy(pattern)
    );
}

// ============================================================================
// POSIX basic (also ed and sed)
// ============================================================================

#[test]
fn test_posix_basic() {
    let s = RE_SYNTAX_POSIX_BASIC;
    x2_syn(s, b"a\\{1,2\\}", b"aaa", 0, 2);
    x2_syn(s, b"a\\+b", b"aab", 0, 3);
    x2_syn(s, b"a\\?b", b"b", 0, 1);
    x2_syn(s, b"a\\|b", b"b", 0, 1);
    x3_syn(s, b"\\(a\\)\\1", b"xaa", 1, 2, 1);
    x2_syn(s, b"\\w\\+", b"  ab ", 2, 4);
    x2_syn(s, b"{", b"a{", 1, 2);
    x2_syn(s, b"a|b", b"a|b", 0, 3);
    e_syn(s, b"a**", RegErrcode::BadRpt);
    e_syn(s, b"\\(a", RegErrcode::EParen);
    assert_eq!(RE_SYNTAX_ED, s);
    assert_eq!(RE_SYNTAX_SED, s);
}

#[test]
fn test_posix_minimal_basic() {
    let s = RE_SYNTAX_POSIX_MINIMAL_BASIC;
    x2_syn(s, b"a\\+", b"a+", 0, 2);
    x2_syn(s, b"a\\?", b"a?", 0, 2);
    x2_syn(s, b"a*", b"aa", 0, 2);
    x2_syn(s, b"\\(a\\)\\1", b"aa", 0, 2);
}

// ============================================================================
// POSIX extended
// ============================================================================

#[test]
fn test_posix_extended() {
    let s = RE_SYNTAX_POSIX_EXTENDED;
    x2_syn(s, b"a{1,2}", b"aaa", 0, 2);
    x2_syn(s, b"a+b", b"aab", 0, 3);
    x2_syn(s, b"a?b", b"b", 0, 1);
    x2_syn(s, b"a|b", b"b", 0, 1);
    x3_syn(s, b"(a)\\1", b"xaa", 1, 2, 1);
    x2_syn(s, b"\\(a\\)", b"(a)", 0, 3);
    x2_syn(s, b"a)", b"a)", 0, 2);
    n_syn(s, b"a.b", b"a\0b");
    e_syn(s, b"(a", RegErrcode::EParen);
    e_syn(s, b"a{1", RegErrcode::EBrace);
}

#[test]
fn test_posix_minimal_extended() {
    let s = RE_SYNTAX_POSIX_MINIMAL_EXTENDED;
    x2_syn(s, b"(a)\\1", b"a1", 0, 2);
    x2_syn(s, b"a+", b"baa", 1, 3);
    e_syn(s, b"*a", RegErrcode::BadRpt);
}

// ============================================================================
// grep / egrep
// ============================================================================

#[test]
fn test_grep() {
    let s = RE_SYNTAX_GREP;
    x2_syn(s, b"ab\ncd", b"xcd", 1, 3);
    x2_syn(s, b"a\\{2\\}", b"aaa", 0, 2);
    x3_syn(s, b"\\(b\\)\\1", b"abb", 1, 2, 1);
    n_syn(s, b"ab\ncd", b"acbd");
}

#[test]
fn test_egrep() {
    let s = RE_SYNTAX_EGREP;
    x2_syn(s, b"ab\ncd", b"xcd", 1, 3);
    x2_syn(s, b"a{2}|z", b"aaz", 0, 2);
    // An unterminated interval is literal text.
    x2_syn(s, b"a{2", b"aa{2", 1, 4);
    x2_syn(s, b"a.b", b"a\0b", 0, 3);
    assert_eq!(RE_SYNTAX_POSIX_EGREP, s);
}

// ============================================================================
// awk family
// ============================================================================

#[test]
fn test_awk() {
    let s = RE_SYNTAX_AWK;
    // No back-references and no intervals.
    x2_syn(s, b"(a)\\1", b"a1", 0, 2);
    x2_syn(s, b"a{2}", b"a{2}", 0, 4);
    // Escapes work inside brackets.
    x2_syn(s, b"[\\]a]+", b"x]a", 1, 3);
    // GNU operators are off.
    x2_syn(s, b"\\w", b"aw", 1, 2);
    x2_syn(s, b"a.b", b"a\nb", 0, 3);
    n_syn(s, b"a.b", b"a\0b");
}

#[test]
fn test_gnu_awk() {
    let s = RE_SYNTAX_GNU_AWK;
    x2_syn(s, b"[\\]a]+", b"x]a", 1, 3);
    x2_syn(s, b"\\w+", b" ab ", 1, 3);
    x2_syn(s, b"a{2}", b"aaa", 0, 2);
    x2_syn(s, b"a{2", b"a{2", 0, 3);
    x2_syn(s, b"a.b", b"a\0b", 0, 3);
}

#[test]
fn test_posix_awk() {
    let s = RE_SYNTAX_POSIX_AWK;
    x2_syn(s, b"a{2}", b"aaa", 0, 2);
    x2_syn(s, b"\\w", b"aw", 1, 2);
    x2_syn(s, b"[\\]a]+", b"x]a", 1, 3);
}

// ============================================================================
// Emacs
// ============================================================================

#[test]
fn test_emacs() {
    let s = RE_SYNTAX_EMACS;
    x2_syn(s, b"a+", b"baa", 1, 3);
    x2_syn(s, b"a?b", b"ab", 0, 2);
    x3_syn(s, b"\\(a\\|b\\)*c", b"abac", 2, 3, 1);
    x2_syn(s, b"a{2}", b"a{2}", 0, 4);
    // No character classes and no newline for '.'.
    n_syn(s, b"a.b", b"a\nb");
    x2_syn(s, b"a.b", b"a\0b", 0, 3);
}

// ============================================================================
// Individual bits
// ============================================================================

#[test]
fn test_no_empty_ranges() {
    e_syn(RE_SYNTAX_POSIX_EXTENDED, b"[b-a]", RegErrcode::ERange);
    let s = RE_SYNTAX_POSIX_EXTENDED.difference(Syntax::NO_EMPTY_RANGES);
    n_syn(s, b"[b-a]", b"ab");
}

#[test]
fn test_hat_lists_not_newline() {
    let s = RE_SYNTAX_POSIX_EXTENDED | Syntax::HAT_LISTS_NOT_NEWLINE;
    n_syn(s, b"[^a]", b"\n");
    x2_syn(RE_SYNTAX_POSIX_EXTENDED, b"[^a]", b"\n", 0, 1);
}

#[test]
fn test_icase_bit() {
    let s = RE_SYNTAX_POSIX_EXTENDED | Syntax::ICASE;
    x2_syn(s, b"ABC", b"xabc", 1, 4);
    x2_syn(s, b"[A-C]+", b"cab", 0, 3);
}

#[test]
fn test_no_gnu_ops() {
    let s = RE_SYNTAX_POSIX_EXTENDED | Syntax::NO_GNU_OPS;
    x2_syn(s, b"\\<", b"a<", 1, 2);
    x2_syn(s, b"\\s", b"as", 1, 2);
}

#[test]
fn test_context_invalid_dup() {
    e_syn(RE_SYNTAX_POSIX_BASIC, b"\\(\\{1\\}a\\)", RegErrcode::BadRpt);
}

#[test]
fn test_newline_alt() {
    let s = RE_SYNTAX_POSIX_EXTENDED | Syntax::NEWLINE_ALT;
    x2_syn(s, b"a\nb", b"b", 0, 1);
    x2_syn(RE_SYNTAX_POSIX_EXTENDED, b"a\nb", b"a\nb", 0, 3);
}

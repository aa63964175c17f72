// compat_backref.rs - Integration tests for back-references.
//
// Back-references make the DFA over-approximate; every candidate end is
// verified by the register backtracker. These tests pin down the overall
// leftmost-longest result and the group contents.

use gnurex::regcomp::regcomp;
use gnurex::regex::*;
use gnurex::regexec::regexec;

fn run(cflags: CompileFlags, pattern: &[u8], input: &[u8], nmatch: usize) -> Option<Vec<RegMatch>> {
    let mut preg = PatternBuffer::new();
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
fn test_simple() {
    x2(b"(a)\\1", b"aa", 0, 2);
    x2(b"(.)\\1", b"abccd", 2, 4);
    x2(b"(ab)\\1", b"xababx", 1, 5);
    n(b"(a)\\1", b"ab");
    n(b"(.)\\1", b"abcd");
}

#[test]
fn test_longest_overall() {
    x2(b"(a+)\\1", b"aaaa", 0, 4);
    x3(b"(a+)\\1", b"aaaa", 0, 2, 1);
    x2(b"(a+)\\1", b"aaaaa", 0, 4);
    x2(b"([a-c]*)\\1", b"abcabc", 0, 6);
    x3(b"([a-c]*)\\1", b"abcabc", 0, 3, 1);
}

#[test]
fn test_anchored() {
    x3(b"^(.+)\\1$", b"abab", 0, 2, 1);
    n(b"^(.+)\\1$", b"aba");
    n(b"^(.+)\\1$", b"abcabd");
}

#[test]
fn test_later_start() {
    x2(b"(b+)\\1", b"abbbb", 1, 5);
    x2(b"x(a|b)\\1", b"xabxbb", 3, 6);
    x3(b"x(a|b)\\1", b"xabxbb", 4, 5, 1);
}

#[test]
fn test_multiple_references() {
    x2(b"(a)(b)\\2\\1", b"xabba", 1, 5);
    x2(b"(a)\\1\\1", b"aaaa", 0, 3);
    n(b"(a)(b)\\2\\1", b"abab");
}

#[test]
fn test_reference_to_empty_group() {
    x2(b"(a*)\\1b", b"b", 0, 1);
    x3(b"(a*)\\1b", b"b", 0, 0, 1);
    x2(b"(a*)\\1b", b"aaab", 1, 4);
}

#[test]
fn test_empty_iteration_of_starred_group() {
    x2(b"(b*)*\\1", b"", 0, 0);
    x3(b"(b*)*\\1", b"", 0, 0, 1);
    x2(b"(b*)*\\1", b"a", 0, 0);
    x3(b"(b*)*\\1", b"a", 0, 0, 1);
    x2(b"((b)*)*\\1", b"acb", 0, 0);
    x3(b"((b)*)*\\1", b"acb", 0, 0, 1);
    x3(b"(a*)*", b"b", 0, 0, 1);
}

#[test]
fn test_starred_group_before_reference() {
    x2(b"(b*)*\\1", b"bb", 0, 2);
    x3(b"(b*)*\\1", b"bb", 0, 1, 1);
    x2(b"(a|b*)*\\1x", b"x", 0, 1);
    x3(b"(a|b*)*\\1x", b"x", 0, 0, 1);
}

#[test]
fn test_basic_syntax() {
    let m = run(CompileFlags::empty(), b"\\(a*\\)b\\1", b"aabaa", 2).unwrap();
    assert_eq!(m[0], RegMatch::new(0, 5));
    assert_eq!(m[1], RegMatch::new(0, 2));
}

#[test]
fn test_icase() {
    let m = run(CompileFlags::EXTENDED | CompileFlags::ICASE, b"(a)\\1", b"aA", 1).unwrap();
    assert_eq!(m[0], RegMatch::new(0, 2));
}

#[test]
fn test_newline() {
    let f = CompileFlags::EXTENDED | CompileFlags::NEWLINE;
    let m = run(f, b"^(.*)\\1$", b"xy\nabab", 2).unwrap();
    assert_eq!(m[0], RegMatch::new(3, 7));
    assert_eq!(m[1], RegMatch::new(3, 5));
}

#[test]
fn test_bounded_work_on_long_subject() {
    let subject = "a".repeat(64);
    let m = run(CompileFlags::EXTENDED, b"^(a+)\\1$", subject.as_bytes(), 2).unwrap();
    assert_eq!(m[0], RegMatch::new(0, 64));
    assert_eq!(m[1], RegMatch::new(0, 32));

    let subject = "a".repeat(63);
    assert!(run(CompileFlags::EXTENDED, b"^(a+)\\1$", subject.as_bytes(), 1).is_none());
}

// compat_gnu.rs - Integration tests for the GNU re_* interface.
//
// Covers re_compile_pattern, re_compile_fastmap, re_search(_2),
// re_match(_2), re_set_registers and the syntax presets.

use gnurex::regcomp::{re_compile_fastmap, re_compile_pattern};
use gnurex::regex::*;
use gnurex::regexec::{re_match, re_match_2, re_search, re_search_2, re_set_registers};

fn compile(pattern: &[u8], syntax: Syntax) -> PatternBuffer {
    let mut buf = PatternBuffer::new();
    re_compile_pattern(pattern, syntax, &mut buf).unwrap_or_else(|e| {
        panic!(
            "compile failed for {:?}: {}",
            String::from_utf8_lossy(pattern),
            e
        )
    });
    buf
}

fn search_all(buf: &mut PatternBuffer, subject: &[u8]) -> RegOff {
    re_search(buf, subject, 0, subject.len() as RegOff, None)
}

// ============================================================================
// re_search
// ============================================================================

#[test]
fn test_search_forward() {
    let mut buf = compile(b"abc", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all(&mut buf, b"xxabcabc"), 2);
    assert_eq!(re_search(&mut buf, b"xxabcabc", 3, 5, None), 5);
    assert_eq!(search_all(&mut buf, b"xxab"), RE_SEARCH_NOMATCH);
}

#[test]
fn test_search_range_limits_starts() {
    let mut buf = compile(b"abc", RE_SYNTAX_POSIX_EXTENDED);
    // Only starts 0 and 1 are tried.
    assert_eq!(re_search(&mut buf, b"xxabc", 0, 1, None), RE_SEARCH_NOMATCH);
    assert_eq!(re_search(&mut buf, b"xxabc", 0, 2, None), 2);
    // A range past the end is clamped.
    assert_eq!(re_search(&mut buf, b"xxabc", 0, 1000, None), 2);
}

#[test]
fn test_search_backward() {
    let mut buf = compile(b"abc", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_search(&mut buf, b"abcabc", 5, -5, None), 3);
    assert_eq!(re_search(&mut buf, b"abcabc", 2, -2, None), 0);
    assert_eq!(re_search(&mut buf, b"abcxxx", 5, -2, None), RE_SEARCH_NOMATCH);
}

#[test]
fn test_search_bad_start() {
    let mut buf = compile(b"a", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_search(&mut buf, b"aaa", 4, 1, None), RE_SEARCH_NOMATCH);
    assert_eq!(re_search(&mut buf, b"aaa", -1, 1, None), RE_SEARCH_NOMATCH);
}

#[test]
fn test_search_uncompiled_is_error() {
    let mut buf = PatternBuffer::new();
    assert_eq!(search_all(&mut buf, b"abc"), RE_SEARCH_ERROR);
}

#[test]
fn test_compile_pattern_error() {
    let mut buf = PatternBuffer::new();
    assert_eq!(
        re_compile_pattern(b"\\(a", RE_SYNTAX_POSIX_BASIC, &mut buf),
        Err(RegErrcode::EParen)
    );
    assert!(!buf.is_compiled());
    assert_eq!(
        re_compile_pattern(b"a\\)", RE_SYNTAX_POSIX_BASIC, &mut buf),
        Err(RegErrcode::ERParen)
    );
}

#[test]
fn test_compile_pattern_anchors_at_newlines() {
    let mut buf = compile(b"^b", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all(&mut buf, b"a\nb"), 2);
    let mut buf = compile(b"a$", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all(&mut buf, b"a\nb"), 0);
}

#[test]
fn test_not_bol_not_eol_fields() {
    let mut buf = compile(b"^a", RE_SYNTAX_POSIX_EXTENDED);
    buf.not_bol = true;
    assert_eq!(search_all(&mut buf, b"a"), RE_SEARCH_NOMATCH);
    assert_eq!(search_all(&mut buf, b"b\na"), 2);

    let mut buf = compile(b"a$", RE_SYNTAX_POSIX_EXTENDED);
    buf.not_eol = true;
    assert_eq!(search_all(&mut buf, b"a"), RE_SEARCH_NOMATCH);
}

// ============================================================================
// Registers
// ============================================================================

#[test]
fn test_registers_are_allocated() {
    let mut buf = compile(b"\\(fo*\\)\\(bar\\)", RE_SYNTAX_POSIX_BASIC);
    let mut regs = Registers::new();
    assert_eq!(re_search(&mut buf, b"xx foobar", 0, 9, Some(&mut regs)), 3);
    assert_eq!(buf.regs_allocated, RegsAllocated::Reallocate);
    assert!(regs.num_regs >= RE_NREGS);
    assert_eq!((regs.start[0], regs.end[0]), (3, 9));
    assert_eq!((regs.start[1], regs.end[1]), (3, 6));
    assert_eq!((regs.start[2], regs.end[2]), (6, 9));
    assert!(regs.start[3..regs.num_regs].iter().all(|&s| s == REG_UNSET));
}

#[test]
fn test_registers_are_reused() {
    let mut buf = compile(b"(a)(b)?", RE_SYNTAX_POSIX_EXTENDED);
    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, b"ab", &mut regs), 0);
    assert_eq!((regs.start[2], regs.end[2]), (1, 2));
    let n = regs.num_regs;
    assert_eq!(search_all_regs(&mut buf, b"xa", &mut regs), 1);
    assert_eq!(regs.num_regs, n);
    assert_eq!((regs.start[1], regs.end[1]), (1, 2));
    assert_eq!((regs.start[2], regs.end[2]), (REG_UNSET, REG_UNSET));
}

fn search_all_regs(buf: &mut PatternBuffer, subject: &[u8], regs: &mut Registers) -> RegOff {
    re_search(buf, subject, 0, subject.len() as RegOff, Some(regs))
}

#[test]
fn test_fixed_registers() {
    let mut buf = compile(b"(a)(b)(c)", RE_SYNTAX_POSIX_EXTENDED);
    buf.regs_allocated = RegsAllocated::Fixed;
    let mut regs = Registers {
        num_regs: 2,
        start: vec![0; 2],
        end: vec![0; 2],
    };
    assert_eq!(search_all_regs(&mut buf, b"xabc", &mut regs), 1);
    assert_eq!(regs.num_regs, 2);
    assert_eq!(regs.start, vec![1, 1]);
    assert_eq!(regs.end, vec![4, 2]);
}

#[test]
fn test_set_registers() {
    let mut buf = compile(b"(a)", RE_SYNTAX_POSIX_EXTENDED);
    let mut regs = Registers::new();
    re_set_registers(&mut buf, &mut regs, 4, vec![0; 4], vec![0; 4]);
    assert_eq!(buf.regs_allocated, RegsAllocated::Reallocate);
    assert_eq!(regs.num_regs, 4);
    assert_eq!(search_all_regs(&mut buf, b"ba", &mut regs), 1);
    assert_eq!(regs.num_regs, 4);
    assert_eq!((regs.start[1], regs.end[1]), (1, 2));
    assert_eq!(regs.start[3], REG_UNSET);

    re_set_registers(&mut buf, &mut regs, 0, Vec::new(), Vec::new());
    assert_eq!(buf.regs_allocated, RegsAllocated::Unallocated);
    assert_eq!(regs.num_regs, 0);
}

#[test]
fn test_no_sub_leaves_registers() {
    let mut buf = compile(b"(a)", RE_SYNTAX_POSIX_EXTENDED | Syntax::NO_SUB);
    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, b"ba", &mut regs), 1);
    assert_eq!(regs.num_regs, 0);
    assert_eq!(buf.regs_allocated, RegsAllocated::Unallocated);
}

// ============================================================================
// re_match
// ============================================================================

#[test]
fn test_match_returns_length() {
    let mut buf = compile(b"ab*", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_match(&mut buf, b"abbbc", 0, None), 4);
    assert_eq!(re_match(&mut buf, b"xab", 0, None), RE_SEARCH_NOMATCH);
    assert_eq!(re_match(&mut buf, b"xab", 1, None), 2);
}

#[test]
fn test_match_empty() {
    let mut buf = compile(b"a*", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_match(&mut buf, b"bbb", 0, None), 0);
}

#[test]
fn test_match_with_registers() {
    let mut buf = compile(b"\\(a*\\)b", RE_SYNTAX_POSIX_BASIC);
    let mut regs = Registers::new();
    assert_eq!(re_match(&mut buf, b"xaab", 1, Some(&mut regs)), 3);
    assert_eq!((regs.start[0], regs.end[0]), (1, 4));
    assert_eq!((regs.start[1], regs.end[1]), (1, 3));
}

// ============================================================================
// Split subjects
// ============================================================================

#[test]
fn test_search_2_spans_halves() {
    let mut buf = compile(b"ab", RE_SYNTAX_POSIX_EXTENDED);
    let mut regs = Registers::new();
    assert_eq!(re_search_2(&mut buf, b"xa", b"by", 0, 4, Some(&mut regs), 4), 1);
    assert_eq!((regs.start[0], regs.end[0]), (1, 3));
}

#[test]
fn test_search_2_stop() {
    let mut buf = compile(b"ab", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_search_2(&mut buf, b"xa", b"b", 0, 3, None, 2), RE_SEARCH_NOMATCH);
    assert_eq!(re_search_2(&mut buf, b"xa", b"b", 0, 3, None, 3), 1);
    assert_eq!(re_search_2(&mut buf, b"xa", b"b", 0, 3, None, -1), RE_SEARCH_ERROR);
}

#[test]
fn test_search_2_empty_halves() {
    let mut buf = compile(b"b", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_search_2(&mut buf, b"", b"ab", 0, 2, None, 2), 1);
    assert_eq!(re_search_2(&mut buf, b"ab", b"", 0, 2, None, 2), 1);
}

#[test]
fn test_match_2() {
    let mut buf = compile(b"a+b", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(re_match_2(&mut buf, b"aa", b"abc", 0, None, 5), 4);
    assert_eq!(re_match_2(&mut buf, b"aa", b"abc", 0, None, 3), RE_SEARCH_NOMATCH);
}

// ============================================================================
// Fastmap
// ============================================================================

#[test]
fn test_fastmap_contents() {
    let mut buf = compile(b"abc|xyz", RE_SYNTAX_POSIX_EXTENDED);
    buf.fastmap = Some(Box::default());
    assert_eq!(re_compile_fastmap(&mut buf), 0);
    assert!(buf.fastmap_accurate);
    let map = buf.fastmap.as_deref().unwrap();
    assert!(map.contains(b'a'));
    assert!(map.contains(b'x'));
    assert!(!map.contains(b'b'));
    assert!(!map.contains(b'y'));
    assert!(!buf.can_be_null);
}

#[test]
fn test_fastmap_can_be_null() {
    let mut buf = compile(b"a*", RE_SYNTAX_POSIX_EXTENDED);
    buf.fastmap = Some(Box::default());
    re_compile_fastmap(&mut buf);
    assert!(buf.can_be_null);
}

#[test]
fn test_fastmap_uncompiled() {
    let mut buf = PatternBuffer::new();
    assert_eq!(re_compile_fastmap(&mut buf), -2);
}

#[test]
fn test_search_with_fastmap() {
    let mut buf = compile(b"[0-9]+", RE_SYNTAX_POSIX_EXTENDED);
    buf.fastmap = Some(Box::default());
    re_compile_fastmap(&mut buf);
    let subject = format!("{}42", "x".repeat(100));
    assert_eq!(search_all(&mut buf, subject.as_bytes()), 100);
    assert_eq!(re_search(&mut buf, subject.as_bytes(), 101, -101, None), 101);
}

// ============================================================================
// Translate table
// ============================================================================

#[test]
fn test_translate_table() {
    let mut table = [0u8; 256];
    for (i, t) in table.iter_mut().enumerate() {
        *t = (i as u8).to_ascii_lowercase();
    }
    let mut buf = PatternBuffer::new();
    buf.translate = Some(Box::new(table));
    re_compile_pattern(b"ABC", RE_SYNTAX_POSIX_EXTENDED, &mut buf).unwrap();
    assert_eq!(search_all(&mut buf, b"xaBc"), 1);
}

// ============================================================================
// Syntax presets
// ============================================================================

#[test]
fn test_grep_newline_alternation() {
    let mut buf = compile(b"foo\nbar", RE_SYNTAX_GREP);
    assert_eq!(search_all(&mut buf, b"xbar"), 1);
    assert_eq!(search_all(&mut buf, b"foo"), 0);
}

#[test]
fn test_egrep() {
    let mut buf = compile(b"a+|b{2}", RE_SYNTAX_EGREP);
    assert_eq!(search_all(&mut buf, b"cbb"), 1);
}

#[test]
fn test_awk_has_no_gnu_ops() {
    let mut buf = compile(b"\\w", RE_SYNTAX_AWK);
    assert_eq!(search_all(&mut buf, b"aw"), 1);
}

#[test]
fn test_emacs_syntax() {
    let mut buf = compile(b"\\(a\\|b\\)+", RE_SYNTAX_EMACS);
    assert_eq!(search_all(&mut buf, b"xbab"), 1);
    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, b"xbab", &mut regs), 1);
    assert_eq!((regs.start[0], regs.end[0]), (1, 4));
    assert_eq!((regs.start[1], regs.end[1]), (3, 4));
}

#[test]
fn test_minimal_basic_has_no_alternation() {
    let mut buf = compile(b"a\\|b", RE_SYNTAX_POSIX_MINIMAL_BASIC);
    assert_eq!(search_all(&mut buf, b"b"), RE_SEARCH_NOMATCH);
    assert_eq!(search_all(&mut buf, b"a|b"), 0);
}

#[test]
fn test_dot_not_null() {
    let mut buf = compile(b"a.b", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all(&mut buf, b"a\0b"), RE_SEARCH_NOMATCH);
    let mut buf = compile(b"a.b", RE_SYNTAX_EMACS);
    assert_eq!(search_all(&mut buf, b"a\0b"), 0);
}

#[test]
fn test_invalid_interval_ord() {
    let mut buf = compile(b"a{1", RE_SYNTAX_EGREP);
    assert_eq!(search_all(&mut buf, b"xa{1"), 1);
}

#[test]
fn test_no_posix_backtracking_stops_early() {
    let mut buf = compile(b"a|ab", RE_SYNTAX_POSIX_EXTENDED | Syntax::NO_POSIX_BACKTRACKING);
    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, b"ab", &mut regs), 0);
    assert_eq!(regs.end[0], 1);
}

// ============================================================================
// Allocator
// ============================================================================

#[test]
fn test_allocator_refusal_is_search_error() {
    use gnurex::alloc::MemoryLimit;
    use std::sync::Arc;

    let limit = Arc::new(MemoryLimit::new(1 << 20));
    let mut buf = PatternBuffer::new();
    buf.allocator = limit.clone();
    re_compile_pattern(b"(a|b)*c", RE_SYNTAX_POSIX_EXTENDED, &mut buf).unwrap();

    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, b"abac", &mut regs), 0);
    let after_small = limit.used();

    // The per-position state log alone is larger than the budget.
    let subject = "a".repeat(200_000);
    let mut regs = Registers::new();
    assert_eq!(search_all_regs(&mut buf, subject.as_bytes(), &mut regs), RE_SEARCH_ERROR);
    // Scratch is released whatever the outcome.
    assert!(limit.used() <= after_small + 4096);

    assert_eq!(search_all_regs(&mut buf, b"xbc", &mut regs), 1);
}

// ============================================================================
// Longest/shortest policy
// ============================================================================

#[test]
fn test_first_repetition_decides_policy() {
    let mut regs = Registers::new();

    // The first repetition is lazy: every alternative stops early.
    let mut buf = compile(b"a+?|b+", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all_regs(&mut buf, b"bbb", &mut regs), 0);
    assert_eq!(regs.end[0], 1);

    // The first repetition is greedy: a later lazy suffix does not matter.
    let mut buf = compile(b"a+|b+?", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all_regs(&mut buf, b"bbb", &mut regs), 0);
    assert_eq!(regs.end[0], 3);

    // No repetition at all behaves as longest.
    let mut buf = compile(b"a|ab", RE_SYNTAX_POSIX_EXTENDED);
    assert_eq!(search_all_regs(&mut buf, b"ab", &mut regs), 0);
    assert_eq!(regs.end[0], 2);
}

#[test]
fn test_lazy_suffix_in_basic_syntax() {
    let mut regs = Registers::new();
    let mut buf = compile(b"a*\\?b*", RE_SYNTAX_POSIX_BASIC);
    assert_eq!(search_all_regs(&mut buf, b"aabb", &mut regs), 0);
    assert_eq!(regs.end[0], 0);
}

#[test]
fn test_lazy_suffix_disabled_without_gnu_ops() {
    let mut regs = Registers::new();
    let mut buf = compile(b"a+?", RE_SYNTAX_POSIX_EXTENDED | Syntax::NO_GNU_OPS);
    assert_eq!(search_all_regs(&mut buf, b"aaa", &mut regs), 0);
    assert_eq!(regs.end[0], 3);
}

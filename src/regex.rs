// regex.rs - Port of regex.h
// Public types, syntax bits, compile/exec flags, error codes, pattern buffer.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::alloc::{RegAllocator, SystemAllocator};
use crate::bitset::BitSet;
use crate::encodings::ascii::ENCODING_ASCII;
use crate::regenc::Encoding;
use crate::regint::Dfa;

// === Basic types ===

/// Byte offset within a subject string. `-1` marks an unset register.
pub type RegOff = isize;

/// Offset value of a register that did not participate in the match.
pub const REG_UNSET: RegOff = -1;

/// `re_search` family: no match.
pub const RE_SEARCH_NOMATCH: RegOff = -1;
/// `re_search` family: internal error (out of memory, bad arguments).
pub const RE_SEARCH_ERROR: RegOff = -2;

/// Largest repetition count accepted inside an interval.
pub const RE_DUP_MAX: usize = 0x7fff;

/// Registers handed out by `re_search` the first time an unallocated
/// `Registers` is passed in.
pub const RE_NREGS: usize = 30;

// === Syntax bits ===

bitflags! {
    /// Dialect selection bits (`reg_syntax_t`).
    ///
    /// The bit order matches GNU `regex.h`, so numeric values may be
    /// exchanged with C callers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Syntax: u64 {
        /// `\` inside a bracket expression quotes the following character.
        const BACKSLASH_ESCAPE_IN_LISTS = 1;
        /// `\+` and `\?` are operators, `+` and `?` are literals.
        const BK_PLUS_QM = 1 << 1;
        /// `[:alpha:]` and friends are recognized in brackets.
        const CHAR_CLASSES = 1 << 2;
        /// `^` and `$` are always anchors.
        const CONTEXT_INDEP_ANCHORS = 1 << 3;
        /// `*`, `+`, `?` and intervals are operators everywhere.
        const CONTEXT_INDEP_OPS = 1 << 4;
        /// A leading repetition operator is an error.
        const CONTEXT_INVALID_OPS = 1 << 5;
        /// `.` matches newline.
        const DOT_NEWLINE = 1 << 6;
        /// `.` does not match NUL.
        const DOT_NOT_NULL = 1 << 7;
        /// `[^...]` does not match newline.
        const HAT_LISTS_NOT_NEWLINE = 1 << 8;
        /// Intervals are recognized.
        const INTERVALS = 1 << 9;
        /// `+`, `?` and `|` are literals.
        const LIMITED_OPS = 1 << 10;
        /// Newline is an alternation operator.
        const NEWLINE_ALT = 1 << 11;
        /// `{...}` delimits an interval, `\{` is literal.
        const NO_BK_BRACES = 1 << 12;
        /// `(...)` groups, `\(` is literal.
        const NO_BK_PARENS = 1 << 13;
        /// `\<digit>` is a literal digit.
        const NO_BK_REFS = 1 << 14;
        /// `|` alternates, `\|` is literal.
        const NO_BK_VBAR = 1 << 15;
        /// A reversed range such as `[z-a]` is an error.
        const NO_EMPTY_RANGES = 1 << 16;
        /// An unmatched `)` is an ordinary character.
        const UNMATCHED_RIGHT_PAREN_ORD = 1 << 17;
        /// Succeed as soon as a match is found.
        const NO_POSIX_BACKTRACKING = 1 << 18;
        /// GNU operators (`\w`, `\b`, `\<`, ..., lazy suffix) are not recognized.
        const NO_GNU_OPS = 1 << 19;
        /// Accepted for compatibility; has no effect.
        const DEBUG = 1 << 20;
        /// An invalid interval such as `a{1` is literal text.
        const INVALID_INTERVAL_ORD = 1 << 21;
        /// Case-insensitive matching.
        const ICASE = 1 << 22;
        /// `^` is an anchor at this position even in BRE context.
        const CARET_ANCHORS_HERE = 1 << 23;
        /// A repetition after an alternation, open-group or interval is an error.
        const CONTEXT_INVALID_DUP = 1 << 24;
        /// Do not report subexpression matches.
        const NO_SUB = 1 << 25;
    }
}

pub const RE_SYNTAX_EMACS: Syntax = Syntax::empty();

pub const RE_SYNTAX_AWK: Syntax = Syntax::BACKSLASH_ESCAPE_IN_LISTS
    .union(Syntax::DOT_NOT_NULL)
    .union(Syntax::NO_BK_PARENS)
    .union(Syntax::NO_BK_REFS)
    .union(Syntax::NO_BK_VBAR)
    .union(Syntax::NO_EMPTY_RANGES)
    .union(Syntax::DOT_NEWLINE)
    .union(Syntax::CONTEXT_INDEP_ANCHORS)
    .union(Syntax::CHAR_CLASSES)
    .union(Syntax::UNMATCHED_RIGHT_PAREN_ORD)
    .union(Syntax::NO_GNU_OPS);

pub const RE_SYNTAX_GNU_AWK: Syntax = RE_SYNTAX_POSIX_EXTENDED
    .union(Syntax::BACKSLASH_ESCAPE_IN_LISTS)
    .union(Syntax::INVALID_INTERVAL_ORD)
    .difference(
        Syntax::DOT_NOT_NULL
            .union(Syntax::CONTEXT_INDEP_OPS)
            .union(Syntax::CONTEXT_INVALID_OPS),
    );

pub const RE_SYNTAX_POSIX_AWK: Syntax = RE_SYNTAX_POSIX_EXTENDED
    .union(Syntax::BACKSLASH_ESCAPE_IN_LISTS)
    .union(Syntax::INTERVALS)
    .union(Syntax::NO_GNU_OPS)
    .union(Syntax::INVALID_INTERVAL_ORD);

pub const RE_SYNTAX_GREP: Syntax = RE_SYNTAX_POSIX_BASIC
    .union(Syntax::NEWLINE_ALT)
    .difference(Syntax::CONTEXT_INVALID_DUP.union(Syntax::DOT_NOT_NULL));

pub const RE_SYNTAX_EGREP: Syntax = RE_SYNTAX_POSIX_EXTENDED
    .union(Syntax::INVALID_INTERVAL_ORD)
    .union(Syntax::NEWLINE_ALT)
    .difference(Syntax::CONTEXT_INVALID_OPS.union(Syntax::DOT_NOT_NULL));

pub const RE_SYNTAX_POSIX_EGREP: Syntax = RE_SYNTAX_EGREP;

pub const RE_SYNTAX_ED: Syntax = RE_SYNTAX_POSIX_BASIC;

pub const RE_SYNTAX_SED: Syntax = RE_SYNTAX_POSIX_BASIC;

const RE_SYNTAX_POSIX_COMMON: Syntax = Syntax::CHAR_CLASSES
    .union(Syntax::DOT_NEWLINE)
    .union(Syntax::DOT_NOT_NULL)
    .union(Syntax::INTERVALS)
    .union(Syntax::NO_EMPTY_RANGES);

pub const RE_SYNTAX_POSIX_BASIC: Syntax = RE_SYNTAX_POSIX_COMMON
    .union(Syntax::BK_PLUS_QM)
    .union(Syntax::CONTEXT_INVALID_DUP);

/// Like `RE_SYNTAX_POSIX_BASIC` but `\?`, `\+` and `\|` are not recognized.
pub const RE_SYNTAX_POSIX_MINIMAL_BASIC: Syntax =
    RE_SYNTAX_POSIX_COMMON.union(Syntax::LIMITED_OPS);

pub const RE_SYNTAX_POSIX_EXTENDED: Syntax = RE_SYNTAX_POSIX_COMMON
    .union(Syntax::CONTEXT_INDEP_ANCHORS)
    .union(Syntax::CONTEXT_INDEP_OPS)
    .union(Syntax::NO_BK_BRACES)
    .union(Syntax::NO_BK_PARENS)
    .union(Syntax::NO_BK_VBAR)
    .union(Syntax::CONTEXT_INVALID_OPS)
    .union(Syntax::UNMATCHED_RIGHT_PAREN_ORD);

/// Differs from `RE_SYNTAX_POSIX_EXTENDED` in that leading operators are
/// errors and back-references are not recognized.
pub const RE_SYNTAX_POSIX_MINIMAL_EXTENDED: Syntax = RE_SYNTAX_POSIX_COMMON
    .union(Syntax::CONTEXT_INDEP_ANCHORS)
    .union(Syntax::CONTEXT_INVALID_OPS)
    .union(Syntax::NO_BK_BRACES)
    .union(Syntax::NO_BK_PARENS)
    .union(Syntax::NO_BK_REFS)
    .union(Syntax::NO_BK_VBAR)
    .union(Syntax::UNMATCHED_RIGHT_PAREN_ORD);

// === POSIX compile / exec flags ===

bitflags! {
    /// `regcomp` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompileFlags: i32 {
        /// Use POSIX extended syntax instead of basic.
        const EXTENDED = 1;
        /// Ignore case.
        const ICASE = 1 << 1;
        /// `.` and `[^...]` do not match newline; `^`/`$` match at newlines.
        const NEWLINE = 1 << 2;
        /// Report only success or failure, no subexpression offsets.
        const NOSUB = 1 << 3;
    }
}

bitflags! {
    /// `regexec` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecFlags: i32 {
        /// The subject does not start at a line beginning.
        const NOTBOL = 1;
        /// The subject does not end at a line end.
        const NOTEOL = 1 << 1;
        /// Take the searched range from `pmatch[0]`.
        const STARTEND = 1 << 2;
    }
}

// === Error codes ===

/// `reg_errcode_t`: results of compilation and POSIX matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RegErrcode {
    NoError = 0,
    /// `regexec` did not find a match.
    NoMatch = 1,
    BadPat = 2,
    ECollate = 3,
    ECtype = 4,
    EEscape = 5,
    ESubreg = 6,
    EBrack = 7,
    EParen = 8,
    EBrace = 9,
    BadBr = 10,
    ERange = 11,
    ESpace = 12,
    BadRpt = 13,
    EEnd = 14,
    ESize = 15,
    ERParen = 16,
    /// Interval bounds out of order, e.g. `{1,0}`.
    EBracket = 17,
}

impl RegErrcode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<RegErrcode> {
        use RegErrcode::*;
        const ALL: [RegErrcode; 18] = [
            NoError, NoMatch, BadPat, ECollate, ECtype, EEscape, ESubreg, EBrack, EParen,
            EBrace, BadBr, ERange, ESpace, BadRpt, EEnd, ESize, ERParen, EBracket,
        ];
        usize::try_from(code).ok().and_then(|i| ALL.get(i).copied())
    }

    /// True for codes produced by a malformed pattern.
    pub fn is_pattern_error(self) -> bool {
        !matches!(
            self,
            RegErrcode::NoError | RegErrcode::NoMatch | RegErrcode::ESpace
        )
    }
}

impl fmt::Display for RegErrcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::regerror::regerror_message(*self))
    }
}

// === Match registers ===

/// POSIX `regmatch_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegMatch {
    pub rm_so: RegOff,
    pub rm_eo: RegOff,
}

impl RegMatch {
    pub const UNSET: RegMatch = RegMatch {
        rm_so: REG_UNSET,
        rm_eo: REG_UNSET,
    };

    pub fn new(rm_so: RegOff, rm_eo: RegOff) -> Self {
        RegMatch { rm_so, rm_eo }
    }

    pub fn is_set(&self) -> bool {
        self.rm_so != REG_UNSET
    }
}

impl Default for RegMatch {
    fn default() -> Self {
        RegMatch::UNSET
    }
}

/// GNU `re_registers`: parallel start/end arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    pub num_regs: usize,
    pub start: Vec<RegOff>,
    pub end: Vec<RegOff>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for i in 0..self.num_regs {
            self.start[i] = REG_UNSET;
            self.end[i] = REG_UNSET;
        }
    }
}

/// How `re_search` treats the `Registers` it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegsAllocated {
    /// Allocate on first use, at least `RE_NREGS` slots.
    #[default]
    Unallocated,
    /// Grow when the pattern needs more slots.
    Reallocate,
    /// Never resize; only the existing slots are filled.
    Fixed,
}

/// Pattern-wide longest/shortest policy fixed by the first repetition
/// operator in the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongestMatch {
    /// First repetition carried a `?` suffix: stop at the shortest match.
    Shortest,
    /// First repetition was greedy.
    Longest,
    /// No repetition seen; behaves as `Longest`.
    #[default]
    Unknown,
}

impl LongestMatch {
    pub fn is_shortest(self) -> bool {
        self == LongestMatch::Shortest
    }
}

// === Pattern buffer ===

/// GNU `struct re_pattern_buffer` (`regex_t`).
///
/// Before compiling, callers may set `translate`, `encoding`, `allocator`
/// and `fastmap`. After compiling, `re_nsub`, `can_be_null` and
/// `fl_longest_match` describe the pattern.
pub struct PatternBuffer {
    pub(crate) buffer: Option<Box<Dfa>>,
    pub syntax: Syntax,
    /// Leading-byte map. `Some` enables fastmap use by `re_search`.
    pub fastmap: Option<Box<BitSet>>,
    /// Byte translation applied to pattern and subject.
    pub translate: Option<Box<[u8; 256]>>,
    pub re_nsub: usize,
    pub can_be_null: bool,
    pub regs_allocated: RegsAllocated,
    pub fastmap_accurate: bool,
    pub no_sub: bool,
    pub not_bol: bool,
    pub not_eol: bool,
    pub newline_anchor: bool,
    pub fl_longest_match: LongestMatch,
    pub encoding: &'static dyn Encoding,
    pub allocator: Arc<dyn RegAllocator>,
}

/// POSIX name for the pattern buffer.
pub type RegexT = PatternBuffer;

impl PatternBuffer {
    pub fn new() -> Self {
        PatternBuffer {
            buffer: None,
            syntax: RE_SYNTAX_EMACS,
            fastmap: None,
            translate: None,
            re_nsub: 0,
            can_be_null: false,
            regs_allocated: RegsAllocated::Unallocated,
            fastmap_accurate: false,
            no_sub: false,
            not_bol: false,
            not_eol: false,
            newline_anchor: false,
            fl_longest_match: LongestMatch::Unknown,
            encoding: &ENCODING_ASCII,
            allocator: Arc::new(SystemAllocator),
        }
    }

    pub fn with_encoding(encoding: &'static dyn Encoding) -> Self {
        PatternBuffer {
            encoding,
            ..Self::new()
        }
    }

    /// True once a pattern has been compiled into this buffer.
    pub fn is_compiled(&self) -> bool {
        self.buffer.is_some()
    }

    pub(crate) fn dfa(&self) -> Option<&Dfa> {
        self.buffer.as_deref()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("syntax", &self.syntax)
            .field("re_nsub", &self.re_nsub)
            .field("can_be_null", &self.can_be_null)
            .field("no_sub", &self.no_sub)
            .field("newline_anchor", &self.newline_anchor)
            .field("fl_longest_match", &self.fl_longest_match)
            .field("encoding", &self.encoding.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_bits_match_header_order() {
        assert_eq!(Syntax::BACKSLASH_ESCAPE_IN_LISTS.bits(), 1);
        assert_eq!(Syntax::NO_GNU_OPS.bits(), 1 << 19);
        assert_eq!(Syntax::NO_SUB.bits(), 1 << 25);
    }

    #[test]
    fn grep_drops_dup_and_dot_bits() {
        assert!(RE_SYNTAX_GREP.contains(Syntax::NEWLINE_ALT));
        assert!(RE_SYNTAX_GREP.contains(Syntax::BK_PLUS_QM));
        assert!(!RE_SYNTAX_GREP.contains(Syntax::CONTEXT_INVALID_DUP));
        assert!(!RE_SYNTAX_GREP.contains(Syntax::DOT_NOT_NULL));
    }

    #[test]
    fn extended_preset() {
        assert!(RE_SYNTAX_POSIX_EXTENDED.contains(Syntax::NO_BK_PARENS | Syntax::NO_BK_VBAR));
        assert!(!RE_SYNTAX_POSIX_EXTENDED.contains(Syntax::BK_PLUS_QM));
        assert!(RE_SYNTAX_POSIX_MINIMAL_EXTENDED.contains(Syntax::NO_BK_REFS));
    }

    #[test]
    fn errcode_round_trip() {
        for code in 0..18 {
            let e = RegErrcode::from_code(code).unwrap();
            assert_eq!(e.code(), code);
        }
        assert_eq!(RegErrcode::from_code(18), None);
        assert_eq!(RegErrcode::from_code(-1), None);
    }

    #[test]
    fn unset_register() {
        let m = RegMatch::default();
        assert!(!m.is_set());
        assert_eq!(m, RegMatch::new(-1, -1));
    }
}

// regint.rs - Port of regex_internal.h
// NFA node tokens, context and constraint bits, the compiled Dfa.

use std::sync::{Mutex, MutexGuard};

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::alloc::Charge;
use crate::bitset::BitSet;
use crate::dfastate::StateCache;
use crate::nodeset::NodeSet;
use crate::regenc::{CharClass, CodePoint, Encoding};
use crate::regex::{RegErrcode, Syntax};

/// Index into the node array (and into subject strings).
pub type Idx = usize;

// === Config Constants ===

/// Node arrays may not grow past this many entries.
pub const NODES_MAX: usize = 1 << 22;

/// Longest name accepted inside `[: :]`, `[= =]` and `[. .]`.
pub const BRACKET_NAME_BUF_SIZE: usize = 32;

/// Bits available in the backreference maps.
pub const BKREF_MAP_BITS: usize = 64;

// === Context ===

bitflags! {
    /// Properties of the character preceding or following a position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Context: u8 {
        const WORD = 1;
        const NEWLINE = 1 << 1;
        const BEGBUF = 1 << 2;
        const ENDBUF = 1 << 3;
    }
}

// === Constraint ===

bitflags! {
    /// Positional requirements carried by anchors and by the nodes that
    /// inherit them during epsilon-closure duplication.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Constraint: u16 {
        const PREV_WORD = 1;
        const PREV_NOTWORD = 1 << 1;
        const NEXT_WORD = 1 << 2;
        const NEXT_NOTWORD = 1 << 3;
        const PREV_NEWLINE = 1 << 4;
        const NEXT_NEWLINE = 1 << 5;
        const PREV_BEGBUF = 1 << 6;
        const NEXT_ENDBUF = 1 << 7;
        const WORD_DELIM = 1 << 8;
        const NOT_WORD_DELIM = 1 << 9;

        const INSIDE_WORD = Self::PREV_WORD.bits() | Self::NEXT_WORD.bits();
        const WORD_FIRST = Self::PREV_NOTWORD.bits() | Self::NEXT_WORD.bits();
        const WORD_LAST = Self::PREV_WORD.bits() | Self::NEXT_NOTWORD.bits();
        const INSIDE_NOTWORD = Self::PREV_NOTWORD.bits() | Self::NEXT_NOTWORD.bits();
        const LINE_FIRST = Self::PREV_NEWLINE.bits();
        const LINE_LAST = Self::NEXT_NEWLINE.bits();
        const BUF_FIRST = Self::PREV_BEGBUF.bits();
        const BUF_LAST = Self::NEXT_ENDBUF.bits();

        const PREV_MASK = Self::PREV_WORD.bits()
            | Self::PREV_NOTWORD.bits()
            | Self::PREV_NEWLINE.bits()
            | Self::PREV_BEGBUF.bits();
        const NEXT_MASK = Self::NEXT_WORD.bits()
            | Self::NEXT_NOTWORD.bits()
            | Self::NEXT_NEWLINE.bits()
            | Self::NEXT_ENDBUF.bits();
    }
}

impl Constraint {
    /// True when the preceding-character context violates a PREV bit.
    #[inline]
    pub fn not_satisfy_prev(self, ctx: Context) -> bool {
        (self.contains(Constraint::PREV_WORD) && !ctx.contains(Context::WORD))
            || (self.contains(Constraint::PREV_NOTWORD) && ctx.contains(Context::WORD))
            || (self.contains(Constraint::PREV_NEWLINE) && !ctx.contains(Context::NEWLINE))
            || (self.contains(Constraint::PREV_BEGBUF) && !ctx.contains(Context::BEGBUF))
    }

    /// True when the following-character context violates a NEXT bit.
    #[inline]
    pub fn not_satisfy_next(self, ctx: Context) -> bool {
        (self.contains(Constraint::NEXT_WORD) && !ctx.contains(Context::WORD))
            || (self.contains(Constraint::NEXT_NOTWORD) && ctx.contains(Context::WORD))
            || (self.contains(Constraint::NEXT_NEWLINE) && !ctx.contains(Context::NEWLINE))
            || (self.contains(Constraint::NEXT_ENDBUF) && !ctx.contains(Context::ENDBUF))
    }

    #[inline]
    pub fn has_next(self) -> bool {
        self.intersects(Constraint::NEXT_MASK)
    }
}

// === Complex bracket ===

/// Multibyte part of a bracket expression (`re_charset_t`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Charset {
    pub mbchars: Vec<CodePoint>,
    pub ranges: Vec<(CodePoint, CodePoint)>,
    pub char_classes: Vec<CharClass>,
    pub non_match: bool,
}

impl Charset {
    /// Membership before `non_match` is applied.
    pub fn contains(&self, enc: &dyn Encoding, code: CodePoint) -> bool {
        self.mbchars.contains(&code)
            || self.char_classes.iter().any(|&c| enc.is_code_ctype(code, c))
            || self.ranges.iter().any(|&(lo, hi)| lo <= code && code <= hi)
    }

    pub fn is_trivial(&self) -> bool {
        self.mbchars.is_empty()
            && self.ranges.is_empty()
            && self.char_classes.is_empty()
            && !self.non_match
    }
}

// === Node types ===

/// Kind and operand of an NFA node or syntax-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    /// One literal byte.
    Character(u8),
    EndOfRe,
    SimpleBracket(Box<BitSet>),
    /// Backreference to the subexpression with this 0-based index.
    BackRef(usize),
    ComplexBracket(Box<Charset>),
    /// `.` (any character).
    Period,
    OpenSubexp(usize),
    CloseSubexp(usize),
    Alt,
    DupAsterisk,
    /// Zero-width assertion; the operand is its constraint.
    Anchor(Constraint),
    /// Tree only.
    Concat,
    /// Tree only.
    Subexp(usize),
}

impl TokenType {
    /// Nodes that move without consuming input.
    #[inline]
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self,
            TokenType::OpenSubexp(_)
                | TokenType::CloseSubexp(_)
                | TokenType::Alt
                | TokenType::DupAsterisk
                | TokenType::Anchor(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenType::Character(_) => "CHARACTER",
            TokenType::EndOfRe => "END_OF_RE",
            TokenType::SimpleBracket(_) => "SIMPLE_BRACKET",
            TokenType::BackRef(_) => "OP_BACK_REF",
            TokenType::ComplexBracket(_) => "COMPLEX_BRACKET",
            TokenType::Period => "OP_PERIOD",
            TokenType::OpenSubexp(_) => "OP_OPEN_SUBEXP",
            TokenType::CloseSubexp(_) => "OP_CLOSE_SUBEXP",
            TokenType::Alt => "OP_ALT",
            TokenType::DupAsterisk => "OP_DUP_ASTERISK",
            TokenType::Anchor(_) => "ANCHOR",
            TokenType::Concat => "CONCAT",
            TokenType::Subexp(_) => "SUBEXP",
        }
    }
}

/// An NFA node (`re_token_t`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub constraint: Constraint,
    /// Copy produced by tree or closure duplication.
    pub duplicated: bool,
    /// Subexpression sitting under `*` or `?`.
    pub opt_subexp: bool,
    /// Can consume a whole multibyte character.
    pub accept_mb: bool,
    /// Byte is not the first of its character.
    pub mb_partial: bool,
    pub word_char: bool,
}

impl Token {
    pub fn new(kind: TokenType) -> Self {
        Token {
            kind,
            constraint: Constraint::empty(),
            duplicated: false,
            opt_subexp: false,
            accept_mb: false,
            mb_partial: false,
            word_char: false,
        }
    }

    #[inline]
    pub fn is_epsilon(&self) -> bool {
        self.kind.is_epsilon()
    }
}

// === Dfa ===

/// Everything produced by compilation: the node array with its edges and
/// closures, pattern-wide facts, and the shared state cache.
pub struct Dfa {
    pub nodes: Vec<Token>,
    /// Successor of each consuming node.
    pub nexts: Vec<Option<Idx>>,
    /// Node each clone was copied from (itself for originals).
    pub org_indices: Vec<Idx>,
    /// Epsilon successors (at most two).
    pub edests: Vec<SmallVec<[Idx; 2]>>,
    pub eclosures: Vec<NodeSet>,
    pub inveclosures: Vec<NodeSet>,

    pub init_node: Idx,
    pub init_nodes: NodeSet,

    pub syntax: Syntax,
    pub encoding: &'static dyn Encoding,
    pub mb_cur_max: usize,
    pub is_utf8: bool,
    pub icase: bool,
    pub translate: Option<Box<[u8; 256]>>,
    pub newline_anchor: bool,

    /// Bytes that are complete characters on their own.
    pub sb_char: BitSet,
    pub word_char: BitSet,
    pub word_ops_used: bool,
    pub has_plural_match: bool,
    pub has_mb_node: bool,
    pub nbackref: usize,
    pub used_bkref_map: u64,
    pub completed_bkref_map: u64,
    pub max_mb_elem_len: usize,

    /// Register folding for directly nested groups, e.g. `((a))`.
    pub subexp_map: Option<Vec<usize>>,
    pub re_nsub: usize,

    pub fastmap: BitSet,
    pub can_be_null: bool,

    pub(crate) cache: Mutex<StateCache>,
    pub(crate) charge: Charge,
}

impl Dfa {
    pub(crate) fn new(
        syntax: Syntax,
        encoding: &'static dyn Encoding,
        charge: Charge,
        pattern_len: usize,
    ) -> Self {
        let mb_cur_max = encoding.max_enc_len();
        let sb_char = if mb_cur_max == 1 {
            BitSet::FULL
        } else {
            BitSet::ascii()
        };
        let mut word_char = BitSet::new();
        for b in 0..=255u8 {
            if sb_char.contains(b) && encoding.is_word_code(b as CodePoint) {
                word_char.set(b);
            }
        }
        Dfa {
            nodes: Vec::new(),
            nexts: Vec::new(),
            org_indices: Vec::new(),
            edests: Vec::new(),
            eclosures: Vec::new(),
            inveclosures: Vec::new(),
            init_node: 0,
            init_nodes: NodeSet::new(),
            syntax,
            encoding,
            mb_cur_max,
            is_utf8: encoding.is_utf8(),
            icase: syntax.contains(Syntax::ICASE),
            translate: None,
            newline_anchor: false,
            sb_char,
            word_char,
            word_ops_used: false,
            has_plural_match: false,
            has_mb_node: false,
            nbackref: 0,
            used_bkref_map: 0,
            completed_bkref_map: 0,
            max_mb_elem_len: 1,
            subexp_map: None,
            re_nsub: 0,
            fastmap: BitSet::new(),
            can_be_null: false,
            cache: Mutex::new(StateCache::new(charge.allocator().clone(), pattern_len)),
            charge,
        }
    }

    /// Append a node with empty edges (`re_dfa_add_node`).
    pub fn add_node(&mut self, token: Token) -> Result<Idx, RegErrcode> {
        if self.nodes.len() >= NODES_MAX {
            return Err(RegErrcode::ESize);
        }
        if self.nodes.len() == self.nodes.capacity() {
            let grow = self.nodes.capacity().max(8);
            self.charge.grow_items::<Token>(grow)?;
            self.charge.grow_items::<(Option<Idx>, Idx, SmallVec<[Idx; 2]>)>(grow)?;
            self.nodes.try_reserve_exact(grow)?;
            self.nexts.try_reserve_exact(grow)?;
            self.org_indices.try_reserve_exact(grow)?;
            self.edests.try_reserve_exact(grow)?;
        }
        let mut token = token;
        let accept_mb = (matches!(token.kind, TokenType::Period) && self.mb_cur_max > 1)
            || matches!(token.kind, TokenType::ComplexBracket(_));
        token.accept_mb = accept_mb;
        if accept_mb {
            self.max_mb_elem_len = self.max_mb_elem_len.max(self.mb_cur_max);
        }
        let idx = self.nodes.len();
        self.nodes.push(token);
        self.nexts.push(None);
        self.org_indices.push(idx);
        self.edests.push(SmallVec::new());
        Ok(idx)
    }

    /// Follow `org_indices` to the node a clone was made from.
    pub fn original(&self, mut node: Idx) -> Idx {
        while self.org_indices[node] != node {
            node = self.org_indices[node];
        }
        node
    }

    /// Single-byte acceptance ignoring constraints; multibyte-only nodes
    /// and backreferences never accept here.
    pub fn accepts_byte(&self, token: &Token, ch: u8) -> bool {
        match &token.kind {
            TokenType::Character(c) => *c == ch,
            TokenType::SimpleBracket(set) => set.contains(ch),
            TokenType::Period => {
                if self.mb_cur_max > 1 && !self.sb_char.contains(ch) {
                    return false;
                }
                !((ch == b'\n' && !self.syntax.contains(Syntax::DOT_NEWLINE))
                    || (ch == 0 && self.syntax.contains(Syntax::DOT_NOT_NULL)))
            }
            _ => false,
        }
    }

    /// Context produced by consuming the single byte `ch`.
    #[inline]
    pub fn byte_context(&self, ch: u8, word: bool) -> Context {
        let mut ctx = Context::empty();
        if word {
            ctx |= Context::WORD;
        }
        if ch == b'\n' && self.newline_anchor {
            ctx |= Context::NEWLINE;
        }
        ctx
    }

    /// Whether transitions need separate tables for word/non-word context.
    pub fn needs_word_table(&self) -> bool {
        self.mb_cur_max > 1 && self.word_ops_used
    }

    /// Coarse lock on the state cache. A poisoned lock is recovered; the
    /// cache only ever grows and stays consistent between insertions.
    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, StateCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Dfa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dfa")
            .field("nodes", &self.nodes.len())
            .field("init_node", &self.init_node)
            .field("nbackref", &self.nbackref)
            .field("re_nsub", &self.re_nsub)
            .finish_non_exhaustive()
    }
}

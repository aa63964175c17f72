// regparse_types.rs - Port of the parser-side types of regcomp.c
// Lexer tokens, bracket elements, the syntax-tree arena and its walkers.

use crate::regenc::{CodePoint, Encoding};
use crate::regex::{LongestMatch, RegErrcode, Syntax};
use crate::regint::{Constraint, Idx, Token, TokenType};

pub type TreeIdx = usize;

// === Token Types ===

/// Lexical token classes produced by `peek_token`/`peek_token_bracket`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PTokenType {
    Character,
    EndOfRe,
    /// Trailing backslash.
    BackSlash,
    OpenSubexp,
    CloseSubexp,
    Alt,
    DupAsterisk,
    DupPlus,
    DupQuestion,
    OpenDupNum,
    CloseDupNum,
    OpenBracket,
    CloseBracket,
    CharsetRange,
    NonMatchList,
    OpenCollElem,
    OpenEquivClass,
    OpenCharClass,
    Period,
    BackRef,
    Anchor,
    Word,
    NotWord,
    Space,
    NotSpace,
}

// === PToken (Parser Token) ===

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PToken {
    pub ty: PTokenType,
    /// Literal byte (or the byte after `\`).
    pub c: u8,
    /// Backreference index, 0-based.
    pub idx: usize,
    pub ctx_type: Constraint,
    pub word_char: bool,
    pub mb_partial: bool,
}

impl PToken {
    pub fn new() -> Self {
        PToken {
            ty: PTokenType::EndOfRe,
            c: 0,
            idx: 0,
            ctx_type: Constraint::empty(),
            word_char: false,
            mb_partial: false,
        }
    }

    /// The NFA token a CHARACTER/PERIOD/BACK_REF/ANCHOR lexeme becomes.
    pub fn to_token(&self) -> Token {
        let kind = match self.ty {
            PTokenType::Period => TokenType::Period,
            PTokenType::BackRef => TokenType::BackRef(self.idx),
            PTokenType::Anchor => TokenType::Anchor(self.ctx_type),
            _ => TokenType::Character(self.c),
        };
        let mut tok = Token::new(kind);
        tok.word_char = self.word_char;
        tok.mb_partial = self.mb_partial;
        tok
    }
}

impl Default for PToken {
    fn default() -> Self {
        Self::new()
    }
}

// === Bracket elements ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BracketElem {
    SbChar(u8),
    MbChar(CodePoint),
    EquivClass(Vec<u8>),
    CollSym(Vec<u8>),
    CharClass(Vec<u8>),
}

// === Syntax tree ===

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub parent: Option<TreeIdx>,
    pub left: Option<TreeIdx>,
    pub right: Option<TreeIdx>,
    /// Leftmost leaf that can begin a match of this subtree.
    pub first: Option<TreeIdx>,
    /// Node reached after this subtree completes.
    pub next: Option<TreeIdx>,
    pub token: Token,
    /// Index of this node in the NFA, assigned by `calc_first`.
    pub node_idx: Idx,
}

/// Arena-allocated binary syntax tree (`bin_tree_t`).
#[derive(Default, Debug)]
pub struct TreeArena {
    nodes: Vec<TreeNode>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, t: TreeIdx) -> &TreeNode {
        &self.nodes[t]
    }

    #[inline]
    pub fn get_mut(&mut self, t: TreeIdx) -> &mut TreeNode {
        &mut self.nodes[t]
    }

    #[inline]
    pub fn token(&self, t: TreeIdx) -> &Token {
        &self.nodes[t].token
    }

    /// Node with the given children; their parent links are updated.
    pub fn create_token_tree(
        &mut self,
        left: Option<TreeIdx>,
        right: Option<TreeIdx>,
        token: Token,
    ) -> Result<TreeIdx, RegErrcode> {
        self.nodes.try_reserve(1)?;
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            parent: None,
            left,
            right,
            first: None,
            next: None,
            token,
            node_idx: 0,
        });
        if let Some(l) = left {
            self.nodes[l].parent = Some(idx);
        }
        if let Some(r) = right {
            self.nodes[r].parent = Some(idx);
        }
        Ok(idx)
    }

    pub fn create_tree(
        &mut self,
        left: Option<TreeIdx>,
        right: Option<TreeIdx>,
        kind: TokenType,
    ) -> Result<TreeIdx, RegErrcode> {
        self.create_token_tree(left, right, Token::new(kind))
    }

    pub fn set_left(&mut self, node: TreeIdx, left: Option<TreeIdx>) {
        self.nodes[node].left = left;
        if let Some(l) = left {
            self.nodes[l].parent = Some(node);
        }
    }

    pub fn set_right(&mut self, node: TreeIdx, right: Option<TreeIdx>) {
        self.nodes[node].right = right;
        if let Some(r) = right {
            self.nodes[r].parent = Some(node);
        }
    }

    /// Deep copy of the subtree at `root`; every copied token is marked
    /// `duplicated`. The copy has no parent.
    pub fn duplicate_tree(&mut self, root: TreeIdx) -> Result<TreeIdx, RegErrcode> {
        let mut stack: Vec<(TreeIdx, Option<TreeIdx>, bool)> = vec![(root, None, false)];
        let mut dup_root = None;
        while let Some((src, parent, is_right)) = stack.pop() {
            let mut token = self.nodes[src].token.clone();
            token.duplicated = true;
            let copy = self.create_token_tree(None, None, token)?;
            match parent {
                Some(p) if is_right => self.set_right(p, Some(copy)),
                Some(p) => self.set_left(p, Some(copy)),
                None => dup_root = Some(copy),
            }
            if let Some(r) = self.nodes[src].right {
                stack.push((r, Some(copy), true));
            }
            if let Some(l) = self.nodes[src].left {
                stack.push((l, Some(copy), false));
            }
        }
        dup_root.ok_or(RegErrcode::BadPat)
    }

    /// Mark every `SUBEXP` numbered `subidx` under `root` as optional.
    pub fn mark_opt_subexp(&mut self, root: TreeIdx, subidx: usize) -> Result<(), RegErrcode> {
        self.postorder(root, |tree, node| {
            if tree.nodes[node].token.kind == TokenType::Subexp(subidx) {
                tree.nodes[node].token.opt_subexp = true;
            }
            Ok(())
        })
    }

    /// Children before parents. `f` may replace the children of the node it
    /// is given but not its ancestors.
    pub fn postorder<F>(&mut self, root: TreeIdx, mut f: F) -> Result<(), RegErrcode>
    where
        F: FnMut(&mut TreeArena, TreeIdx) -> Result<(), RegErrcode>,
    {
        let mut node = root;
        loop {
            // Descend, preferably to the left.
            loop {
                let n = &self.nodes[node];
                match (n.left, n.right) {
                    (Some(l), _) => node = l,
                    (None, Some(r)) => node = r,
                    (None, None) => break,
                }
            }
            loop {
                f(self, node)?;
                if node == root {
                    return Ok(());
                }
                let prev = node;
                node = match self.nodes[node].parent {
                    Some(p) => p,
                    None => return Ok(()),
                };
                // Keep climbing while we arrive from the right.
                let right = self.nodes[node].right;
                if !(right == Some(prev) || right.is_none()) {
                    break;
                }
            }
            node = match self.nodes[node].right {
                Some(r) => r,
                None => return Ok(()),
            };
        }
    }

    /// Parents before children. `f` may replace the children of the node it
    /// is given.
    pub fn preorder<F>(&mut self, root: TreeIdx, mut f: F) -> Result<(), RegErrcode>
    where
        F: FnMut(&mut TreeArena, TreeIdx) -> Result<(), RegErrcode>,
    {
        let mut node = root;
        loop {
            f(self, node)?;
            if let Some(l) = self.nodes[node].left {
                node = l;
                continue;
            }
            let mut prev = None;
            loop {
                let right = self.nodes[node].right;
                if !(right == prev || right.is_none()) {
                    break;
                }
                if node == root {
                    return Ok(());
                }
                prev = Some(node);
                node = match self.nodes[node].parent {
                    Some(p) => p,
                    None => return Ok(()),
                };
            }
            node = match self.nodes[node].right {
                Some(r) => r,
                None => return Ok(()),
            };
        }
    }
}

// === Parse Environment ===

/// Pattern-wide facts gathered while parsing.
pub struct ParseEnv<'a> {
    pub syntax: Syntax,
    pub encoding: &'static dyn Encoding,
    pub translate: Option<&'a [u8; 256]>,
    pub mb_cur_max: usize,
    pub tree: TreeArena,
    pub re_nsub: usize,
    pub fl_longest_match: LongestMatch,
    /// Groups already closed, usable by a backreference.
    pub completed_bkref_map: u64,
    pub used_bkref_map: u64,
    pub nbackref: usize,
    pub has_plural_match: bool,
    pub has_mb_node: bool,
    pub word_ops_used: bool,
}

impl<'a> ParseEnv<'a> {
    pub fn new(
        syntax: Syntax,
        encoding: &'static dyn Encoding,
        translate: Option<&'a [u8; 256]>,
    ) -> Self {
        ParseEnv {
            syntax,
            encoding,
            translate,
            mb_cur_max: encoding.max_enc_len(),
            tree: TreeArena::new(),
            re_nsub: 0,
            fl_longest_match: LongestMatch::Unknown,
            completed_bkref_map: 0,
            used_bkref_map: 0,
            nbackref: 0,
            has_plural_match: false,
            has_mb_node: false,
            word_ops_used: false,
        }
    }
}

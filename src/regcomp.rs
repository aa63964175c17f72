// regcomp.rs - Port of the compiler half of regcomp.c
// Lowers the syntax tree into the NFA node array, computes epsilon
// closures and the fastmap, and provides the compile entry points.
//
// Structure: tree passes (optimize_subexps → lower_subexps → calc_first →
// calc_next → link_nfa_nodes) → closures → initial state and fastmap →
// entry points (re_compile_pattern, regcomp, ...).

use smallvec::SmallVec;

use crate::alloc::Charge;
use crate::bitset::BitSet;
use crate::nodeset::NodeSet;
use crate::regenc::CodePoint;
use crate::regex::{
    CompileFlags, PatternBuffer, RegErrcode, Syntax, RE_SYNTAX_POSIX_BASIC,
    RE_SYNTAX_POSIX_EXTENDED,
};
use crate::regint::{Constraint, Context, Dfa, Idx, Token, TokenType, BKREF_MAP_BITS};
use crate::regparse::parse;
use crate::regparse_types::{ParseEnv, TreeArena, TreeIdx};
use crate::restring::{ReString, ViewOptions};

type CompileResult<T> = Result<T, RegErrcode>;

// ============================================================================
// Tree passes
// ============================================================================

/// Fold directly nested groups onto one register and renumber
/// backreferences accordingly.
fn optimize_subexps(
    tree: &mut TreeArena,
    node: TreeIdx,
    map: &mut [usize],
    used_bkref_map: &mut u64,
) -> CompileResult<()> {
    match tree.token(node).kind {
        TokenType::BackRef(idx) => {
            let idx = map.get(idx).copied().ok_or(RegErrcode::ESubreg)?;
            tree.get_mut(node).token.kind = TokenType::BackRef(idx);
            if idx < BKREF_MAP_BITS {
                *used_bkref_map |= 1 << idx;
            }
        }
        TokenType::Subexp(idx) => {
            let Some(left) = tree.get(node).left else {
                return Ok(());
            };
            if let TokenType::Subexp(other) = tree.token(left).kind {
                let inner = tree.get(left).left;
                tree.set_left(node, inner);
                map[other] = map[idx];
                if other < BKREF_MAP_BITS {
                    *used_bkref_map &= !(1 << other);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// `SUBEXP(body)` becomes `CONCAT(OPEN, CONCAT(body, CLOSE))`. Under
/// `no_sub`, groups no backreference needs disappear entirely.
fn lower_subexp(
    tree: &mut TreeArena,
    node: TreeIdx,
    used_bkref_map: u64,
    no_sub: bool,
) -> CompileResult<TreeIdx> {
    let TokenType::Subexp(idx) = tree.token(node).kind else {
        return Ok(node);
    };
    let body = tree.get(node).left;
    if let Some(body) = body {
        if no_sub && (idx >= BKREF_MAP_BITS || used_bkref_map & (1 << idx) == 0) {
            return Ok(body);
        }
    }
    let opt_subexp = tree.token(node).opt_subexp;
    let mut open = Token::new(TokenType::OpenSubexp(idx));
    open.opt_subexp = opt_subexp;
    let mut close = Token::new(TokenType::CloseSubexp(idx));
    close.opt_subexp = opt_subexp;
    let op = tree.create_token_tree(None, None, open)?;
    let cls = tree.create_token_tree(None, None, close)?;
    let tail = match body {
        Some(b) => tree.create_tree(Some(b), Some(cls), TokenType::Concat)?,
        None => cls,
    };
    tree.create_tree(Some(op), Some(tail), TokenType::Concat)
}

fn lower_subexps(
    tree: &mut TreeArena,
    node: TreeIdx,
    used_bkref_map: u64,
    no_sub: bool,
) -> CompileResult<()> {
    if let Some(left) = tree.get(node).left {
        if matches!(tree.token(left).kind, TokenType::Subexp(_)) {
            let lowered = lower_subexp(tree, left, used_bkref_map, no_sub)?;
            tree.set_left(node, Some(lowered));
        }
    }
    if let Some(right) = tree.get(node).right {
        if matches!(tree.token(right).kind, TokenType::Subexp(_)) {
            let lowered = lower_subexp(tree, right, used_bkref_map, no_sub)?;
            tree.set_right(node, Some(lowered));
        }
    }
    Ok(())
}

/// Emit NFA nodes. A CONCAT is represented by its left child.
fn calc_first(tree: &mut TreeArena, node: TreeIdx, dfa: &mut Dfa) -> CompileResult<()> {
    if matches!(tree.token(node).kind, TokenType::Concat) {
        let left = tree.get(node).left.ok_or(RegErrcode::BadPat)?;
        let (first, node_idx) = (tree.get(left).first, tree.get(left).node_idx);
        let n = tree.get_mut(node);
        n.first = first;
        n.node_idx = node_idx;
    } else {
        let mut token = tree.token(node).clone();
        if let TokenType::Anchor(constraint) = token.kind {
            token.constraint = constraint;
        }
        let node_idx = dfa.add_node(token)?;
        let n = tree.get_mut(node);
        n.first = Some(node);
        n.node_idx = node_idx;
    }
    Ok(())
}

fn calc_next(tree: &mut TreeArena, node: TreeIdx) -> CompileResult<()> {
    let n = tree.get(node);
    let (left, right, next) = (n.left, n.right, n.next);
    let is_star = matches!(n.token.kind, TokenType::DupAsterisk);
    let is_concat = matches!(n.token.kind, TokenType::Concat);
    if is_star {
        if let Some(l) = left {
            tree.get_mut(l).next = Some(node);
        }
    } else if is_concat {
        let l = left.ok_or(RegErrcode::BadPat)?;
        let r = right.ok_or(RegErrcode::BadPat)?;
        tree.get_mut(l).next = tree.get(r).first;
        tree.get_mut(r).next = next;
    } else {
        if let Some(l) = left {
            tree.get_mut(l).next = next;
        }
        if let Some(r) = right {
            tree.get_mut(r).next = next;
        }
    }
    Ok(())
}

/// NFA index of the first node of the subtree at `t`.
fn first_node(tree: &TreeArena, t: TreeIdx) -> CompileResult<Idx> {
    let first = tree.get(t).first.ok_or(RegErrcode::BadPat)?;
    Ok(tree.get(first).node_idx)
}

fn link_nfa_nodes(tree: &mut TreeArena, node: TreeIdx, dfa: &mut Dfa) -> CompileResult<()> {
    let n = tree.get(node);
    let idx = n.node_idx;
    let next = n.next.map(|t| tree.get(t).node_idx);
    match n.token.kind {
        TokenType::Concat | TokenType::EndOfRe => {}
        TokenType::DupAsterisk | TokenType::Alt => {
            dfa.has_plural_match = true;
            let left = match n.left {
                Some(l) => first_node(tree, l)?,
                None => next.ok_or(RegErrcode::BadPat)?,
            };
            let right = match n.right {
                Some(r) => first_node(tree, r)?,
                None => next.ok_or(RegErrcode::BadPat)?,
            };
            dfa.edests[idx] = NodeSet::with_two(left, right)?.iter().collect();
        }
        TokenType::Anchor(_) | TokenType::OpenSubexp(_) | TokenType::CloseSubexp(_) => {
            let next = next.ok_or(RegErrcode::BadPat)?;
            dfa.edests[idx] = SmallVec::from_slice(&[next]);
        }
        TokenType::BackRef(_) => {
            let next = next.ok_or(RegErrcode::BadPat)?;
            dfa.nexts[idx] = Some(next);
            dfa.edests[idx] = SmallVec::from_slice(&[next]);
        }
        _ => {
            dfa.nexts[idx] = Some(next.ok_or(RegErrcode::BadPat)?);
        }
    }
    Ok(())
}

// ============================================================================
// Epsilon closures
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Pending,
    InProgress,
    Done,
}

/// Copy of `org` carrying `constraint` in addition to its own.
fn duplicate_node(dfa: &mut Dfa, org: Idx, constraint: Constraint) -> CompileResult<Idx> {
    let token = dfa.nodes[org].clone();
    let dup = dfa.add_node(token)?;
    let node = &mut dfa.nodes[dup];
    node.constraint |= constraint;
    node.duplicated = true;
    dfa.org_indices[dup] = org;
    Ok(dup)
}

/// Most recent closure clone of `org` with exactly `constraint`.
fn search_duplicated_node(dfa: &Dfa, org: Idx, constraint: Constraint) -> Option<Idx> {
    let mut idx = dfa.nodes.len().checked_sub(1)?;
    while idx > 0 && dfa.org_indices[idx] != idx {
        if dfa.org_indices[idx] == org && dfa.nodes[idx].constraint == constraint {
            return Some(idx);
        }
        idx -= 1;
    }
    None
}

/// Clone the epsilon closure of `top_org` below `top_clone`, adding
/// `init_constraint` to every clone, so that the constraint of an anchor
/// travels with the nodes it guards.
fn duplicate_node_closure(
    dfa: &mut Dfa,
    top_org: Idx,
    top_clone: Idx,
    root: Idx,
    init_constraint: Constraint,
) -> CompileResult<()> {
    let mut constraint = init_constraint;
    let (mut org, mut clone) = (top_org, top_clone);
    loop {
        let org_dest;
        let clone_dest;
        if matches!(dfa.nodes[org].kind, TokenType::BackRef(_)) {
            org_dest = dfa.nexts[org].ok_or(RegErrcode::BadPat)?;
            dfa.edests[clone].clear();
            clone_dest = duplicate_node(dfa, org_dest, constraint)?;
            dfa.nexts[clone] = dfa.nexts[org];
            dfa.edests[clone].push(clone_dest);
        } else if dfa.edests[org].is_empty() {
            dfa.nexts[clone] = dfa.nexts[org];
            break;
        } else if dfa.edests[org].len() == 1 {
            org_dest = dfa.edests[org][0];
            dfa.edests[clone].clear();
            // A loop back to the root: tie it to the root's destination.
            if org == root && clone != org {
                dfa.edests[clone].push(org_dest);
                break;
            }
            constraint |= dfa.nodes[org].constraint;
            clone_dest = duplicate_node(dfa, org_dest, constraint)?;
            dfa.edests[clone].push(clone_dest);
        } else {
            let (first, second) = (dfa.edests[org][0], dfa.edests[org][1]);
            dfa.edests[clone].clear();
            match search_duplicated_node(dfa, first, constraint) {
                Some(existing) => dfa.edests[clone].push(existing),
                None => {
                    let dup = duplicate_node(dfa, first, constraint)?;
                    dfa.edests[clone].push(dup);
                    duplicate_node_closure(dfa, first, dup, root, constraint)?;
                }
            }
            org_dest = second;
            clone_dest = duplicate_node(dfa, org_dest, constraint)?;
            let dests = &mut dfa.edests[clone];
            if !dests.contains(&clone_dest) {
                dests.push(clone_dest);
                dests.sort_unstable();
            }
        }
        org = org_dest;
        clone = clone_dest;
    }
    Ok(())
}

fn sync_closure_marks(dfa: &mut Dfa, marks: &mut Vec<Mark>) -> CompileResult<()> {
    let len = dfa.nodes.len();
    if marks.len() < len {
        marks.try_reserve(len - marks.len())?;
        marks.resize(len, Mark::Pending);
        dfa.eclosures.try_reserve(len - dfa.eclosures.len())?;
        dfa.eclosures.resize_with(len, NodeSet::new);
    }
    Ok(())
}

fn calc_eclosure_iter(
    dfa: &mut Dfa,
    marks: &mut Vec<Mark>,
    node: Idx,
    root: bool,
) -> CompileResult<NodeSet> {
    let mut eclosure = NodeSet::with_one(node)?;
    marks[node] = Mark::InProgress;

    // Nodes reached from a constrained node must inherit the constraint.
    let constraint = dfa.nodes[node].constraint;
    if !constraint.is_empty() {
        if let Some(&first) = dfa.edests[node].first() {
            if dfa.org_indices[first] == first {
                duplicate_node_closure(dfa, node, node, node, constraint)?;
                sync_closure_marks(dfa, marks)?;
            }
        }
    }

    let mut incomplete = false;
    if dfa.nodes[node].is_epsilon() {
        let edests = dfa.edests[node].clone();
        for edest in edests {
            let elem = match marks[edest] {
                Mark::InProgress => {
                    incomplete = true;
                    continue;
                }
                Mark::Pending => calc_eclosure_iter(dfa, marks, edest, false)?,
                Mark::Done => dfa.eclosures[edest].clone(),
            };
            eclosure.merge(&elem)?;
            if marks[edest] == Mark::Pending {
                incomplete = true;
            }
        }
    }

    if incomplete && !root {
        marks[node] = Mark::Pending;
    } else {
        marks[node] = Mark::Done;
        dfa.eclosures[node] = eclosure.clone();
    }
    Ok(eclosure)
}

fn calc_eclosure(dfa: &mut Dfa) -> CompileResult<()> {
    let mut marks = Vec::new();
    dfa.eclosures.clear();
    sync_closure_marks(dfa, &mut marks)?;
    let mut node = 0;
    while node < dfa.nodes.len() {
        if marks[node] != Mark::Done {
            calc_eclosure_iter(dfa, &mut marks, node, true)?;
        }
        node += 1;
    }
    Ok(())
}

fn calc_inveclosure(dfa: &mut Dfa) -> CompileResult<()> {
    let mut inv = Vec::new();
    inv.try_reserve_exact(dfa.nodes.len())?;
    inv.resize_with(dfa.nodes.len(), NodeSet::new);
    for (src, closure) in dfa.eclosures.iter().enumerate() {
        for elem in closure {
            inv[elem].insert_last(src)?;
        }
    }
    dfa.inveclosures = inv;
    Ok(())
}

// ============================================================================
// Analysis
// ============================================================================

fn analyze(
    dfa: &mut Dfa,
    tree: &mut TreeArena,
    root: TreeIdx,
    no_sub: bool,
) -> CompileResult<()> {
    if dfa.re_nsub > 0 {
        let mut map: Vec<usize> = (0..dfa.re_nsub).collect();
        let mut used = dfa.used_bkref_map;
        tree.preorder(root, |t, n| optimize_subexps(t, n, &mut map, &mut used))?;
        dfa.used_bkref_map = used;
        let identity = map.iter().enumerate().all(|(i, &m)| i == m);
        dfa.subexp_map = if identity { None } else { Some(map) };
    }

    let used = dfa.used_bkref_map;
    tree.postorder(root, |t, n| lower_subexps(t, n, used, no_sub))?;
    tree.postorder(root, |t, n| calc_first(t, n, dfa))?;
    tree.preorder(root, calc_next)?;
    tree.preorder(root, |t, n| link_nfa_nodes(t, n, dfa))?;
    calc_eclosure(dfa)?;

    // Only sifting and backreference checks read the inverse closures.
    if (!no_sub && dfa.re_nsub > 0 && dfa.has_plural_match) || dfa.nbackref > 0 {
        calc_inveclosure(dfa)?;
    }
    Ok(())
}

fn set_fastmap(dfa: &Dfa, map: &mut BitSet, icase: bool, ch: u8) {
    map.set(ch);
    if icase && (dfa.mb_cur_max == 1 || ch < 0x80) {
        map.set(dfa.encoding.to_lower(ch as CodePoint) as u8);
    }
}

/// Add the bytes that can start a match from `nodes` (`re_compile_fastmap_iter`).
fn fastmap_iter(dfa: &Dfa, nodes: &NodeSet, map: &mut BitSet) {
    let icase = dfa.icase;
    for n in nodes {
        match &dfa.nodes[n].kind {
            TokenType::Character(c) => set_fastmap(dfa, map, icase, *c),
            TokenType::SimpleBracket(set) => {
                for ch in set.iter() {
                    set_fastmap(dfa, map, icase, ch);
                }
            }
            TokenType::ComplexBracket(cset) => {
                if dfa.mb_cur_max > 1
                    && (cset.non_match || !cset.char_classes.is_empty() || !cset.ranges.is_empty())
                {
                    for ch in 0x80..=0xffu8 {
                        map.set(ch);
                    }
                } else {
                    let mut buf = [0u8; 4];
                    for &wc in &cset.mbchars {
                        if dfa.encoding.code_to_mbc(wc, &mut buf) > 0 {
                            set_fastmap(dfa, map, icase, buf[0]);
                        }
                        if icase && dfa.encoding.code_to_mbc(dfa.encoding.to_lower(wc), &mut buf) > 0 {
                            map.set(buf[0]);
                        }
                    }
                }
            }
            TokenType::Period | TokenType::EndOfRe => {
                map.set_all();
                return;
            }
            _ => {}
        }
    }
}

/// Record the start node and derive the fastmap and `can_be_null` from the
/// initial states of the four start contexts.
fn create_initial_state(dfa: &mut Dfa, init_node: Idx) -> CompileResult<()> {
    dfa.init_node = init_node;
    dfa.init_nodes = dfa.eclosures[init_node].clone();

    let (fastmap, can_be_null) = {
        let dfa: &Dfa = dfa;
        let mut cache = dfa.lock_cache();
        let mut map = BitSet::new();
        let mut can_be_null = false;
        for ctx in [
            Context::empty(),
            Context::WORD,
            Context::NEWLINE,
            Context::NEWLINE | Context::BEGBUF,
        ] {
            let id = cache.init_state(dfa, ctx)?;
            let state = cache.state(id);
            can_be_null |= state
                .nodes
                .iter()
                .any(|n| matches!(dfa.nodes[n].kind, TokenType::EndOfRe));
            fastmap_iter(dfa, &state.nodes, &mut map);
        }
        (map, can_be_null)
    };
    dfa.fastmap = fastmap;
    dfa.can_be_null = can_be_null;
    Ok(())
}

// ============================================================================
// Entry points
// ============================================================================

/// Compile `pattern` into `preg` with `syntax`. On failure `preg` holds no
/// compiled pattern.
pub(crate) fn re_compile_internal(
    preg: &mut PatternBuffer,
    pattern: &[u8],
    syntax: Syntax,
) -> CompileResult<()> {
    preg.fastmap_accurate = false;
    preg.syntax = syntax;
    preg.not_bol = false;
    preg.not_eol = false;
    preg.re_nsub = 0;
    preg.can_be_null = false;
    preg.regs_allocated = Default::default();
    preg.fl_longest_match = Default::default();
    preg.buffer = None;

    match compile_dfa(preg, pattern, syntax) {
        Ok(dfa) => {
            preg.re_nsub = dfa.re_nsub;
            preg.can_be_null = dfa.can_be_null;
            preg.buffer = Some(dfa);
            Ok(())
        }
        Err(e) => {
            debug!("compile failed: {:?}", e);
            Err(e)
        }
    }
}

fn compile_dfa(
    preg: &mut PatternBuffer,
    pattern: &[u8],
    syntax: Syntax,
) -> CompileResult<Box<Dfa>> {
    let charge = Charge::new(preg.allocator.clone());
    let mut dfa = Box::new(Dfa::new(syntax, preg.encoding, charge, pattern.len()));
    dfa.translate = preg.translate.clone();
    dfa.newline_anchor = preg.newline_anchor;

    let mut opts = ViewOptions::new(preg.encoding);
    opts.translate = preg.translate.as_deref();
    opts.icase = syntax.contains(Syntax::ICASE);
    let mut regexp = ReString::construct(pattern, opts)?;

    let mut env = ParseEnv::new(syntax, preg.encoding, preg.translate.as_deref());
    let root = parse(&mut regexp, &mut env)?;
    preg.fl_longest_match = env.fl_longest_match;
    dfa.re_nsub = env.re_nsub;
    dfa.completed_bkref_map = env.completed_bkref_map;
    dfa.used_bkref_map = env.used_bkref_map;
    dfa.nbackref = env.nbackref;
    dfa.has_plural_match = env.has_plural_match;
    dfa.has_mb_node = env.has_mb_node;
    dfa.word_ops_used = env.word_ops_used;
    let mut tree = std::mem::take(&mut env.tree);

    analyze(&mut dfa, &mut tree, root, preg.no_sub)?;
    let init_node = first_node(&tree, root)?;
    drop(tree);
    create_initial_state(&mut dfa, init_node)?;

    debug!(
        "compiled {} bytes: {} nodes, {} groups, {} backrefs, can_be_null {}",
        pattern.len(),
        dfa.nodes.len(),
        dfa.re_nsub,
        dfa.nbackref,
        dfa.can_be_null
    );
    Ok(dfa)
}

/// GNU `re_compile_pattern`. Registers are reported unless `syntax`
/// carries `NO_SUB`; `^` and `$` also match at newlines.
pub fn re_compile_pattern(
    pattern: &[u8],
    syntax: Syntax,
    bufp: &mut PatternBuffer,
) -> Result<(), RegErrcode> {
    bufp.no_sub = syntax.contains(Syntax::NO_SUB);
    bufp.newline_anchor = true;
    re_compile_internal(bufp, pattern, syntax)
}

/// Fill the caller-allocated fastmap of `bufp`. Returns 0, or -2 when
/// nothing is compiled.
pub fn re_compile_fastmap(bufp: &mut PatternBuffer) -> i32 {
    let Some(dfa) = bufp.buffer.as_deref() else {
        return -2;
    };
    if let Some(map) = bufp.fastmap.as_deref_mut() {
        *map = dfa.fastmap;
    }
    bufp.can_be_null = dfa.can_be_null;
    bufp.fastmap_accurate = true;
    0
}

/// POSIX `regcomp`.
pub fn regcomp(preg: &mut PatternBuffer, pattern: &[u8], cflags: CompileFlags) -> RegErrcode {
    let mut syntax = if cflags.contains(CompileFlags::EXTENDED) {
        RE_SYNTAX_POSIX_EXTENDED
    } else {
        RE_SYNTAX_POSIX_BASIC
    };
    preg.buffer = None;
    preg.fastmap = Some(Box::new(BitSet::new()));
    if cflags.contains(CompileFlags::ICASE) {
        syntax |= Syntax::ICASE;
    }
    if cflags.contains(CompileFlags::NEWLINE) {
        syntax.remove(Syntax::DOT_NEWLINE);
        syntax |= Syntax::HAT_LISTS_NOT_NEWLINE;
        preg.newline_anchor = true;
    } else {
        preg.newline_anchor = false;
    }
    preg.no_sub = cflags.contains(CompileFlags::NOSUB);
    preg.translate = None;

    match re_compile_internal(preg, pattern, syntax) {
        Ok(()) => {
            re_compile_fastmap(preg);
            RegErrcode::NoError
        }
        Err(e) => {
            preg.fastmap = None;
            // POSIX has a single code for unbalanced parentheses.
            if e == RegErrcode::ERParen {
                RegErrcode::EParen
            } else {
                e
            }
        }
    }
}

/// POSIX `regfree`: release everything the compiled pattern owns.
pub fn regfree(preg: &mut PatternBuffer) {
    preg.buffer = None;
    preg.fastmap = None;
    preg.fastmap_accurate = false;
    preg.translate = None;
}

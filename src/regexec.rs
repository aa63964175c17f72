// regexec.rs - Port of regexec.c
// Matching: the forward DFA scan with its state log, backward sifting,
// register recovery by backtracking, and the GNU/POSIX search entry points.
//
// Structure: MatchContext (scan, log merge, recovery) → sifting →
// Backtracker (set_regs, fail stack, backreference cache) →
// re_search_internal → GNU stubs (re_search, re_match, ...) → regexec.

use std::collections::HashMap;

use memchr::{memchr, memchr2, memchr3};
use smallvec::SmallVec;

use crate::alloc::Charge;
use crate::bitset::BitSet;
use crate::dfastate::{StateCache, StateId};
use crate::nodeset::NodeSet;
use crate::regcomp::re_compile_fastmap;
use crate::regex::{
    ExecFlags, PatternBuffer, RegErrcode, RegMatch, RegOff, Registers, RegsAllocated, Syntax,
    REG_UNSET, RE_NREGS, RE_SEARCH_ERROR, RE_SEARCH_NOMATCH,
};
use crate::regint::{Context, Dfa, Idx, Token, TokenType};
use crate::restring::{ReString, ViewOptions, WINVALID};

type ExecResult<T> = Result<T, RegErrcode>;

/// Which accepting positions a scan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// Stop at the first accepting position.
    First,
    /// Keep scanning; report the last accepting position.
    Longest,
    /// Report every accepting position (backreference patterns).
    All,
}

// ============================================================================
// Node acceptance
// ============================================================================

/// Bytes a multibyte-capable node consumes at `idx`, or 0. Undecodable
/// bytes are consumed one at a time by `.` and by negated brackets.
fn check_node_accept_bytes(
    dfa: &Dfa,
    input: &ReString<'_>,
    node: Idx,
    idx: usize,
    limit: usize,
) -> usize {
    if idx >= limit || !input.first_byte(idx) {
        return 0;
    }
    let wc = input.wchar_at(idx);
    let char_len = input.char_size_at(idx);
    if idx + char_len > limit {
        return 0;
    }
    match &dfa.nodes[node].kind {
        TokenType::Period => {
            if wc == WINVALID {
                1
            } else if char_len > 1 {
                char_len
            } else {
                0
            }
        }
        TokenType::ComplexBracket(cset) => {
            if wc == WINVALID {
                return usize::from(cset.non_match);
            }
            if char_len <= 1 {
                return 0;
            }
            if cset.contains(dfa.encoding, wc) != cset.non_match {
                char_len
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Single-byte acceptance of `token` at `idx`, including its constraint.
fn check_node_accept(dfa: &Dfa, input: &ReString<'_>, token: &Token, idx: usize) -> bool {
    if idx >= input.len() || !dfa.accepts_byte(token, input.byte_at(idx)) {
        return false;
    }
    token.constraint.is_empty() || !token.constraint.not_satisfy_next(input.context_at(idx))
}

// ============================================================================
// Match context
// ============================================================================

struct MatchContext<'a> {
    dfa: &'a Dfa,
    input: ReString<'a>,
    /// Working offset where consumption stops.
    stop: usize,
    /// DFA state reached at each working offset; entries above
    /// `log_top` are stale.
    state_log: Option<Vec<Option<StateId>>>,
    log_top: usize,
    max_mb_elem_len: usize,
    /// Backreference comparisons keyed by (node, position, so, eo).
    bkref_cache: HashMap<(Idx, usize, usize, usize), bool>,
    charge: Charge,
}

impl<'a> MatchContext<'a> {
    fn new(
        dfa: &'a Dfa,
        string: &'a [u8],
        eflags: ExecFlags,
        need_log: bool,
    ) -> ExecResult<Self> {
        let mut opts = ViewOptions::new(dfa.encoding);
        opts.translate = dfa.translate.as_deref();
        opts.icase = dfa.icase;
        opts.newline_anchor = dfa.newline_anchor;
        opts.word_ops_used = dfa.word_ops_used;
        if !dfa.word_ops_used {
            opts.word_char = BitSet::new();
        }
        opts.not_bol = eflags.contains(ExecFlags::NOTBOL);
        opts.not_eol = eflags.contains(ExecFlags::NOTEOL);
        let input = ReString::construct(string, opts)?;

        let mut charge = Charge::new(dfa.charge.allocator().clone());
        let state_log = if need_log {
            let n = input.len() + 1;
            charge.grow_items::<Option<StateId>>(n)?;
            let mut log = Vec::new();
            log.try_reserve_exact(n)?;
            log.resize(n, None);
            Some(log)
        } else {
            None
        };
        let stop = input.len();
        Ok(MatchContext {
            dfa,
            input,
            stop,
            state_log,
            log_top: 0,
            max_mb_elem_len: 0,
            bkref_cache: HashMap::new(),
            charge,
        })
    }

    /// EndOfRe node of `state` whose trailing constraint holds at `idx`.
    fn halt_node(&self, cache: &StateCache, state: StateId, idx: usize) -> Option<Idx> {
        let st = cache.state(state);
        if !st.halt {
            return None;
        }
        let ctx = self.input.context_at(idx);
        st.nodes.iter().find(|&n| {
            let t = &self.dfa.nodes[n];
            t.kind == TokenType::EndOfRe && !t.constraint.not_satisfy_next(ctx)
        })
    }

    // === Forward scan ===

    /// Run the DFA from `start` and return the accepting end positions,
    /// ascending. `First` and `Longest` report at most one.
    fn check_matching(
        &mut self,
        cache: &mut StateCache,
        start: usize,
        mode: ScanMode,
    ) -> ExecResult<SmallVec<[usize; 4]>> {
        let dfa = self.dfa;
        let mut ends = SmallVec::new();
        self.log_top = start;
        self.max_mb_elem_len = 0;

        let mut cur = cache.init_state(dfa, self.input.context_before(start))?;
        if let Some(log) = self.state_log.as_mut() {
            log[start] = Some(cur);
        }
        if self.halt_node(cache, cur, start).is_some() {
            ends.push(start);
            if mode == ScanMode::First {
                return Ok(ends);
            }
        }

        let mut idx = start;
        while idx < self.stop {
            let next = self.transit_state(cache, cur, idx)?;
            idx += 1;
            let mut next = if self.state_log.is_some() {
                self.merge_state_with_log(cache, idx, next)?
            } else {
                next
            };
            if next.is_none() && self.state_log.is_some() {
                next = self.find_recover_state(cache, &mut idx)?;
            }
            let Some(state) = next else { break };
            cur = state;

            if self.halt_node(cache, cur, idx).is_some() {
                match mode {
                    ScanMode::First => {
                        ends.push(idx);
                        break;
                    }
                    ScanMode::Longest => {
                        ends.clear();
                        ends.push(idx);
                    }
                    ScanMode::All => ends.push(idx),
                }
            }
        }
        Ok(ends)
    }

    /// Consume the byte at `idx`. Multibyte moves from `state` are written
    /// ahead into the log first.
    fn transit_state(
        &mut self,
        cache: &mut StateCache,
        state: StateId,
        idx: usize,
    ) -> ExecResult<Option<StateId>> {
        if cache.state(state).accept_mb && self.state_log.is_some() {
            self.transit_state_mb(cache, state, idx)?;
        }
        let ch = self.input.byte_at(idx);
        let word = self.input.context_at(idx).contains(Context::WORD);
        cache.transition(self.dfa, state, ch, word)
    }

    fn transit_state_mb(
        &mut self,
        cache: &mut StateCache,
        state: StateId,
        idx: usize,
    ) -> ExecResult<()> {
        let dfa = self.dfa;
        let mb_nodes: SmallVec<[Idx; 8]> = cache
            .state(state)
            .nodes
            .iter()
            .filter(|&n| dfa.nodes[n].accept_mb)
            .collect();
        for node in mb_nodes {
            let constraint = dfa.nodes[node].constraint;
            if !constraint.is_empty() && constraint.not_satisfy_next(self.input.context_at(idx)) {
                continue;
            }
            let naccepted = check_node_accept_bytes(dfa, &self.input, node, idx, self.stop);
            if naccepted == 0 {
                continue;
            }
            let Some(next) = dfa.nexts[node] else { continue };
            let dest = idx + naccepted;
            self.max_mb_elem_len = self.max_mb_elem_len.max(naccepted);
            self.clean_state_log_if_needed(dest);

            let ctx = self.input.context_before(dest);
            let Some(log) = self.state_log.as_mut() else {
                return Ok(());
            };
            let dest_nodes = match log[dest] {
                Some(s) => NodeSet::union_of(&cache.state(s).entrance_nodes, &dfa.eclosures[next])?,
                None => dfa.eclosures[next].clone(),
            };
            log[dest] = cache.acquire(dfa, &dest_nodes, ctx)?;
        }
        Ok(())
    }

    fn clean_state_log_if_needed(&mut self, next: usize) {
        if next <= self.log_top {
            return;
        }
        if let Some(log) = self.state_log.as_mut() {
            for slot in &mut log[self.log_top + 1..=next] {
                *slot = None;
            }
        }
        self.log_top = next;
    }

    /// Fold what multibyte moves already logged at `idx` into `next`.
    fn merge_state_with_log(
        &mut self,
        cache: &mut StateCache,
        idx: usize,
        next: Option<StateId>,
    ) -> ExecResult<Option<StateId>> {
        let dfa = self.dfa;
        let ctx = self.input.context_before(idx);
        let Some(log) = self.state_log.as_mut() else {
            return Ok(next);
        };
        if idx > self.log_top {
            log[idx] = next;
            self.log_top = idx;
            return Ok(next);
        }
        let Some(logged) = log[idx] else {
            log[idx] = next;
            return Ok(next);
        };
        let nodes = match next {
            Some(n) => {
                NodeSet::union_of(&cache.state(n).entrance_nodes, &cache.state(logged).entrance_nodes)?
            }
            None => cache.state(logged).entrance_nodes.clone(),
        };
        let merged = cache.acquire(dfa, &nodes, ctx)?;
        log[idx] = merged;
        Ok(merged)
    }

    /// After a dead transition, resume at the next logged position.
    fn find_recover_state(
        &mut self,
        cache: &mut StateCache,
        idx: &mut usize,
    ) -> ExecResult<Option<StateId>> {
        loop {
            let max = self.log_top;
            loop {
                *idx += 1;
                if *idx > max {
                    return Ok(None);
                }
                let logged = self
                    .state_log
                    .as_ref()
                    .and_then(|log| log[*idx]);
                if logged.is_some() {
                    break;
                }
            }
            if let Some(state) = self.merge_state_with_log(cache, *idx, None)? {
                return Ok(Some(state));
            }
        }
    }

    // === Sifting ===

    /// Walk the log back from `last` keeping only nodes that can still
    /// reach `last_node`. Index 0 of the result is `start`; `None` there
    /// means the logged path is impossible.
    fn sift_states_backward(
        &mut self,
        cache: &StateCache,
        start: usize,
        last: usize,
        last_node: Idx,
    ) -> ExecResult<Vec<Option<NodeSet>>> {
        let n = last - start + 1;
        self.charge.grow_items::<Option<NodeSet>>(n)?;
        let mut sifted: Vec<Option<NodeSet>> = Vec::new();
        sifted.try_reserve_exact(n)?;
        sifted.resize(n, None);

        let dest = NodeSet::with_one(last_node)?;
        self.update_cur_sifted_state(cache, &mut sifted, start, last, dest)?;

        let mut idx = last;
        let mut null_cnt = 0;
        while idx > start {
            null_cnt = if sifted[idx - start].is_none() {
                null_cnt + 1
            } else {
                0
            };
            if null_cnt > self.max_mb_elem_len {
                for slot in &mut sifted[..idx - start] {
                    *slot = None;
                }
                return Ok(sifted);
            }
            idx -= 1;
            let dest = self.build_sifted_states(cache, &sifted, start, last, idx)?;
            self.update_cur_sifted_state(cache, &mut sifted, start, idx, dest)?;
        }
        Ok(sifted)
    }

    /// Consuming nodes logged at `idx` whose successor survived sifting.
    fn build_sifted_states(
        &self,
        cache: &StateCache,
        sifted: &[Option<NodeSet>],
        start: usize,
        last: usize,
        idx: usize,
    ) -> ExecResult<NodeSet> {
        let dfa = self.dfa;
        let mut dest = NodeSet::new();
        let Some(state) = self.state_log.as_ref().and_then(|log| log[idx]) else {
            return Ok(dest);
        };
        let survived = |at: usize, node: Option<Idx>| -> bool {
            match (node, sifted.get(at - start)) {
                (Some(n), Some(Some(set))) => set.contains(n),
                _ => false,
            }
        };
        for prev in cache.state(state).non_eps_nodes.iter() {
            let token = &dfa.nodes[prev];
            let mut accepted = false;
            if token.accept_mb {
                let n = check_node_accept_bytes(dfa, &self.input, prev, idx, self.stop);
                accepted = n > 0 && idx + n <= last && survived(idx + n, dfa.nexts[prev]);
            }
            if !accepted
                && check_node_accept(dfa, &self.input, token, idx)
                && survived(idx + 1, dfa.nexts[prev])
            {
                accepted = true;
            }
            if accepted {
                dest.insert(prev)?;
            }
        }
        Ok(dest)
    }

    /// Add the logged epsilon sources of `dest` and store it at `idx`.
    fn update_cur_sifted_state(
        &self,
        cache: &StateCache,
        sifted: &mut [Option<NodeSet>],
        start: usize,
        idx: usize,
        mut dest: NodeSet,
    ) -> ExecResult<()> {
        if dest.is_empty() {
            sifted[idx - start] = None;
            return Ok(());
        }
        if let Some(state) = self.state_log.as_ref().and_then(|log| log[idx]) {
            let mut inv = NodeSet::new();
            for d in dest.iter() {
                inv.merge(&self.dfa.inveclosures[d])?;
            }
            let candidates = &cache.state(state).nodes;
            dest.add_intersect(candidates, &inv)?;
        }
        sifted[idx - start] = Some(dest);
        Ok(())
    }

    // === Registers ===

    fn set_regs(
        &mut self,
        cache: &StateCache,
        sifted: Option<&[Option<NodeSet>]>,
        start: usize,
        end: usize,
        nregs: usize,
    ) -> ExecResult<Option<Vec<RegMatch>>> {
        let path = match sifted {
            Some(sets) => PathLog::Sifted { base: start, sets },
            None => PathLog::Raw(self.state_log.as_deref().ok_or(RegErrcode::BadPat)?),
        };
        let mut bt = Backtracker {
            dfa: self.dfa,
            input: &self.input,
            cache,
            path,
            end,
            charge: &mut self.charge,
            bkref_cache: &mut self.bkref_cache,
            fs: Vec::new(),
            fs_charged: 0,
            entry_size: std::mem::size_of::<FailEntry>()
                + 2 * nregs * std::mem::size_of::<RegMatch>(),
        };
        bt.run(start, nregs)
    }
}

// ============================================================================
// Register recovery
// ============================================================================

/// Node sets a path may visit at each position.
#[derive(Clone, Copy)]
enum PathLog<'m> {
    /// The forward log, indexed by working offset.
    Raw(&'m [Option<StateId>]),
    /// Sifted sets starting at working offset `base`.
    Sifted {
        base: usize,
        sets: &'m [Option<NodeSet>],
    },
}

/// Epsilon nodes walked since the last consumed character.
#[derive(Clone, Default)]
struct EpsVia {
    nodes: NodeSet,
    /// Nodes already re-entered once through an empty iteration.
    looped: NodeSet,
}

impl EpsVia {
    fn clear(&mut self) {
        self.nodes.clear();
        self.looped.clear();
    }
}

struct FailEntry {
    idx: usize,
    node: Idx,
    regs: Vec<RegMatch>,
    prev: Vec<RegMatch>,
    eps_via: EpsVia,
}

struct Backtracker<'m, 'a> {
    dfa: &'a Dfa,
    input: &'m ReString<'a>,
    cache: &'m StateCache,
    path: PathLog<'m>,
    end: usize,
    charge: &'m mut Charge,
    bkref_cache: &'m mut HashMap<(Idx, usize, usize, usize), bool>,
    fs: Vec<FailEntry>,
    fs_charged: usize,
    entry_size: usize,
}

impl<'m, 'a> Backtracker<'m, 'a> {
    fn nodes_at(&self, idx: usize) -> Option<&'m NodeSet> {
        let cache: &'m StateCache = self.cache;
        match self.path {
            PathLog::Raw(log) => log
                .get(idx)
                .copied()
                .flatten()
                .map(|s| &cache.state(s).nodes),
            PathLog::Sifted { base, sets } => sets.get(idx.checked_sub(base)?)?.as_ref(),
        }
    }

    fn is_halt_node(&self, node: Idx) -> bool {
        let t = &self.dfa.nodes[node];
        t.kind == TokenType::EndOfRe
            && !t.constraint.not_satisfy_next(self.input.context_at(self.end))
    }

    /// Walk from the initial node to an accepting node at `end`, recording
    /// group boundaries. `None` when no path verifies.
    fn run(&mut self, start: usize, nregs: usize) -> ExecResult<Option<Vec<RegMatch>>> {
        self.charge.grow_items::<RegMatch>(2 * nregs)?;
        let mut regs = vec![RegMatch::UNSET; nregs];
        regs[0] = RegMatch::new(start as RegOff, self.end as RegOff);
        let mut prev = regs.clone();
        let mut eps_via = EpsVia::default();
        let mut node = self.dfa.init_node;
        let mut idx = start;

        loop {
            update_regs(self.dfa, &mut regs, &mut prev, node, idx);

            if idx == self.end && self.is_halt_node(node) {
                if !regs.iter().any(is_open) {
                    return Ok(Some(regs));
                }
                match self.pop(&mut idx, &mut regs, &mut prev, &mut eps_via) {
                    Some(n) => {
                        node = n;
                        continue;
                    }
                    None => {
                        for r in regs.iter_mut().filter(|r| is_open(r)) {
                            *r = RegMatch::UNSET;
                        }
                        return Ok(Some(regs));
                    }
                }
            }

            // Reaching a walked epsilon node again completes one empty
            // iteration. Carry on once so the node can leave by its exit
            // edge; a second return is a cycle.
            if eps_via.nodes.contains(node) && !eps_via.looped.insert(node)? {
                match self.pop(&mut idx, &mut regs, &mut prev, &mut eps_via) {
                    Some(n) => {
                        node = n;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            match self.proceed_next_node(&mut regs, &mut prev, &mut idx, node, &mut eps_via)? {
                Some(n) => node = n,
                None => match self.pop(&mut idx, &mut regs, &mut prev, &mut eps_via) {
                    Some(n) => node = n,
                    None => return Ok(None),
                },
            }
        }
    }

    fn proceed_next_node(
        &mut self,
        regs: &mut [RegMatch],
        prev: &mut [RegMatch],
        idx: &mut usize,
        node: Idx,
        eps_via: &mut EpsVia,
    ) -> ExecResult<Option<Idx>> {
        let dfa = self.dfa;
        let token = &dfa.nodes[node];

        if token.is_epsilon() {
            eps_via.nodes.insert(node)?;
            let Some(cur_nodes) = self.nodes_at(*idx) else {
                return Ok(None);
            };
            let mut dest = None;
            for &cand in dfa.edests[node].iter() {
                if !cur_nodes.contains(cand) {
                    continue;
                }
                match dest {
                    None => dest = Some(cand),
                    Some(first) => {
                        // Take the second branch when the first loops back.
                        if eps_via.nodes.contains(first) {
                            return Ok(Some(cand));
                        }
                        self.push(*idx, cand, regs, prev, eps_via)?;
                        break;
                    }
                }
            }
            return Ok(dest);
        }

        let mut naccepted = 0;
        if token.accept_mb {
            if token.constraint.is_empty()
                || !token.constraint.not_satisfy_next(self.input.context_at(*idx))
            {
                naccepted = check_node_accept_bytes(dfa, self.input, node, *idx, self.end);
            }
        } else if let TokenType::BackRef(sub) = token.kind {
            let reg = sub + 1;
            let Some(r) = regs.get(reg).copied() else {
                return Ok(None);
            };
            if r.rm_so < 0 || r.rm_eo < r.rm_so {
                return Ok(None);
            }
            let (so, eo) = (r.rm_so as usize, r.rm_eo as usize);
            naccepted = eo - so;
            if naccepted == 0 {
                eps_via.nodes.insert(node)?;
                let dest = dfa.edests[node].first().copied();
                return Ok(dest.filter(|&d| self.nodes_at(*idx).is_some_and(|s| s.contains(d))));
            }
            if *idx + naccepted > self.end || !self.bkref_matches(node, *idx, so, eo)? {
                return Ok(None);
            }
        }

        if naccepted == 0 && (*idx >= self.end || !check_node_accept(dfa, self.input, token, *idx)) {
            return Ok(None);
        }
        let Some(dest) = dfa.nexts[node] else {
            return Ok(None);
        };
        let next_idx = *idx + naccepted.max(1);
        if next_idx > self.end || !self.nodes_at(next_idx).is_some_and(|s| s.contains(dest)) {
            return Ok(None);
        }
        *idx = next_idx;
        eps_via.clear();
        Ok(Some(dest))
    }

    /// Does the text at `idx` repeat the captured `so..eo`?
    fn bkref_matches(&mut self, node: Idx, idx: usize, so: usize, eo: usize) -> ExecResult<bool> {
        let key = (node, idx, so, eo);
        if let Some(&hit) = self.bkref_cache.get(&key) {
            return Ok(hit);
        }
        let buf = self.input.bytes();
        let len = eo - so;
        let hit = buf.get(so..eo) == buf.get(idx..idx + len);
        self.charge
            .grow_items::<((Idx, usize, usize, usize), bool)>(1)?;
        self.bkref_cache.insert(key, hit);
        Ok(hit)
    }

    fn push(
        &mut self,
        idx: usize,
        node: Idx,
        regs: &[RegMatch],
        prev: &[RegMatch],
        eps_via: &EpsVia,
    ) -> ExecResult<()> {
        // Charge the stack by its high-water mark.
        if self.fs.len() >= self.fs_charged {
            let grow = self.fs_charged.max(4);
            self.charge.grow(grow.saturating_mul(self.entry_size))?;
            self.fs_charged += grow;
        }
        self.fs.try_reserve(1)?;
        self.fs.push(FailEntry {
            idx,
            node,
            regs: regs.to_vec(),
            prev: prev.to_vec(),
            eps_via: eps_via.clone(),
        });
        Ok(())
    }

    fn pop(
        &mut self,
        idx: &mut usize,
        regs: &mut Vec<RegMatch>,
        prev: &mut Vec<RegMatch>,
        eps_via: &mut EpsVia,
    ) -> Option<Idx> {
        let entry = self.fs.pop()?;
        *idx = entry.idx;
        *regs = entry.regs;
        *prev = entry.prev;
        *eps_via = entry.eps_via;
        Some(entry.node)
    }
}

fn is_open(r: &RegMatch) -> bool {
    r.rm_so != REG_UNSET && r.rm_eo == REG_UNSET
}

/// Record a group boundary when passing an open or close node.
fn update_regs(dfa: &Dfa, regs: &mut [RegMatch], prev: &mut [RegMatch], node: Idx, idx: usize) {
    let token = &dfa.nodes[node];
    let at = idx as RegOff;
    match token.kind {
        TokenType::OpenSubexp(sub) => {
            if let Some(r) = regs.get_mut(sub + 1) {
                *r = RegMatch::new(at, REG_UNSET);
            }
        }
        TokenType::CloseSubexp(sub) => {
            let reg = sub + 1;
            if reg >= regs.len() {
                return;
            }
            if regs[reg].rm_so < at {
                regs[reg].rm_eo = at;
                prev.copy_from_slice(regs);
            } else if token.opt_subexp && prev[reg].rm_so != REG_UNSET {
                // Empty pass through an optional group after a real
                // iteration: keep the earlier iteration's registers.
                regs.copy_from_slice(prev);
            } else {
                regs[reg].rm_eo = at;
            }
        }
        _ => {}
    }
}

// ============================================================================
// Candidate start positions
// ============================================================================

/// First position in `from..=right_lim` whose byte is in `map`.
fn skip_forward(
    map: &BitSet,
    buf: &[u8],
    from: usize,
    right_lim: usize,
    can_be_null: bool,
) -> Option<usize> {
    let hay_end = right_lim.saturating_add(1).min(buf.len());
    if from < hay_end {
        let hay = &buf[from..hay_end];
        let mut members = map.iter();
        let found = match map.count() {
            1 => members.next().and_then(|a| memchr(a, hay)),
            2 => match (members.next(), members.next()) {
                (Some(a), Some(b)) => memchr2(a, b, hay),
                _ => None,
            },
            3 => match (members.next(), members.next(), members.next()) {
                (Some(a), Some(b), Some(c)) => memchr3(a, b, c, hay),
                _ => None,
            },
            _ => hay.iter().position(|&b| map.contains(b)),
        };
        if let Some(off) = found {
            return Some(from + off);
        }
    }
    if right_lim >= buf.len() && can_be_null {
        Some(buf.len())
    } else {
        None
    }
}

/// Last position in `left_lim..=from` whose byte is in `map`.
fn skip_backward(
    map: &BitSet,
    buf: &[u8],
    from: usize,
    left_lim: usize,
    can_be_null: bool,
) -> Option<usize> {
    let mut pos = from;
    loop {
        let hit = match buf.get(pos) {
            Some(&b) => map.contains(b),
            None => can_be_null,
        };
        if hit {
            return Some(pos);
        }
        if pos <= left_lim {
            return None;
        }
        pos -= 1;
    }
}

// ============================================================================
// Search
// ============================================================================

/// A match in working offsets, with registers when they were recovered.
struct Found {
    start: usize,
    end: usize,
    regs: Option<Vec<RegMatch>>,
}

/// Search `string` for a match starting between raw offsets `start` and
/// `last_start` (either order), consuming no further than `stop`. On
/// success fills up to `nmatch` entries of `pmatch` with raw offsets.
pub(crate) fn re_search_internal(
    preg: &PatternBuffer,
    string: &[u8],
    start: usize,
    last_start: usize,
    stop: usize,
    nmatch: usize,
    pmatch: &mut [RegMatch],
    eflags: ExecFlags,
) -> ExecResult<bool> {
    let Some(dfa) = preg.dfa() else {
        return Ok(false);
    };
    let nmatch = nmatch.min(pmatch.len());
    let extra_nmatch = nmatch.saturating_sub(dfa.re_nsub + 1);
    let nmatch = nmatch - extra_nmatch;

    let mut guard = dfa.lock_cache();
    let cache: &mut StateCache = &mut guard;

    // With no unanchored initial state only position 0 can match.
    let (mut start, mut last_start) = (start, last_start);
    let mut init_is_empty = |ctx: Context| -> ExecResult<bool> {
        let id = cache.init_state(dfa, ctx)?;
        Ok(cache.state(id).nodes.is_empty())
    };
    if init_is_empty(Context::empty())?
        && init_is_empty(Context::WORD)?
        && (!dfa.newline_anchor || init_is_empty(Context::NEWLINE)?)
    {
        if start != 0 && last_start != 0 {
            return Ok(false);
        }
        start = 0;
        last_start = 0;
    }

    let shortest = preg.fl_longest_match.is_shortest()
        || dfa.syntax.contains(Syntax::NO_POSIX_BACKTRACKING);
    let fl_longest = (nmatch != 0 || dfa.nbackref > 0) && !shortest;
    let mode = if dfa.nbackref > 0 {
        ScanMode::All
    } else if fl_longest {
        ScanMode::Longest
    } else {
        ScanMode::First
    };
    let need_regs = !preg.no_sub && nmatch > 1;
    let need_log = need_regs || dfa.has_mb_node || dfa.nbackref > 0;
    let sift = need_regs && dfa.re_nsub > 0 && dfa.has_plural_match && dfa.nbackref == 0;
    let internal_nregs = if dfa.nbackref > 0 {
        nmatch.max(dfa.re_nsub + 1)
    } else {
        nmatch
    };
    trace!(
        "search: {} strategy, mode {:?}",
        if dfa.nbackref > 0 { "backtracking" } else { "dfa" },
        mode
    );

    let mut mctx = MatchContext::new(dfa, string, eflags, need_log)?;
    mctx.stop = mctx.input.raw_to_working(stop.min(string.len()));
    let start_w = mctx.input.raw_to_working(start);
    let last_w = mctx.input.raw_to_working(last_start);
    let forward = start_w <= last_w;
    let (left_lim, right_lim) = if forward {
        (start_w, last_w)
    } else {
        (last_w, start_w)
    };
    let fastmap = preg
        .fastmap
        .as_deref()
        .filter(|m| preg.fastmap_accurate && !m.is_full());

    let mut found = None;
    let mut match_first = start_w;
    loop {
        if match_first < left_lim || match_first > right_lim {
            break;
        }
        if let Some(map) = fastmap {
            let buf = mctx.input.bytes();
            let next = if forward {
                skip_forward(map, buf, match_first, right_lim, dfa.can_be_null)
            } else {
                skip_backward(map, buf, match_first, left_lim, dfa.can_be_null)
            };
            match next {
                Some(p) => match_first = p,
                None => break,
            }
        }

        if mctx.input.first_byte(match_first) {
            if let Some(f) =
                try_start(&mut mctx, cache, match_first, mode, shortest, sift, need_regs, internal_nregs)?
            {
                found = Some(f);
                break;
            }
        }

        if forward {
            match_first += 1;
        } else if match_first == 0 {
            break;
        } else {
            match_first -= 1;
        }
    }

    let Some(found) = found else {
        return Ok(false);
    };
    if nmatch == 0 {
        return Ok(true);
    }

    pmatch[0] = RegMatch::new(found.start as RegOff, found.end as RegOff);
    for (i, slot) in pmatch.iter_mut().enumerate().take(nmatch).skip(1) {
        *slot = match &found.regs {
            Some(regs) if need_regs => regs.get(i).copied().unwrap_or(RegMatch::UNSET),
            _ => RegMatch::UNSET,
        };
    }
    for m in pmatch.iter_mut().take(nmatch) {
        if m.is_set() && m.rm_eo >= 0 {
            m.rm_so = mctx.input.working_to_raw(m.rm_so as usize) as RegOff;
            m.rm_eo = mctx.input.working_to_raw(m.rm_eo as usize) as RegOff;
        } else {
            *m = RegMatch::UNSET;
        }
    }
    for m in pmatch.iter_mut().skip(nmatch).take(extra_nmatch) {
        *m = RegMatch::UNSET;
    }
    if let Some(map) = &dfa.subexp_map {
        for reg_idx in 0..nmatch.saturating_sub(1) {
            let target = map[reg_idx];
            if target != reg_idx && target + 1 < nmatch {
                pmatch[reg_idx + 1] = pmatch[target + 1];
            }
        }
    }
    Ok(true)
}

/// Scan from one candidate start and verify the result.
#[allow(clippy::too_many_arguments)]
fn try_start(
    mctx: &mut MatchContext<'_>,
    cache: &mut StateCache,
    match_first: usize,
    mode: ScanMode,
    shortest: bool,
    sift: bool,
    need_regs: bool,
    nregs: usize,
) -> ExecResult<Option<Found>> {
    let ends = mctx.check_matching(cache, match_first, mode)?;
    if ends.is_empty() {
        return Ok(None);
    }

    if mctx.dfa.nbackref > 0 {
        let order: SmallVec<[usize; 4]> = if shortest {
            ends
        } else {
            ends.into_iter().rev().collect()
        };
        for end in order {
            if let Some(regs) = mctx.set_regs(cache, None, match_first, end, nregs)? {
                return Ok(Some(Found {
                    start: match_first,
                    end,
                    regs: Some(regs),
                }));
            }
        }
        return Ok(None);
    }

    let end = ends[ends.len() - 1];
    if !need_regs {
        return Ok(Some(Found {
            start: match_first,
            end,
            regs: None,
        }));
    }

    let regs = if sift {
        let last_state = mctx
            .state_log
            .as_ref()
            .and_then(|log| log[end])
            .ok_or(RegErrcode::BadPat)?;
        let Some(halt) = mctx.halt_node(cache, last_state, end) else {
            return Ok(None);
        };
        let sifted = mctx.sift_states_backward(cache, match_first, end, halt)?;
        if sifted[0].is_none() {
            return Ok(None);
        }
        mctx.set_regs(cache, Some(sifted.as_slice()), match_first, end, nregs)?
    } else {
        mctx.set_regs(cache, None, match_first, end, nregs)?
    };
    match regs {
        Some(regs) => Ok(Some(Found {
            start: match_first,
            end,
            regs: Some(regs),
        })),
        None => {
            debug!("search: no register path for {}..{}", match_first, end);
            Ok(None)
        }
    }
}

// ============================================================================
// GNU entry points
// ============================================================================

/// Copy `nregs` matched registers into `regs` under the buffer's
/// allocation policy; returns the new policy, `Unallocated` on failure.
fn re_copy_regs(
    regs: &mut Registers,
    pmatch: &[RegMatch],
    nregs: usize,
    regs_allocated: RegsAllocated,
) -> RegsAllocated {
    let need_regs = nregs + 1;
    let grow = |regs: &mut Registers, n: usize| -> bool {
        if regs.start.try_reserve(n.saturating_sub(regs.start.len())).is_err()
            || regs.end.try_reserve(n.saturating_sub(regs.end.len())).is_err()
        {
            return false;
        }
        regs.start.resize(n, REG_UNSET);
        regs.end.resize(n, REG_UNSET);
        regs.num_regs = n;
        true
    };
    let rval = match regs_allocated {
        RegsAllocated::Unallocated => {
            regs.start.clear();
            regs.end.clear();
            if !grow(regs, need_regs.max(RE_NREGS)) {
                return RegsAllocated::Unallocated;
            }
            RegsAllocated::Reallocate
        }
        RegsAllocated::Reallocate => {
            let n = need_regs.max(regs.num_regs);
            if !grow(regs, n) {
                return RegsAllocated::Unallocated;
            }
            RegsAllocated::Reallocate
        }
        RegsAllocated::Fixed => RegsAllocated::Fixed,
    };

    let slots = regs.num_regs.min(regs.start.len()).min(regs.end.len());
    for i in 0..slots {
        let m = pmatch.get(i).filter(|_| i < nregs).copied().unwrap_or(RegMatch::UNSET);
        regs.start[i] = m.rm_so;
        regs.end[i] = m.rm_eo;
    }
    rval
}

fn re_search_stub(
    bufp: &mut PatternBuffer,
    string: &[u8],
    start: RegOff,
    range: RegOff,
    stop: RegOff,
    regs: Option<&mut Registers>,
    ret_len: bool,
) -> RegOff {
    let length = string.len() as RegOff;
    if start < 0 || start > length {
        return RE_SEARCH_NOMATCH;
    }
    if !bufp.is_compiled() {
        return RE_SEARCH_ERROR;
    }
    let mut last_start = start.saturating_add(range);
    if length < last_start || (range >= 0 && last_start < start) {
        last_start = length;
    } else if last_start < 0 || (range < 0 && start <= last_start) {
        last_start = 0;
    }

    let mut eflags = ExecFlags::empty();
    if bufp.not_bol {
        eflags |= ExecFlags::NOTBOL;
    }
    if bufp.not_eol {
        eflags |= ExecFlags::NOTEOL;
    }

    if start < last_start && bufp.fastmap.is_some() && !bufp.fastmap_accurate {
        re_compile_fastmap(bufp);
    }

    let mut regs = if bufp.no_sub { None } else { regs };
    let nregs = match regs.as_ref().map(|r| r.num_regs) {
        None => 1,
        Some(n) if bufp.regs_allocated == RegsAllocated::Fixed && n <= bufp.re_nsub => {
            if n < 1 {
                regs = None;
                1
            } else {
                n
            }
        }
        Some(_) => bufp.re_nsub + 1,
    };

    let mut pmatch = Vec::new();
    if pmatch.try_reserve_exact(nregs).is_err() {
        return RE_SEARCH_ERROR;
    }
    pmatch.resize(nregs, RegMatch::UNSET);

    let stop = stop.clamp(0, length) as usize;
    match re_search_internal(
        bufp,
        string,
        start as usize,
        last_start as usize,
        stop,
        nregs,
        &mut pmatch,
        eflags,
    ) {
        Ok(true) => {}
        Ok(false) => return RE_SEARCH_NOMATCH,
        Err(e) => {
            debug!("re_search: {:?}", e);
            return RE_SEARCH_ERROR;
        }
    }

    if let Some(regs) = regs {
        bufp.regs_allocated = re_copy_regs(regs, &pmatch, nregs, bufp.regs_allocated);
        if bufp.regs_allocated == RegsAllocated::Unallocated {
            return RE_SEARCH_ERROR;
        }
    }

    if ret_len {
        pmatch[0].rm_eo - start
    } else {
        pmatch[0].rm_so
    }
}

fn concat_strings<'s>(string1: &'s [u8], string2: &'s [u8]) -> Option<std::borrow::Cow<'s, [u8]>> {
    use std::borrow::Cow;
    if string2.is_empty() {
        return Some(Cow::Borrowed(string1));
    }
    if string1.is_empty() {
        return Some(Cow::Borrowed(string2));
    }
    let mut joined = Vec::new();
    joined.try_reserve_exact(string1.len() + string2.len()).ok()?;
    joined.extend_from_slice(string1);
    joined.extend_from_slice(string2);
    Some(Cow::Owned(joined))
}

/// Search `string` for the compiled pattern, trying starts from `start`
/// towards `start + range` (backward when `range` is negative).
///
/// Returns the match start, `RE_SEARCH_NOMATCH` or `RE_SEARCH_ERROR`.
/// Registers are filled according to `bufp.regs_allocated`.
pub fn re_search(
    bufp: &mut PatternBuffer,
    string: &[u8],
    start: RegOff,
    range: RegOff,
    regs: Option<&mut Registers>,
) -> RegOff {
    let len = string.len() as RegOff;
    re_search_stub(bufp, string, start, range, len, regs, false)
}

/// `re_search` over the concatenation of two strings; matching consumes
/// nothing at or beyond `stop`.
pub fn re_search_2(
    bufp: &mut PatternBuffer,
    string1: &[u8],
    string2: &[u8],
    start: RegOff,
    range: RegOff,
    regs: Option<&mut Registers>,
    stop: RegOff,
) -> RegOff {
    if stop < 0 {
        return RE_SEARCH_ERROR;
    }
    let Some(joined) = concat_strings(string1, string2) else {
        return RE_SEARCH_ERROR;
    };
    re_search_stub(bufp, &joined, start, range, stop, regs, false)
}

/// Match anchored at `start`; returns the match length.
pub fn re_match(
    bufp: &mut PatternBuffer,
    string: &[u8],
    start: RegOff,
    regs: Option<&mut Registers>,
) -> RegOff {
    let len = string.len() as RegOff;
    re_search_stub(bufp, string, start, 0, len, regs, true)
}

pub fn re_match_2(
    bufp: &mut PatternBuffer,
    string1: &[u8],
    string2: &[u8],
    start: RegOff,
    regs: Option<&mut Registers>,
    stop: RegOff,
) -> RegOff {
    if stop < 0 {
        return RE_SEARCH_ERROR;
    }
    let Some(joined) = concat_strings(string1, string2) else {
        return RE_SEARCH_ERROR;
    };
    re_search_stub(bufp, &joined, start, 0, stop, regs, true)
}

/// Hand caller-owned register arrays to the buffer. With `num_regs == 0`
/// the registers are released and the buffer goes back to allocating.
pub fn re_set_registers(
    bufp: &mut PatternBuffer,
    regs: &mut Registers,
    num_regs: usize,
    starts: Vec<RegOff>,
    ends: Vec<RegOff>,
) {
    if num_regs > 0 {
        bufp.regs_allocated = RegsAllocated::Reallocate;
        regs.num_regs = num_regs;
        regs.start = starts;
        regs.end = ends;
    } else {
        bufp.regs_allocated = RegsAllocated::Unallocated;
        regs.num_regs = 0;
        regs.start = Vec::new();
        regs.end = Vec::new();
    }
}

// ============================================================================
// POSIX entry point
// ============================================================================

/// POSIX `regexec`. Fills `pmatch` (unless the pattern was compiled with
/// `NOSUB`) and returns `NoError`, `NoMatch`, or an error code.
///
/// With `STARTEND`, `pmatch[0]` gives the byte range to search; offsets
/// stay relative to the start of `string`.
pub fn regexec(
    preg: &PatternBuffer,
    string: &[u8],
    pmatch: &mut [RegMatch],
    eflags: ExecFlags,
) -> RegErrcode {
    if eflags.bits() & !ExecFlags::all().bits() != 0 {
        return RegErrcode::BadPat;
    }
    let (start, length) = if eflags.contains(ExecFlags::STARTEND) {
        let Some(range) = pmatch.first() else {
            return RegErrcode::BadPat;
        };
        if range.rm_so < 0 || range.rm_eo < range.rm_so || range.rm_eo as usize > string.len() {
            return RegErrcode::BadPat;
        }
        (range.rm_so as usize, range.rm_eo as usize)
    } else {
        (0, string.len())
    };

    let nmatch = if preg.no_sub { 0 } else { pmatch.len() };
    match re_search_internal(
        preg,
        &string[..length],
        start,
        length,
        length,
        nmatch,
        pmatch,
        eflags,
    ) {
        Ok(true) => RegErrcode::NoError,
        Ok(false) => RegErrcode::NoMatch,
        Err(e) => e,
    }
}

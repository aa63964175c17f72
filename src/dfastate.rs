// dfastate.rs - Port of the DFA state functions of regex_internal.c and regexec.c
// Interned (node set, context) states with lazily filled transition tables.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::alloc::{Charge, RegAllocator};
use crate::nodeset::NodeSet;
use crate::regex::RegErrcode;
use crate::regint::{Constraint, Context, Dfa, Idx, TokenType};

/// Index of a state inside its [`StateCache`].
pub type StateId = usize;

/// One memoized transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trans {
    #[default]
    Unknown,
    Dead,
    To(StateId),
}

type TransTable = Box<[Trans; 256]>;

/// A DFA state (`re_dfastate_t`).
#[derive(Debug)]
pub struct DfaState {
    pub hash: u32,
    /// Members that survive the state's context.
    pub nodes: NodeSet,
    /// Consuming members of `nodes`.
    pub non_eps_nodes: NodeSet,
    /// The set the state was requested with; this is its identity.
    pub entrance_nodes: NodeSet,
    pub context: Context,
    pub halt: bool,
    pub accept_mb: bool,
    pub has_backref: bool,
    pub has_constraint: bool,
    trtable: Option<TransTable>,
    word_trtable: Option<TransTable>,
}

impl DfaState {
    fn heap_size(&self) -> usize {
        self.nodes.heap_size() + self.non_eps_nodes.heap_size() + self.entrance_nodes.heap_size()
    }
}

/// Every state built so far for one compiled pattern.
pub struct StateCache {
    states: Vec<DfaState>,
    buckets: HashMap<u32, SmallVec<[StateId; 2]>>,
    /// Initial state per context, indexed by `Context::bits()`.
    init_states: [Option<StateId>; 16],
    charge: Charge,
}

fn calc_state_hash(nodes: &NodeSet, ctx: Context) -> u32 {
    let mut hash = (nodes.len() as u32).wrapping_add(ctx.bits() as u32);
    for n in nodes {
        hash = hash.wrapping_add(n as u32);
    }
    hash
}

impl StateCache {
    pub(crate) fn new(allocator: Arc<dyn RegAllocator>, pattern_len: usize) -> Self {
        StateCache {
            states: Vec::new(),
            buckets: HashMap::with_capacity(pattern_len.next_power_of_two().min(1 << 10)),
            init_states: [None; 16],
            charge: Charge::new(allocator),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn state(&self, id: StateId) -> &DfaState {
        &self.states[id]
    }

    /// Drop every state; the next search rebuilds what it needs.
    pub fn clear(&mut self) {
        self.states.clear();
        self.buckets.clear();
        self.init_states = [None; 16];
        self.charge.reset();
    }

    /// Canonical state for `nodes` seen in context `ctx`
    /// (`re_acquire_state_context`). An empty set has no state.
    pub fn acquire(
        &mut self,
        dfa: &Dfa,
        nodes: &NodeSet,
        ctx: Context,
    ) -> Result<Option<StateId>, RegErrcode> {
        if nodes.is_empty() {
            return Ok(None);
        }
        let expanded;
        let nodes = if dfa.nbackref > 0 {
            expanded = expand_backrefs(dfa, nodes)?;
            &expanded
        } else {
            nodes
        };

        // States whose members ignore the previous character share one
        // entry for every context.
        let ctx = if nodes
            .iter()
            .any(|n| dfa.nodes[n].constraint.intersects(Constraint::PREV_MASK))
        {
            ctx
        } else {
            Context::empty()
        };

        let hash = calc_state_hash(nodes, ctx);
        if let Some(ids) = self.buckets.get(&hash) {
            for &id in ids {
                let st = &self.states[id];
                if st.context == ctx && st.entrance_nodes == *nodes {
                    return Ok(Some(id));
                }
            }
        }
        self.create_state(dfa, nodes, ctx, hash).map(Some)
    }

    fn create_state(
        &mut self,
        dfa: &Dfa,
        entrance: &NodeSet,
        ctx: Context,
        hash: u32,
    ) -> Result<StateId, RegErrcode> {
        let mut nodes = NodeSet::new();
        nodes.merge(entrance)?;
        let mut non_eps_nodes = NodeSet::new();
        let mut halt = false;
        let mut accept_mb = false;
        let mut has_backref = false;
        let mut has_constraint = false;
        let mut i = 0;
        while i < nodes.len() {
            let n = nodes.as_slice()[i];
            let token = &dfa.nodes[n];
            if !token.constraint.is_empty() {
                has_constraint = true;
                if token.constraint.not_satisfy_prev(ctx) {
                    nodes.remove_at(i);
                    continue;
                }
            }
            if !token.is_epsilon() {
                non_eps_nodes.insert_last(n)?;
            }
            accept_mb |= token.accept_mb;
            match token.kind {
                TokenType::EndOfRe => halt = true,
                TokenType::BackRef(_) => has_backref = true,
                _ => {}
            }
            i += 1;
        }

        let state = DfaState {
            hash,
            nodes,
            non_eps_nodes,
            entrance_nodes: entrance.clone(),
            context: ctx,
            halt,
            accept_mb,
            has_backref,
            has_constraint,
            trtable: None,
            word_trtable: None,
        };
        self.charge
            .grow(std::mem::size_of::<DfaState>() + state.heap_size())
            .map_err(|e| {
                debug!("state cache: allocator refused a new state");
                e
            })?;
        self.states.try_reserve(1)?;
        let id = self.states.len();
        self.states.push(state);
        self.buckets.entry(hash).or_default().push(id);
        trace!(
            "new state {} ({} nodes, ctx {:?}, halt {}); cache holds {}",
            id,
            self.states[id].nodes.len(),
            ctx,
            halt,
            self.states.len()
        );
        Ok(id)
    }

    /// Initial state for a search starting after context `ctx`.
    pub fn init_state(&mut self, dfa: &Dfa, ctx: Context) -> Result<StateId, RegErrcode> {
        let slot = ctx.bits() as usize & 0xf;
        if let Some(id) = self.init_states[slot] {
            return Ok(id);
        }
        let id = self
            .acquire(dfa, &dfa.init_nodes, ctx)?
            .ok_or(RegErrcode::BadPat)?;
        self.init_states[slot] = Some(id);
        Ok(id)
    }

    /// Successor of `id` on byte `ch`. `word` says whether the character
    /// containing `ch` is a word character.
    pub fn transition(
        &mut self,
        dfa: &Dfa,
        id: StateId,
        ch: u8,
        word: bool,
    ) -> Result<Option<StateId>, RegErrcode> {
        let use_word = word && dfa.needs_word_table();
        let table = if use_word {
            &self.states[id].word_trtable
        } else {
            &self.states[id].trtable
        };
        if let Some(t) = table {
            match t[ch as usize] {
                Trans::Dead => return Ok(None),
                Trans::To(next) => return Ok(Some(next)),
                Trans::Unknown => {}
            }
        }

        let ctx = dfa.byte_context(ch, word);
        let mut dest = NodeSet::new();
        for n in self.states[id].non_eps_nodes.iter() {
            let token = &dfa.nodes[n];
            if let TokenType::BackRef(_) = token.kind {
                // The DFA treats a backreference as any text; the
                // backtracker verifies the real contents.
                dest.insert(n)?;
                if let Some(next) = dfa.nexts[n] {
                    dest.merge(&dfa.eclosures[next])?;
                }
                continue;
            }
            if !dfa.accepts_byte(token, ch) || token.constraint.not_satisfy_next(ctx) {
                continue;
            }
            if let Some(next) = dfa.nexts[n] {
                dest.merge(&dfa.eclosures[next])?;
            }
        }
        let result = self.acquire(dfa, &dest, ctx)?;

        let table = self.table_mut(id, use_word)?;
        table[ch as usize] = match result {
            Some(next) => Trans::To(next),
            None => Trans::Dead,
        };
        Ok(result)
    }

    fn table_mut(&mut self, id: StateId, word: bool) -> Result<&mut [Trans; 256], RegErrcode> {
        let state = &mut self.states[id];
        let slot = if word {
            &mut state.word_trtable
        } else {
            &mut state.trtable
        };
        if slot.is_none() {
            self.charge.grow_items::<Trans>(256)?;
        }
        Ok(slot.get_or_insert_with(|| Box::new([Trans::Unknown; 256])))
    }
}

/// Let every backreference in `nodes` also match the empty string, to a
/// fixed point.
fn expand_backrefs(dfa: &Dfa, nodes: &NodeSet) -> Result<NodeSet, RegErrcode> {
    let mut out = nodes.clone();
    let mut pending: Vec<Idx> = out
        .iter()
        .filter(|&n| matches!(dfa.nodes[n].kind, TokenType::BackRef(_)))
        .collect();
    while let Some(b) = pending.pop() {
        let Some(&dest) = dfa.edests[b].first() else {
            continue;
        };
        for n in dfa.eclosures[dest].iter() {
            if out.insert(n)? && matches!(dfa.nodes[n].kind, TokenType::BackRef(_)) {
                pending.push(n);
            }
        }
    }
    Ok(out)
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("states", &self.states.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regcomp::re_compile_pattern;
    use crate::regex::{PatternBuffer, RE_SYNTAX_POSIX_EXTENDED};

    fn compile(pattern: &str) -> PatternBuffer {
        let mut buf = PatternBuffer::new();
        re_compile_pattern(pattern.as_bytes(), RE_SYNTAX_POSIX_EXTENDED, &mut buf).unwrap();
        buf
    }

    #[test]
    fn same_set_same_state() {
        let buf = compile("ab|ac");
        let dfa = buf.dfa().unwrap();
        let mut cache = dfa.lock_cache();
        let a = cache.acquire(dfa, &dfa.init_nodes, Context::empty()).unwrap();
        let b = cache.acquire(dfa, &dfa.init_nodes, Context::empty()).unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
        let n = cache.len();
        // No node looks at the previous character, so contexts collapse.
        let c = cache.acquire(dfa, &dfa.init_nodes, Context::WORD).unwrap();
        assert_eq!(a, c);
        assert_eq!(cache.len(), n);
    }

    #[test]
    fn empty_set_has_no_state() {
        let buf = compile("a");
        let dfa = buf.dfa().unwrap();
        let mut cache = dfa.lock_cache();
        assert_eq!(cache.acquire(dfa, &NodeSet::new(), Context::empty()).unwrap(), None);
    }

    #[test]
    fn transitions_are_memoized() {
        let buf = compile("ab");
        let dfa = buf.dfa().unwrap();
        let mut cache = dfa.lock_cache();
        let init = cache.init_state(dfa, Context::NEWLINE | Context::BEGBUF).unwrap();
        let s1 = cache.transition(dfa, init, b'a', true).unwrap().unwrap();
        let before = cache.len();
        assert_eq!(cache.transition(dfa, init, b'a', true).unwrap(), Some(s1));
        assert_eq!(cache.len(), before);
        assert_eq!(cache.transition(dfa, init, b'x', true).unwrap(), None);
        let s2 = cache.transition(dfa, s1, b'b', true).unwrap().unwrap();
        assert!(cache.state(s2).halt);
        assert!(!cache.state(s1).halt);
    }

    #[test]
    fn anchored_init_state_depends_on_context() {
        let buf = compile("^a");
        let dfa = buf.dfa().unwrap();
        let mut cache = dfa.lock_cache();
        let at_start = cache.init_state(dfa, Context::NEWLINE | Context::BEGBUF).unwrap();
        let inside = cache.init_state(dfa, Context::empty()).unwrap();
        assert_ne!(at_start, inside);
        assert!(!cache.state(at_start).nodes.is_empty());
        assert!(cache.state(inside).nodes.is_empty());
        assert!(cache.state(inside).has_constraint);
    }

    #[test]
    fn backref_states_absorb_text() {
        let buf = compile(r"(a)\1b");
        let dfa = buf.dfa().unwrap();
        let mut cache = dfa.lock_cache();
        let init = cache.init_state(dfa, Context::NEWLINE | Context::BEGBUF).unwrap();
        let s = cache.transition(dfa, init, b'a', true).unwrap().unwrap();
        assert!(cache.state(s).has_backref);
        let s = cache.transition(dfa, s, b'z', true).unwrap().unwrap();
        assert!(cache.state(s).has_backref);
        let s = cache.transition(dfa, s, b'b', true).unwrap().unwrap();
        assert!(cache.state(s).halt);
    }
}

// nodeset.rs - Port of the re_node_set_* functions of regex_internal.c
// Sorted, duplicate-free sets of NFA node indices.

use std::collections::TryReserveError;
use std::fmt;

use crate::regex::RegErrcode;
use crate::regint::Idx;

impl From<TryReserveError> for RegErrcode {
    fn from(_: TryReserveError) -> Self {
        RegErrcode::ESpace
    }
}

/// An ordered set of node indices.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeSet {
    elems: Vec<Idx>,
}

impl NodeSet {
    pub const fn new() -> Self {
        NodeSet { elems: Vec::new() }
    }

    pub fn with_one(elem: Idx) -> Result<Self, RegErrcode> {
        let mut elems = Vec::new();
        elems.try_reserve_exact(1)?;
        elems.push(elem);
        Ok(NodeSet { elems })
    }

    pub fn with_two(a: Idx, b: Idx) -> Result<Self, RegErrcode> {
        let mut elems = Vec::new();
        elems.try_reserve_exact(2)?;
        if a == b {
            elems.push(a);
        } else if a < b {
            elems.extend([a, b]);
        } else {
            elems.extend([b, a]);
        }
        Ok(NodeSet { elems })
    }

    /// Union of two sets.
    pub fn union_of(a: &NodeSet, b: &NodeSet) -> Result<Self, RegErrcode> {
        let mut out = NodeSet::new();
        out.elems.try_reserve_exact(a.len() + b.len())?;
        let (mut i, mut j) = (0, 0);
        while i < a.elems.len() && j < b.elems.len() {
            let (x, y) = (a.elems[i], b.elems[j]);
            if x < y {
                out.elems.push(x);
                i += 1;
            } else if y < x {
                out.elems.push(y);
                j += 1;
            } else {
                out.elems.push(x);
                i += 1;
                j += 1;
            }
        }
        out.elems.extend_from_slice(&a.elems[i..]);
        out.elems.extend_from_slice(&b.elems[j..]);
        Ok(out)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Idx] {
        &self.elems
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, Idx>> {
        self.elems.iter().copied()
    }

    /// Position of `elem` in the set.
    #[inline]
    pub fn position(&self, elem: Idx) -> Option<usize> {
        self.elems.binary_search(&elem).ok()
    }

    #[inline]
    pub fn contains(&self, elem: Idx) -> bool {
        self.position(elem).is_some()
    }

    pub fn clear(&mut self) {
        self.elems.clear();
    }

    /// Insert `elem`, keeping order. Returns whether it was newly added.
    pub fn insert(&mut self, elem: Idx) -> Result<bool, RegErrcode> {
        match self.elems.binary_search(&elem) {
            Ok(_) => Ok(false),
            Err(pos) => {
                self.elems.try_reserve(1)?;
                self.elems.insert(pos, elem);
                Ok(true)
            }
        }
    }

    /// Append an element known to exceed every current member.
    pub fn insert_last(&mut self, elem: Idx) -> Result<(), RegErrcode> {
        debug_assert!(self.elems.last().map_or(true, |&l| l < elem));
        self.elems.try_reserve(1)?;
        self.elems.push(elem);
        Ok(())
    }

    /// Remove and return the member at `pos`.
    pub fn remove_at(&mut self, pos: usize) -> Idx {
        self.elems.remove(pos)
    }

    /// `self ∪= src`.
    pub fn merge(&mut self, src: &NodeSet) -> Result<(), RegErrcode> {
        if src.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            self.elems.try_reserve_exact(src.len())?;
            self.elems.extend_from_slice(&src.elems);
            return Ok(());
        }
        if self.elems.last() < src.elems.first() {
            self.elems.try_reserve(src.len())?;
            self.elems.extend_from_slice(&src.elems);
            return Ok(());
        }
        *self = NodeSet::union_of(self, src)?;
        Ok(())
    }

    /// Intersection of two sets.
    pub fn intersect(a: &NodeSet, b: &NodeSet) -> Result<Self, RegErrcode> {
        let mut out = NodeSet::new();
        out.elems.try_reserve_exact(a.len().min(b.len()))?;
        let (mut i, mut j) = (0, 0);
        while i < a.elems.len() && j < b.elems.len() {
            let (x, y) = (a.elems[i], b.elems[j]);
            if x < y {
                i += 1;
            } else if y < x {
                j += 1;
            } else {
                out.elems.push(x);
                i += 1;
                j += 1;
            }
        }
        Ok(out)
    }

    /// `self ∪= (a ∩ b)`.
    pub fn add_intersect(&mut self, a: &NodeSet, b: &NodeSet) -> Result<(), RegErrcode> {
        self.merge(&NodeSet::intersect(a, b)?)
    }

    /// Heap bytes held by this set.
    pub fn heap_size(&self) -> usize {
        self.elems.capacity() * std::mem::size_of::<Idx>()
    }
}

impl fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.elems.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = Idx;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Idx>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

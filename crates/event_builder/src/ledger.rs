//! In-flight assemblies and the unmatched-fragment queue.
//!
//! Assemblies live in a `Slab`; the insertion order is a deque of slab keys,
//! so eviction moves keys rather than assemblies. Positions handed out by the
//! lookup methods index that deque and are only valid until the next removal.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use slab::Slab;

use contracts::Fragment;

use crate::assembly::Assembly;
use crate::window::MatchWindow;

/// A non-trigger physics fragment waiting for its assembly.
#[derive(Debug, Clone)]
pub struct PendingFragment {
    pub fragment: Fragment,
    pub received_at: Instant,
}

impl PendingFragment {
    pub fn new(fragment: Fragment, received_at: Instant) -> Self {
        Self {
            fragment,
            received_at,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }
}

#[derive(Default)]
pub struct AssemblyLedger {
    storage: Slab<Assembly>,
    order: VecDeque<usize>,
    unmatched: VecDeque<PendingFragment>,
}

impl fmt::Debug for AssemblyLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyLedger")
            .field("in_flight", &self.order.len())
            .field("unmatched", &self.unmatched.len())
            .finish()
    }
}

impl AssemblyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== in-flight =====

    /// Append an assembly; returns its position.
    pub fn add(&mut self, assembly: Assembly) -> usize {
        let key = self.storage.insert(assembly);
        self.order.push_back(key);
        self.order.len() - 1
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Assembly> {
        self.order.get(pos).and_then(|&key| self.storage.get(key))
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Assembly> {
        let key = *self.order.get(pos)?;
        self.storage.get_mut(key)
    }

    /// In-flight assemblies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Assembly> + '_ {
        self.order.iter().filter_map(|&key| self.storage.get(key))
    }

    /// First assembly at or after `from` with the given type code.
    pub fn find_by_type(&self, type_code: u16, from: usize) -> Option<usize> {
        self.position_from(from, |assembly| assembly.type_code() == type_code)
    }

    /// First physics assembly at or after `from` whose reference timestamp
    /// lies in `window`.
    pub fn find_physics_by_window(&self, window: &MatchWindow, from: usize) -> Option<usize> {
        self.position_from(from, |assembly| {
            assembly.is_physics() && window.contains(assembly.reference_timestamp())
        })
    }

    fn position_from<F>(&self, from: usize, mut predicate: F) -> Option<usize>
    where
        F: FnMut(&Assembly) -> bool,
    {
        self.order
            .iter()
            .enumerate()
            .skip(from)
            .find(|&(_, &key)| self.storage.get(key).is_some_and(&mut predicate))
            .map(|(pos, _)| pos)
    }

    /// Take the assembly at `pos` out of the ledger.
    ///
    /// Returns `None` for a position past the end.
    pub fn remove_item(&mut self, pos: usize) -> Option<Assembly> {
        let key = self.order.remove(pos)?;
        self.storage.try_remove(key)
    }

    /// Evict and return every assembly strictly before `pos`, oldest first.
    pub fn remove_prior(&mut self, pos: usize) -> Vec<Assembly> {
        let cut = pos.min(self.order.len());
        self.order
            .drain(..cut)
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|key| self.storage.try_remove(key))
            .collect()
    }

    /// Evict and return every assembly matching `predicate`, oldest first.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Assembly>
    where
        F: FnMut(&Assembly) -> bool,
    {
        let mut removed = Vec::new();
        let storage = &mut self.storage;
        self.order.retain(|&key| {
            let evict = storage.get(key).is_some_and(&mut predicate);
            if evict {
                if let Some(assembly) = storage.try_remove(key) {
                    removed.push(assembly);
                }
            }
            !evict
        });
        removed
    }

    /// Evict everything in flight.
    pub fn drain_all(&mut self) -> Vec<Assembly> {
        self.remove_prior(self.order.len())
    }

    pub fn count_prior(&self, pos: usize) -> usize {
        pos.min(self.order.len())
    }

    /// Number of in-flight entries in `[from, to)`.
    pub fn count_range(&self, from: usize, to: usize) -> usize {
        let to = to.min(self.order.len());
        to.saturating_sub(from)
    }

    // ===== unmatched =====

    pub fn push_unmatched(&mut self, pending: PendingFragment) {
        self.unmatched.push_back(pending);
    }

    /// Take the whole unmatched queue, leaving it empty.
    pub fn take_unmatched(&mut self) -> VecDeque<PendingFragment> {
        std::mem::take(&mut self.unmatched)
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &PendingFragment> + '_ {
        self.unmatched.iter()
    }

    pub fn unmatched_len(&self) -> usize {
        self.unmatched.len()
    }

    /// Remove and return unmatched entries matching `predicate`, in order.
    pub fn remove_unmatched_where<F>(&mut self, mut predicate: F) -> Vec<PendingFragment>
    where
        F: FnMut(&PendingFragment) -> bool,
    {
        let (removed, kept): (VecDeque<_>, VecDeque<_>) =
            self.take_unmatched().into_iter().partition(|p| predicate(p));
        self.unmatched = kept;
        removed.into()
    }
}

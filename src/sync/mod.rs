use crate::models::{NodeId, NodeRecord};
use std::collections::BTreeMap;

/// A store write, as issued by a command or kept for retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingWrite {
    Set(NodeRecord),
    Remove(NodeId),
}

impl PendingWrite {
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Set(rec) => &rec.id,
            Self::Remove(id) => id,
        }
    }
}

/// Failed writes waiting for the repair pass.
///
/// Every write gets a sequence number when issued. Per id only the newest intent is kept:
/// a failure replaces an older entry, and a success clears any entry issued before it.
#[derive(Debug, Default)]
pub struct PendingWrites {
    next_seq: u64,
    entries: BTreeMap<NodeId, (u64, PendingWrite)>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn failed(&mut self, seq: u64, write: PendingWrite) {
        let id = write.id().clone();
        match self.entries.get(&id) {
            Some((existing, _)) if *existing > seq => {}
            _ => {
                self.entries.insert(id, (seq, write));
            }
        }
    }

    pub fn succeeded(&mut self, seq: u64, id: &NodeId) {
        if self.entries.get(id).is_some_and(|(existing, _)| *existing < seq) {
            self.entries.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&PendingWrite> {
        self.entries.get(id).map(|(_, w)| w)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.entries.keys().cloned().collect()
    }

    /// Writes to retry, with `Set` entries refreshed from `current`.
    ///
    /// A `Set` whose node no longer exists is dropped; its removal is someone else's write.
    pub fn retry_batch(
        &mut self,
        current: impl Fn(&NodeId) -> Option<NodeRecord>,
    ) -> Vec<PendingWrite> {
        let mut out = vec![];
        self.entries.retain(|id, (_, write)| {
            if let PendingWrite::Set(_) = write {
                match current(id) {
                    Some(now) => *write = PendingWrite::Set(now),
                    None => return false,
                }
            }
            out.push(write.clone());
            true
        });
        out
    }
}

//! Deferred existence conditions declared inside an open WHERE group.

use super::spec::ExistsSpec;

#[derive(Debug, Clone)]
pub(crate) struct Queued {
    /// Reserved WHERE slot the compiled fragment goes into
    pub slot: usize,
    /// Group depth at declaration time
    pub depth: usize,
    pub spec: ExistsSpec,
}

/// Ordered WHERE-queue. Entries leave in declaration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct WhereQueue {
    entries: Vec<Queued>,
}

impl WhereQueue {
    pub fn push(&mut self, slot: usize, depth: usize, spec: ExistsSpec) {
        self.entries.push(Queued { slot, depth, spec });
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes the entries declared at `depth` or deeper.
    pub fn drain_from(&mut self, depth: usize) -> Vec<Queued> {
        let (ready, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|q| q.depth >= depth);
        self.entries = rest;
        ready
    }

    pub fn drain_all(&mut self) -> Vec<Queued> {
        std::mem::take(&mut self.entries)
    }
}

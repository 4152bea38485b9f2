use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::Mutation;

/// Counts mutations currently awaiting their RPC.
#[derive(Default, Clone)]
pub struct MutationTracker {
    running: Arc<DashMap<Mutation, usize>>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, mutation: Mutation) -> MutationGuard {
        *self.running.entry(mutation).or_insert(0) += 1;
        MutationGuard {
            mutation,
            running: Arc::clone(&self.running),
        }
    }

    pub fn is_pending(&self, mutation: Mutation) -> bool {
        self.running.get(&mutation).is_some_and(|count| *count > 0)
    }

    pub fn pending_count(&self) -> usize {
        self.running.iter().map(|entry| *entry.value()).sum()
    }
}

pub struct MutationGuard {
    mutation: Mutation,
    running: Arc<DashMap<Mutation, usize>>,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.running.get_mut(&self.mutation) {
            *count = count.saturating_sub(1);
        }
        self.running.remove_if(&self.mutation, |_, count| *count == 0);
    }
}

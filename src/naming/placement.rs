//! File Placement
//!
//! Decides which registered storage server receives a newly created file.

use crate::common::Path;
use crate::rpc::Stub;
use crate::storage::protocol::CommandApi;

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait PlacementStrategy: Send + Sync + 'static {
    /// Picks one of `candidates` to hold `file`, or `None` if there are none.
    fn select(&self, file: &Path, candidates: &[Stub<CommandApi>]) -> Option<Stub<CommandApi>>;
}

/// Uniformly random choice. The default.
#[derive(Debug, Default)]
pub struct RandomPlacement;

impl PlacementStrategy for RandomPlacement {
    fn select(&self, _file: &Path, candidates: &[Stub<CommandApi>]) -> Option<Stub<CommandApi>> {
        if candidates.is_empty() {
            return None;
        }

        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates.get(index).copied()
    }
}

/// Cycles through the candidates in registration order.
#[derive(Debug, Default)]
pub struct RoundRobinPlacement {
    next: AtomicUsize,
}

impl PlacementStrategy for RoundRobinPlacement {
    fn select(&self, _file: &Path, candidates: &[Stub<CommandApi>]) -> Option<Stub<CommandApi>> {
        if candidates.is_empty() {
            return None;
        }

        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        candidates.get(turn % candidates.len()).copied()
    }
}

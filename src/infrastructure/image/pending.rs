//! Registry of the latest pending request per display target.
//!
//! Every submission for a target gets a fresh generation number and makes
//! it the target's current generation. Work carrying an older generation is
//! stale and must be dropped without delivering anything. On top of that,
//! each pipeline stage (disk lookup, network fetch) holds at most one
//! pending request per target; installing a new one replaces the old.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::entities::TargetId;
use crate::domain::ports::ImageRequest;

use super::loader::ImageLoadedEvent;

/// Pipeline stage a request is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for a worker to check the disk tier.
    Disk,
    /// Waiting for a worker to download the image.
    Network,
}

/// A request registered at a stage, tagged with its generation.
#[derive(Clone)]
pub struct Pending {
    /// Generation assigned when the request was submitted.
    pub generation: u64,
    /// The caller's request.
    pub request: Arc<dyn ImageRequest>,
    /// Where the outcome goes; dropped unsent if the request is superseded.
    pub reply: mpsc::UnboundedSender<ImageLoadedEvent>,
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("generation", &self.generation)
            .field("target", self.request.target())
            .field("url", &self.request.url())
            .finish()
    }
}

/// Per-target registries for the disk and network stages.
///
/// Not synchronized on its own; the loader keeps it behind the same lock
/// as the memory cache.
#[derive(Debug, Default)]
pub struct PendingRequests {
    next_generation: u64,
    current: HashMap<TargetId, u64>,
    disk: HashMap<TargetId, Pending>,
    network: HashMap<TargetId, Pending>,
}

impl PendingRequests {
    /// Creates empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request for `target`, voiding everything older.
    ///
    /// Clears both stage entries and returns the new current generation.
    pub fn begin(&mut self, target: &TargetId) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.disk.remove(target);
        self.network.remove(target);
        self.current.insert(target.clone(), generation);
        generation
    }

    /// Installs `pending` at `stage`, replacing any older entry there.
    ///
    /// Returns the replaced entry.
    pub fn supersede(&mut self, stage: Stage, target: &TargetId, pending: Pending) -> Option<Pending> {
        self.stage_mut(stage).insert(target.clone(), pending)
    }

    /// Removes and returns the request registered at `stage` for `target`.
    pub fn consume(&mut self, stage: Stage, target: &TargetId) -> Option<Pending> {
        self.stage_mut(stage).remove(target)
    }

    /// Returns true if `generation` is still the newest for `target`.
    #[must_use]
    pub fn is_current(&self, target: &TargetId, generation: u64) -> bool {
        self.current.get(target) == Some(&generation)
    }

    /// Retires `generation` if it is still current.
    ///
    /// Returns true when the caller owns the single delivery for this
    /// request; false means a newer request superseded it.
    pub fn finish(&mut self, target: &TargetId, generation: u64) -> bool {
        if self.is_current(target, generation) {
            self.current.remove(target);
            true
        } else {
            false
        }
    }

    /// Number of requests registered at `stage`.
    #[must_use]
    pub fn len(&self, stage: Stage) -> usize {
        match stage {
            Stage::Disk => self.disk.len(),
            Stage::Network => self.network.len(),
        }
    }

    /// Number of targets with an undelivered request.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.current.len()
    }

    /// Returns true if no target has an undelivered request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut HashMap<TargetId, Pending> {
        match stage {
            Stage::Disk => &mut self.disk,
            Stage::Network => &mut self.network,
        }
    }
}

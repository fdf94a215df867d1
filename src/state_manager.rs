//! Manages the mutable rotation state and the preload bookkeeping.
//!
//! `RotationState` groups everything the rotation driver and the transition
//! engine mutate: the committed index, the re-entrancy guard, the set of keys
//! already prefetched, and the single pending timer or watch task.

use crate::media_pipeline::PrefetchHint;
use crate::model::{AssetCycle, AssetEntry, DriverPhase};
use log::{debug, trace};
use std::collections::HashSet;
use tokio::task::JoinHandle;

/// Which kind of task currently owns the pending slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingKind {
    /// Dwell timer for a non-terminal asset.
    Dwell,
    /// Near-end position watch (and optional max-wait) for the terminal asset.
    Watch,
}

/// The one outstanding timer/watch task. Aborted when replaced or dropped.
#[derive(Debug)]
pub struct PendingTrigger {
    pub seq: u64,
    pub kind: PendingKind,
    handle: JoinHandle<()>,
}

impl Drop for PendingTrigger {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// State owned by the rotation driver / transition engine pair.
#[derive(Debug)]
pub struct RotationState {
    pub current_index: usize,
    pub is_transitioning: bool,
    pub phase: DriverPhase,
    pub commits: u64,
    preloaded_keys: HashSet<String>,
    pending: Option<PendingTrigger>,
    next_seq: u64,
}

impl RotationState {
    pub fn new(start_index: usize) -> Self {
        debug!("Initializing rotation state at index {}.", start_index);
        Self {
            current_index: start_index,
            is_transitioning: false,
            phase: DriverPhase::Idle,
            commits: 0,
            preloaded_keys: HashSet::new(),
            pending: None,
            next_seq: 0,
        }
    }

    /// Arms a new pending task, cancelling whichever was pending before.
    ///
    /// `spawn` receives the sequence number the task must present when it fires.
    pub fn arm<F>(&mut self, kind: PendingKind, spawn: F) -> u64
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        self.cancel_pending();
        self.next_seq += 1;
        let seq = self.next_seq;
        let handle = spawn(seq);
        trace!("Armed {:?} task #{}", kind, seq);
        self.pending = Some(PendingTrigger { seq, kind, handle });
        seq
    }

    /// Cancels the pending task, if any. Returns true if one was cancelled.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(previous) => {
                trace!("Cancelling {:?} task #{}", previous.kind, previous.seq);
                true
            }
            None => false,
        }
    }

    /// Whether `seq` is the currently armed task of `kind`.
    pub fn is_armed(&self, kind: PendingKind, seq: u64) -> bool {
        self.pending.as_ref().map_or(false, |p| p.kind == kind && p.seq == seq)
    }

    pub fn pending_kind(&self) -> Option<PendingKind> {
        self.pending.as_ref().map(|p| p.kind)
    }

    pub fn has_preloaded(&self, key: &str) -> bool {
        self.preloaded_keys.contains(key)
    }

    pub fn preloaded_count(&self) -> usize {
        self.preloaded_keys.len()
    }

    /// Records `key` as prefetched. Returns false if it already was.
    pub fn mark_preloaded(&mut self, key: &str) -> bool {
        self.preloaded_keys.insert(key.to_string())
    }
}

/// Issues a prefetch hint for the entry after the current one, at most once per key.
///
/// Returns the entry that was hinted, or `None` if it had been hinted before.
pub fn ensure_next_preloaded<'a>(
    state: &mut RotationState,
    catalog: &'a AssetCycle,
    prefetch: &dyn PrefetchHint,
) -> Option<&'a AssetEntry> {
    let next = catalog.entry(catalog.next_index(state.current_index));
    if !state.mark_preloaded(&next.key) {
        trace!("Asset '{}' already preloaded, skipping hint.", next.key);
        return None;
    }
    debug!("Preloading next asset '{}' ({})", next.key, next.path);
    prefetch.hint(&next.key, &next.path);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_pipeline::RecordingPrefetch;
    use std::time::Duration;

    fn cycle() -> AssetCycle {
        AssetCycle::new("v/", [("a", "a.mp4"), ("b", "b.mp4"), ("c", "c.mp4")], Some("b")).unwrap()
    }

    #[test]
    fn preload_is_idempotent_per_key() {
        let catalog = cycle();
        let prefetch = RecordingPrefetch::new();
        let mut state = RotationState::new(0);

        assert_eq!(ensure_next_preloaded(&mut state, &catalog, &prefetch).map(|e| e.key.as_str()), Some("b"));
        assert!(ensure_next_preloaded(&mut state, &catalog, &prefetch).is_none());
        assert_eq!(prefetch.hints(), vec!["v/b.mp4".to_string()]);
        assert!(state.has_preloaded("b"));
    }

    #[test]
    fn preloaded_keys_only_grow() {
        let catalog = cycle();
        let prefetch = RecordingPrefetch::new();
        let mut state = RotationState::new(0);
        for step in 0..7 {
            ensure_next_preloaded(&mut state, &catalog, &prefetch);
            state.current_index = catalog.next_index(state.current_index);
            assert!(state.preloaded_count() >= (step + 1).min(3));
        }
        assert_eq!(state.preloaded_count(), 3);
        assert_eq!(prefetch.hints().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn arming_replaces_and_aborts_previous_task() {
        let mut state = RotationState::new(0);
        let first = state.arm(PendingKind::Dwell, |_| tokio::spawn(tokio::time::sleep(Duration::from_secs(60))));
        let second = state.arm(PendingKind::Watch, |_| tokio::spawn(tokio::time::sleep(Duration::from_secs(60))));
        assert_ne!(first, second);
        assert!(!state.is_armed(PendingKind::Dwell, first));
        assert!(state.is_armed(PendingKind::Watch, second));
        assert_eq!(state.pending_kind(), Some(PendingKind::Watch));
        assert!(state.cancel_pending());
        assert!(!state.cancel_pending());
    }
}

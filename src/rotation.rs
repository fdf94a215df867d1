//! Hero video rotation: the rotation driver and the transition engine.
//!
//! `HeroRotator` owns one presentation surface and cycles it through an
//! `AssetCycle`. Non-terminal assets advance on a dwell timer. The terminal
//! asset plays to completion: a position watch triggers the handoff shortly
//! before the natural end, and the host's `ended` notification is the fallback.
//!
//! At most one handoff is in flight. Every entry point checks the re-entrancy
//! guard synchronously and discards triggers that arrive while it is set.
//! The guard is always cleared when a handoff finishes, whether playback of the
//! new asset started or not, and the next scheduling decision is always armed.

use crate::config::VideoConfig;
use crate::errors::SurfaceError;
use crate::media_pipeline::PrefetchHint;
use crate::model::{AssetCycle, AssetEntry, ClientHints, DriverPhase, RotationSnapshot, RotationTrigger, SelectionReport};
use crate::state_manager::{ensure_next_preloaded, PendingKind, RotationState};
use crate::surface::PresentationSurface;
use chrono::Utc;
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};

/// Timing knobs of the rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationTiming {
    pub dwell: Duration,
    pub fade: Duration,
    /// Remaining playback at or below which the near-end watch fires.
    pub lead: Duration,
    pub watch_interval: Duration,
    pub play_timeout: Duration,
    pub terminal_max_wait: Option<Duration>,
    pub near_end_watch: bool,
    /// Target opacity used when the surface cannot report one.
    pub default_opacity: f32,
}

impl Default for RotationTiming {
    fn default() -> Self {
        RotationTiming::from(&VideoConfig::default())
    }
}

impl From<&VideoConfig> for RotationTiming {
    fn from(config: &VideoConfig) -> Self {
        Self {
            dwell: config.rotation_interval,
            fade: config.fade_duration,
            lead: config.transition_lead(),
            watch_interval: config.watch_interval,
            play_timeout: config.play_timeout,
            terminal_max_wait: config.terminal_max_wait,
            near_end_watch: config.near_end_watch,
            default_opacity: config.default_opacity,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Autoplay refused by client hints; nothing was armed.
    Disabled,
    AlreadyStarted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A handoff is already in flight.
    Transitioning,
    /// The timer or watch that fired is no longer the armed one.
    Stale,
    /// `ended` arrived while the current asset is not being watched.
    NotWatching,
    /// The rotation is not running (not started, disabled, or shut down).
    NotRunning,
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Dwell(u64),
    NearEnd(u64),
    MaxWait(u64),
    Ended,
    External,
}

impl Trigger {
    fn kind(self) -> RotationTrigger {
        match self {
            Trigger::Dwell(_) => RotationTrigger::Dwell,
            Trigger::NearEnd(_) => RotationTrigger::NearEnd,
            Trigger::MaxWait(_) => RotationTrigger::MaxWait,
            Trigger::Ended => RotationTrigger::Ended,
            Trigger::External => RotationTrigger::External,
        }
    }
}

struct Shared<S: PresentationSurface> {
    catalog: AssetCycle,
    timing: RotationTiming,
    surface: S,
    prefetch: Arc<dyn PrefetchHint>,
    target_opacity: OnceLock<f32>,
    started: AtomicBool,
    shut_down: AtomicBool,
    state: Mutex<RotationState>,
    snapshot_tx: watch::Sender<RotationSnapshot>,
}

/// Drives the hero video rotation on one presentation surface.
///
/// Cloning is cheap and yields a handle to the same rotation.
pub struct HeroRotator<S: PresentationSurface> {
    shared: Arc<Shared<S>>,
}

impl<S: PresentationSurface> Clone for HeroRotator<S> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<S: PresentationSurface> HeroRotator<S> {
    pub fn new(catalog: AssetCycle, timing: RotationTiming, surface: S, prefetch: Arc<dyn PrefetchHint>) -> Self {
        Self::starting_at(catalog, timing, surface, prefetch, 0)
    }

    /// Like `new`, with the surface already showing the entry at `start_index`.
    pub fn starting_at(
        catalog: AssetCycle,
        timing: RotationTiming,
        surface: S,
        prefetch: Arc<dyn PrefetchHint>,
        start_index: usize,
    ) -> Self {
        let start_index = start_index % catalog.len();
        let state = RotationState::new(start_index);
        let (snapshot_tx, _) = watch::channel(snapshot_of(&catalog, &state));
        Self {
            shared: Arc::new(Shared {
                catalog,
                timing,
                surface,
                prefetch,
                target_opacity: OnceLock::new(),
                started: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                state: Mutex::new(state),
                snapshot_tx,
            }),
        }
    }

    /// Starts playback of the current asset and arms the first scheduling decision.
    ///
    /// On data-saver or 2g connections the surface is switched to `preload = none`
    /// and nothing is armed.
    pub async fn start(&self, hints: &ClientHints) -> StartOutcome {
        let shared = &self.shared;
        if shared.started.swap(true, Ordering::SeqCst) {
            debug!("Hero rotation already started.");
            return StartOutcome::AlreadyStarted;
        }
        if !hints.allows_hero_autoplay() {
            info!("Hero rotation disabled on constrained connection: {:?}", hints);
            shared.surface.set_preload("none");
            let mut st = shared.lock_state();
            st.phase = DriverPhase::Disabled;
            shared.publish(&st);
            return StartOutcome::Disabled;
        }

        let target = shared
            .surface
            .computed_opacity()
            .filter(|o| o.is_finite() && (0.0..=1.0).contains(o))
            .unwrap_or(shared.timing.default_opacity);
        let _ = shared.target_opacity.set(target);

        let current = shared.catalog.entry(shared.lock_state().current_index).clone();
        info!("Starting hero rotation on '{}' (target opacity {})", current.key, target);
        shared.surface.set_loop(!current.is_terminal_signal);
        let started = shared.request_playback(&current).await;
        if !started {
            debug!("Initial playback of '{}' did not start; arming anyway.", current.key);
        }

        let mut st = shared.lock_state();
        if shared.shut_down.load(Ordering::SeqCst) {
            debug!("Hero rotation shut down during start-up; nothing armed.");
            st.phase = DriverPhase::Idle;
            shared.publish(&st);
            return StartOutcome::Started;
        }
        ensure_next_preloaded(&mut st, &shared.catalog, shared.prefetch.as_ref());
        shared.arm_for_current(&mut st);
        shared.publish(&st);
        StartOutcome::Started
    }

    /// External rotation request. A no-op while a handoff is in flight.
    pub fn request_rotation(&self) -> TriggerOutcome {
        self.shared.trigger(Trigger::External)
    }

    /// The surface's `ended` notification.
    pub fn notify_ended(&self) -> TriggerOutcome {
        self.shared.trigger(Trigger::Ended)
    }

    /// Cancels the pending timer or watch. An in-flight handoff still completes
    /// but arms nothing afterwards.
    pub fn shutdown(&self) {
        self.shared.shut_down.store(true, Ordering::SeqCst);
        let mut st = self.shared.lock_state();
        st.cancel_pending();
        if !st.is_transitioning {
            st.phase = DriverPhase::Idle;
        }
        self.shared.publish(&st);
        info!("Hero rotation shut down at '{}'", self.shared.catalog.entry(st.current_index).key);
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        let st = self.shared.lock_state();
        snapshot_of(&self.shared.catalog, &st)
    }

    pub fn subscribe(&self) -> watch::Receiver<RotationSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn catalog(&self) -> &AssetCycle {
        &self.shared.catalog
    }

    pub fn surface(&self) -> &S {
        &self.shared.surface
    }

    /// Opacity the surface fades back in to.
    pub fn target_opacity(&self) -> f32 {
        self.shared.target_opacity()
    }
}

fn snapshot_of(catalog: &AssetCycle, st: &RotationState) -> RotationSnapshot {
    RotationSnapshot {
        index: st.current_index,
        key: catalog.entry(st.current_index).key.clone(),
        phase: st.phase,
        transitioning: st.is_transitioning,
        commits: st.commits,
    }
}

/// Clears the re-entrancy guard if a handoff task is torn down before finishing.
struct InFlight<'a, S: PresentationSurface> {
    shared: &'a Shared<S>,
    armed: bool,
}

impl<S: PresentationSurface> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Hero handoff dropped before completion; clearing transition guard.");
            let mut st = self.shared.lock_state();
            st.is_transitioning = false;
            st.phase = DriverPhase::Idle;
            self.shared.publish(&st);
        }
    }
}

impl<S: PresentationSurface> Shared<S> {
    fn lock_state(&self) -> MutexGuard<'_, RotationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn target_opacity(&self) -> f32 {
        self.target_opacity.get().copied().unwrap_or(self.timing.default_opacity)
    }

    fn publish(&self, st: &RotationState) {
        self.snapshot_tx.send_replace(snapshot_of(&self.catalog, st));
    }

    /// Single entry point for every rotation trigger.
    fn trigger(self: &Arc<Self>, trigger: Trigger) -> TriggerOutcome {
        let mut st = self.lock_state();
        if st.is_transitioning {
            debug!("Discarding {:?} trigger: handoff in flight.", trigger.kind());
            return TriggerOutcome::Ignored(IgnoreReason::Transitioning);
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return TriggerOutcome::Ignored(IgnoreReason::NotRunning);
        }
        let verdict = match trigger {
            Trigger::Dwell(seq) if !st.is_armed(PendingKind::Dwell, seq) => Some(IgnoreReason::Stale),
            Trigger::NearEnd(seq) | Trigger::MaxWait(seq) if !st.is_armed(PendingKind::Watch, seq) => {
                Some(IgnoreReason::Stale)
            }
            Trigger::Ended if st.phase != DriverPhase::Watching => Some(IgnoreReason::NotWatching),
            Trigger::External if !matches!(st.phase, DriverPhase::Scheduled | DriverPhase::Watching) => {
                Some(IgnoreReason::NotRunning)
            }
            _ => None,
        };
        if let Some(reason) = verdict {
            debug!("Ignoring {:?} trigger: {:?}", trigger.kind(), reason);
            return TriggerOutcome::Ignored(reason);
        }

        st.is_transitioning = true;
        st.phase = DriverPhase::Transitioning;
        st.cancel_pending();
        self.publish(&st);
        drop(st);

        debug!("Accepted {:?} trigger; starting handoff.", trigger.kind());
        tokio::spawn(Arc::clone(self).advance(trigger.kind()));
        TriggerOutcome::Accepted
    }

    /// Runs one handoff to completion and commits it.
    async fn advance(self: Arc<Self>, trigger: RotationTrigger) {
        let mut guard = InFlight { shared: &self, armed: true };
        let next_index = self.catalog.next_index(self.lock_state().current_index);
        let next = self.catalog.entry(next_index).clone();
        info!("Rotating hero video to '{}' ({:?})", next.key, trigger);

        let outcome = self.hand_off(&next).await;
        guard.armed = false;
        self.finish(next_index, &next, trigger, outcome);
    }

    /// Fade out, swap, play, fade in. Returns whether playback of `next` started.
    async fn hand_off(&self, next: &AssetEntry) -> Result<bool, SurfaceError> {
        let target = self.target_opacity();
        self.surface.set_opacity(0.0);
        sleep(self.timing.fade).await;

        if let Err(e) = self.surface.set_source(&next.path) {
            self.surface.set_opacity(target);
            return Err(e);
        }
        self.surface.set_loop(!next.is_terminal_signal);
        self.surface.load();
        let started = self.request_playback(next).await;

        self.surface.set_opacity(target);
        sleep(self.timing.fade).await;
        Ok(started)
    }

    /// Requests playback, bounded by the play timeout. Failures are logged only.
    async fn request_playback(&self, entry: &AssetEntry) -> bool {
        match timeout(self.timing.play_timeout, self.surface.play()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Hero video '{}' failed to start: {}", entry.key, e);
                false
            }
            Err(_) => {
                warn!("Hero video '{}': {}", entry.key, SurfaceError::PlaybackTimedOut);
                false
            }
        }
    }

    fn finish(
        self: &Arc<Self>,
        next_index: usize,
        next: &AssetEntry,
        trigger: RotationTrigger,
        outcome: Result<bool, SurfaceError>,
    ) {
        let mut st = self.lock_state();
        match outcome {
            Ok(playback_started) => {
                st.current_index = next_index;
                st.commits += 1;
                self.report_selection(next_index, next, trigger, playback_started);
            }
            Err(e) => {
                debug!("Hero handoff to '{}' skipped: {}", next.key, e);
            }
        }
        st.is_transitioning = false;
        st.phase = DriverPhase::Idle;
        if self.shut_down.load(Ordering::SeqCst) {
            self.publish(&st);
            return;
        }
        ensure_next_preloaded(&mut st, &self.catalog, self.prefetch.as_ref());
        self.arm_for_current(&mut st);
        self.publish(&st);
    }

    fn report_selection(&self, index: usize, entry: &AssetEntry, trigger: RotationTrigger, playback_started: bool) {
        let report = SelectionReport {
            key: entry.key.clone(),
            path: entry.path.clone(),
            index,
            trigger,
            playback_started,
            at: Utc::now(),
        };
        match serde_json::to_string(&report) {
            Ok(json) => info!("Hero selection: {}", json),
            Err(e) => error!("Failed to serialize hero selection for '{}': {}", entry.key, e),
        }
    }

    /// Arms the dwell timer or the terminal watch for the current asset.
    fn arm_for_current(self: &Arc<Self>, st: &mut RotationState) {
        let current = self.catalog.entry(st.current_index);
        if !current.is_terminal_signal {
            let dwell = self.timing.dwell;
            let weak = Arc::downgrade(self);
            st.arm(PendingKind::Dwell, |seq| {
                tokio::spawn(async move {
                    sleep(dwell).await;
                    if let Some(shared) = weak.upgrade() {
                        shared.trigger(Trigger::Dwell(seq));
                    }
                })
            });
            st.phase = DriverPhase::Scheduled;
            debug!("Scheduled rotation away from '{}' in {:?}", current.key, dwell);
            return;
        }

        st.cancel_pending();
        st.phase = DriverPhase::Watching;
        if !self.timing.near_end_watch && self.timing.terminal_max_wait.is_none() {
            debug!("Watching '{}' for its ended signal only.", current.key);
            return;
        }
        let weak = Arc::downgrade(self);
        let every = self.timing.watch_interval;
        st.arm(PendingKind::Watch, |seq| tokio::spawn(watch_terminal(weak, seq, every)));
        debug!("Watching '{}' for natural end.", current.key);
    }

    /// True once the remaining playback is within the transition lead time.
    fn near_end(&self) -> bool {
        match (self.surface.current_time(), self.surface.duration()) {
            (Some(position), Some(duration)) if duration.is_finite() && duration > 0.0 => {
                let remaining = duration - position;
                trace!("Terminal watch: {:.3}s remaining", remaining);
                remaining <= self.timing.lead.as_secs_f64()
            }
            _ => false,
        }
    }
}

/// Polls playback position of the terminal asset until it nears its end or the
/// optional maximum wait elapses.
async fn watch_terminal<S: PresentationSurface>(weak: Weak<Shared<S>>, seq: u64, every: Duration) {
    let armed_at = Instant::now();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(shared) = weak.upgrade() else { break };
        if let Some(max_wait) = shared.timing.terminal_max_wait {
            if armed_at.elapsed() >= max_wait {
                info!("Terminal asset exceeded max wait of {:?}; rotating.", max_wait);
                shared.trigger(Trigger::MaxWait(seq));
                break;
            }
        }
        if shared.timing.near_end_watch && shared.near_end() {
            shared.trigger(Trigger::NearEnd(seq));
            break;
        }
    }
}

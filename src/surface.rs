//! The presentation surface contract and a simulated implementation.
//!
//! A `PresentationSurface` is the one video element the hero rotation drives:
//! opacity, source, loop flag, load/play/pause, and a time-position readout.
//! The host delivers the element's `ended` notification by calling
//! `HeroRotator::notify_ended`.
//!
//! `SimulatedSurface` implements the contract without a rendering environment.
//! Playback position follows the tokio clock, so it advances under paused test
//! time exactly like timers do.

use crate::errors::SurfaceError;
use async_trait::async_trait;
use log::{debug, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

#[async_trait]
pub trait PresentationSurface: Send + Sync + 'static {
    /// Opacity resolved from the element's style, if the host can read it.
    fn computed_opacity(&self) -> Option<f32>;

    fn set_opacity(&self, opacity: f32);

    /// Replaces the media source.
    ///
    /// # Errors
    /// `SurfaceError::MissingSource` if the element has no source to replace.
    fn set_source(&self, path: &str) -> Result<(), SurfaceError>;

    fn set_loop(&self, looping: bool);

    /// Sets the element's preload policy (`auto`, `metadata`, `none`).
    fn set_preload(&self, policy: &str);

    fn load(&self);

    /// Requests playback start; resolves once playback started or was refused.
    async fn play(&self) -> Result<(), SurfaceError>;

    fn pause(&self);

    /// Current playback position in seconds.
    fn current_time(&self) -> Option<f64>;

    /// Media duration in seconds; `None` while unknown.
    fn duration(&self) -> Option<f64>;
}

/// A call observed by `SimulatedSurface`.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceCall {
    SetOpacity(f32),
    SetSource(String),
    SetLoop(bool),
    SetPreload(String),
    Load,
    Play,
    Pause,
}

#[derive(Debug)]
struct SimState {
    computed_opacity: Option<f32>,
    opacity: f32,
    has_source_element: bool,
    source: Option<String>,
    looping: bool,
    durations: HashMap<String, f64>,
    playing_since: Option<Instant>,
    /// Outcomes of the next `play` calls, front first. Empty means success.
    scripted_plays: VecDeque<PlayScript>,
    calls: Vec<SurfaceCall>,
}

/// Scripted outcome of one `play` request.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayScript {
    Resolve(Result<(), SurfaceError>),
    /// The request never settles.
    Hang,
}

/// A recording, clock-driven stand-in for a video element.
#[derive(Debug)]
pub struct SimulatedSurface {
    state: Mutex<SimState>,
}

impl SimulatedSurface {
    pub fn new(initial_source: &str) -> Self {
        Self {
            state: Mutex::new(SimState {
                computed_opacity: Some(0.5),
                opacity: 0.5,
                has_source_element: true,
                source: Some(initial_source.to_string()),
                looping: true,
                durations: HashMap::new(),
                playing_since: None,
                scripted_plays: VecDeque::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the media duration reported while `path` is the source.
    pub fn with_duration(self, path: &str, seconds: f64) -> Self {
        self.lock().durations.insert(path.to_string(), seconds);
        self
    }

    /// Sets the opacity the host reports from the resolved style.
    pub fn with_computed_opacity(self, opacity: Option<f32>) -> Self {
        {
            let mut st = self.lock();
            st.computed_opacity = opacity;
            if let Some(o) = opacity {
                st.opacity = o;
            }
        }
        self
    }

    /// Simulates an element without a `<source>` child.
    pub fn without_source_element(self) -> Self {
        {
            let mut st = self.lock();
            st.has_source_element = false;
            st.source = None;
        }
        self
    }

    /// Queues the result of an upcoming `play` call.
    pub fn script_play(&self, result: Result<(), SurfaceError>) {
        self.lock().scripted_plays.push_back(PlayScript::Resolve(result));
    }

    /// Makes the next `play` call hang forever.
    pub fn script_play_hang(&self) {
        self.lock().scripted_plays.push_back(PlayScript::Hang);
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn opacity(&self) -> f32 {
        self.lock().opacity
    }

    pub fn source(&self) -> Option<String> {
        self.lock().source.clone()
    }

    pub fn looping(&self) -> bool {
        self.lock().looping
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing_since.is_some()
    }

    /// Sources assigned through `set_source`, in order.
    pub fn source_history(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::SetSource(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PresentationSurface for SimulatedSurface {
    fn computed_opacity(&self) -> Option<f32> {
        self.lock().computed_opacity
    }

    fn set_opacity(&self, opacity: f32) {
        trace!("Surface opacity -> {}", opacity);
        let mut st = self.lock();
        st.opacity = opacity;
        st.calls.push(SurfaceCall::SetOpacity(opacity));
    }

    fn set_source(&self, path: &str) -> Result<(), SurfaceError> {
        let mut st = self.lock();
        if !st.has_source_element {
            return Err(SurfaceError::MissingSource);
        }
        st.source = Some(path.to_string());
        st.playing_since = None;
        st.calls.push(SurfaceCall::SetSource(path.to_string()));
        Ok(())
    }

    fn set_loop(&self, looping: bool) {
        let mut st = self.lock();
        st.looping = looping;
        st.calls.push(SurfaceCall::SetLoop(looping));
    }

    fn set_preload(&self, policy: &str) {
        self.lock().calls.push(SurfaceCall::SetPreload(policy.to_string()));
    }

    fn load(&self) {
        let mut st = self.lock();
        st.playing_since = None;
        st.calls.push(SurfaceCall::Load);
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        let script = {
            let mut st = self.lock();
            st.calls.push(SurfaceCall::Play);
            let script = st.scripted_plays.pop_front().unwrap_or(PlayScript::Resolve(Ok(())));
            match &script {
                PlayScript::Resolve(Ok(())) => {
                    debug!("Simulated playback started for {:?}", st.source);
                    st.playing_since = Some(Instant::now());
                }
                PlayScript::Resolve(Err(e)) => warn!("Simulated playback refused for {:?}: {}", st.source, e),
                PlayScript::Hang => debug!("Simulated playback request for {:?} will never settle", st.source),
            }
            script
        };
        match script {
            PlayScript::Resolve(result) => result,
            PlayScript::Hang => std::future::pending().await,
        }
    }

    fn pause(&self) {
        let mut st = self.lock();
        st.playing_since = None;
        st.calls.push(SurfaceCall::Pause);
    }

    fn current_time(&self) -> Option<f64> {
        let st = self.lock();
        let started = st.playing_since?;
        let elapsed = started.elapsed().as_secs_f64();
        let duration = st.source.as_ref().and_then(|s| st.durations.get(s)).copied();
        Some(match duration {
            Some(d) if d > 0.0 && st.looping => elapsed % d,
            Some(d) => elapsed.min(d),
            None => elapsed,
        })
    }

    fn duration(&self) -> Option<f64> {
        let st = self.lock();
        st.source.as_ref().and_then(|s| st.durations.get(s)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn position_follows_the_clock_and_clamps_without_loop() {
        let surface = SimulatedSurface::new("a.mp4").with_duration("a.mp4", 4.0);
        surface.set_loop(false);
        assert_eq!(surface.current_time(), None);
        surface.play().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((surface.current_time().unwrap() - 3.0).abs() < 1e-6);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((surface.current_time().unwrap() - 4.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scripted_play_failures_are_consumed_in_order() {
        let surface = SimulatedSurface::new("a.mp4");
        surface.script_play(Err(SurfaceError::PlaybackRejected("autoplay".into())));
        assert!(surface.play().await.is_err());
        assert!(surface.play().await.is_ok());
        assert!(surface.is_playing());
    }

    #[test]
    fn missing_source_element_refuses_swap() {
        let surface = SimulatedSurface::new("a.mp4").without_source_element();
        assert_eq!(surface.set_source("b.mp4"), Err(SurfaceError::MissingSource));
        assert!(surface.source_history().is_empty());
    }
}

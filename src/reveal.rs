//! Scroll-triggered reveal of page sections and lazy playback of inline videos.
//!
//! Both trackers consume intersection reports from the host and act on each
//! element at most once, after which the element is no longer observed.

use crate::config::ObserverConfig;
use crate::errors::SurfaceError;
use crate::model::ClientHints;
use log::{debug, trace};
use std::collections::HashSet;

pub const FADE_IN_CLASS: &str = "fade-in-up";
pub const VISIBLE_CLASS: &str = "visible";

/// One intersection report for an observed element.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub id: String,
    pub is_intersecting: bool,
    pub ratio: f32,
}

pub trait RevealHost {
    fn add_class(&self, id: &str, class: &str);
}

/// Adds the visible class to each observed element once it scrolls into view.
#[derive(Debug)]
pub struct RevealTracker {
    threshold: f32,
    root_margin: String,
    enabled: bool,
    observed: HashSet<String>,
}

impl RevealTracker {
    /// Inert when the client prefers reduced motion.
    pub fn new(config: &ObserverConfig, hints: &ClientHints) -> Self {
        let enabled = hints.allows_motion_effects();
        if !enabled {
            debug!("Scroll reveal disabled (reduced motion).");
        }
        Self {
            threshold: config.threshold,
            root_margin: config.root_margin.clone(),
            enabled,
            observed: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Margin the host observer should be created with.
    pub fn root_margin(&self) -> &str {
        &self.root_margin
    }

    pub fn is_observing(&self, id: &str) -> bool {
        self.observed.contains(id)
    }

    pub fn observe<H, I, T>(&mut self, host: &H, ids: I)
    where
        H: RevealHost,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        if !self.enabled {
            return;
        }
        for id in ids {
            let id = id.into();
            host.add_class(&id, FADE_IN_CLASS);
            self.observed.insert(id);
        }
    }

    /// Returns the ids revealed by this batch.
    pub fn on_intersections<H: RevealHost>(&mut self, host: &H, entries: &[Intersection]) -> Vec<String> {
        let mut revealed = Vec::new();
        for entry in entries {
            if !entry.is_intersecting || entry.ratio < self.threshold {
                continue;
            }
            if self.observed.remove(&entry.id) {
                trace!("Revealing '{}'", entry.id);
                host.add_class(&entry.id, VISIBLE_CLASS);
                revealed.push(entry.id.clone());
            }
        }
        revealed
    }
}

pub trait LazyVideoHost {
    fn is_paused(&self, id: &str) -> bool;
    fn play(&self, id: &str) -> Result<(), SurfaceError>;
}

/// Starts lazily-loaded videos the first time they come into view.
#[derive(Debug, Default)]
pub struct LazyVideoTracker {
    observed: HashSet<String>,
}

impl LazyVideoTracker {
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self { observed: ids.into_iter().map(Into::into).collect() }
    }

    pub fn on_intersections<H: LazyVideoHost>(&mut self, host: &H, entries: &[Intersection]) {
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            if !self.observed.remove(&entry.id) {
                continue;
            }
            if host.is_paused(&entry.id) {
                if let Err(e) = host.play(&entry.id) {
                    debug!("Lazy video '{}' did not start: {}", entry.id, e);
                }
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.observed.len()
    }
}

//! Defines the core data structures and enums used by the hero rotation.
//!
//! This includes the asset catalog (`AssetCycle`), the rotation driver phases,
//! the observable snapshot published after each state change, the selection
//! report logged on every commit, and the client hints consulted at start-up.

use crate::errors::CatalogError;
use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Serialize;
use std::collections::HashSet;

/// Represents a single entry of the hero video cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetEntry {
    /// Logical identifier, e.g. `hero` or `analytics`.
    pub key: String,
    /// Fully resolved playable path (`base_path + filename`).
    pub path: String,
    /// True for the one entry whose advance is driven by playback completion.
    pub is_terminal_signal: bool,
}

/// An ordered, fixed, circular sequence of hero video assets.
///
/// Keys are unique and at most one entry is the terminal-signal item. The
/// terminal item is matched by key, never by path.
#[derive(Clone, Debug)]
pub struct AssetCycle {
    base_path: String,
    entries: Vec<AssetEntry>,
}

impl AssetCycle {
    /// Builds a cycle from `(key, filename)` pairs in rotation order.
    ///
    /// # Errors
    /// Returns `CatalogError` if the list is empty, a key repeats, or
    /// `terminal_key` names no entry.
    pub fn new<I, K, F>(base_path: &str, files: I, terminal_key: Option<&str>) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (key, filename) in files {
            let key = key.into();
            if !seen.insert(key.clone()) {
                return Err(CatalogError::DuplicateKey(key));
            }
            let is_terminal_signal = terminal_key == Some(key.as_str());
            let path = format!("{}{}", base_path, filename.as_ref());
            trace!("Catalog entry '{}' -> '{}' (terminal: {})", key, path, is_terminal_signal);
            entries.push(AssetEntry { key, path, is_terminal_signal });
        }
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        if let Some(terminal) = terminal_key {
            if !seen.contains(terminal) {
                return Err(CatalogError::UnknownTerminal(terminal.to_string()));
            }
        }
        debug!("Built asset cycle of {} entries under '{}'", entries.len(), base_path);
        Ok(Self { base_path: base_path.to_string(), entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed cycle; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    /// Entry at `index`, wrapping modulo the cycle length.
    pub fn entry(&self, index: usize) -> &AssetEntry {
        &self.entries[index % self.entries.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.entries.len()
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    /// Resolves a key to its playable path.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.key == key).map(|e| e.path.as_str())
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        self.entry(index).is_terminal_signal
    }

    pub fn terminal_index(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.is_terminal_signal)
    }
}

/// Phases of the rotation driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    /// Nothing armed (before start, after shutdown, or momentarily after a handoff).
    Idle,
    /// A dwell timer is pending for a non-terminal asset.
    Scheduled,
    /// Waiting on the terminal asset's near-end watch or ended signal.
    Watching,
    /// A transition is in flight; all triggers are discarded.
    Transitioning,
    /// Autoplay was refused at start (slow connection or data saver).
    Disabled,
}

/// What caused a rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationTrigger {
    Dwell,
    NearEnd,
    Ended,
    MaxWait,
    External,
}

/// Observable view of the rotation, published through a watch channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RotationSnapshot {
    pub index: usize,
    pub key: String,
    pub phase: DriverPhase,
    pub transitioning: bool,
    /// Number of committed advances since start.
    pub commits: u64,
}

/// Logged (as JSON) every time a new asset is committed.
#[derive(Clone, Debug, Serialize)]
pub struct SelectionReport {
    pub key: String,
    pub path: String,
    pub index: usize,
    pub trigger: RotationTrigger,
    pub playback_started: bool,
    pub at: DateTime<Utc>,
}

/// Capabilities and preferences of the client, read once at page-ready time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientHints {
    pub reduced_motion: bool,
    pub hover_capable: bool,
    pub save_data: bool,
    /// Effective connection type as reported by the host (`4g`, `slow-2g`, ...).
    pub effective_type: Option<String>,
}

impl Default for ClientHints {
    fn default() -> Self {
        Self {
            reduced_motion: false,
            hover_capable: true,
            save_data: false,
            effective_type: None,
        }
    }
}

impl ClientHints {
    /// Heavy hero videos are not autoplayed on data-saver or 2g connections.
    pub fn allows_hero_autoplay(&self) -> bool {
        if self.save_data {
            return false;
        }
        !self
            .effective_type
            .as_deref()
            .map_or(false, |t| t.to_lowercase().contains("2g"))
    }

    pub fn allows_motion_effects(&self) -> bool {
        !self.reduced_motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> AssetCycle {
        AssetCycle::new(
            "assets/videos/",
            [("hero", "hero-video.mp4"), ("analytics", "analytics.mp4"), ("errorHandler", "error_handler.mp4")],
            Some("analytics"),
        )
        .unwrap()
    }

    #[test]
    fn resolves_paths_and_terminal_by_key() {
        let cycle = three();
        assert_eq!(cycle.resolve("analytics"), Some("assets/videos/analytics.mp4"));
        assert_eq!(cycle.resolve("missing"), None);
        assert_eq!(cycle.terminal_index(), Some(1));
        assert!(cycle.is_terminal(1));
        assert!(!cycle.is_terminal(0));
    }

    #[test]
    fn next_index_wraps() {
        let cycle = three();
        assert_eq!(cycle.next_index(0), 1);
        assert_eq!(cycle.next_index(2), 0);
        for n in 2..6 {
            let files: Vec<(String, String)> = (0..n).map(|i| (format!("k{i}"), format!("{i}.mp4"))).collect();
            let cycle = AssetCycle::new("/", files, None).unwrap();
            let mut idx = 0;
            for _ in 0..n {
                idx = cycle.next_index(idx);
            }
            assert_eq!(idx, 0, "cycle of {n} should close");
        }
    }

    #[test]
    fn rejects_bad_catalogs() {
        let empty: Vec<(&str, &str)> = Vec::new();
        assert_eq!(AssetCycle::new("/", empty, None).unwrap_err(), CatalogError::Empty);
        assert_eq!(
            AssetCycle::new("/", [("a", "a.mp4"), ("a", "b.mp4")], None).unwrap_err(),
            CatalogError::DuplicateKey("a".into())
        );
        assert_eq!(
            AssetCycle::new("/", [("a", "a.mp4")], Some("b")).unwrap_err(),
            CatalogError::UnknownTerminal("b".into())
        );
    }

    #[test]
    fn terminal_is_not_inferred_from_matching_paths() {
        // Two keys share a filename; only the named key is terminal.
        let cycle = AssetCycle::new("/", [("a", "same.mp4"), ("b", "same.mp4")], Some("b")).unwrap();
        assert!(!cycle.is_terminal(0));
        assert!(cycle.is_terminal(1));
    }

    #[test]
    fn client_hints_gate_autoplay_and_motion() {
        let mut hints = ClientHints::default();
        assert!(hints.allows_hero_autoplay());
        hints.effective_type = Some("slow-2g".into());
        assert!(!hints.allows_hero_autoplay());
        hints.effective_type = Some("4g".into());
        hints.save_data = true;
        assert!(!hints.allows_hero_autoplay());
        hints.reduced_motion = true;
        assert!(!hints.allows_motion_effects());
    }
}

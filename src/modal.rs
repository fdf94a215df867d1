//! Modal dialogs: open/close, focus restoration, focus trap, lazy video source.
//!
//! The controller holds no element references. Everything it touches goes
//! through `ModalHost`, which the page layer implements.

use crate::errors::SurfaceError;
use log::{debug, trace};

/// Opaque handle to a focusable element.
pub type FocusTarget = String;

/// Page operations the modal controller needs.
pub trait ModalHost {
    fn modal_exists(&self, id: &str) -> bool;
    fn set_active(&self, id: &str, active: bool);
    fn set_aria_hidden(&self, id: &str, hidden: bool);
    fn lock_page_scroll(&self, locked: bool);
    fn focused(&self) -> Option<FocusTarget>;
    fn focus(&self, target: &FocusTarget);
    /// Focusable descendants of the modal, in document order.
    fn focusables(&self, id: &str) -> Vec<FocusTarget>;
    fn has_video(&self, id: &str) -> bool;
    /// Moves the deferred `data-src` onto the video source if it has none yet.
    /// Returns true when a source was assigned.
    fn assign_lazy_source(&self, id: &str) -> bool;
    fn load_video(&self, id: &str);
    fn play_video(&self, id: &str) -> Result<(), SurfaceError>;
    fn pause_video(&self, id: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab { shift: bool },
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    /// Focus was wrapped; the host must suppress the default tab behaviour.
    PreventDefault,
}

/// Tracks the active modal and the element to return focus to.
#[derive(Debug, Default)]
pub struct ModalController {
    active: Option<String>,
    last_focused: Option<FocusTarget>,
}

impl ModalController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Opens `id`. Unknown ids are ignored.
    pub fn open<H: ModalHost>(&mut self, host: &H, id: &str) {
        if !host.modal_exists(id) {
            debug!("open: no modal with id '{}'", id);
            return;
        }
        self.last_focused = host.focused();
        host.set_active(id, true);
        host.set_aria_hidden(id, false);
        host.lock_page_scroll(true);
        if let Some(first) = host.focusables(id).first() {
            host.focus(first);
        }
        if host.has_video(id) {
            if host.assign_lazy_source(id) {
                trace!("Assigned deferred video source for modal '{}'", id);
                host.load_video(id);
            }
            if let Err(e) = host.play_video(id) {
                debug!("Auto-play prevented in modal '{}': {}", id, e);
            }
        }
        self.active = Some(id.to_string());
    }

    /// Closes `id`. Unknown ids are ignored.
    pub fn close<H: ModalHost>(&mut self, host: &H, id: &str) {
        if !host.modal_exists(id) {
            debug!("close: no modal with id '{}'", id);
            return;
        }
        host.set_active(id, false);
        host.set_aria_hidden(id, true);
        host.lock_page_scroll(false);
        if host.has_video(id) {
            host.pause_video(id);
        }
        if let Some(previous) = &self.last_focused {
            host.focus(previous);
        }
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
    }

    /// Escape closes the active modal; Tab wraps focus inside it.
    pub fn handle_key<H: ModalHost>(&mut self, host: &H, key: Key) -> KeyOutcome {
        let Some(id) = self.active.clone() else {
            return KeyOutcome::Ignored;
        };
        match key {
            Key::Escape => {
                self.close(host, &id);
                KeyOutcome::Handled
            }
            Key::Tab { shift } => {
                let focusables = host.focusables(&id);
                let (Some(first), Some(last)) = (focusables.first(), focusables.last()) else {
                    return KeyOutcome::Ignored;
                };
                let focused = host.focused();
                if shift && focused.as_ref() == Some(first) {
                    host.focus(last);
                    KeyOutcome::PreventDefault
                } else if !shift && focused.as_ref() == Some(last) {
                    host.focus(first);
                    KeyOutcome::PreventDefault
                } else {
                    KeyOutcome::Ignored
                }
            }
            Key::Other => KeyOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakePage {
        focused: RefCell<Option<String>>,
        active: RefCell<Vec<String>>,
        scroll_locked: RefCell<bool>,
        lazy_pending: RefCell<bool>,
        log: RefCell<Vec<String>>,
        refuse_play: bool,
    }

    impl ModalHost for FakePage {
        fn modal_exists(&self, id: &str) -> bool {
            id == "demo"
        }
        fn set_active(&self, id: &str, active: bool) {
            let mut list = self.active.borrow_mut();
            list.retain(|m| m != id);
            if active {
                list.push(id.to_string());
            }
        }
        fn set_aria_hidden(&self, id: &str, hidden: bool) {
            self.log.borrow_mut().push(format!("aria-hidden {id}={hidden}"));
        }
        fn lock_page_scroll(&self, locked: bool) {
            *self.scroll_locked.borrow_mut() = locked;
        }
        fn focused(&self) -> Option<FocusTarget> {
            self.focused.borrow().clone()
        }
        fn focus(&self, target: &FocusTarget) {
            *self.focused.borrow_mut() = Some(target.clone());
        }
        fn focusables(&self, _id: &str) -> Vec<FocusTarget> {
            vec!["close-btn".into(), "link".into(), "submit".into()]
        }
        fn has_video(&self, _id: &str) -> bool {
            true
        }
        fn assign_lazy_source(&self, _id: &str) -> bool {
            self.lazy_pending.replace(false)
        }
        fn load_video(&self, _id: &str) {
            self.log.borrow_mut().push("load".into());
        }
        fn play_video(&self, _id: &str) -> Result<(), SurfaceError> {
            self.log.borrow_mut().push("play".into());
            if self.refuse_play {
                Err(SurfaceError::PlaybackRejected("autoplay".into()))
            } else {
                Ok(())
            }
        }
        fn pause_video(&self, _id: &str) {
            self.log.borrow_mut().push("pause".into());
        }
    }

    fn page() -> FakePage {
        let page = FakePage::default();
        *page.focused.borrow_mut() = Some("cta".into());
        *page.lazy_pending.borrow_mut() = true;
        page
    }

    #[test]
    fn open_and_close_restore_focus_and_scroll() {
        let page = page();
        let mut modals = ModalController::new();
        modals.open(&page, "demo");
        assert_eq!(modals.active(), Some("demo"));
        assert_eq!(page.focused().as_deref(), Some("close-btn"));
        assert!(*page.scroll_locked.borrow());

        modals.close(&page, "demo");
        assert_eq!(modals.active(), None);
        assert_eq!(page.focused().as_deref(), Some("cta"));
        assert!(!*page.scroll_locked.borrow());
        assert!(page.log.borrow().contains(&"pause".to_string()));
    }

    #[test]
    fn lazy_source_is_assigned_once() {
        let page = page();
        let mut modals = ModalController::new();
        modals.open(&page, "demo");
        modals.close(&page, "demo");
        modals.open(&page, "demo");
        let loads = page.log.borrow().iter().filter(|l| *l == "load").count();
        let plays = page.log.borrow().iter().filter(|l| *l == "play").count();
        assert_eq!((loads, plays), (1, 2));
    }

    #[test]
    fn refused_autoplay_does_not_break_open() {
        let page = FakePage { refuse_play: true, ..page() };
        let mut modals = ModalController::new();
        modals.open(&page, "demo");
        assert_eq!(modals.active(), Some("demo"));
    }

    #[test]
    fn unknown_modal_is_ignored() {
        let page = page();
        let mut modals = ModalController::new();
        modals.open(&page, "nope");
        assert_eq!(modals.active(), None);
        assert!(page.log.borrow().is_empty());
    }

    #[test]
    fn tab_wraps_inside_active_modal() {
        let page = page();
        let mut modals = ModalController::new();
        assert_eq!(modals.handle_key(&page, Key::Tab { shift: false }), KeyOutcome::Ignored);

        modals.open(&page, "demo");
        assert_eq!(modals.handle_key(&page, Key::Tab { shift: true }), KeyOutcome::PreventDefault);
        assert_eq!(page.focused().as_deref(), Some("submit"));
        assert_eq!(modals.handle_key(&page, Key::Tab { shift: false }), KeyOutcome::PreventDefault);
        assert_eq!(page.focused().as_deref(), Some("close-btn"));
        page.focus(&"link".to_string());
        assert_eq!(modals.handle_key(&page, Key::Tab { shift: false }), KeyOutcome::Ignored);
    }

    #[test]
    fn escape_closes_active_modal() {
        let page = page();
        let mut modals = ModalController::new();
        modals.open(&page, "demo");
        assert_eq!(modals.handle_key(&page, Key::Escape), KeyOutcome::Handled);
        assert_eq!(modals.active(), None);
        assert!(page.active.borrow().is_empty());
    }
}

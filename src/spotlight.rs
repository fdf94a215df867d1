//! Cursor-following spotlight on card elements, throttled to one update per frame.

use crate::model::ClientHints;
use log::debug;

pub const MOUSE_X: &str = "--mouse-x";
pub const MOUSE_Y: &str = "--mouse-y";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub client_x: f64,
    pub client_y: f64,
}

/// Bounding rectangle of a card in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardRect {
    pub left: f64,
    pub top: f64,
}

pub trait SpotlightHost {
    /// Tracked cards with their current bounding rects.
    fn cards(&self) -> Vec<(String, CardRect)>;
    fn set_property(&self, card: &str, name: &str, value: &str);
    fn request_animation_frame(&self);
}

#[derive(Debug)]
pub struct Spotlight {
    enabled: bool,
    frame_pending: bool,
    latest: Option<Pointer>,
}

impl Spotlight {
    /// Inert under reduced motion or on devices without hover.
    pub fn new(hints: &ClientHints) -> Self {
        let enabled = hints.allows_motion_effects() && hints.hover_capable;
        if !enabled {
            debug!("Spotlight disabled (reduced motion or no hover).");
        }
        Self { enabled, frame_pending: false, latest: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records the pointer and requests a frame unless one is already pending.
    /// Returns true if a frame was requested.
    pub fn on_pointer_move<H: SpotlightHost>(&mut self, host: &H, pointer: Pointer) -> bool {
        if !self.enabled {
            return false;
        }
        self.latest = Some(pointer);
        if self.frame_pending {
            return false;
        }
        self.frame_pending = true;
        host.request_animation_frame();
        true
    }

    /// Writes the pointer offset relative to every card.
    pub fn on_animation_frame<H: SpotlightHost>(&mut self, host: &H) {
        self.frame_pending = false;
        let Some(pointer) = self.latest else { return };
        for (card, rect) in host.cards() {
            let x = pointer.client_x - rect.left;
            let y = pointer.client_y - rect.top;
            host.set_property(&card, MOUSE_X, &format!("{}px", x));
            host.set_property(&card, MOUSE_Y, &format!("{}px", y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Cards {
        frames: RefCell<u32>,
        props: RefCell<Vec<(String, String, String)>>,
    }

    impl SpotlightHost for Cards {
        fn cards(&self) -> Vec<(String, CardRect)> {
            vec![
                ("one".into(), CardRect { left: 10.0, top: 20.0 }),
                ("two".into(), CardRect { left: 200.0, top: 20.0 }),
            ]
        }
        fn set_property(&self, card: &str, name: &str, value: &str) {
            self.props.borrow_mut().push((card.into(), name.into(), value.into()));
        }
        fn request_animation_frame(&self) {
            *self.frames.borrow_mut() += 1;
        }
    }

    #[test]
    fn moves_within_a_frame_request_one_update() {
        let host = Cards::default();
        let mut spotlight = Spotlight::new(&ClientHints::default());
        assert!(spotlight.on_pointer_move(&host, Pointer { client_x: 50.0, client_y: 60.0 }));
        assert!(!spotlight.on_pointer_move(&host, Pointer { client_x: 55.0, client_y: 65.0 }));
        assert_eq!(*host.frames.borrow(), 1);

        spotlight.on_animation_frame(&host);
        let props = host.props.borrow();
        assert_eq!(props.len(), 4);
        assert_eq!(props[0], ("one".into(), MOUSE_X.into(), "45px".into()));
        assert_eq!(props[1], ("one".into(), MOUSE_Y.into(), "45px".into()));
        assert_eq!(props[2], ("two".into(), MOUSE_X.into(), "-145px".into()));
        drop(props);

        assert!(spotlight.on_pointer_move(&host, Pointer { client_x: 0.0, client_y: 0.0 }));
        assert_eq!(*host.frames.borrow(), 2);
    }

    #[test]
    fn disabled_without_hover_or_with_reduced_motion() {
        let host = Cards::default();
        let no_hover = ClientHints { hover_capable: false, ..ClientHints::default() };
        let mut spotlight = Spotlight::new(&no_hover);
        assert!(!spotlight.on_pointer_move(&host, Pointer { client_x: 1.0, client_y: 1.0 }));
        spotlight.on_animation_frame(&host);
        assert!(host.props.borrow().is_empty());

        let reduced = ClientHints { reduced_motion: true, ..ClientHints::default() };
        assert!(!Spotlight::new(&reduced).is_enabled());
    }
}

//! Client-side enhancements for the marketing site's landing page.
//!
//! The centre of the crate is [`rotation::HeroRotator`], which cycles the hero
//! video through an [`model::AssetCycle`] on an injected
//! [`surface::PresentationSurface`]. The modal, scroll-reveal and spotlight
//! collaborators are independent of it.

pub mod config;
pub mod errors;
pub mod media_pipeline;
pub mod modal;
pub mod model;
pub mod reveal;
pub mod rotation;
pub mod spotlight;
pub mod state_manager;
pub mod surface;

pub use config::{load_config, parse_config, SiteConfig};
pub use errors::AppError;
pub use rotation::{HeroRotator, RotationTiming, StartOutcome, TriggerOutcome};

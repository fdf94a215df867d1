use hero_rotator_rs::config::{self, SiteConfig};
use hero_rotator_rs::errors::AppError;
use hero_rotator_rs::media_pipeline::{HttpPrefetcher, PrefetchHint, RecordingPrefetch};
use hero_rotator_rs::model::ClientHints;
use hero_rotator_rs::rotation::{HeroRotator, RotationTiming, StartOutcome};
use hero_rotator_rs::surface::SimulatedSurface;
use log::{debug, error, info, warn};
use reqwest::Client as ReqwestClient;
use std::sync::Arc;

// --- Constants ---
const DEFAULT_CONFIG_PATH: &str = "/etc/hero_rotator.conf";
const CONFIG_ENV: &str = "HERO_ROTATOR_CONFIG";
/// Length the simulated surface reports for the terminal asset.
const SIMULATED_TERMINAL_SECONDS: f64 = 12.0;

fn resolve_config() -> SiteConfig {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    match config::load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Falling back to built-in configuration: {}", e);
            SiteConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init(); // Initialize logger
    info!("Starting hero_rotator...");

    let site = resolve_config();
    let catalog = site.video.catalog().map_err(|e| {
        error!("Invalid hero video catalog: {}", e);
        AppError::from(e)
    })?;

    let first = catalog.entry(0).path.clone();
    let mut surface = SimulatedSurface::new(&first);
    if let Some(terminal) = catalog.terminal_index() {
        surface = surface.with_duration(&catalog.entry(terminal).path, SIMULATED_TERMINAL_SECONDS);
    }

    let prefetch: Arc<dyn PrefetchHint> = match &site.video.prefetch_origin {
        Some(origin) => {
            info!("Prefetching hero assets from {}", origin);
            Arc::new(HttpPrefetcher::new(ReqwestClient::new(), origin))
        }
        None => Arc::new(RecordingPrefetch::new()),
    };

    let rotator = HeroRotator::new(catalog, RotationTiming::from(&site.video), surface, prefetch);
    let mut snapshots = rotator.subscribe();
    if rotator.start(&ClientHints::default()).await != StartOutcome::Started {
        warn!("Hero rotation did not start.");
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                debug!("Rotation snapshot: {:?}", snap);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping hero rotation.");
                break;
            }
        }
    }
    rotator.shutdown();
    Ok(())
}

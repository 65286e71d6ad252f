use bevy::prelude::*;

const DEFAULT_BPM: f32 = 120.0;

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Tempo of the demo beat clock.
    pub bpm: f32,
    /// Fixed seed for effect start phases. `None` uses OS entropy.
    pub seed: Option<u64>,
    /// Start with the platform disabled (effects created but not registered).
    pub start_disabled: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            seed: None,
            start_disabled: false,
        }
    }
}

pub(super) fn plugin(app: &mut App) {
    let config = parse_config(std::env::args().skip(1), |key| std::env::var(key).ok());
    info!("Viewer config: {:?}", config);
    app.insert_resource(config);
}

/// Builds the config from CLI args, falling back to the environment, then defaults.
///
/// Supported:
///   --bpm <n> / --bpm=<n>
///   --seed <n> / --seed=<n>
///   --start-disabled
///   PLATFORM_BPM / PLATFORM_SEED environment variables
fn parse_config(
    args: impl IntoIterator<Item = String>,
    env: impl Fn(&str) -> Option<String>,
) -> ViewerConfig {
    let mut bpm: Option<String> = None;
    let mut seed: Option<String> = None;
    let mut start_disabled = false;

    let mut pending_key: Option<&'static str> = None;
    for arg in args {
        if let Some(key) = pending_key.take() {
            if key == "bpm" {
                bpm = Some(arg);
            } else if key == "seed" {
                seed = Some(arg);
            }
        } else if arg == "--bpm" {
            pending_key = Some("bpm");
        } else if let Some(val) = arg.strip_prefix("--bpm=") {
            bpm = Some(val.to_string());
        } else if arg == "--seed" {
            pending_key = Some("seed");
        } else if let Some(val) = arg.strip_prefix("--seed=") {
            seed = Some(val.to_string());
        } else if arg == "--start-disabled" {
            start_disabled = true;
        }
    }

    let bpm = bpm
        .or_else(|| env("PLATFORM_BPM"))
        .and_then(|raw| match raw.trim().parse::<f32>() {
            Ok(bpm) if bpm > 0.0 && bpm.is_finite() => Some(bpm),
            _ => {
                warn!("Ignoring invalid bpm {raw:?}; using {DEFAULT_BPM}");
                None
            }
        })
        .unwrap_or(DEFAULT_BPM);

    let seed = seed
        .or_else(|| env("PLATFORM_SEED"))
        .and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(_) => {
                warn!("Ignoring invalid seed {raw:?}");
                None
            }
        });

    ViewerConfig {
        bpm,
        seed,
        start_disabled,
    }
}

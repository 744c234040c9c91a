use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    config, error,
    errors::{PlayerError, RecoveryAction},
    player::{ConnectSdk, PlaybackAdapter, PlaybackState, PlayerConfig, SdkLoader},
    spotify::WebApi,
    success, utils, warning,
};

use super::fail;

const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Creates the adapter over the Connect SDK and waits for its device.
async fn connect(api: &Arc<WebApi>) -> PlaybackAdapter {
    let sdk = Arc::new(ConnectSdk::new(config::spotify_apiurl()));
    let loader = Arc::new(SdkLoader::new(sdk, config::sdk_load_timeout()));
    let adapter = PlaybackAdapter::new(
        api.clone(),
        loader,
        PlayerConfig {
            name: config::player_name(),
            ..Default::default()
        },
    );

    let mut reported = adapter.subscribe_errors();
    if let Err(e) = adapter.initialize_player().await {
        // The SDK's own report says more than "failed to connect".
        if let Ok(classified) = reported.try_recv() {
            error!("{}", classified)
        }
        fail(&e)
    }

    match adapter.wait_until_ready(READY_TIMEOUT).await {
        Ok(device) => tracing::debug!(device_id = %device.device_id, "player device ready"),
        Err(e) => fail(&e),
    }
    adapter
}

pub async fn play(api: Arc<WebApi>, track: Option<String>, search: Option<String>, follow: bool) {
    let adapter = connect(&api).await;

    let label = match (track, search) {
        (Some(input), _) => {
            let Some(track_id) = utils::extract_track_id(&input) else {
                error!("\"{}\" is not a Spotify track id, URI or link.", input)
            };
            if let Err(e) = adapter.play_track(&track_id).await {
                fail(&e)
            }
            adapter
                .playback()
                .track
                .map(|t| format!("{} - {}", t.name, t.artists.join(", ")))
                .unwrap_or(track_id)
        }
        (None, Some(query)) => match adapter.play_search(&query).await {
            Ok(track) => format!("{} - {}", track.name, track.artist_names()),
            Err(e) => fail(&e),
        },
        (None, None) => fail(&PlayerError::MissingTrack),
    };
    success!("Playing {}", label);

    if follow {
        follow_progress(&adapter).await;
    }
    adapter.disconnect();
}

/// Renders the mirrored playback state until the track stops, a fatal
/// player error arrives or the user presses Ctrl-C.
async fn follow_progress(adapter: &PlaybackAdapter) {
    let mut playback = adapter.subscribe();
    let mut errors = adapter.subscribe_errors();

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {prefix}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut started = false;
    loop {
        let state = playback.borrow_and_update().clone();
        render(&bar, &state);
        if state.is_playing {
            started = true;
        } else if started {
            break;
        }

        tokio::select! {
            changed = playback.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            reported = errors.recv() => match reported {
                Ok(classified) => {
                    bar.suspend(|| warning!("{}", classified));
                    if matches!(
                        classified.action,
                        RecoveryAction::Login | RecoveryAction::Upgrade
                    ) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bar.finish();
}

fn render(bar: &ProgressBar, state: &PlaybackState) {
    bar.set_length(state.duration_ms);
    bar.set_position(state.position_ms);
    bar.set_prefix(format!(
        "{} / {}",
        utils::format_time(state.position_ms),
        utils::format_time(state.duration_ms)
    ));
    if let Some(track) = &state.track {
        bar.set_message(track.name.clone());
    }
}

pub async fn pause(api: Arc<WebApi>) {
    let adapter = connect(&api).await;
    if let Err(e) = adapter.pause().await {
        fail(&e)
    }
    success!("Paused.");
}

pub async fn seek(api: Arc<WebApi>, position: String) {
    let Some(position_ms) = utils::parse_position(&position) else {
        error!("Invalid position \"{}\". Use M:SS or milliseconds.", position)
    };

    let adapter = connect(&api).await;
    if let Err(e) = adapter.seek(position_ms).await {
        fail(&e)
    }
    success!("Seeked to {}.", utils::format_time(position_ms));
}

pub async fn volume(api: Arc<WebApi>, percent: u8) {
    if percent > 100 {
        fail(&PlayerError::InvalidVolume(percent))
    }

    let adapter = connect(&api).await;
    if let Err(e) = adapter.set_volume(percent).await {
        fail(&e)
    }
    success!("Volume set to {}%.", percent);
}

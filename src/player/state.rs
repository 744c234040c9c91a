use super::sdk::SdkPlaybackState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRef {
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// Mirror of the SDK's playback state. The adapter never produces one on
/// its own initiative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub track: Option<TrackRef>,
}

impl PlaybackState {
    pub fn from_sdk(state: &SdkPlaybackState) -> Self {
        Self {
            is_playing: !state.paused,
            position_ms: clamp_position(state.position_ms, state.duration_ms),
            duration_ms: state.duration_ms,
            track: state.track.clone(),
        }
    }

    pub fn progress_percent(&self) -> f64 {
        crate::utils::progress_percent(self.position_ms, self.duration_ms)
    }
}

/// Caps a position at the track duration. An unknown (zero) duration leaves
/// the position alone.
pub(crate) fn clamp_position(position_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms == 0 {
        position_ms
    } else {
        position_ms.min(duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDevice {
    pub device_id: String,
    pub is_ready: bool,
}

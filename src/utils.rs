use crate::types::{Track, TrackTableRow};

pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Extracts a track id from a bare id, a `spotify:track:` URI or an
/// `open.spotify.com/track/` URL.
pub fn extract_track_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let candidate = if let Some(rest) = input.strip_prefix("spotify:track:") {
        rest
    } else if let Some(index) = input.find("open.spotify.com/") {
        let path = &input[index + "open.spotify.com/".len()..];
        // Localized links look like open.spotify.com/intl-de/track/<id>
        let path = match path.strip_prefix("intl-") {
            Some(rest) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
            None => path,
        };
        let id = path.strip_prefix("track/")?;
        id.split(['?', '#', '/']).next().unwrap_or("")
    } else {
        input
    };

    if is_track_id(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn is_track_id(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn progress_percent(position_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    (position_ms as f64 / duration_ms as f64 * 100.0).clamp(0.0, 100.0)
}

/// Parses a seek target given as `M:SS` or as plain milliseconds.
pub fn parse_position(input: &str) -> Option<u64> {
    let input = input.trim();
    match input.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes
                .checked_mul(60)?
                .checked_add(seconds)?
                .checked_mul(1000)
        }
        None => input.parse().ok(),
    }
}

pub fn is_market_code(input: &str) -> bool {
    input.len() == 2 && input.chars().all(|c| c.is_ascii_alphabetic())
}

/// Builds the search query for a standard, optionally narrowed to one
/// composer.
pub fn standard_query(title: &str, composer: Option<&str>) -> String {
    match composer.map(str::trim).filter(|c| !c.is_empty()) {
        Some(composer) => format!("track:{} {}", title.trim(), composer),
        None => title.trim().to_string(),
    }
}

pub fn track_table_rows(tracks: &[Track]) -> Vec<TrackTableRow> {
    tracks
        .iter()
        .map(|track| TrackTableRow {
            id: track.id.clone(),
            name: track.name.clone(),
            artists: track.artist_names(),
            album: track
                .album
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            duration: format_time(track.duration_ms),
        })
        .collect()
}

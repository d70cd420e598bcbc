use crate::player::{PropertySnapshot, PropertyValue};
use std::fmt;


/// Fallback large-image asset when no cover art could be resolved.
pub const FALLBACK_IMAGE_KEY: &str = "mpv";

/// Activity type tag: "Listening to".
pub const ACTIVITY_TYPE_LISTENING: i64 = 2;
/// Activity type tag: "Watching".
pub const ACTIVITY_TYPE_WATCHING: i64 = 3;

/// The composed status payload describing current playback.
///
/// A fresh immutable value every reconciliation tick; no identity beyond
/// its fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub name: String,
    pub state: String,
    pub details: String,
    pub kind: i64,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
    pub party: Option<ActivityParty>,
    pub secrets: Option<ActivitySecrets>,
    pub timestamps: Option<ActivityTimestamps>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityParty {
    pub id: String,
    pub players: i64,
    pub max_players: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySecrets {
    pub r#match: String,
    pub join: String,
    pub spectate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTimestamps {
    pub start: i64,
    pub end: i64,
}

/// Reference wall-clock instant for drift-corrected progress timestamps.
///
/// Reset after every successful unpaused timestamp computation so the
/// presence host can extrapolate a smooth progress bar between one-second
/// polls. Monotonically non-decreasing across resets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAnchor {
    epoch_ms: i64,
}

impl TimeAnchor {
    pub fn new(now_ms: i64) -> Self {
        Self { epoch_ms: now_ms }
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    /// Move the anchor forward; never backwards.
    pub fn reset(&mut self, now_ms: i64) {
        self.epoch_ms = self.epoch_ms.max(now_ms);
    }
}

/// A tick's snapshot could not be turned into an Activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeError {
    MissingProperty(&'static str),
    TypeMismatch(&'static str),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::MissingProperty(name) => {
                write!(f, "required property '{}' is unavailable", name)
            }
            ComposeError::TypeMismatch(name) => {
                write!(f, "property '{}' has an unexpected type", name)
            }
        }
    }
}

impl std::error::Error for ComposeError {}

/// A track selector reads as "no track" only when the player reports it
/// as false; any other value, including absent, counts as selected.
fn track_selected(value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Boolean(false) => false,
        PropertyValue::String(s) => s != "false",
        _ => true,
    }
}

fn require_number(
    snapshot: &PropertySnapshot,
    name: &'static str,
) -> Result<f64, ComposeError> {
    match snapshot.get(name) {
        PropertyValue::Number(n) => Ok(*n),
        PropertyValue::Absent => Err(ComposeError::MissingProperty(name)),
        _ => Err(ComposeError::TypeMismatch(name)),
    }
}

/// Compose an Activity from one tick's property snapshot.
///
/// `cover_url` is the pre-resolved cover-art URL for the current media's
/// directory, if any. `now_ms` is the wall clock used to re-seat the time
/// anchor after an unpaused timestamp computation; it is injected so the
/// derivation stays deterministic under test.
pub fn compose(
    snapshot: &PropertySnapshot,
    cover_url: Option<String>,
    anchor: &mut TimeAnchor,
    now_ms: i64,
) -> Result<Activity, ComposeError> {
    let mut activity = Activity::default();

    // Large image: resolved cover art, or the client's own asset.
    activity.large_image_key = cover_url.unwrap_or_else(|| FALLBACK_IMAGE_KEY.to_string());
    activity.large_image_text = "mpv".to_string();
    if let Some(version) = snapshot.string("mpv-version") {
        if !version.is_empty() {
            let suffix = version.strip_prefix("mpv ").unwrap_or(version);
            activity.large_image_text.push(' ');
            activity.large_image_text.push_str(suffix);
        }
    }

    // Details
    let title = snapshot.string("media-title").unwrap_or_default();
    activity.name = title.to_string();
    activity.details = title.to_string();
    activity.kind = ACTIVITY_TYPE_LISTENING;

    // State: artist when tagged; the album tag folds into the large-image
    // text rather than the state line.
    if let PropertyValue::String(artist) = snapshot.get("metadata/by-key/Artist") {
        activity.state = artist.clone();
    }
    if let PropertyValue::String(album) = snapshot.get("metadata/by-key/Album") {
        activity.large_image_text = format!("{} - {}", album, activity.large_image_text);
    }

    if activity.state.is_empty() {
        if track_selected(snapshot.get("aid")) {
            activity.kind = ACTIVITY_TYPE_LISTENING;
            activity.state.push_str("Audio");
        }
        activity.state.push('/');
        if track_selected(snapshot.get("vid")) {
            activity.state.push_str("Video");
            activity.kind = ACTIVITY_TYPE_WATCHING;
        }
        activity.state.push_str(": ");
        activity
            .state
            .push_str(snapshot.string("file-format").unwrap_or_default());
    }

    // Small image: buffering > paused > looping > playing.
    let buffering = matches!(snapshot.get("paused-for-cache"), PropertyValue::Boolean(true));
    let paused = matches!(snapshot.get("pause"), PropertyValue::Boolean(true));
    let loop_file = snapshot.string("loop-file").unwrap_or("no");
    let loop_playlist = snapshot.string("loop-playlist").unwrap_or("no");
    if buffering {
        activity.small_image_key = "buffer".to_string();
        activity.small_image_text = "Buffering".to_string();
    } else if paused {
        activity.small_image_key = "pause".to_string();
        activity.small_image_text = "Paused".to_string();
    } else if loop_file != "no" || loop_playlist != "no" {
        activity.small_image_key = "loop".to_string();
        activity.small_image_text = "Looping".to_string();
    } else {
        activity.small_image_key = "play".to_string();
        activity.small_image_text = "Playing".to_string();
    }
    if let PropertyValue::Number(percent) = snapshot.get("percent-pos") {
        activity
            .small_image_text
            .push_str(&format!(" ({}%)", *percent as i64));
    }
    if let PropertyValue::Number(count) = snapshot.get("playlist-count") {
        if *count as i64 > 1 {
            if let PropertyValue::Number(pos) = snapshot.get("playlist-pos-1") {
                activity
                    .small_image_text
                    .push_str(&format!(" [{}/{}]", *pos as i64, *count as i64));
            }
        }
    }

    // Timestamps: anchored against the reference instant so the progress
    // bar advances smoothly between polls. Omitted entirely while paused.
    let duration = require_number(snapshot, "duration")?;
    let position = require_number(snapshot, "time-pos")?;
    let start = anchor.epoch_ms() - (position as i64) * 1000;
    let end = start + (duration as i64) * 1000;
    if matches!(snapshot.get("pause"), PropertyValue::Boolean(false)) {
        activity.timestamps = Some(ActivityTimestamps { start, end });
        anchor.reset(now_ms);
    }

    Ok(activity)
}

//! # Playback Domain Models
//!
//! Value types shared by the transport, the resolver and the session.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference to the track's artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArtistRef {
    /// Artist identifier; the stream origin keys storage by it.
    pub id: Option<String>,
    pub name: String,
}

/// Quality labels advertised by the catalog, e.g. `["320", "128k"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreamHint {
    #[serde(default)]
    pub qualities: Vec<String>,
}

/// A catalog track.
///
/// Tracks are value objects: the session holds a copy of the queued track,
/// never a handle into whichever feed produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: ArtistRef,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Catalog duration in seconds. May be approximate or stale.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub stream: Option<StreamHint>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: ArtistRef::default(),
            cover_url: None,
            duration,
            liked: false,
            stream: None,
        }
    }

    pub fn with_artist(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.artist = ArtistRef {
            id: Some(id.into()),
            name: name.into(),
        };
        self
    }

    pub fn with_qualities<I, S>(mut self, qualities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream = Some(StreamHint {
            qualities: qualities.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Artist id, if present and non-blank.
    pub fn artist_id(&self) -> Option<&str> {
        self.artist
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Catalog duration sanitized to a finite, non-negative value.
    pub fn catalog_duration(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration
        } else {
            0.0
        }
    }
}

/// One bitrate rendition of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Bits per second.
    pub bitrate: u32,
    pub url: String,
}

/// A short-lived set of signed URLs for one track.
///
/// Valid only for `track_id`; a newly queued track invalidates it immediately
/// regardless of expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub track_id: String,
    pub master_url: String,
    pub variants: Vec<StreamVariant>,
    pub expires_in_seconds: u64,
    pub fetched_at: DateTime<Utc>,
}

impl StreamDescriptor {
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.expires_in_seconds)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// True if the URLs expire within `margin` of `now` (or already have).
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match ChronoDuration::from_std(margin)
            .ok()
            .and_then(|margin| now.checked_add_signed(margin))
        {
            Some(deadline) => deadline >= self.expires_at(),
            None => true,
        }
    }
}

/// Session play state.
///
/// `Idle` is the pre-first-track state; `Stopped` follows an explicit stop or
/// the natural end of a track. Both are silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlayState {
    #[default]
    Idle,
    ResolvingStream,
    Playing,
    Paused,
    Stopped,
    Errored,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Idle => "idle",
            PlayState::ResolvingStream => "resolving_stream",
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
            PlayState::Stopped => "stopped",
            PlayState::Errored => "errored",
        }
    }

    /// Only `Playing` produces sound.
    pub fn is_audible(&self) -> bool {
        matches!(self, PlayState::Playing)
    }
}

/// Parameters for one stream origin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub track_id: String,
    pub artist_id: String,
    /// Candidate bitrates in bps; `None` lets the origin choose its defaults.
    pub bitrates: Option<Vec<u32>>,
}

impl StreamRequest {
    /// Build the request for `track`, or `None` if it has no artist id.
    pub fn from_track(track: &Track) -> Option<Self> {
        let artist_id = track.artist_id()?;
        Some(Self {
            track_id: track.id.clone(),
            artist_id: artist_id.to_string(),
            bitrates: track
                .stream
                .as_ref()
                .and_then(|hint| parse_bitrates(hint.qualities.as_slice())),
        })
    }
}

/// Convert quality labels into candidate bitrates.
///
/// Non-digits are stripped (`"128k"` becomes `128`), empty and zero values are
/// dropped, values below 1000 are read as kbps, duplicates keep their first
/// position. An empty result is `None`.
pub fn parse_bitrates<S: AsRef<str>>(qualities: &[S]) -> Option<Vec<u32>> {
    let mut bitrates: Vec<u32> = Vec::new();

    for label in qualities {
        let digits: String = label
            .as_ref()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let Ok(value) = digits.parse::<u64>() else {
            continue;
        };
        if value == 0 {
            continue;
        }
        let scaled = if value < 1000 { value * 1000 } else { value };
        let Ok(bitrate) = u32::try_from(scaled) else {
            continue;
        };
        if !bitrates.contains(&bitrate) {
            bitrates.push(bitrate);
        }
    }

    (!bitrates.is_empty()).then_some(bitrates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(fetched_at: i64, ttl: u64) -> StreamDescriptor {
        StreamDescriptor {
            track_id: "t1".to_string(),
            master_url: "https://x/m.m3u8".to_string(),
            variants: vec![
                StreamVariant {
                    bitrate: 96_000,
                    url: "https://x/96k.m3u8".to_string(),
                },
                StreamVariant {
                    bitrate: 256_000,
                    url: "https://x/256k.m3u8".to_string(),
                },
            ],
            expires_in_seconds: ttl,
            fetched_at: DateTime::<Utc>::from_timestamp(fetched_at, 0).unwrap(),
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn test_parse_bitrates_normalizes_labels() {
        assert_eq!(
            parse_bitrates(&["320", "128k", "256000", "128 kbps", "lossless", "0"]),
            Some(vec![320_000, 128_000, 256_000])
        );
    }

    #[test]
    fn test_parse_bitrates_empty_is_absent() {
        assert_eq!(parse_bitrates::<&str>(&[]), None);
        assert_eq!(parse_bitrates(&["hi-fi", "", "000"]), None);
    }

    #[test]
    fn test_parse_bitrates_drops_overflowing_values() {
        assert_eq!(parse_bitrates(&["99999999999", "160"]), Some(vec![160_000]));
    }

    #[test]
    fn test_stream_request_requires_artist() {
        let track = Track::new("t1", "Intro", 200.0);
        assert!(StreamRequest::from_track(&track).is_none());

        let blank = Track::new("t1", "Intro", 200.0).with_artist("  ", "Nobody");
        assert!(StreamRequest::from_track(&blank).is_none());

        let track = Track::new("t1", "Intro", 200.0)
            .with_artist("a1", "Artist")
            .with_qualities(["128k", "320"]);
        let request = StreamRequest::from_track(&track).unwrap();
        assert_eq!(request.artist_id, "a1");
        assert_eq!(request.bitrates, Some(vec![128_000, 320_000]));
    }

    #[test]
    fn test_descriptor_expiry() {
        let desc = descriptor(1_000, 300);
        assert_eq!(desc.expires_at(), at(1_300));
        assert!(!desc.is_expired(at(1_299)));
        assert!(desc.is_expired(at(1_300)));

        assert!(!desc.expires_within(at(1_000), Duration::from_secs(30)));
        assert!(desc.expires_within(at(1_280), Duration::from_secs(30)));
        assert!(desc.expires_within(at(2_000), Duration::ZERO));
    }

    #[test]
    fn test_only_playing_is_audible() {
        assert!(PlayState::Playing.is_audible());
        for state in [
            PlayState::Idle,
            PlayState::ResolvingStream,
            PlayState::Paused,
            PlayState::Stopped,
            PlayState::Errored,
        ] {
            assert!(!state.is_audible(), "{}", state.as_str());
        }
    }

    #[test]
    fn test_track_deserializes_with_defaults() {
        let track: Track = serde_json::from_str(
            r#"{"id":"t1","title":"Intro","artist":{"id":"a1","name":"A"},"duration":200}"#,
        )
        .unwrap();
        assert_eq!(track.artist_id(), Some("a1"));
        assert!(track.stream.is_none());
        assert!(!track.liked);

        let mut bad = track.clone();
        bad.duration = f64::NAN;
        assert_eq!(bad.catalog_duration(), 0.0);
    }
}

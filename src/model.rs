//! Domain types for cached segments and peer metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Classification of a cached file, derived from its filename.
///
/// Init segments and playlists are required to bootstrap playback and are
/// exempt from time-based eviction; only media segments age out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// Init segment (init.mp4 or init.m4s)
    Init,
    /// Master playlist (master.m3u8)
    MasterPlaylist,
    /// Variant playlist (playlist.m3u8 or {quality}.m3u8)
    VariantPlaylist,
    /// Media segment (seg_0001.m4s), actual video/audio data
    Media,
}

impl SegmentType {
    /// Derive the segment type from a segment id / filename.
    pub fn from_segment_id(segment_id: &str) -> Self {
        let lower = segment_id.to_lowercase();
        if lower == "init" || lower.starts_with("init.") {
            return SegmentType::Init;
        }
        if lower == "master" || lower.starts_with("master.") {
            return SegmentType::MasterPlaylist;
        }
        if lower == "playlist" || lower.starts_with("playlist.") || lower.ends_with(".m3u8") {
            return SegmentType::VariantPlaylist;
        }
        SegmentType::Media
    }

    /// Critical segments must survive the time-based sweep.
    pub fn is_critical(self) -> bool {
        !matches!(self, SegmentType::Media)
    }
}

/// Identifies one segment of one movie, optionally scoped to a quality variant.
///
/// `quality_id` is `None` only for the movie-level master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub movie_id: String,
    pub quality_id: Option<String>,
    pub segment_id: String,
}

impl SegmentKey {
    pub fn new(
        movie_id: impl Into<String>,
        quality_id: Option<String>,
        segment_id: impl Into<String>,
    ) -> Self {
        Self {
            movie_id: movie_id.into(),
            quality_id,
            segment_id: segment_id.into(),
        }
    }

    pub fn kind(&self) -> SegmentType {
        SegmentType::from_segment_id(&self.segment_id)
    }
}

/// A segment present in the local cache directory tree.
#[derive(Debug, Clone)]
pub struct CachedSegment {
    pub movie_id: String,
    pub quality_id: Option<String>,
    pub segment_id: String,
    pub path: PathBuf,
    pub last_modified: DateTime<Utc>,
    pub kind: SegmentType,
}

impl CachedSegment {
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }
}

/// Performance metrics for a peer, used by clients to rank download candidates.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerMetrics {
    /// Reported upload speed in MB/s
    pub upload_speed: f64,
    /// Reported latency in milliseconds
    pub latency: i64,
    /// Delivery success rate in [0, 1]
    pub success_rate: f64,
    /// Last activity as epoch seconds
    pub last_active: i64,
}

impl PeerMetrics {
    /// Conservative defaults for a peer with no recorded metrics: new peers
    /// stay eligible to be tried rather than being excluded.
    pub fn unknown(now_epoch: i64) -> Self {
        Self {
            upload_speed: 0.0,
            latency: 999,
            success_rate: 0.5,
            last_active: now_epoch,
        }
    }
}

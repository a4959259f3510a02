//! Registry key grammar for the streaming swarm.
//!
//! Key structure:
//! - `movie:{movieId}:quality:{qualityId}:segments`: segments this node holds
//!   for a quality variant (`movie:{movieId}:segments` for the movie level)
//! - `movie:{movieId}:peers`: peers streaming a movie, any quality
//! - `movie:{movieId}:quality:{qualityId}:segment:{segmentId}:owners`: peers
//!   holding a specific segment (quality infix omitted at the movie level)
//! - `peer:{clientId}:lastSeen`: last activity timestamp
//! - `p2p:metrics:{clientId}`: peer performance metrics

/// Key for the segments this node holds for a movie quality.
pub fn movie_quality_segments(movie_id: &str, quality_id: Option<&str>) -> String {
    match quality_id {
        Some(q) if !q.trim().is_empty() => format!("movie:{}:quality:{}:segments", movie_id, q),
        _ => format!("movie:{}:segments", movie_id),
    }
}

/// Key for the set of peers holding a specific segment.
pub fn segment_owners(movie_id: &str, quality_id: Option<&str>, segment_id: &str) -> String {
    match quality_id {
        Some(q) if !q.trim().is_empty() => {
            format!("movie:{}:quality:{}:segment:{}:owners", movie_id, q, segment_id)
        }
        _ => format!("movie:{}:segment:{}:owners", movie_id, segment_id),
    }
}

/// Key for all peers currently connected for a movie.
pub fn movie_peers(movie_id: &str) -> String {
    format!("movie:{}:peers", movie_id)
}

/// Pattern matching every segment-owner key of a movie, with or without a
/// quality infix. Used by the disconnect sweep.
pub fn segment_owners_pattern(movie_id: &str) -> String {
    format!("movie:{}:*segment:*:owners", movie_id)
}

/// Key for a peer's last-seen timestamp.
pub fn peer_last_seen(client_id: &str) -> String {
    format!("peer:{}:lastSeen", client_id)
}

/// Key for a peer's performance metrics hash.
pub fn peer_metrics(client_id: &str) -> String {
    format!("p2p:metrics:{}", client_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::glob_match;

    #[test]
    fn quality_scoped_keys() {
        assert_eq!(
            movie_quality_segments("m1", Some("720p")),
            "movie:m1:quality:720p:segments"
        );
        assert_eq!(movie_quality_segments("m1", None), "movie:m1:segments");
        assert_eq!(
            segment_owners("m1", Some("720p"), "seg_0001.m4s"),
            "movie:m1:quality:720p:segment:seg_0001.m4s:owners"
        );
        assert_eq!(
            segment_owners("m1", None, "master.m3u8"),
            "movie:m1:segment:master.m3u8:owners"
        );
    }

    #[test]
    fn owners_pattern_matches_both_key_shapes() {
        let pattern = segment_owners_pattern("m1");
        assert!(glob_match(
            &pattern,
            "movie:m1:quality:720p:segment:seg_0001.m4s:owners"
        ));
        assert!(glob_match(&pattern, "movie:m1:segment:master.m3u8:owners"));
        assert!(!glob_match(&pattern, "movie:m1:peers"));
        assert!(!glob_match(
            &pattern,
            "movie:other:quality:720p:segment:seg_0001.m4s:owners"
        ));
    }
}

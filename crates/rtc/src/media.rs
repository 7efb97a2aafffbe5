//! Media track identity and stream groupings

use std::sync::Arc;

/// Identity of a media track
///
/// The peer layer only needs a track's id: it keys the sender map and names
/// streams. Everything else about a track (kind, codec, payload) belongs to
/// the underlying connection implementation.
pub trait Track: Send + Sync {
    /// Stable identifier of this track
    fn id(&self) -> String;
}

/// A grouping of tracks under one stream id
///
/// Mirrors the browser `MediaStream`: remote tracks may arrive grouped into
/// streams, and local tracks are attached under a stream grouping.
#[derive(Debug)]
pub struct MediaStream<T> {
    id: String,
    tracks: Vec<Arc<T>>,
}

impl<T> MediaStream<T> {
    /// An empty stream with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    /// A stream with the given id and tracks
    pub fn with_tracks(id: impl Into<String>, tracks: Vec<Arc<T>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Wrap a single ungrouped track in a fresh stream
    ///
    /// Some senders attach tracks without grouping them into a stream; this
    /// normalizes them so consumers always receive a usable stream handle.
    /// The id is freshly generated, as a browser `new MediaStream` would.
    pub fn from_track(track: Arc<T>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks: vec![track],
        }
    }

    /// Stream identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tracks grouped under this stream
    pub fn tracks(&self) -> &[Arc<T>] {
        &self.tracks
    }

    /// Append a track to this grouping
    pub fn add_track(&mut self, track: Arc<T>) {
        self.tracks.push(track);
    }
}

impl<T> Clone for MediaStream<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            tracks: self.tracks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedTrack(&'static str);

    impl Track for NamedTrack {
        fn id(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_from_track_wraps_exactly_one_track() {
        let track = Arc::new(NamedTrack("mic"));
        let stream = MediaStream::from_track(Arc::clone(&track));
        assert_eq!(stream.tracks().len(), 1);
        assert_eq!(stream.tracks()[0].id(), "mic");
        assert!(!stream.id().is_empty());
    }

    #[test]
    fn test_from_track_generates_distinct_ids() {
        let a = MediaStream::from_track(Arc::new(NamedTrack("a")));
        let b = MediaStream::from_track(Arc::new(NamedTrack("b")));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_with_tracks_keeps_order() {
        let stream = MediaStream::with_tracks(
            "screen",
            vec![Arc::new(NamedTrack("video")), Arc::new(NamedTrack("audio"))],
        );
        assert_eq!(stream.id(), "screen");
        let ids: Vec<String> = stream.tracks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["video", "audio"]);
    }
}

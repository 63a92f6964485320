use serde::{Deserialize, Serialize};

/// The kind of failure a preset response simulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    /// Fails with `ErrorKind::Transport` before any event is streamed.
    Transport,
    /// Fails with `ErrorKind::RateLimited` before any event is streamed.
    RateLimited,
    /// Streams the deltas, then fails with `ErrorKind::MalformedResponse`.
    MalformedResponse,
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Message deltas in this response.
    pub deltas: Vec<String>,
    /// If set, the request fails instead of completing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` that streams the given deltas.
    #[inline]
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Creates a `PresetResponse` that streams the text in one delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_deltas([text])
    }

    /// Creates a `PresetResponse` that fails with the given kind.
    #[inline]
    pub fn with_failure(failure: PresetFailure) -> Self {
        Self {
            deltas: vec![],
            failure: Some(failure),
        }
    }
}

use std::fmt::{self, Display};

/// The kind of error that occurred.
///
/// The generation loop treats every kind identically. The distinction is
/// kept so that callers can report why a run ended early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be delivered, or the endpoint answered with
    /// a non-success status.
    Transport,
    /// The model provider is rate limited.
    RateLimited,
    /// The endpoint answered, but the payload could not be understood.
    MalformedResponse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::RateLimited => write!(f, "Rate limited"),
            ErrorKind::MalformedResponse => write!(f, "Malformed response"),
        }
    }
}

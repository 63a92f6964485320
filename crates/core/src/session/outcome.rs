use std::fmt::{self, Display};

use ner_forge_model::ErrorKind;

use crate::budget::UnknownCostModel;

/// The generated samples of a run, in request order.
pub type ArtifactLog = Vec<String>;

/// Why a run stopped before reaching its target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The model client reported an error. The run is never retried.
    ModelClient {
        /// The kind of the client error.
        kind: ErrorKind,
        /// The client's error message.
        message: String,
    },
    /// The cost model stopped being recognized mid-run.
    CostEstimation(UnknownCostModel),
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ModelClient { kind, message } => {
                write!(f, "{kind}: {message}")
            }
            FailureReason::CostEstimation(err) => Display::fmt(err, f),
        }
    }
}

/// The result of a generation run.
///
/// Every variant carries the samples collected so far. A failing client
/// or a cancellation ends the run early, but never loses them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The target count was reached.
    Completed(ArtifactLog),
    /// The run stopped early because of a failure.
    PartialSuccess(ArtifactLog, FailureReason),
    /// The run stopped early because cancellation was requested.
    Cancelled(ArtifactLog),
}

impl Outcome {
    /// Returns the collected samples.
    #[inline]
    pub fn artifacts(&self) -> &[String] {
        match self {
            Outcome::Completed(artifacts)
            | Outcome::PartialSuccess(artifacts, _)
            | Outcome::Cancelled(artifacts) => artifacts,
        }
    }

    /// Converts the outcome into the collected samples.
    #[inline]
    pub fn into_artifacts(self) -> ArtifactLog {
        match self {
            Outcome::Completed(artifacts)
            | Outcome::PartialSuccess(artifacts, _)
            | Outcome::Cancelled(artifacts) => artifacts,
        }
    }

    /// Returns the number of collected samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.artifacts().len()
    }

    /// Returns `true` if nothing was collected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.artifacts().is_empty()
    }

    /// Returns the failure that ended the run, if any.
    #[inline]
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::PartialSuccess(_, reason) => Some(reason),
            _ => None,
        }
    }
}

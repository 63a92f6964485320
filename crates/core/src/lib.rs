//! Core logic of the generation loop: token budgeting, cancellation and
//! the bounded-context generation session.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod budget;
mod cancel;
mod model_client;
mod session;

pub use budget::{Budget, TiktokenEstimator, TokenEstimator, UnknownCostModel};
pub use cancel::CancellationToken;
pub use session::{
    ArtifactLog, BuildError, DEFAULT_CONTINUATION, DEFAULT_COST_MODEL,
    DEFAULT_TOKEN_LIMIT, FailureReason, GenerationSession, Outcome,
    SessionBuilder, SessionState, TurnStatus,
};

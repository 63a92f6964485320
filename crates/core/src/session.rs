mod builder;
mod outcome;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use ner_forge_model::{GenerationOptions, ModelMessage, ModelRequest};
use tracing::Instrument;

use crate::budget::{Budget, TiktokenEstimator, TokenEstimator};
use crate::cancel::CancellationToken;
use crate::model_client::ModelClient;
pub use builder::{
    BuildError, DEFAULT_CONTINUATION, DEFAULT_COST_MODEL, DEFAULT_TOKEN_LIMIT,
    SessionBuilder,
};
pub use outcome::{ArtifactLog, FailureReason, Outcome};

pub(crate) type ArtifactFn = Box<dyn Fn(usize, &str) + Send + Sync>;
pub(crate) type DeltaFn = Arc<dyn Fn(&str) + Send + Sync>;

// Separator used when a transcript is flattened for cost estimation.
const COST_TEXT_SEPARATOR: &str = ". ";

/// The stage a [`GenerationSession`] is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The transcript is exactly the anchor.
    #[default]
    Ready,
    /// Turns have been appended to the transcript beyond the anchor.
    Extended,
    /// The run has ended, no more requests will be sent.
    Terminated,
}

/// What a single call to [`GenerationSession::turn`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnStatus {
    /// A sample was produced and the transcript grew by the sample and
    /// a continuation message.
    Extended,
    /// A sample was produced and the transcript was reset to the anchor,
    /// because its cost reached the limit.
    Reset,
    /// The session is terminated. No sample was produced, unless the cost
    /// estimation failed after the model answered: that sample is still
    /// kept in the log.
    Terminated,
}

enum Termination {
    Completed,
    Failed(FailureReason),
    Cancelled,
}

/// A bounded-context generation loop.
///
/// The session holds a conversation with the model that starts from a
/// fixed anchor (a system and a user message). Every turn sends the whole
/// transcript, appends the completion to the artifact log, and then
/// either grows the transcript with the completion and a continuation
/// message, or resets it to the anchor once its estimated cost reaches the
/// token limit.
///
/// The cost is always re-estimated from the full transcript rather than
/// accumulated from deltas, since tokenizing concatenated text is not
/// additive over its parts.
///
/// A session runs until the target count is reached, the model client
/// fails, or cancellation is requested. The last two end the run early
/// but keep every sample collected so far, see [`Outcome`].
pub struct GenerationSession {
    model_client: ModelClient,
    estimator: Box<dyn TokenEstimator + Send + Sync>,
    cost_model: String,
    anchor: Vec<ModelMessage>,
    transcript: Vec<ModelMessage>,
    continuation: String,
    options: GenerationOptions,
    budget: Budget,
    target: usize,
    artifacts: ArtifactLog,
    state: SessionState,
    termination: Option<Termination>,
    cancellation: CancellationToken,
    on_artifact: Option<ArtifactFn>,
    on_delta: Option<DeltaFn>,
}

impl GenerationSession {
    fn from_builder(builder: SessionBuilder) -> Result<Self, BuildError> {
        let SessionBuilder {
            model_client,
            estimator,
            system_prompt,
            user_prompt,
            continuation,
            target,
            token_limit,
            cost_model,
            options,
            cancellation,
            on_artifact,
            on_delta,
        } = builder;

        let anchor: Vec<_> = system_prompt
            .map(ModelMessage::System)
            .into_iter()
            .chain(user_prompt.map(ModelMessage::User))
            .collect();
        let estimator =
            estimator.unwrap_or_else(|| Box::new(TiktokenEstimator::new()));
        let anchor_cost =
            estimator.estimate(&cost_text(&anchor, None), &cost_model)?;
        debug!(anchor_cost, token_limit, target, "session created");
        if anchor_cost >= token_limit {
            warn!(
                anchor_cost,
                token_limit, "the anchor alone exceeds the token limit"
            );
        }

        Ok(Self {
            model_client,
            estimator,
            cost_model,
            transcript: anchor.clone(),
            anchor,
            continuation,
            options,
            budget: Budget::new(token_limit, anchor_cost),
            target,
            artifacts: Vec::with_capacity(target.min(1024)),
            state: SessionState::Ready,
            termination: None,
            cancellation: cancellation.unwrap_or_default(),
            on_artifact,
            on_delta,
        })
    }

    /// Returns the current stage of the session.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns whether the run has ended.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Returns the transcript that the next turn will send.
    #[inline]
    pub fn transcript(&self) -> &[ModelMessage] {
        &self.transcript
    }

    /// Returns the anchor messages every transcript starts with.
    #[inline]
    pub fn anchor(&self) -> &[ModelMessage] {
        &self.anchor
    }

    /// Returns the current budget.
    #[inline]
    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Returns the samples collected so far.
    #[inline]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Runs one turn.
    ///
    /// Cancellation is checked first, so a turn never starts after it was
    /// requested. The request itself is never interrupted.
    pub async fn turn(&mut self) -> TurnStatus {
        if self.is_terminated() {
            return TurnStatus::Terminated;
        }
        if self.cancellation.is_cancelled() {
            self.terminate(Termination::Cancelled);
            return TurnStatus::Terminated;
        }
        if self.artifacts.len() >= self.target {
            self.terminate(Termination::Completed);
            return TurnStatus::Terminated;
        }

        let index = self.artifacts.len();
        let span = debug_span!("turn", index);

        match self.estimate(&cost_text(&self.transcript, None)) {
            Ok(cost) => self.budget.current_cost = cost,
            Err(reason) => {
                self.terminate(Termination::Failed(reason));
                return TurnStatus::Terminated;
            }
        }
        span.in_scope(|| {
            debug!(
                current_cost = self.budget.current_cost,
                messages = self.transcript.len(),
                "sending request"
            );
        });

        let request = ModelRequest {
            messages: self.transcript.clone(),
            options: self.options.clone(),
        };
        let on_delta = self.on_delta.clone();
        let resp_or_err = self
            .model_client
            .send_request(request, move |delta| {
                if let Some(on_delta) = &on_delta {
                    on_delta(delta);
                }
            })
            .instrument(span.clone())
            .await;
        let artifact = match resp_or_err {
            Ok(resp) => resp.content,
            Err(err) => {
                let _enter = span.enter();
                warn!("request failed, terminating early: {err}");
                self.terminate(Termination::Failed(
                    FailureReason::ModelClient {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                ));
                return TurnStatus::Terminated;
            }
        };

        self.artifacts.push(artifact);
        let artifact = &self.artifacts[index];
        if let Some(on_artifact) = &self.on_artifact {
            on_artifact(index, artifact);
        }

        let projected_cost =
            match self.estimate(&cost_text(&self.transcript, Some(artifact))) {
                Ok(cost) => cost,
                Err(reason) => {
                    self.terminate(Termination::Failed(reason));
                    return TurnStatus::Terminated;
                }
            };

        let status = if self.budget.admits(projected_cost) {
            self.extend(index)
        } else {
            span.in_scope(|| {
                debug!(projected_cost, "token limit reached, resetting");
            });
            self.reset();
            TurnStatus::Reset
        };

        if self.artifacts.len() == self.target {
            self.terminate(Termination::Completed);
        }
        status
    }

    /// Runs turns until the session terminates and returns the outcome.
    pub async fn run(mut self) -> Outcome {
        while !self.is_terminated() {
            self.turn().await;
        }
        self.finish()
    }

    /// Ends the session and hands over the collected samples.
    ///
    /// A session that is dropped before it terminated by itself is
    /// reported as cancelled.
    pub fn finish(self) -> Outcome {
        match self.termination {
            Some(Termination::Completed) => Outcome::Completed(self.artifacts),
            Some(Termination::Failed(reason)) => {
                Outcome::PartialSuccess(self.artifacts, reason)
            }
            Some(Termination::Cancelled) | None => {
                Outcome::Cancelled(self.artifacts)
            }
        }
    }

    fn extend(&mut self, index: usize) -> TurnStatus {
        let artifact = self.artifacts[index].clone();
        self.transcript.push(ModelMessage::Assistant(artifact));
        self.transcript
            .push(ModelMessage::User(self.continuation.clone()));
        // The continuation will be sent with the next turn, so it's part of
        // the cost already.
        match self.estimate(&cost_text(&self.transcript, None)) {
            Ok(cost) => {
                self.budget.current_cost = cost;
                self.state = SessionState::Extended;
                TurnStatus::Extended
            }
            Err(reason) => {
                self.terminate(Termination::Failed(reason));
                TurnStatus::Terminated
            }
        }
    }

    fn reset(&mut self) {
        self.transcript.clone_from(&self.anchor);
        self.budget.reset();
        self.state = SessionState::Ready;
    }

    fn terminate(&mut self, termination: Termination) {
        if self.termination.is_none() {
            match &termination {
                Termination::Completed => {
                    info!(collected = self.artifacts.len(), "run completed");
                }
                Termination::Failed(reason) => {
                    info!(
                        collected = self.artifacts.len(),
                        target = self.target,
                        "run ended early: {reason}"
                    );
                }
                Termination::Cancelled => {
                    info!(
                        collected = self.artifacts.len(),
                        target = self.target,
                        "run cancelled"
                    );
                }
            }
            self.termination = Some(termination);
        }
        self.state = SessionState::Terminated;
    }

    #[inline]
    fn estimate(&self, text: &str) -> Result<usize, FailureReason> {
        self.estimator
            .estimate(text, &self.cost_model)
            .map_err(FailureReason::CostEstimation)
    }
}

/// Flattens message contents (plus an optional pending reply) into the
/// text whose cost is estimated.
fn cost_text(messages: &[ModelMessage], pending: Option<&str>) -> String {
    let mut text = String::new();
    let contents = messages.iter().map(ModelMessage::content).chain(pending);
    for (i, content) in contents.enumerate() {
        if i > 0 {
            text.push_str(COST_TEXT_SEPARATOR);
        }
        text.push_str(content);
    }
    text
}

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use ner_forge_model::{GenerationOptions, ModelProvider};

use super::{ArtifactFn, DeltaFn, GenerationSession};
use crate::budget::{TokenEstimator, UnknownCostModel};
use crate::cancel::CancellationToken;
use crate::model_client::ModelClient;

/// The default instruction sent between turns.
pub const DEFAULT_CONTINUATION: &str = "Do it again.";
/// The default transcript cost that triggers a reset.
pub const DEFAULT_TOKEN_LIMIT: usize = 5000;
/// The default cost model for estimating transcript sizes.
pub const DEFAULT_COST_MODEL: &str = "gpt-4";

/// An error that prevents a session from being built.
///
/// All of these are configuration errors: nothing has been sent to the
/// model when they occur.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The target artifact count is zero.
    InvalidTarget,
    /// The token limit is zero.
    InvalidLimit,
    /// No user prompt has been set.
    MissingPrompt,
    /// The estimator doesn't know the cost model.
    UnknownCostModel(UnknownCostModel),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidTarget => {
                write!(f, "the target count must be at least 1")
            }
            BuildError::InvalidLimit => {
                write!(f, "the token limit must be positive")
            }
            BuildError::MissingPrompt => write!(f, "no user prompt is set"),
            BuildError::UnknownCostModel(err) => Display::fmt(err, f),
        }
    }
}

impl StdError for BuildError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BuildError::UnknownCostModel(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UnknownCostModel> for BuildError {
    #[inline]
    fn from(err: UnknownCostModel) -> Self {
        BuildError::UnknownCostModel(err)
    }
}

/// [`GenerationSession`] builder.
pub struct SessionBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) estimator: Option<Box<dyn TokenEstimator + Send + Sync>>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) user_prompt: Option<String>,
    pub(crate) continuation: String,
    pub(crate) target: usize,
    pub(crate) token_limit: usize,
    pub(crate) cost_model: String,
    pub(crate) options: GenerationOptions,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) on_artifact: Option<ArtifactFn>,
    pub(crate) on_delta: Option<DeltaFn>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            estimator: None,
            system_prompt: None,
            user_prompt: None,
            continuation: DEFAULT_CONTINUATION.to_owned(),
            target: 1,
            token_limit: DEFAULT_TOKEN_LIMIT,
            cost_model: DEFAULT_COST_MODEL.to_owned(),
            options: GenerationOptions::default(),
            cancellation: None,
            on_artifact: None,
            on_delta: None,
        }
    }

    /// Sets the system message of the anchor.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the user message of the anchor, i.e. the task prompt.
    #[inline]
    pub fn with_user_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    /// Sets the message sent after each sample while the transcript grows.
    #[inline]
    pub fn with_continuation<S: Into<String>>(mut self, message: S) -> Self {
        self.continuation = message.into();
        self
    }

    /// Sets how many samples to generate.
    #[inline]
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// Sets the transcript cost at which the conversation is reset.
    #[inline]
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    /// Sets the cost model passed to the estimator.
    #[inline]
    pub fn with_cost_model<S: Into<String>>(mut self, cost_model: S) -> Self {
        self.cost_model = cost_model.into();
        self
    }

    /// Replaces the default tiktoken estimator.
    #[inline]
    pub fn with_estimator<E>(mut self, estimator: E) -> Self
    where
        E: TokenEstimator + Send + Sync + 'static,
    {
        self.estimator = Some(Box::new(estimator));
        self
    }

    /// Sets the sampling parameters sent with every request.
    #[inline]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches a cancellation token, checked before every turn.
    #[inline]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attaches a callback invoked with the index and text of every
    /// sample, right after it's appended to the log.
    #[inline]
    pub fn on_artifact(
        mut self,
        on_artifact: impl Fn(usize, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_artifact = Some(Box::new(on_artifact));
        self
    }

    /// Attaches a callback invoked with the text as it streams in.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_delta = Some(Arc::new(on_delta));
        self
    }

    /// Builds the session.
    ///
    /// The anchor cost is estimated here, so an unknown cost model is
    /// reported before any request is sent.
    pub fn build(self) -> Result<GenerationSession, BuildError> {
        if self.target == 0 {
            return Err(BuildError::InvalidTarget);
        }
        if self.token_limit == 0 {
            return Err(BuildError::InvalidLimit);
        }
        if self.user_prompt.is_none() {
            return Err(BuildError::MissingPrompt);
        }
        GenerationSession::from_builder(self)
    }
}

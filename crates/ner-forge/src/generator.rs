use ner_forge_core::{
    BuildError, CancellationToken, GenerationSession, SessionBuilder,
};
use ner_forge_model::{GenerationOptions, ModelProvider};

use crate::scheme::LabelingScheme;

/// The system message used when none is given.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a dataset generator.";

/// A generator builder.
///
/// It fills in the prompts of a [`LabelingScheme`] and the sampling
/// parameters that tend to give varied samples, and builds a
/// [`GenerationSession`] ready to run.
pub struct GeneratorBuilder {
    session_builder: SessionBuilder,
    scheme: LabelingScheme,
    system_prompt: Option<String>,
    user_prompt: Option<String>,
}

impl GeneratorBuilder {
    /// Creates a generator builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let options = GenerationOptions::default()
            .with_temperature(0.4)
            .with_presence_penalty(-1.0);
        let session_builder =
            SessionBuilder::with_model_provider(provider).with_options(options);
        Self {
            session_builder,
            scheme: LabelingScheme::default(),
            system_prompt: None,
            user_prompt: None,
        }
    }

    /// Sets the labeling scheme, which selects the built-in task prompt.
    #[inline]
    pub fn with_scheme(mut self, scheme: LabelingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Overrides the system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Replaces the task prompt of the scheme.
    #[inline]
    pub fn with_user_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    /// Sets the message sent after each sample.
    #[inline]
    pub fn with_continuation<S: Into<String>>(mut self, message: S) -> Self {
        self.session_builder = self.session_builder.with_continuation(message);
        self
    }

    /// Sets how many samples to generate.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.session_builder = self.session_builder.with_target(count);
        self
    }

    /// Sets the transcript cost at which the conversation is reset.
    #[inline]
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.session_builder = self.session_builder.with_token_limit(limit);
        self
    }

    /// Sets the cost model used for estimating transcript sizes.
    #[inline]
    pub fn with_cost_model<S: Into<String>>(mut self, cost_model: S) -> Self {
        self.session_builder = self.session_builder.with_cost_model(cost_model);
        self
    }

    /// Replaces the sampling parameters.
    #[inline]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.session_builder = self.session_builder.with_options(options);
        self
    }

    /// Attaches a cancellation token.
    #[inline]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.session_builder = self.session_builder.with_cancellation(token);
        self
    }

    /// Attaches a callback to be invoked when a sample is generated.
    #[inline]
    pub fn on_sample(
        mut self,
        on_sample: impl Fn(usize, &str) + Send + Sync + 'static,
    ) -> Self {
        self.session_builder = self.session_builder.on_artifact(on_sample);
        self
    }

    /// Attaches a callback to be invoked as text streams in.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.session_builder = self.session_builder.on_delta(on_delta);
        self
    }

    /// Builds the session.
    pub fn build(self) -> Result<GenerationSession, BuildError> {
        let system_prompt = self
            .system_prompt
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned());
        let user_prompt = self
            .user_prompt
            .unwrap_or_else(|| self.scheme.prompt().to_owned());
        debug!("building a generator for the {} scheme", self.scheme);

        self.session_builder
            .with_system_prompt(system_prompt)
            .with_user_prompt(user_prompt)
            .build()
    }
}

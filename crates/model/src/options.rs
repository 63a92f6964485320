use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the model provider.
///
/// These are opaque tuning knobs: the generation loop passes them through
/// verbatim and never checks their ranges. Unset fields are left to the
/// provider's defaults.
///
/// `n` may ask the provider for several candidate completions, but only
/// the first one is ever consumed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,
    /// Penalty for tokens that already appeared in the text.
    pub presence_penalty: Option<f32>,
    /// Penalty proportional to how often a token already appeared.
    pub frequency_penalty: Option<f32>,
    /// Upper bound of generated tokens per completion.
    pub max_tokens: Option<u32>,
    /// Number of candidate completions to request.
    pub n: Option<u32>,
    /// Sequences where the model stops generating.
    pub stop: Option<Vec<String>>,
    /// Whether to return log probabilities.
    pub logprobs: Option<bool>,
    /// Number of most likely tokens to return at each position.
    pub top_logprobs: Option<u8>,
}

impl GenerationOptions {
    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the presence penalty.
    #[inline]
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    /// Sets the frequency penalty.
    #[inline]
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    /// Sets the maximum number of generated tokens.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

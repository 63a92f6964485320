//! Token cost estimation and the per-transcript budget.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};

use tiktoken_rs::CoreBPE;

/// The cost model identifier is not known to the estimator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnknownCostModel(pub String);

impl Display for UnknownCostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cost model `{}`", self.0)
    }
}

impl StdError for UnknownCostModel {}

/// Estimates how many tokens a text costs under a given cost model.
///
/// Implementations must be deterministic for a given `(text, cost_model)`
/// pair and free of observable side effects, since the session calls them
/// several times per turn.
pub trait TokenEstimator {
    /// Returns the estimated token count of `text`.
    fn estimate(
        &self,
        text: &str,
        cost_model: &str,
    ) -> Result<usize, UnknownCostModel>;
}

/// A [`TokenEstimator`] backed by the tiktoken BPE tables.
///
/// `cost_model` may be an OpenAI model name (`gpt-4`, `gpt-4o`, ...) or an
/// encoding name (`cl100k_base`, `p50k_base`, `r50k_base`). Loaded tables
/// are cached per identifier.
#[derive(Default)]
pub struct TiktokenEstimator {
    encoders: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl TiktokenEstimator {
    /// Creates an estimator with an empty table cache.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn encoder(
        &self,
        cost_model: &str,
    ) -> Result<Arc<CoreBPE>, UnknownCostModel> {
        let mut encoders =
            self.encoders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bpe) = encoders.get(cost_model) {
            return Ok(Arc::clone(bpe));
        }

        let bpe = match cost_model {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            model => tiktoken_rs::get_bpe_from_model(model),
        }
        .map_err(|err| {
            debug!("failed to load tokenizer for {cost_model}: {err}");
            UnknownCostModel(cost_model.to_owned())
        })?;
        let bpe = Arc::new(bpe);
        encoders.insert(cost_model.to_owned(), Arc::clone(&bpe));
        Ok(bpe)
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(
        &self,
        text: &str,
        cost_model: &str,
    ) -> Result<usize, UnknownCostModel> {
        // Special tokens are counted as plain text.
        Ok(self.encoder(cost_model)?.encode_ordinary(text).len())
    }
}

impl<T: TokenEstimator + ?Sized> TokenEstimator for Arc<T> {
    #[inline]
    fn estimate(
        &self,
        text: &str,
        cost_model: &str,
    ) -> Result<usize, UnknownCostModel> {
        (**self).estimate(text, cost_model)
    }
}

/// The running token cost of a transcript against its limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Budget {
    /// Estimated cost of the transcript that will be sent next.
    pub current_cost: usize,
    /// The transcript is reset once its cost reaches this value.
    pub limit: usize,
    /// Estimated cost of the anchor messages alone.
    pub anchor_cost: usize,
}

impl Budget {
    #[inline]
    pub(crate) fn new(limit: usize, anchor_cost: usize) -> Self {
        Self {
            current_cost: anchor_cost,
            limit,
            anchor_cost,
        }
    }

    /// Returns whether a transcript of `cost` may keep growing.
    #[inline]
    pub fn admits(&self, cost: usize) -> bool {
        cost < self.limit
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.current_cost = self.anchor_cost;
    }
}

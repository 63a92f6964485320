//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use ner_forge_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct TestModelResponse {
    deltas: VecDeque<String>,
    fail_at_end: bool,
    finished: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if this.finished {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(delta) = this.deltas.pop_front() {
                return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                    delta,
                ))));
            }

            this.finished = true;
            if this.fail_at_end {
                return Poll::Ready(Err(Error {
                    message: "truncated event stream",
                    kind: ErrorKind::MalformedResponse,
                }));
            }
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ))));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<PresetResponse>,
    fallback: Option<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to each request. Scripted responses are consumed in
/// order, one per request; once they run out, the repeating response (if
/// any) answers every further request. Without one, an error is returned.
///
/// Clones share the same script and request log, so a test can keep a
/// clone around to inspect what the model was asked.
///
/// # Note
///
/// This type is not optimized for production use, every request is copied
/// into the log. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().steps.push_back(preset);
    }

    /// Answers every request past the script with `preset`.
    #[inline]
    pub fn set_repeating_response(&mut self, preset: PresetResponse) {
        self.lock().fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread may poison the lock, the script itself is
        // still consistent.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("requests", &self.request_count())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let preset = {
            let mut script = self.lock();
            script.requests.push(req.clone());
            script.steps.pop_front().or_else(|| script.fallback.clone())
        };

        let result = match preset {
            None => Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Transport,
            }),
            Some(PresetResponse {
                failure: Some(PresetFailure::Transport),
                ..
            }) => Err(Error {
                message: "connection refused",
                kind: ErrorKind::Transport,
            }),
            Some(PresetResponse {
                failure: Some(PresetFailure::RateLimited),
                ..
            }) => Err(Error {
                message: "too many requests",
                kind: ErrorKind::RateLimited,
            }),
            Some(PresetResponse { deltas, failure }) => Ok(TestModelResponse {
                deltas: deltas.into(),
                fail_at_end: failure == Some(PresetFailure::MalformedResponse),
                finished: false,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
        };
        ready(result)
    }
}

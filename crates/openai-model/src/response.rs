use std::pin::Pin;
use std::task::{Context, Poll, ready};

use ner_forge_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{self, ChatCompletionChunk};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // Set once the first choice reports a finish reason. It's returned
    // right after the message delta of the same chunk (if any).
    pending_finish_reason: Option<ModelFinishReason>,
    finished: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streaming chat completion.
    ///
    /// Only the choice with index 0 is surfaced, the other candidates are
    /// dropped while parsing.
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_finish_reason: None,
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        partial_state.finished = true;
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    let sse = &mut partial_state.sse;
    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(err.0, ErrorKind::Transport));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "invalid event stream payload",
                    ErrorKind::MalformedResponse,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::MalformedResponse)
            })?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new(
                "chunk id mismatch",
                ErrorKind::MalformedResponse,
            ));
        };

        if let Some(usage) = chunk.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "reported usage"
            );
        }

        if partial_state.finished {
            // Drain trailing chunks of the other choices.
            continue;
        }
        let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0)
        else {
            continue;
        };

        let finish_reason =
            choice.finish_reason.as_deref().map(proto::parse_finish_reason);
        let message_delta = choice.delta.content.filter(|c| !c.is_empty());

        match (message_delta, finish_reason) {
            (Some(delta), reason) => {
                partial_state.pending_finish_reason = reason;
                return Ok((
                    Some(ModelResponseEvent::MessageDelta(delta)),
                    partial_state,
                ));
            }
            (None, Some(reason)) => {
                partial_state.finished = true;
                return Ok((
                    Some(ModelResponseEvent::Completed(reason)),
                    partial_state,
                ));
            }
            (None, None) => {}
        }
    }

    Ok((None, partial_state))
}

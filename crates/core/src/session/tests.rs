use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ner_forge_model::{ErrorKind, GenerationOptions, ModelMessage};
use ner_forge_test_model::{PresetFailure, PresetResponse, TestModelProvider};

use crate::budget::{TokenEstimator, UnknownCostModel};
use crate::{
    BuildError, CancellationToken, FailureReason, Outcome, SessionBuilder,
    SessionState, TurnStatus,
};

const SYSTEM_PROMPT: &str = "You are a dataset generator.";
const USER_PROMPT: &str = "Generate one sample.";
// "You are a dataset generator.. Generate one sample." is 8 words.
const ANCHOR_COST: usize = 8;

/// Counts whitespace separated words, which makes budgets easy to follow.
struct WordEstimator;

impl TokenEstimator for WordEstimator {
    fn estimate(
        &self,
        text: &str,
        cost_model: &str,
    ) -> Result<usize, UnknownCostModel> {
        if cost_model != "words" {
            return Err(UnknownCostModel(cost_model.to_owned()));
        }
        Ok(text.split_whitespace().count())
    }
}

/// A [`WordEstimator`] that stops recognizing its cost model from the
/// `fail_from`-th call on (counting from 1).
struct FailingEstimator {
    calls: AtomicUsize,
    fail_from: usize,
}

impl TokenEstimator for FailingEstimator {
    fn estimate(
        &self,
        text: &str,
        cost_model: &str,
    ) -> Result<usize, UnknownCostModel> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return Err(UnknownCostModel(cost_model.to_owned()));
        }
        WordEstimator.estimate(text, cost_model)
    }
}

fn builder(provider: &TestModelProvider) -> SessionBuilder {
    SessionBuilder::with_model_provider(provider.clone())
        .with_system_prompt(SYSTEM_PROMPT)
        .with_user_prompt(USER_PROMPT)
        .with_estimator(WordEstimator)
        .with_cost_model("words")
        .with_token_limit(10_000)
}

fn anchor() -> Vec<ModelMessage> {
    vec![
        ModelMessage::System(SYSTEM_PROMPT.to_owned()),
        ModelMessage::User(USER_PROMPT.to_owned()),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_completes_target_in_order() {
    let mut provider = TestModelProvider::default();
    for i in 0..5 {
        provider.add_response(PresetResponse::with_text(format!("sample {i}")));
    }

    let outcome = builder(&provider).with_target(5).build().unwrap().run().await;

    let expected: Vec<_> = (0..5).map(|i| format!("sample {i}")).collect();
    assert_eq!(outcome, Outcome::Completed(expected));
    assert_eq!(provider.request_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_collected_artifacts() {
    for (k, failure, kind) in [
        (1, PresetFailure::Transport, ErrorKind::Transport),
        (3, PresetFailure::RateLimited, ErrorKind::RateLimited),
        (5, PresetFailure::MalformedResponse, ErrorKind::MalformedResponse),
    ] {
        let mut provider = TestModelProvider::default();
        for i in 1..k {
            provider.add_response(PresetResponse::with_text(format!("s{i}")));
        }
        provider.add_response(PresetResponse::with_failure(failure));
        provider.set_repeating_response(PresetResponse::with_text("unused"));

        let outcome =
            builder(&provider).with_target(5).build().unwrap().run().await;

        assert_eq!(outcome.len(), k - 1);
        let Some(FailureReason::ModelClient { kind: actual, .. }) =
            outcome.failure()
        else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(*actual, kind);
        // No retry, and no further turn after the failure.
        assert_eq!(provider.request_count(), k);
    }
}

#[tokio::test(start_paused = true)]
async fn test_extends_transcript_under_limit() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("oil B-MEDIUM"));

    let mut session = builder(&provider).with_target(3).build().unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.budget().current_cost, ANCHOR_COST);

    assert_eq!(session.turn().await, TurnStatus::Extended);
    assert_eq!(session.state(), SessionState::Extended);
    let mut expected = anchor();
    expected.push(ModelMessage::Assistant("oil B-MEDIUM".to_owned()));
    expected.push(ModelMessage::User("Do it again.".to_owned()));
    assert_eq!(session.transcript(), expected);
    // Anchor, the sample and the continuation: 8 + 2 + 3 words.
    assert_eq!(session.budget().current_cost, 13);

    assert_eq!(session.turn().await, TurnStatus::Extended);
    let requests = provider.requests();
    assert_eq!(requests[0].messages, anchor());
    assert_eq!(requests[1].messages, expected);
}

#[tokio::test(start_paused = true)]
async fn test_reset_restores_anchor() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("a b"));

    // Turn 1 projects 8 + 2 = 10 and grows to 13 with the continuation,
    // turn 2 projects 13 + 2 = 15 which trips the limit.
    let mut session = builder(&provider)
        .with_target(6)
        .with_token_limit(15)
        .build()
        .unwrap();

    let mut statuses = vec![];
    while !session.is_terminated() {
        let status = session.turn().await;
        if status == TurnStatus::Reset {
            assert_eq!(session.transcript(), anchor());
            assert_eq!(session.budget().current_cost, ANCHOR_COST);
            assert_eq!(
                session.budget().current_cost,
                session.budget().anchor_cost
            );
        }
        statuses.push(status);
    }
    assert_eq!(
        statuses,
        [
            TurnStatus::Extended,
            TurnStatus::Reset,
            TurnStatus::Extended,
            TurnStatus::Reset,
            TurnStatus::Extended,
            TurnStatus::Reset,
        ]
    );

    let lengths: Vec<_> =
        provider.requests().iter().map(|r| r.messages.len()).collect();
    assert_eq!(lengths, [2, 4, 2, 4, 2, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_cost_is_monotonic_between_resets() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text(
        "Johannes B-ARTIST Vermeer, I-ARTIST",
    ));

    let mut session = builder(&provider)
        .with_target(20)
        .with_token_limit(60)
        .build()
        .unwrap();

    let mut last_cost = session.budget().current_cost;
    let mut resets = 0;
    while !session.is_terminated() {
        match session.turn().await {
            TurnStatus::Extended => {
                assert!(session.budget().current_cost >= last_cost);
            }
            TurnStatus::Reset => resets += 1,
            TurnStatus::Terminated => unreachable!(),
        }
        last_cost = session.budget().current_cost;
    }
    assert!(resets > 0);
}

#[tokio::test(start_paused = true)]
async fn test_decisions_are_deterministic() {
    async fn decisions() -> Vec<TurnStatus> {
        let mut provider = TestModelProvider::default();
        for i in 0..12 {
            let text = "word ".repeat(i % 4 + 1);
            provider.add_response(PresetResponse::with_text(text));
        }
        let mut session = builder(&provider)
            .with_target(12)
            .with_token_limit(30)
            .build()
            .unwrap();
        let mut statuses = vec![];
        while !session.is_terminated() {
            statuses.push(session.turn().await);
        }
        statuses
    }

    let first = decisions().await;
    assert_eq!(first.len(), 12);
    assert!(first.contains(&TurnStatus::Reset));
    assert_eq!(first, decisions().await);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_after_third_turn() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("sample"));

    let token = CancellationToken::new();
    let outcome = builder(&provider)
        .with_target(1000)
        .with_cancellation(token.clone())
        .on_artifact(move |index, _| {
            if index == 2 {
                token.cancel();
            }
        })
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome, Outcome::Cancelled(vec!["sample".to_owned(); 3]));
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_turn() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("sample"));

    let token = CancellationToken::new();
    token.cancel();
    let mut session = builder(&provider)
        .with_target(3)
        .with_cancellation(token)
        .build()
        .unwrap();

    assert_eq!(session.turn().await, TurnStatus::Terminated);
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.finish(), Outcome::Cancelled(vec![]));
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_limit_below_anchor_cost() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("sample"));

    let mut session = builder(&provider)
        .with_target(4)
        .with_token_limit(ANCHOR_COST - 1)
        .build()
        .unwrap();
    while !session.is_terminated() {
        assert_eq!(session.transcript(), anchor());
        assert_eq!(session.turn().await, TurnStatus::Reset);
    }

    assert_eq!(session.finish().len(), 4);
    assert!(provider.requests().iter().all(|r| r.messages == anchor()));
}

#[tokio::test(start_paused = true)]
async fn test_build_errors() {
    let provider = TestModelProvider::default();

    let err = builder(&provider).with_target(0).build().err();
    assert_eq!(err, Some(BuildError::InvalidTarget));

    let err = builder(&provider).with_token_limit(0).build().err();
    assert_eq!(err, Some(BuildError::InvalidLimit));

    let err = builder(&provider).with_cost_model("gpt-2000").build().err();
    assert_eq!(
        err,
        Some(BuildError::UnknownCostModel(UnknownCostModel(
            "gpt-2000".to_owned()
        )))
    );

    let err = SessionBuilder::with_model_provider(provider.clone())
        .with_system_prompt(SYSTEM_PROMPT)
        .build()
        .err();
    assert_eq!(err, Some(BuildError::MissingPrompt));

    assert_eq!(provider.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_options_and_deltas_pass_through() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_deltas(["oil ", "B-MEDIUM"]));

    let options = GenerationOptions {
        n: Some(3),
        ..GenerationOptions::default()
            .with_temperature(0.4)
            .with_presence_penalty(-1.0)
    };
    let deltas = Arc::new(Mutex::new(String::new()));
    let outcome = builder(&provider)
        .with_options(options.clone())
        .on_delta({
            let deltas = Arc::clone(&deltas);
            move |delta| deltas.lock().unwrap().push_str(delta)
        })
        .build()
        .unwrap()
        .run()
        .await;

    assert_eq!(outcome, Outcome::Completed(vec!["oil B-MEDIUM".to_owned()]));
    assert_eq!(*deltas.lock().unwrap(), "oil B-MEDIUM");
    assert_eq!(provider.requests()[0].options, options);
}

#[tokio::test(start_paused = true)]
async fn test_default_estimator() {
    let provider = TestModelProvider::default();
    let session = SessionBuilder::with_model_provider(provider)
        .with_system_prompt(SYSTEM_PROMPT)
        .with_user_prompt(USER_PROMPT)
        .build()
        .unwrap();
    assert!(session.budget().anchor_cost > 0);
    assert_eq!(session.budget().limit, crate::DEFAULT_TOKEN_LIMIT);
    assert_eq!(session.anchor(), anchor());
}

#[tokio::test(start_paused = true)]
async fn test_finish_before_termination() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("sample"));

    let mut session = builder(&provider).with_target(10).build().unwrap();
    session.turn().await;
    session.turn().await;
    assert!(!session.is_terminated());
    assert_eq!(session.artifacts().len(), 2);
    assert_eq!(session.finish(), Outcome::Cancelled(vec!["sample".into(); 2]));
}

#[tokio::test(start_paused = true)]
async fn test_estimation_failure_after_answer_keeps_sample() {
    // Calls: anchor at build, transcript, projected cost, extended cost.
    for fail_from in [3, 4] {
        let mut provider = TestModelProvider::default();
        provider.set_repeating_response(PresetResponse::with_text("a b"));

        let mut session = builder(&provider)
            .with_estimator(FailingEstimator {
                calls: AtomicUsize::new(0),
                fail_from,
            })
            .with_target(5)
            .build()
            .unwrap();

        assert_eq!(session.turn().await, TurnStatus::Terminated);
        assert!(session.is_terminated());
        assert_eq!(session.artifacts(), ["a b"]);
        assert_eq!(session.turn().await, TurnStatus::Terminated);
        assert_eq!(provider.request_count(), 1);
        assert_eq!(
            session.finish(),
            Outcome::PartialSuccess(
                vec!["a b".to_owned()],
                FailureReason::CostEstimation(UnknownCostModel(
                    "words".to_owned()
                )),
            )
        );
    }
}

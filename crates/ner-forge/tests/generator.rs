use ner_forge::core::Outcome;
use ner_forge::{DEFAULT_SYSTEM_PROMPT, GeneratorBuilder, LabelingScheme};
use ner_forge_model::ModelMessage;
use ner_forge_test_model::{PresetResponse, TestModelProvider};

#[tokio::test(start_paused = true)]
async fn test_scheme_prompts() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text(
        "{\"sentence\": \"x\", \"entities\": []}",
    ));

    let outcome = GeneratorBuilder::with_model_provider(provider.clone())
        .with_scheme(LabelingScheme::Spans)
        .with_count(2)
        .build()
        .unwrap()
        .run()
        .await;
    assert_eq!(outcome.len(), 2);
    assert!(matches!(outcome, Outcome::Completed(_)));

    let requests = provider.requests();
    let request = &requests[0];
    assert_eq!(
        request.messages,
        vec![
            ModelMessage::System(DEFAULT_SYSTEM_PROMPT.to_owned()),
            ModelMessage::User(LabelingScheme::Spans.prompt().to_owned()),
        ]
    );
    assert_eq!(request.options.temperature, Some(0.4));
    assert_eq!(request.options.presence_penalty, Some(-1.0));
}

#[tokio::test(start_paused = true)]
async fn test_prompt_overrides() {
    let mut provider = TestModelProvider::default();
    provider.set_repeating_response(PresetResponse::with_text("a O"));

    let outcome = GeneratorBuilder::with_model_provider(provider.clone())
        .with_system_prompt("Be brief.")
        .with_user_prompt("Label one word.")
        .with_continuation("Another.")
        .with_count(2)
        .build()
        .unwrap()
        .run()
        .await;
    assert_eq!(outcome, Outcome::Completed(vec!["a O".into(); 2]));

    let requests = provider.requests();
    assert_eq!(
        requests[1].messages,
        vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("Label one word.".to_owned()),
            ModelMessage::Assistant("a O".to_owned()),
            ModelMessage::User("Another.".to_owned()),
        ]
    );
}

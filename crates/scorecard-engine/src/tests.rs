//! Integration tests for element and decision tree evaluation

#[cfg(test)]
mod tests {
    use crate::{
        CostLedger, DecisionTreeEvaluator, EngineConfig, EngineError, EvaluationContext,
        RetryConfig, CONTENT_FILTERED_EXPLANATION,
    };
    use scorecard_domain::{
        Answer, CallKind, ChunkingPolicy, DecisionNode, Element, FixedOutcome, InputFilter,
        Metadata, ScoreDefinition, Terminal,
    };
    use scorecard_llm::{LlmError, MockProvider};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const YES: &str = r#"{"answer": "yes", "explanation": "It happened.", "quote": "Hello"}"#;
    const NO: &str = r#"{"answer": "no", "explanation": "It did not happen.", "quote": ""}"#;

    fn definition(tree: DecisionNode, elements: Vec<Element>) -> ScoreDefinition {
        ScoreDefinition {
            id: "1".to_string(),
            name: "Test Score".to_string(),
            key: None,
            external_id: None,
            depends_on: Vec::new(),
            condition: None,
            decision_tree: Arc::new(tree),
            elements,
            terminals: BTreeMap::new(),
            chunking: ChunkingPolicy::default(),
            filters: Vec::new(),
        }
    }

    fn yes_no(element: &str) -> DecisionNode {
        DecisionNode::branch(element, DecisionNode::terminal("yes"), DecisionNode::terminal("no"))
    }

    fn greeting_tree() -> DecisionNode {
        yes_no("Greeting")
    }

    fn greeting() -> Element {
        Element::new("Greeting", "Did the agent greet the caller?")
    }

    fn evaluator(
        provider: &MockProvider,
        config: EngineConfig,
    ) -> DecisionTreeEvaluator<MockProvider> {
        DecisionTreeEvaluator::new(Arc::new(provider.clone()), Arc::new(config))
    }

    fn context(definition: &ScoreDefinition, text: &str) -> EvaluationContext {
        EvaluationContext::for_score(definition, text, Arc::new(Metadata::new()), CostLedger::new())
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: true,
        }
    }

    #[tokio::test]
    async fn test_single_element_yes() {
        let provider = MockProvider::new(YES);
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello, thanks for calling.");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.name, "Test Score");
        assert_eq!(result.value, "Yes");
        assert_eq!(result.explanation, "It happened.");
        assert_eq!(result.quote, "Hello");
        assert_eq!(result.decision_path(), vec![("greeting", Answer::Yes)]);
        assert_eq!(result.cost, ctx.ledger.snapshot());
        assert_eq!(result.cost.request_count, 1);
        assert!(result.decision_tree.is_some());
    }

    #[tokio::test]
    async fn test_nested_branches_record_path() {
        let provider = MockProvider::new(NO);
        provider.add_response("hung up", YES);

        let tree = DecisionNode::branch(
            "Greeting",
            DecisionNode::terminal("yes"),
            DecisionNode::branch(
                "Caller Hung Up",
                DecisionNode::terminal("na"),
                DecisionNode::terminal("no"),
            ),
        );
        let hung_up =
            Element::new("Caller Hung Up", "Was the call cut short because the caller hung up?");
        let elements = vec![greeting(), hung_up];
        let definition = definition(tree, elements);
        let ctx = context(&definition, "Customer: <disconnected>");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "NA");
        assert_eq!(
            results[0].decision_path(),
            vec![("greeting", Answer::No), ("caller_hung_up", Answer::Yes)]
        );
        assert_eq!(ctx.ledger.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_short_circuit_does_not_wait_for_slow_chunks() {
        let provider = MockProvider::new(NO);
        provider.add_response("alpha", YES);
        provider.add_delayed_response("slow", NO, Duration::from_millis(1_500));

        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "alpha yes marker\nbeta slow one\ngamma slow two");

        let started = Instant::now();
        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
        assert_eq!(results[0].value, "Yes");
        assert_eq!(results[0].element_results[0].chunk_index, Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_discarded_chunks_still_reach_the_ledger() {
        let provider = MockProvider::new(NO);
        provider.add_response("alpha", YES);
        provider.add_delayed_response("slow", NO, Duration::from_millis(200));

        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "alpha yes marker\nbeta slow one\ngamma slow two");

        evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ctx.ledger.len() < 3 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(ctx.ledger.len(), 3);
        assert_eq!(ctx.ledger.snapshot().prompt_tokens, 300);
    }

    #[tokio::test]
    async fn test_queued_chunks_skip_after_decision() {
        let provider = MockProvider::new(NO);
        provider.add_response("alpha", YES);

        let mut config = EngineConfig::default();
        config.chunk_concurrency = 1;
        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "alpha yes marker\nbeta one\ngamma two\ndelta three");

        let results = evaluator(&provider, config).compute_result(&definition, &ctx).await.unwrap();
        assert_eq!(results[0].value, "Yes");

        // Let the remaining tasks drain; the last chunk was still queued at decision time
        tokio::time::sleep(Duration::from_millis(100)).await;
        let asked_last_chunk = provider
            .conversations()
            .iter()
            .any(|conversation| {
                conversation.iter().any(|message| message.content.contains("delta three"))
            });
        assert!(!asked_last_chunk);
        assert!(provider.call_count() <= 2);
    }

    #[tokio::test]
    async fn test_clarification_overrides_affirmative() {
        let provider = MockProvider::new(YES);
        provider.add_response(
            "sincere",
            r#"{"answer": "no", "explanation": "The apology was sarcastic."}"#,
        );

        let element = Element::new("Apology", "Did the agent apologize?")
            .with_clarification("Was the apology sincere?");
        let tree = yes_no("apology");
        let definition = definition(tree, vec![element]);
        let ctx = context(&definition, "Agent: Oh, I'm SO sorry.");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        let result = &results[0];
        assert_eq!(result.value, "No");
        assert_eq!(result.explanation, "The apology was sarcastic.");

        let outcome = &result.element_results[0];
        assert!(outcome.clarified);
        assert_eq!(outcome.value, Answer::No);
        assert_eq!(outcome.original_explanation.as_deref(), Some("It happened."));
        assert_eq!(outcome.quote, "Hello");
        assert_eq!(outcome.chat_history_excerpt.len(), 5);

        // The clarification extends the primary conversation
        let conversations = provider.conversations();
        assert_eq!(conversations.len(), 2);
        assert_eq!(&conversations[1][..2], &conversations[0][..]);

        let kinds: Vec<CallKind> =
            ctx.ledger.history().iter().map(|entry| entry.call_kind).collect();
        assert_eq!(kinds, vec![CallKind::Primary, CallKind::Clarification]);
    }

    #[tokio::test]
    async fn test_clarified_chunk_is_representative_when_none_affirmative() {
        let provider = MockProvider::new(NO);
        provider.add_response("sincere", r#"{"answer": "no", "explanation": "Not sincere."}"#);
        provider.add_response("second", YES);

        let element = Element::new("Apology", "Did the agent apologize?")
            .with_clarification("Was it sincere?");
        let tree = yes_no("apology");
        let mut definition = definition(tree, vec![element]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "first chunk here\nsecond chunk here");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        let outcome = &results[0].element_results[0];
        assert_eq!(results[0].value, "No");
        assert_eq!(outcome.chunk_index, Some(1));
        assert!(outcome.clarified);
        assert_eq!(outcome.explanation, "Not sincere.");
        assert_eq!(ctx.ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_first_chunk_is_representative_by_default() {
        let provider = MockProvider::new(NO);
        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "first chunk here\nsecond chunk here\nthird chunk here");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "No");
        assert_eq!(results[0].element_results[0].chunk_index, Some(0));
        assert_eq!(ctx.ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_repaired_once() {
        let provider = MockProvider::new(
            "```json\n{\"answer\": \"yes\", \"explanation\": \"Greeted warmly.\",}\n```",
        );
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "Yes");
        assert_eq!(results[0].explanation, "Greeted warmly.");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unrepairable_reply_fails_the_score() {
        let provider = MockProvider::new("I'd rather not say.");
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let err = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::MalformedResponse(_)));
        // The call was still paid for
        assert_eq!(ctx.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = MockProvider::new(NO);
        provider.add_transient_failures("greet", 2, YES);

        let mut config = EngineConfig::default();
        config.retry = fast_retry();
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let results = evaluator(&provider, config).compute_result(&definition, &ctx).await.unwrap();
        assert_eq!(results[0].value, "Yes");
        assert_eq!(provider.call_count(), 3);
        assert_eq!(ctx.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_score() {
        let provider = MockProvider::new(NO);
        provider.add_transient_failures("greet", 100, YES);

        let mut config = EngineConfig::default();
        config.retry = fast_retry();
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let err = evaluator(&provider, config).compute_result(&definition, &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::TransientProvider { attempts: 4, .. }));
        assert!(ctx.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_mask_affirmative_chunk() {
        let provider = MockProvider::new(NO);
        provider.add_error("broken", LlmError::ModelNotAvailable("mock".to_string()));
        provider.add_delayed_response("fine", YES, Duration::from_millis(50));

        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "broken chunk\nfine chunk");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();
        assert_eq!(results[0].value, "Yes");
    }

    #[tokio::test]
    async fn test_failed_chunk_without_affirmative_fails_the_element() {
        let provider = MockProvider::new(NO);
        provider.add_error("broken", LlmError::ModelNotAvailable("mock".to_string()));

        let mut definition = definition(greeting_tree(), vec![greeting()]);
        definition.chunking.max_chunk_size = Some(20);
        let ctx = context(&definition, "broken chunk\nfine chunk");

        let err = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));
    }

    #[tokio::test]
    async fn test_content_filter_is_negative() {
        let provider = MockProvider::new(YES);
        provider.add_content_filter("greet");
        let definition = definition(greeting_tree(), vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "No");
        assert_eq!(results[0].explanation, CONTENT_FILTERED_EXPLANATION);
        assert_eq!(ctx.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_element_is_configuration_error() {
        let provider = MockProvider::new(YES);
        let tree = yes_no("Not Declared");
        let definition = definition(tree, vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let err = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Configuration(ref message)
                if message.contains("not_declared") || message.contains("Not Declared")
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_element_keeps_partial_path() {
        let provider = MockProvider::new(YES);
        provider.add_error(
            "resolve the issue",
            LlmError::Http {
                status: 400,
                message: "bad request".to_string(),
            },
        );
        let tree = DecisionNode::branch(
            "Greeting",
            yes_no("Resolved"),
            DecisionNode::terminal("no"),
        );
        let definition = definition(
            tree,
            vec![greeting(), Element::new("Resolved", "Did the agent resolve the issue?")],
        );
        let ctx = context(&definition, "Agent: Hello!");
        let evaluator = evaluator(&provider, EngineConfig::default());

        let results = evaluator.score(&definition, &ctx).await;
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap_or_default().contains("bad request"));
        assert_eq!(result.decision_path(), vec![("greeting", Answer::Yes)]);
        assert!(result.decision_tree.is_some());
        assert_eq!(result.cost.request_count, 1);

        let err = evaluator.compute_result(&definition, &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));
    }

    #[tokio::test]
    async fn test_unknown_terminal_is_configuration_error() {
        let provider = MockProvider::new(YES);
        let tree = DecisionNode::branch(
            "Greeting",
            DecisionNode::terminal("escalate"),
            DecisionNode::terminal("no"),
        );
        let definition = definition(tree, vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let err = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_custom_terminal_value_and_explanation() {
        let provider = MockProvider::new(YES);
        let tree = DecisionNode::branch(
            "Greeting",
            DecisionNode::terminal("Escalate"),
            DecisionNode::terminal("no"),
        );
        let mut definition = definition(tree, vec![greeting()]);
        definition.terminals.insert(
            "escalate".to_string(),
            Terminal {
                value: "Escalated".to_string(),
                explanation: Some("Routed to a supervisor.".to_string()),
            },
        );
        let ctx = context(&definition, "Agent: Hello!");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "Escalated");
        assert_eq!(results[0].explanation, "Routed to a supervisor.");
        assert_eq!(results[0].quote, "Hello");
    }

    #[tokio::test]
    async fn test_fixed_leaf_yields_one_result_per_entry() {
        let provider = MockProvider::new(YES);
        let fixed = DecisionNode::Fixed(vec![
            FixedOutcome {
                sub_score_name: "Empathy".to_string(),
                value: "5".to_string(),
            },
            FixedOutcome {
                sub_score_name: "Accuracy".to_string(),
                value: "3".to_string(),
            },
        ]);
        let tree = DecisionNode::branch("Greeting", fixed, DecisionNode::terminal("no"));
        let definition = definition(tree, vec![greeting()]);
        let ctx = context(&definition, "Agent: Hello!");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        let summary: Vec<(&str, &str)> =
            results.iter().map(|r| (r.name.as_str(), r.value.as_str())).collect();
        assert_eq!(summary, vec![("Empathy", "5"), ("Accuracy", "3")]);
        assert!(results.iter().all(|r| r.element_results.len() == 1));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fixed_root_makes_no_calls() {
        let provider = MockProvider::new(YES);
        let fixed = DecisionNode::Fixed(vec![FixedOutcome {
            sub_score_name: "Baseline".to_string(),
            value: "0".to_string(),
        }]);
        let definition = definition(fixed, Vec::new());
        let ctx = context(&definition, "anything");

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].element_results.is_empty());
        assert!(results[0].cost.is_zero());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_builtin_predicate_after_filtering() {
        let provider = MockProvider::new(YES);
        let tree = DecisionNode::branch(
            "Input Is Empty",
            DecisionNode::terminal("na"),
            yes_no("Greeting"),
        );
        let mut definition = definition(tree, vec![greeting()]);
        definition.filters = vec![InputFilter::KeepSpeakers {
            speakers: vec!["Agent".to_string()],
        }];

        let ctx = context(&definition, "Customer: Hello?\nCustomer: Anyone there?");
        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();

        assert_eq!(results[0].value, "NA");
        assert_eq!(results[0].decision_path(), vec![("input_is_empty", Answer::Yes)]);
        assert_eq!(provider.call_count(), 0);
        assert!(results[0].cost.is_zero());
    }

    #[tokio::test]
    async fn test_metadata_reaches_prompt() {
        let provider = MockProvider::new(NO);
        provider.add_response("Acme Corp", YES);

        let element = Element::new("Brand Mention", "Did the agent mention {{company}}?");
        let tree = yes_no("Brand Mention");
        let definition = definition(tree, vec![element]);

        let mut metadata = Metadata::new();
        metadata.insert("company".to_string(), "Acme Corp".to_string());
        let ctx = EvaluationContext::for_score(
            &definition,
            "Agent: Welcome!",
            Arc::new(metadata),
            CostLedger::new(),
        );

        let results = evaluator(&provider, EngineConfig::default())
            .compute_result(&definition, &ctx)
            .await
            .unwrap();
        assert_eq!(results[0].value, "Yes");
    }
}

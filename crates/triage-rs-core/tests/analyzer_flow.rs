use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use triage_rs_config::{
    DecisionConfig, GenerationConfig, GenerationProviderKind, LedgerConfig, TriageConfig,
};
use triage_rs_core::{Analyzer, GenerationError, GenerativeModel, NewTicket, TriageError};
use triage_rs_protocol::{
    AnalysisSource, EventPayload, EventSink, FallbackReason, ResolutionEstimate,
};
use triage_rs_test_utils::{
    FailingModel, FixedModel, RecordingModel, RecordingSink, SlowModel, TableEmbedding,
    WORKED_EXAMPLE_QUERY, ticket_rows, worked_example_corpus, worked_example_embedding,
};

fn offline_config() -> TriageConfig {
    TriageConfig::builder()
        .generation(GenerationConfig {
            provider: GenerationProviderKind::None,
            ..GenerationConfig::default()
        })
        .build()
}

async fn worked_example_analyzer(
    config: TriageConfig,
    embedding: TableEmbedding,
    model: Arc<dyn GenerativeModel>,
    sink: Option<RecordingSink>,
) -> Analyzer {
    let sink = sink.map(|sink| Arc::new(sink) as Arc<dyn EventSink>);
    let analyzer = Analyzer::new(config, Some(Arc::new(embedding)), Some(model), sink)
        .expect("analyzer");
    for ticket in worked_example_corpus() {
        analyzer.add_ticket(ticket).await.expect("add ticket");
    }
    analyzer
}

#[tokio::test]
async fn worked_example_assigns_network_from_history() {
    let analyzer = worked_example_analyzer(
        offline_config(),
        worked_example_embedding(),
        Arc::new(FailingModel::transport("must not be called")),
        None,
    )
    .await;

    let result = analyzer
        .analyze(WORKED_EXAMPLE_QUERY, Some(3))
        .await
        .expect("analyze");
    assert_eq!(result.assigned_team, "Network");
    assert_eq!(result.source, AnalysisSource::Historical);
    assert!((result.confidence - 0.668).abs() < 1e-3);
    let (w_a, w_b) = (1.0 / 1.1, 1.0 / 1.3);
    let expected = (w_a * 2.0 + w_b * 6.0) / (w_a + w_b);
    let hours = result.estimated_resolution_hours().expect("hours");
    assert!((hours - expected).abs() < 1e-3);
    let ids: Vec<&str> = result
        .supporting_matches
        .iter()
        .map(|m| m.ticket.id.as_str())
        .collect();
    assert_eq!(ids, vec!["A", "C", "B"]);
    assert!(result.fallback_reasons.is_empty());
}

#[tokio::test]
async fn low_confidence_defers_to_model_with_weak_matches() {
    let config = TriageConfig::builder()
        .decision(DecisionConfig {
            confidence_threshold: 0.9,
            ..DecisionConfig::default()
        })
        .build();
    let model = RecordingModel::new(
        r#"{"assigned_team": "Network", "reason": "router firmware", "estimated_resolution_hours": 5}"#,
    );
    let sink = RecordingSink::new();
    let analyzer = worked_example_analyzer(
        config,
        worked_example_embedding(),
        Arc::new(model.clone()),
        Some(sink.clone()),
    )
    .await;

    let result = analyzer
        .analyze(WORKED_EXAMPLE_QUERY, None)
        .await
        .expect("analyze");
    assert_eq!(result.source, AnalysisSource::Generative);
    assert_eq!(result.assigned_team, "Network");
    assert_eq!(result.estimate, ResolutionEstimate::Hours(5.0));
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.supporting_matches.len(), 3);
    assert_eq!(result.rationale.as_deref(), Some("router firmware"));
    assert!(matches!(
        result.fallback_reasons.as_slice(),
        [FallbackReason::LowConfidence { threshold, .. }] if *threshold == 0.9
    ));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("loosely related past tickets"));
    assert!(prompts[0].user.contains("[A] wifi router drops connection"));

    let kinds: Vec<&'static str> = sink
        .payloads()
        .iter()
        .map(|payload| match payload {
            EventPayload::AnalysisStarted { .. } => "started",
            EventPayload::MatchesRetrieved { .. } => "retrieved",
            EventPayload::FallbackTriggered { .. } => "fallback",
            EventPayload::AnalysisCompleted { .. } => "completed",
            EventPayload::CorpusReloaded { .. } => "reloaded",
        })
        .collect();
    assert_eq!(kinds, vec!["started", "retrieved", "fallback", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn fallback_timeout_degrades_to_unassigned() {
    let analyzer = Analyzer::new(
        TriageConfig::default(),
        None,
        Some(Arc::new(SlowModel::new(
            Duration::from_secs(600),
            r#"{"assigned_team": "Software", "estimated_resolution_hours": 1}"#,
        ))),
        None,
    )
    .expect("analyzer");

    let result = analyzer
        .analyze("smart lights ignore schedule", None)
        .await
        .expect("analyze");
    assert_eq!(result.assigned_team, "Unassigned");
    assert_eq!(result.source, AnalysisSource::Generative);
    assert_eq!(result.estimate, ResolutionEstimate::Unavailable);
    assert_eq!(
        result.fallback_reasons,
        vec![FallbackReason::NoMatches, FallbackReason::NoResolutionData]
    );
    assert!(
        result
            .rationale
            .as_deref()
            .is_some_and(|text| text.contains("timed out"))
    );
}

#[tokio::test]
async fn model_failures_never_surface_as_errors() {
    let failures = [
        FailingModel::transport("connection refused"),
        FailingModel::new(GenerationError::Status {
            status: 503,
            body: "overloaded".to_string(),
        }),
        FailingModel::new(GenerationError::Parse("no JSON object".to_string())),
    ];
    for model in failures {
        let analyzer = Analyzer::new(TriageConfig::default(), None, Some(Arc::new(model)), None)
            .expect("analyzer");
        let result = analyzer
            .analyze("smart lights ignore schedule", None)
            .await
            .expect("degraded result");
        assert_eq!(result.assigned_team, "Unassigned");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.estimate, ResolutionEstimate::Unavailable);
    }
}

#[tokio::test]
async fn one_bad_row_does_not_abort_ingestion() {
    let analyzer = Analyzer::new(offline_config(), None, None, None).expect("analyzer");
    let mut rows = ticket_rows(6);
    rows[2].ticket_open_date = Some("31st of Smarch".to_string());

    let report = analyzer.load_corpus(&rows).await;
    assert_eq!(report.accepted, 5);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].row, 3);
    assert_eq!(report.rejected[0].ticket_id.as_deref(), Some("T3"));
    assert!(report.skipped.is_empty());
    assert_eq!(analyzer.index().len(), 5);
    assert!(!analyzer.index().contains("T3"));
}

#[tokio::test]
async fn embedding_failures_during_ingestion_are_skipped() {
    let embedding = TableEmbedding::new(2).with("Software issue number 1", vec![1.0, 0.0]);
    let sink = RecordingSink::new();
    let analyzer = Analyzer::new(
        offline_config(),
        Some(Arc::new(embedding)),
        None,
        Some(Arc::new(sink.clone())),
    )
    .expect("analyzer");

    let report = analyzer.load_corpus(&ticket_rows(2)).await;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].row, 2);
    assert!(matches!(
        sink.payloads().as_slice(),
        [EventPayload::CorpusReloaded { indexed: 1, rejected: 0, skipped: 1 }]
    ));
}

#[tokio::test]
async fn query_embedding_failure_is_fatal_to_the_query() {
    let analyzer = worked_example_analyzer(
        offline_config(),
        worked_example_embedding(),
        Arc::new(FixedModel::recommending("Software", 1.0)),
        None,
    )
    .await;
    assert!(matches!(
        analyzer.analyze("text without a vector", None).await,
        Err(TriageError::Embedding(_))
    ));
}

#[tokio::test]
async fn follow_ups_inherit_the_open_issue() {
    let embedding = worked_example_embedding()
        .with(format!("{WORKED_EXAMPLE_QUERY} only at night"), vec![1.0, 0.0]);
    let analyzer = worked_example_analyzer(
        offline_config(),
        embedding,
        Arc::new(FailingModel::transport("unused")),
        None,
    )
    .await;

    let session = analyzer.create_session();
    let first = analyzer
        .analyze_in_session(session, WORKED_EXAMPLE_QUERY, None)
        .await
        .expect("first turn");
    assert_eq!(first.assigned_team, "Network");
    let follow_up = analyzer
        .analyze_in_session(session, "only at night", None)
        .await
        .expect("follow-up");
    assert_eq!(follow_up.assigned_team, "Network");
    assert_eq!(analyzer.sessions().history(session).expect("history").len(), 2);

    let other = analyzer.create_session();
    assert!(matches!(
        analyzer.analyze_in_session(other, "only at night", None).await,
        Err(TriageError::Embedding(_))
    ));

    let resolved = analyzer.create_session();
    analyzer
        .analyze_in_session(resolved, WORKED_EXAMPLE_QUERY, None)
        .await
        .expect("first turn");
    assert!(analyzer.mark_resolved(resolved).expect("mark"));
    assert!(matches!(
        analyzer.analyze_in_session(resolved, "only at night", None).await,
        Err(TriageError::Embedding(_))
    ));
}

#[tokio::test]
async fn third_follow_up_still_searches_with_the_first_question() {
    let embedding = worked_example_embedding()
        .with(format!("{WORKED_EXAMPLE_QUERY} only at night"), vec![1.0, 0.0])
        .with(
            format!("{WORKED_EXAMPLE_QUERY} only at night and on weekends"),
            vec![1.0, 0.0],
        );
    let analyzer = worked_example_analyzer(
        offline_config(),
        embedding,
        Arc::new(FailingModel::transport("unused")),
        None,
    )
    .await;

    let session = analyzer.create_session();
    for text in [WORKED_EXAMPLE_QUERY, "only at night", "and on weekends"] {
        let result = analyzer
            .analyze_in_session(session, text, None)
            .await
            .expect("turn");
        assert_eq!(result.assigned_team, "Network");
        assert_eq!(result.source, AnalysisSource::Historical);
    }

    let history = analyzer.sessions().history(session).expect("history");
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].query_text, "and on weekends");
    assert_eq!(
        history[2].context_text(),
        format!("{WORKED_EXAMPLE_QUERY} only at night and on weekends")
    );
}

#[tokio::test]
async fn resolved_ledger_tickets_feed_the_corpus() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut config = offline_config();
    config.ledger = LedgerConfig {
        enabled: true,
        path: Some(temp.path().join("tickets.jsonl").display().to_string()),
    };
    let analyzer = Analyzer::new(config, None, None, None).expect("analyzer");
    let ledger = analyzer.ledger().expect("ledger").clone();

    let ticket_id = ledger
        .open_ticket(NewTicket::new("smart plug firmware bricked", "Device", "High"))
        .expect("open ticket");
    assert!(matches!(
        analyzer.learn_from_ticket(&ticket_id).await,
        Err(TriageError::Validation(_))
    ));
    ledger
        .resolve(&ticket_id, "Flash firmware over USB")
        .expect("resolve");
    let learned = analyzer.learn_from_ticket(&ticket_id).await.expect("learn");
    assert_eq!(learned.team, "Device");

    let result = analyzer
        .analyze("smart plug firmware bricked", None)
        .await
        .expect("analyze");
    assert_eq!(result.source, AnalysisSource::Historical);
    assert_eq!(result.assigned_team, "Device");
    assert_eq!(result.confidence, 1.0);
}

#[tokio::test]
async fn corpus_loads_from_jsonl_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("tickets.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"Ticket_ID\": 101, \"Issue_Category\": \"payment declined at renewal\", \"Assigned_To_Team\": \"Payments\", \"Ticket_Open_Date\": \"2024-03-01 10:00:00\", \"Date_of_Resolution\": \"2024-03-01 13:00:00\"}\n",
            "{\"Ticket_ID\": 102, \"Issue_Category\": \"app crashes on login\", \"Assigned_To_Team\": \"Software\", \"Ticket_Open_Date\": \"2024-03-02\", \"Date_of_Resolution\": \"\"}\n",
        ),
    )
    .expect("write");
    let analyzer = Analyzer::new(offline_config(), None, None, None).expect("analyzer");
    let report = analyzer.load_corpus_file(&path).await.expect("load");
    assert_eq!(report.accepted, 2);
    assert!(analyzer.index().contains("101"));
    let ticket = analyzer.index().get("102").expect("ticket");
    assert_eq!(ticket.resolution_hours(), None);
}

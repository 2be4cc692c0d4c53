use pretty_assertions::assert_eq;
use triage_rs::config::{GenerationConfig, GenerationProviderKind};
use triage_rs::core::TicketRow;
use triage_rs::{Analyzer, AnalysisSource, TriageConfig, init_logging};

#[tokio::test]
async fn sdk_surface_runs_an_offline_analysis() {
    init_logging();
    init_logging();

    let config = TriageConfig::builder()
        .generation(GenerationConfig {
            provider: GenerationProviderKind::None,
            ..GenerationConfig::default()
        })
        .build();
    let analyzer = Analyzer::new(config, None, None, None).expect("analyzer");
    let rows = vec![
        TicketRow::new("1", "payment gateway rejects card on renewal", "Payments")
            .with_dates("2024-04-01 09:00", Some("2024-04-01 12:00")),
        TicketRow::new("2", "subscription renewal payment fails", "Payments")
            .with_dates("2024-04-02 09:00", Some("2024-04-02 10:00")),
    ];
    let report = analyzer.load_corpus(&rows).await;
    assert_eq!(report.accepted, 2);

    let result = analyzer
        .analyze("card rejected when renewing subscription payment", None)
        .await
        .expect("analyze");
    assert_eq!(result.source, AnalysisSource::Historical);
    assert_eq!(result.assigned_team, "Payments");
    let hours = result.estimated_resolution_hours().expect("hours");
    assert!((1.0..=3.0).contains(&hours));
}

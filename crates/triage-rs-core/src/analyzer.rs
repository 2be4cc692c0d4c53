//! Analyzer façade: corpus loading, stateless and per-session analysis, and
//! the optional ticket ledger.

use crate::decision::{DecisionEngine, Verdict};
use crate::error::TriageError;
use crate::fallback::FallbackAdvisor;
use crate::generation::{GenerativeModel, HttpChatModel};
use crate::ingest::{IngestReport, RowError, TicketRow, load_rows_jsonl, validate_rows};
use crate::ledger::TicketLedger;
use crate::retrieval::RetrievalAgent;
use crate::sessions::SessionStore;
use crate::summarizer::IssueSummarizer;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use triage_rs_config::{
    EmbeddingConfig, EmbeddingProviderKind, GenerationConfig, GenerationProviderKind,
    TriageConfig,
};
use triage_rs_index::{EmbeddingProvider, HashedEmbedding, HttpEmbedding, SimilarityIndex};
use triage_rs_protocol::{
    AnalysisResult, ConversationTurn, EventPayload, EventSink, HistoricalTicket, SessionId,
    TicketId, TriageEvent,
};

const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Main entry point: owns the index, sessions, and fallback wiring.
pub struct Analyzer {
    config: Arc<TriageConfig>,
    index: Arc<SimilarityIndex>,
    retrieval: RetrievalAgent,
    engine: DecisionEngine,
    advisor: FallbackAdvisor,
    summarizer: Option<IssueSummarizer>,
    sessions: SessionStore,
    ledger: Option<Arc<TicketLedger>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl Analyzer {
    /// Construct an analyzer; providers left as `None` are built from config.
    pub fn new(
        config: TriageConfig,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        model: Option<Arc<dyn GenerativeModel>>,
        event_sink: Option<Arc<dyn EventSink>>,
    ) -> Result<Self, TriageError> {
        info!("initializing analyzer");
        config
            .validate()
            .map_err(|err| TriageError::Validation(err.to_string()))?;
        debug!(
            "analyzer config (top_k={}, threshold={}, timeout_ms={}, ledger={})",
            config.retrieval.top_k,
            config.decision.confidence_threshold,
            config.fallback.timeout_ms,
            config.ledger.enabled
        );

        let embedder = match embedder {
            Some(embedder) => embedder,
            None => build_default_embedder(&config.embedding),
        };
        let model = match model {
            Some(model) => Some(model),
            None => build_default_model(&config.generation),
        };
        let ledger = if config.ledger.enabled {
            let path = config.ledger.path.as_deref().ok_or_else(|| {
                TriageError::Validation("ledger.path is required when the ledger is enabled".to_string())
            })?;
            Some(Arc::new(TicketLedger::open(path)?))
        } else {
            None
        };

        let index = Arc::new(SimilarityIndex::new(embedder));
        let retrieval = RetrievalAgent::new(index.clone(), config.retrieval.augment_with_history);
        let engine = DecisionEngine::from_config(&config.decision);
        let advisor = FallbackAdvisor::new(model.clone(), &config.fallback);
        let summarizer = if config.retrieval.summarize_query {
            model.map(|model| {
                IssueSummarizer::new(model, Duration::from_millis(config.fallback.timeout_ms))
            })
        } else {
            None
        };
        let sessions = SessionStore::new(config.conversation.max_turns);

        info!("analyzer initialized");
        Ok(Self {
            config: Arc::new(config),
            index,
            retrieval,
            engine,
            advisor,
            summarizer,
            sessions,
            ledger,
            event_sink,
        })
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The live ticket ledger, when enabled.
    pub fn ledger(&self) -> Option<&Arc<TicketLedger>> {
        self.ledger.as_ref()
    }

    /// Validate `rows`, embed them into a fresh corpus, and swap it in.
    pub async fn load_corpus(&self, rows: &[TicketRow]) -> IngestReport {
        let batch = validate_rows(rows);
        for err in &batch.rejected {
            warn!("rejected ticket row (row={}, reason={})", err.row, err.reason);
        }
        let row_numbers: HashMap<TicketId, usize> = batch
            .tickets
            .iter()
            .map(|(row, ticket)| (ticket.id.clone(), *row))
            .collect();
        let tickets = batch.tickets.into_iter().map(|(_, ticket)| ticket).collect();
        let build = self.index.replace_corpus(tickets).await;
        let skipped: Vec<RowError> = build
            .failures
            .into_iter()
            .map(|(ticket_id, err)| RowError {
                row: row_numbers.get(&ticket_id).copied().unwrap_or_default(),
                ticket_id: Some(ticket_id),
                reason: err.to_string(),
            })
            .collect();
        let report = IngestReport {
            accepted: build.indexed,
            rejected: batch.rejected,
            skipped,
        };
        info!(
            "corpus loaded (accepted={}, rejected={}, skipped={})",
            report.accepted,
            report.rejected.len(),
            report.skipped.len()
        );
        self.emit(
            None,
            EventPayload::CorpusReloaded {
                indexed: report.accepted,
                rejected: report.rejected.len(),
                skipped: report.skipped.len(),
            },
        );
        report
    }

    /// Read rows from a JSON array or JSON Lines file and load them.
    pub async fn load_corpus_file(&self, path: impl AsRef<Path>) -> Result<IngestReport, TriageError> {
        let rows = load_rows_jsonl(path)?;
        Ok(self.load_corpus(&rows).await)
    }

    /// Add or replace one ticket in the live corpus.
    pub async fn add_ticket(&self, ticket: HistoricalTicket) -> Result<(), TriageError> {
        debug!("adding ticket (ticket_id={})", ticket.id);
        Ok(self.index.upsert(ticket).await?)
    }

    /// Feed a resolved ledger ticket back into the corpus.
    pub async fn learn_from_ticket(&self, ticket_id: &str) -> Result<HistoricalTicket, TriageError> {
        let ledger = self
            .ledger
            .as_ref()
            .ok_or_else(|| TriageError::Ledger("ledger is not enabled".to_string()))?;
        let ticket = ledger
            .get(ticket_id)
            .ok_or_else(|| TriageError::Ledger(format!("unknown ticket: {ticket_id}")))?;
        let historical = ticket.to_historical().ok_or_else(|| {
            TriageError::Validation(format!("ticket {ticket_id} is not resolved"))
        })?;
        self.index.upsert(historical.clone()).await?;
        info!("learned from resolved ticket (ticket_id={})", ticket_id);
        Ok(historical)
    }

    pub fn create_session(&self) -> SessionId {
        self.sessions.create_session()
    }

    /// Mark the latest turn of a session as accepted.
    pub fn mark_resolved(&self, session_id: SessionId) -> Result<bool, TriageError> {
        self.sessions.mark_resolved(session_id)
    }

    /// Analyze one issue without conversation history; nothing is recorded.
    pub async fn analyze(
        &self,
        issue_text: &str,
        k: Option<usize>,
    ) -> Result<AnalysisResult, TriageError> {
        self.run_analysis(None, issue_text, k, &[]).await
    }

    /// Analyze one issue within a session and record the turn.
    pub async fn analyze_in_session(
        &self,
        session_id: SessionId,
        issue_text: &str,
        k: Option<usize>,
    ) -> Result<AnalysisResult, TriageError> {
        let history = self.sessions.history(session_id)?;
        let result = self
            .run_analysis(Some(session_id), issue_text, k, &history)
            .await?;
        let turn = ConversationTurn::new(issue_text, result.clone())
            .with_search_text(self.retrieval.search_text(issue_text, &history));
        self.sessions.append_turn(session_id, turn)?;
        Ok(result)
    }

    fn resolve_k(&self, k: Option<usize>) -> Result<usize, TriageError> {
        let k = k.unwrap_or(self.config.retrieval.top_k);
        if k == 0 {
            return Err(TriageError::Validation(
                "k must be greater than zero".to_string(),
            ));
        }
        if k > self.config.retrieval.max_top_k {
            return Err(TriageError::Validation(format!(
                "k must be at most {} (got {k})",
                self.config.retrieval.max_top_k
            )));
        }
        Ok(k)
    }

    async fn run_analysis(
        &self,
        session_id: Option<SessionId>,
        issue_text: &str,
        k: Option<usize>,
        history: &[ConversationTurn],
    ) -> Result<AnalysisResult, TriageError> {
        if issue_text.trim().is_empty() {
            return Err(TriageError::Validation("query text is empty".to_string()));
        }
        let k = self.resolve_k(k)?;
        self.emit(
            session_id,
            EventPayload::AnalysisStarted {
                query_text: issue_text.to_string(),
                k,
            },
        );

        let summary = match &self.summarizer {
            Some(summarizer) => summarizer.summarize(issue_text).await,
            None => None,
        };
        let search_text = summary
            .as_ref()
            .map(|summary| summary.summary.as_str())
            .unwrap_or(issue_text);
        let matches = self.retrieval.retrieve(search_text, k, history).await?;
        debug!(
            "matches retrieved (count={}, k={}, corpus={})",
            matches.len(),
            k,
            self.index.len()
        );
        self.emit(
            session_id,
            EventPayload::MatchesRetrieved {
                count: matches.len(),
            },
        );

        let result = match self.engine.evaluate(matches) {
            Verdict::Trusted(result) => result,
            Verdict::Insufficient { reasons, matches } => {
                info!(
                    "fallback triggered (reasons={:?}, matches={})",
                    reasons,
                    matches.len()
                );
                self.emit(
                    session_id,
                    EventPayload::FallbackTriggered {
                        reasons: reasons.clone(),
                    },
                );
                self.advisor
                    .recommend(issue_text, history, matches, reasons)
                    .await
            }
        };

        info!(
            "analysis completed (team={}, source={}, confidence={:.3})",
            result.assigned_team,
            result.source.as_str(),
            result.confidence
        );
        self.emit(
            session_id,
            EventPayload::AnalysisCompleted {
                assigned_team: result.assigned_team.clone(),
                source: result.source,
                confidence: result.confidence,
            },
        );
        Ok(result)
    }

    fn emit(&self, session_id: Option<SessionId>, payload: EventPayload) {
        if let Some(sink) = &self.event_sink {
            sink.emit(TriageEvent::new(session_id, payload));
        }
    }
}

/// Build the embedding provider named by config.
fn build_default_embedder(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    info!(
        "initializing embedding provider (provider={:?}, dimension={})",
        config.provider, config.dimension
    );
    match config.provider {
        EmbeddingProviderKind::Hashed => Arc::new(HashedEmbedding::new(config.dimension)),
        EmbeddingProviderKind::Http => Arc::new(HttpEmbedding::new(
            config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_EMBEDDING_BASE_URL),
            config.model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL),
            read_api_key(config.api_key_env.as_deref()),
            config.dimension,
        )),
    }
}

/// Build the generative model named by config; `None` disables generation.
fn build_default_model(config: &GenerationConfig) -> Option<Arc<dyn GenerativeModel>> {
    match config.provider {
        GenerationProviderKind::None => {
            info!("generative fallback disabled");
            None
        }
        GenerationProviderKind::Http => {
            let api_key = read_api_key(config.api_key_env.as_deref());
            if api_key.is_none() {
                warn!(
                    "no API key found for generative model (env={})",
                    config.api_key_env.as_deref().unwrap_or("-")
                );
            }
            Some(Arc::new(HttpChatModel::new(
                config
                    .base_url
                    .as_deref()
                    .unwrap_or(HttpChatModel::DEFAULT_BASE_URL),
                config.model.as_deref().unwrap_or(HttpChatModel::DEFAULT_MODEL),
                api_key,
            )))
        }
    }
}

fn read_api_key(env_name: Option<&str>) -> Option<String> {
    env_name
        .and_then(|name| std::env::var(name).ok())
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_rs_config::{LedgerConfig, RetrievalConfig};
    use triage_rs_protocol::AnalysisSource;

    fn offline_config() -> TriageConfig {
        TriageConfig::builder()
            .generation(GenerationConfig {
                provider: GenerationProviderKind::None,
                ..GenerationConfig::default()
            })
            .build()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = offline_config();
        config.decision.confidence_threshold = 1.5;
        assert!(matches!(
            Analyzer::new(config, None, None, None),
            Err(TriageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn k_is_bounded_by_config() {
        let config = TriageConfig::builder()
            .retrieval(RetrievalConfig {
                max_top_k: 5,
                ..RetrievalConfig::default()
            })
            .generation(GenerationConfig {
                provider: GenerationProviderKind::None,
                ..GenerationConfig::default()
            })
            .build();
        let analyzer = Analyzer::new(config, None, None, None).expect("analyzer");
        assert!(matches!(
            analyzer.analyze("vpn drops", Some(6)).await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            analyzer.analyze("vpn drops", Some(0)).await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            analyzer.analyze("  ", None).await,
            Err(TriageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn empty_corpus_without_model_degrades() {
        let analyzer = Analyzer::new(offline_config(), None, None, None).expect("analyzer");
        let result = analyzer.analyze("printer on fire", None).await.expect("analyze");
        assert_eq!(result.assigned_team, "Unassigned");
        assert_eq!(result.source, AnalysisSource::Generative);
        assert_eq!(result.estimated_resolution_hours(), None);
        assert!(result.supporting_matches.is_empty());
    }

    #[tokio::test]
    async fn rows_load_into_the_index() {
        let analyzer = Analyzer::new(offline_config(), None, None, None).expect("analyzer");
        let rows = vec![
            TicketRow::new("1", "wifi keeps dropping", "Network")
                .with_dates("2024-01-01 08:00:00", Some("2024-01-01 10:00:00")),
            TicketRow::new("2", "", "Network"),
        ];
        let report = analyzer.load_corpus(&rows).await;
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].row, 2);
        assert!(analyzer.index().contains("1"));
    }

    #[tokio::test]
    async fn learning_requires_ledger() {
        let analyzer = Analyzer::new(offline_config(), None, None, None).expect("analyzer");
        assert!(analyzer.ledger().is_none());
        assert!(matches!(
            analyzer.learn_from_ticket("TECH_200").await,
            Err(TriageError::Ledger(_))
        ));

        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = offline_config();
        config.ledger = LedgerConfig {
            enabled: true,
            path: Some(temp.path().join("tickets.jsonl").display().to_string()),
        };
        let analyzer = Analyzer::new(config, None, None, None).expect("analyzer");
        assert!(analyzer.ledger().is_some());
    }
}

//! Provider chain: primary (probed), then secondary, then provider-free
//! heuristics. Every request that gets here resolves to exactly one result.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use crate::clients::{GeminiClient, OpenAiClient, ProviderClient};
use crate::config::Config;
use crate::error::{AppError, ProviderError};
use crate::models::{
    AnalysisReport, AnalysisRequest, AnalysisResult, AttemptOutcome, AttemptStage, CustomResult,
    ProducedBy, ProviderAttempt,
};
use super::heuristics::{
    asks_for_extraction, asks_for_questions, extract_column_values, extract_questions,
    render_questions, requested_count, DEFAULT_EXTRACTION_COUNT, DEFAULT_QUESTION_COUNT,
};
use super::prompt_builder::build_prompt;
use super::structurer::structure_response;
use super::summarizer::basic_summary;

const HEURISTIC_NOTE: &str =
    "Note: the AI analysis service is unavailable, so this answer was extracted directly from the spreadsheet.";

/// One provider in the chain.
#[derive(Clone)]
pub struct ProviderTier {
    pub client: Arc<dyn ProviderClient>,
    /// Probe before sending the real prompt.
    pub probe_first: bool,
}

/// Ordered providers plus the per-call time limit. Shared read-only between
/// requests.
#[derive(Clone)]
pub struct ProviderChain {
    tiers: Vec<ProviderTier>,
    timeout: Duration,
}

/// How a single bounded provider call ended.
enum StepResult<T> {
    Done(Result<T, ProviderError>),
    Cancelled,
}

impl ProviderChain {
    pub fn new(timeout: Duration) -> Self {
        Self { tiers: Vec::new(), timeout }
    }

    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>, probe_first: bool) -> Self {
        self.tiers.push(ProviderTier { client, probe_first });
        self
    }

    /// Primary is Gemini (always probed), secondary is OpenAI (probed only
    /// when `probe_secondary` is set). Unconfigured providers are left out.
    pub fn from_config(config: &Config) -> Self {
        let mut chain = Self::new(config.provider_timeout);

        match &config.gemini {
            Some(settings) => match GeminiClient::new(settings, config.provider_timeout) {
                Ok(client) => chain = chain.with_provider(Arc::new(client), true),
                Err(e) => tracing::error!("Primary provider disabled: {}", e),
            },
            None => tracing::info!("No primary provider configured"),
        }

        match &config.openai {
            Some(settings) => {
                chain = chain.with_provider(Arc::new(OpenAiClient::new(settings)), config.probe_secondary);
            }
            None => tracing::info!("No secondary provider configured"),
        }

        tracing::info!(
            "Provider chain: [{}], timeout {:?}",
            chain.tiers.iter().map(|t| t.client.name()).collect::<Vec<_>>().join(" -> "),
            chain.timeout
        );
        chain
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    async fn bounded<T, F>(&self, cancel: &CancellationToken, call: F) -> StepResult<T>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => StepResult::Cancelled,
            res = tokio::time::timeout(self.timeout, call) => match res {
                Ok(r) => StepResult::Done(r),
                Err(_) => StepResult::Done(Err(ProviderError::Timeout(self.timeout))),
            },
        }
    }

    /// Runs the chain for one request.
    ///
    /// Providers are tried in order with at most one real call each; the first
    /// success wins. When none succeeds the heuristics answer. The only error
    /// is `AppError::Cancelled`, after which no further step runs.
    pub async fn resolve(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, AppError> {
        let mut attempts = Vec::new();
        let mut cached_prompt: Option<String> = None;

        for tier in &self.tiers {
            let client = tier.client.as_ref();
            let slot = client.slot();

            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let mut verified = false;
            if tier.probe_first {
                tracing::debug!("Verifying {} ({:?})", client.name(), slot);
                let started = Instant::now();
                match self.bounded(cancel, client.probe()).await {
                    StepResult::Cancelled => return Err(AppError::Cancelled),
                    StepResult::Done(Ok(())) => verified = true,
                    StepResult::Done(Err(e)) => {
                        tracing::warn!(provider = client.name(), stage = "probe", "Provider unavailable: {}", e);
                        attempts.push(ProviderAttempt {
                            provider_id: client.name().to_string(),
                            slot,
                            verified: false,
                            stage: AttemptStage::Probe,
                            outcome: AttemptOutcome::Failure(e.to_string()),
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        });
                        continue;
                    }
                }
            }

            let prompt: &str = cached_prompt.get_or_insert_with(|| build_prompt(request));
            tracing::info!("Sending {} prompt ({} chars) to {} [{}]",
                if request.is_custom() { "custom" } else { "standard" },
                prompt.len(), client.name(), client.model());
            let started = Instant::now();
            let outcome = match self.bounded(cancel, client.complete(prompt)).await {
                StepResult::Cancelled => return Err(AppError::Cancelled),
                StepResult::Done(outcome) => outcome,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let failure = match outcome {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!("{} answered in {}ms", client.name(), elapsed_ms);
                    attempts.push(ProviderAttempt {
                        provider_id: client.name().to_string(),
                        slot,
                        verified,
                        stage: AttemptStage::Complete,
                        outcome: AttemptOutcome::Success(format!("{} chars", text.len())),
                        elapsed_ms,
                    });
                    let result = provider_result(request, text, slot.into());
                    return Ok(AnalysisReport { result, attempts });
                }
                Ok(_) => ProviderError::EmptyResponse,
                Err(e) => e,
            };

            tracing::warn!(provider = client.name(), stage = "complete", "Provider call failed: {}", failure);
            attempts.push(ProviderAttempt {
                provider_id: client.name().to_string(),
                slot,
                verified,
                stage: AttemptStage::Complete,
                outcome: AttemptOutcome::Failure(failure.to_string()),
                elapsed_ms,
            });
        }

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        tracing::info!("No provider succeeded after {} attempt(s), using heuristic fallback", attempts.len());
        Ok(AnalysisReport {
            result: heuristic_fallback(request),
            attempts,
        })
    }
}

fn provider_result(request: &AnalysisRequest, text: String, produced_by: ProducedBy) -> AnalysisResult {
    match &request.instruction {
        Some(instruction) => AnalysisResult::Custom(CustomResult {
            text,
            source_instruction: instruction.clone(),
            produced_by,
        }),
        None => AnalysisResult::Structured(structure_response(&text, &request.document_name, produced_by)),
    }
}

/// Provider-free answer: question rows, then a named column, then an apology
/// for custom requests; the basic summary for standard ones.
pub fn heuristic_fallback(request: &AnalysisRequest) -> AnalysisResult {
    let Some(instruction) = request.instruction.as_deref() else {
        return AnalysisResult::Structured(basic_summary(request));
    };

    let custom = |text: String, produced_by: ProducedBy| {
        AnalysisResult::Custom(CustomResult {
            text,
            source_instruction: instruction.to_string(),
            produced_by,
        })
    };

    if asks_for_questions(instruction) {
        let questions = extract_questions(&request.all_rows);
        if !questions.is_empty() {
            let count = requested_count(instruction).unwrap_or(DEFAULT_QUESTION_COUNT);
            let text = render_questions(&request.document_name, &questions, count);
            return custom(format!("{}\n\n{}", text, HEURISTIC_NOTE), ProducedBy::HeuristicExtractor);
        }
        tracing::debug!("No question-like rows found");
    }

    if asks_for_extraction(instruction) {
        if let Some(hit) = request.first_sheet().and_then(|s| extract_column_values(instruction, s)) {
            let count = requested_count(instruction).unwrap_or(DEFAULT_EXTRACTION_COUNT);
            return custom(format!("{}\n\n{}", hit.render(count), HEURISTIC_NOTE), ProducedBy::HeuristicExtractor);
        }
        tracing::debug!("No header matched the instruction");
    }

    custom(
        format!(
            "I'm sorry, the AI analysis service is currently unavailable, so I can't answer \"{}\" right now. \
             The document \"{}\" contains {} rows and {} columns across {} sheet(s): {}. Please try again later.",
            instruction,
            request.document_name,
            request.total_rows,
            request.total_columns,
            request.sheets.len(),
            request.sheet_names().join(", ")
        ),
        ProducedBy::Unavailable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;
    use crate::models::ProviderSlot;
    use crate::services::excel::build_request;
    use crate::services::excel::types::{RawSheet, RawWorkbook};

    #[derive(Clone, Copy)]
    enum Probe {
        Pass,
        Fail,
        Hang,
    }

    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct Scripted {
        name: &'static str,
        slot: ProviderSlot,
        probe: Probe,
        reply: Reply,
        probes: AtomicUsize,
        completes: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, slot: ProviderSlot, probe: Probe, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name,
                slot,
                probe,
                reply,
                probes: AtomicUsize::new(0),
                completes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn slot(&self) -> ProviderSlot {
            self.slot
        }

        async fn probe(&self) -> Result<(), ProviderError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match self.probe {
                Probe::Pass => Ok(()),
                Probe::Fail => Err(ProviderError::Http("connection refused".into())),
                Probe::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            }
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.completes.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Fail => Err(ProviderError::Api("429 rate limited".into())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".into())
                }
            }
        }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn survey(instruction: Option<&str>) -> AnalysisRequest {
        let mut cells = vec![vec!["Question".to_string(), "Owner".to_string()]];
        cells.extend((1..=10).map(|i| vec![format!("Q{i}: item number {i}?"), format!("person{i}")]));
        let workbook = RawWorkbook {
            sheets: vec![RawSheet::new("Survey", cells), RawSheet::new("Blank", vec![])],
        };
        build_request("survey.xlsx", workbook, instruction).unwrap()
    }

    fn chain() -> ProviderChain {
        ProviderChain::new(Duration::from_millis(200))
    }

    fn text_of(result: &AnalysisResult) -> &str {
        match result {
            AnalysisResult::Custom(c) => &c.text,
            other => panic!("expected custom result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn primary_success_short_circuits_the_chain() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Text("Ten questions."));
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Pass, Reply::Text("unused"));
        let chain = chain().with_provider(primary.clone(), true).with_provider(secondary.clone(), false);

        let report = assert_ok!(chain.resolve(&survey(Some("how many rows?")), &CancellationToken::new()).await);
        assert_eq!(report.result.produced_by(), ProducedBy::ProviderA);
        assert_eq!(text_of(&report.result), "Ten questions.");
        assert_eq!(primary.probes.load(Ordering::SeqCst), 1);
        assert_eq!(primary.completes.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.completes.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempts.len(), 1);
        assert!(report.attempts[0].verified && report.attempts[0].succeeded());
    }

    #[tokio::test]
    async fn failed_probe_skips_the_real_prompt() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Fail, Reply::Text("never sent"));
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Pass, Reply::Text("From B"));
        let chain = chain().with_provider(primary.clone(), true).with_provider(secondary.clone(), false);

        let report = chain.resolve(&survey(Some("summarize")), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.result.produced_by(), ProducedBy::ProviderB);
        assert_eq!(primary.completes.load(Ordering::SeqCst), 0);
        assert_eq!(secondary.probes.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempts[0].stage, AttemptStage::Probe);
        assert!(!report.attempts[0].verified);
        assert!(!report.attempts[1].verified);
        assert!(report.attempts[1].succeeded());
    }

    #[tokio::test]
    async fn failures_fall_through_to_question_heuristic() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Fail);
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Pass, Reply::Text("   "));
        let chain = chain().with_provider(primary.clone(), true).with_provider(secondary.clone(), false);

        let report = chain
            .resolve(&survey(Some("give me the first 3 questions")), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.result.produced_by(), ProducedBy::HeuristicExtractor);
        let text = text_of(&report.result);
        assert!(text.contains("3. Q3: item number 3?"));
        assert!(!text.contains("Q4:"));
        assert!(text.contains("Showing 3 of 10 questions found."));
        assert_eq!(primary.completes.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.completes.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempts.len(), 2);
        assert!(report.attempts.iter().all(|a| !a.succeeded()));
    }

    #[tokio::test]
    async fn hung_provider_times_out() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Hang);
        let chain = ProviderChain::new(Duration::from_millis(50)).with_provider(primary, true);

        let report = chain.resolve(&survey(None), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.result.produced_by(), ProducedBy::HeuristicExtractor);
        match &report.attempts[0].outcome {
            AttemptOutcome::Failure(reason) => assert!(reason.starts_with("timed out")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_verification_times_out_and_moves_on() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Hang, Reply::Text("never sent"));
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Pass, Reply::Text("From B"));
        let chain = ProviderChain::new(Duration::from_millis(50))
            .with_provider(primary.clone(), true)
            .with_provider(secondary, false);

        let report = chain.resolve(&survey(Some("summarize")), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.result.produced_by(), ProducedBy::ProviderB);
        assert_eq!(primary.completes.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempts[0].stage, AttemptStage::Probe);
        match &report.attempts[0].outcome {
            AttemptOutcome::Failure(reason) => assert!(reason.starts_with("timed out")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn verified_secondary_with_failing_check_is_skipped() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Fail);
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Fail, Reply::Text("never sent"));
        let chain = chain()
            .with_provider(primary.clone(), true)
            .with_provider(secondary.clone(), true);

        let report = chain.resolve(&survey(Some("list the questions")), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.result.produced_by(), ProducedBy::HeuristicExtractor);
        assert_eq!(secondary.probes.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.completes.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].stage, AttemptStage::Complete);
        assert!(report.attempts[0].verified);
        assert_eq!(report.attempts[1].slot, ProviderSlot::Secondary);
        assert_eq!(report.attempts[1].stage, AttemptStage::Probe);
        assert!(!report.attempts[1].verified);
    }

    #[tokio::test]
    async fn standard_provider_text_is_structured() {
        let primary = Scripted::new(
            "a",
            ProviderSlot::Primary,
            Probe::Pass,
            Reply::Text("A survey of ten items.\nKey Insights\n- Every item has a distinct owner.\nRecommendations\n- Assign reviewers to each item.\nData Quality\n- No missing owners were found."),
        );
        let chain = chain().with_provider(primary, true);

        let report = chain.resolve(&survey(None), &CancellationToken::new()).await.unwrap();
        match report.result {
            AnalysisResult::Structured(s) => {
                assert_eq!(s.produced_by, ProducedBy::ProviderA);
                assert_eq!(s.summary, "A survey of ten items.");
                assert_eq!(s.insights, vec!["Every item has a distinct owner."]);
                assert_eq!(s.recommendations, vec!["Assign reviewers to each item."]);
                assert_eq!(s.data_quality_issues, vec!["No missing owners were found."]);
                assert!(s.note.is_none());
            }
            other => panic!("expected structured result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_providers_always_resolves() {
        let chain = chain();
        assert!(chain.is_empty());

        let standard = chain.resolve(&survey(None), &CancellationToken::new()).await.unwrap();
        match standard.result {
            AnalysisResult::Structured(s) => {
                assert_eq!(s.produced_by, ProducedBy::HeuristicExtractor);
                assert!(s.note.is_some());
                assert!(!s.insights.is_empty() && !s.recommendations.is_empty() && !s.data_quality_issues.is_empty());
            }
            other => panic!("expected structured result, got {other:?}"),
        }

        let questions = chain.resolve(&survey(Some("list the questions")), &CancellationToken::new()).await.unwrap();
        assert!(text_of(&questions.result).contains("Showing 5 of 10 questions found."));

        let column = chain.resolve(&survey(Some("show the owner column")), &CancellationToken::new()).await.unwrap();
        assert_eq!(column.result.produced_by(), ProducedBy::HeuristicExtractor);
        assert!(text_of(&column.result).contains("Showing 10 of 10 values found."));

        let apology = chain.resolve(&survey(Some("what is the trend?")), &CancellationToken::new()).await.unwrap();
        assert_eq!(apology.result.produced_by(), ProducedBy::Unavailable);
        let text = text_of(&apology.result);
        assert!(text.contains("unavailable"));
        assert!(text.contains("11 rows and 2 columns across 1 sheet(s): Survey"));
        assert!(standard.attempts.is_empty());
    }

    #[tokio::test]
    async fn cancelled_request_stops_before_any_call() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Text("x"));
        let chain = chain().with_provider(primary.clone(), true);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = chain.resolve(&survey(None), &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(primary.probes.load(Ordering::SeqCst), 0);
        assert_eq!(primary.completes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call_and_skips_secondary() {
        let primary = Scripted::new("a", ProviderSlot::Primary, Probe::Pass, Reply::Hang);
        let secondary = Scripted::new("b", ProviderSlot::Secondary, Probe::Pass, Reply::Text("unused"));
        let chain = ProviderChain::new(Duration::from_secs(10))
            .with_provider(primary, true)
            .with_provider(secondary.clone(), false);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = chain.resolve(&survey(Some("anything")), &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(secondary.completes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn question_intent_without_questions_falls_to_column_then_apology() {
        let workbook = RawWorkbook {
            sheets: vec![RawSheet::new("People", grid(&[&["name", "city"], &["Ann", "Oslo"]]))],
        };
        let request = build_request("people.xlsx", workbook, Some("find the question about city")).unwrap();
        let result = heuristic_fallback(&request);
        assert_eq!(result.produced_by(), ProducedBy::HeuristicExtractor);
        assert!(text_of(&result).contains("Values from column \"city\""));

        let request = build_request(
            "people.xlsx",
            RawWorkbook { sheets: vec![RawSheet::new("People", grid(&[&["name"], &["Ann"]]))] },
            Some("any questions?"),
        )
        .unwrap();
        assert_eq!(heuristic_fallback(&request).produced_by(), ProducedBy::Unavailable);
    }
}

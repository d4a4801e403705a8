//! Bounded self-correction: generate, validate, execute, and recover.
//!
//! The loop is an explicit state machine. Each state is handled by one arm
//! of [`SelfCorrection::run`] and yields the next state; every non-terminal
//! state appends exactly one trace entry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::classifier::classify;
use super::fixes::{apply_fix, DeterministicFix};
use super::ErrorClassification;
use crate::error::NlsqlError;
use crate::executor::{ExecutionError, QueryExecutor, QueryRows};
use crate::llm::{GeneratedQuery, GenerationError, GenerationRequest, TextGenerator};
use crate::pipeline::trace::{Trace, TraceStep};
use crate::schema::fk_graph::edges_touching;
use crate::schema::SchemaView;
use crate::validation::validate;

/// Retry and timeout policy for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts after the first one. Default: 2
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-call limit on query generation. Default: 30000
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Per-call limit on query execution. Default: 15000
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

fn default_execution_timeout_ms() -> u64 {
    15_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            generation_timeout_ms: default_generation_timeout_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> usize {
        self.max_retries as usize + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Generation,
    Validation,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed { error: String },
}

/// One pass through generate/validate/execute. `index` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub index: usize,
    pub query: String,
    pub stage: AttemptStage,
    pub outcome: AttemptOutcome,
}

impl ExecutionAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Failed { error } => Some(error),
            AttemptOutcome::Success => None,
        }
    }
}

/// Context handed to the generator when regenerating after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDirective {
    pub failed_query: String,
    pub error: String,
    pub analysis: String,
    pub fix_hint: Option<String>,
    pub join_table: Option<String>,
    /// `Table.column → Target.column` lines for the join table
    pub fk_edges: Vec<String>,
}

/// States of the correction loop, as surfaced in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionState {
    Generating,
    Validating,
    Executing,
    Classifying,
    DeterministicFix,
    Regenerating,
    Success,
    Exhausted,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    Success {
        query: String,
        reasoning: Option<String>,
        rows: QueryRows,
    },
    /// Attempt budget spent; carries the last failure
    Exhausted { last_error: ErrorClassification },
    /// A collaborator is unavailable
    Aborted { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    pub outcome: CorrectionOutcome,
    pub attempts: Vec<ExecutionAttempt>,
    /// Every state the loop passed through, in order
    pub path: Vec<CorrectionState>,
}

struct Failure {
    stage: AttemptStage,
    query: String,
    error: String,
    /// Set when the failure is already classified (timeouts, rejections)
    classification: Option<ErrorClassification>,
}

enum Step {
    Generating,
    Validating(GeneratedQuery),
    Executing(GeneratedQuery),
    Classifying(Failure),
    DeterministicFix {
        query: String,
        fix: DeterministicFix,
    },
    Regenerating {
        failure: Failure,
        classification: ErrorClassification,
    },
    Success(GeneratedQuery, QueryRows),
    Exhausted(ErrorClassification),
    Aborted(String),
}

impl Step {
    fn state(&self) -> CorrectionState {
        match self {
            Step::Generating => CorrectionState::Generating,
            Step::Validating(_) => CorrectionState::Validating,
            Step::Executing(_) => CorrectionState::Executing,
            Step::Classifying(_) => CorrectionState::Classifying,
            Step::DeterministicFix { .. } => CorrectionState::DeterministicFix,
            Step::Regenerating { .. } => CorrectionState::Regenerating,
            Step::Success(..) => CorrectionState::Success,
            Step::Exhausted(_) => CorrectionState::Exhausted,
            Step::Aborted(_) => CorrectionState::Aborted,
        }
    }
}

fn describe_fix(fix: &DeterministicFix) -> String {
    match fix {
        DeterministicFix::Rename { from, to } => format!("Renamed {} to {}", from, to),
        DeterministicFix::StripTrailingComma => "Removed trailing comma".to_string(),
        DeterministicFix::QuoteReservedWord { word } => format!("Quoted reserved word {}", word),
    }
}

/// Drives one turn's generate/validate/execute loop.
pub struct SelfCorrection<'a> {
    generator: &'a dyn TextGenerator,
    executor: &'a dyn QueryExecutor,
    /// Full schema, used for classification and projection widening
    schema: &'a SchemaView,
    policy: &'a RetryPolicy,
}

impl<'a> SelfCorrection<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        executor: &'a dyn QueryExecutor,
        schema: &'a SchemaView,
        policy: &'a RetryPolicy,
    ) -> Self {
        Self {
            generator,
            executor,
            schema,
            policy,
        }
    }

    pub async fn run(&self, mut request: GenerationRequest, trace: &mut Trace) -> CorrectionReport {
        let mut attempts: Vec<ExecutionAttempt> = Vec::new();
        let mut path = Vec::new();
        let mut step = Step::Generating;

        loop {
            path.push(step.state());
            step = match step {
                Step::Generating => self.generate(&request, attempts.len(), trace).await,

                Step::Validating(generated) => match validate(&generated.query) {
                    Ok(()) => {
                        trace.complete(TraceStep::Validation, "Query passed read-only validation");
                        Step::Executing(generated)
                    }
                    Err(rejection) => {
                        let reason = rejection.to_string();
                        trace.error(TraceStep::Validation, format!("Query rejected: {}", reason));
                        Step::Classifying(Failure {
                            stage: AttemptStage::Validation,
                            query: generated.query,
                            classification: Some(ErrorClassification::validation_rejected(&reason)),
                            error: reason,
                        })
                    }
                },

                Step::Executing(generated) => {
                    let limit = self.policy.execution_timeout_ms;
                    let result = tokio::time::timeout(
                        Duration::from_millis(limit),
                        self.executor.execute(&generated.query),
                    )
                    .await;

                    match result {
                        Ok(Ok(rows)) => {
                            trace.complete(
                                TraceStep::Execution,
                                format!("Query returned {} rows", rows.len()),
                            );
                            attempts.push(ExecutionAttempt {
                                index: attempts.len(),
                                query: generated.query.clone(),
                                stage: AttemptStage::Execution,
                                outcome: AttemptOutcome::Success,
                            });
                            Step::Success(generated, rows)
                        }
                        Ok(Err(ExecutionError::Connection(reason))) => {
                            trace.error(TraceStep::Execution, format!("Database unavailable: {}", reason));
                            attempts.push(ExecutionAttempt {
                                index: attempts.len(),
                                query: generated.query,
                                stage: AttemptStage::Execution,
                                outcome: AttemptOutcome::Failed {
                                    error: reason.clone(),
                                },
                            });
                            Step::Aborted(
                                NlsqlError::from(ExecutionError::Connection(reason)).to_string(),
                            )
                        }
                        Ok(Err(e)) => {
                            let error = e.to_string();
                            trace.error(TraceStep::Execution, format!("Execution failed: {}", error));
                            Step::Classifying(Failure {
                                stage: AttemptStage::Execution,
                                query: generated.query,
                                error,
                                classification: None,
                            })
                        }
                        Err(_) => {
                            let classification = ErrorClassification::execution_timeout(limit);
                            trace.error(TraceStep::Execution, classification.analysis.clone());
                            Step::Classifying(Failure {
                                stage: AttemptStage::Execution,
                                query: generated.query,
                                error: classification.analysis.clone(),
                                classification: Some(classification),
                            })
                        }
                    }
                }

                Step::Classifying(failure) => {
                    attempts.push(ExecutionAttempt {
                        index: attempts.len(),
                        query: failure.query.clone(),
                        stage: failure.stage,
                        outcome: AttemptOutcome::Failed {
                            error: failure.error.clone(),
                        },
                    });

                    let classification = failure
                        .classification
                        .clone()
                        .unwrap_or_else(|| classify(&failure.error, &failure.query, self.schema));

                    if attempts.len() >= self.policy.max_attempts() {
                        tracing::error!(
                            attempts = attempts.len(),
                            kind = %classification.kind,
                            "Retry budget exhausted"
                        );
                        trace.error(
                            TraceStep::Failed,
                            format!(
                                "Giving up after {} attempts: {} ({})",
                                attempts.len(),
                                classification.kind,
                                classification.analysis
                            ),
                        );
                        Step::Exhausted(classification)
                    } else {
                        tracing::warn!(
                            attempt = attempts.len(),
                            kind = %classification.kind,
                            "Attempt failed, retrying"
                        );
                        trace.retry(
                            TraceStep::Retry,
                            format!(
                                "Attempt {} failed: {} ({})",
                                attempts.len(),
                                classification.kind,
                                classification.analysis
                            ),
                        );

                        let fixed = classification
                            .fix
                            .as_ref()
                            .and_then(|fix| apply_fix(&failure.query, fix).map(|q| (q, fix.clone())));

                        match fixed {
                            Some((query, fix)) => Step::DeterministicFix { query, fix },
                            None => Step::Regenerating {
                                failure,
                                classification,
                            },
                        }
                    }
                }

                Step::DeterministicFix { query, fix } => {
                    trace.retry(TraceStep::Fix, format!("{} without regenerating", describe_fix(&fix)));
                    Step::Validating(GeneratedQuery {
                        query,
                        reasoning: None,
                    })
                }

                Step::Regenerating {
                    failure,
                    classification,
                } => {
                    let directive = self.directive(&failure, &classification, &mut request.schema);
                    trace.retry(
                        TraceStep::Regenerate,
                        match &directive.join_table {
                            Some(table) => format!("Regenerating with a JOIN on {}", table),
                            None => "Regenerating with the error as context".to_string(),
                        },
                    );
                    request.directive = Some(directive);
                    Step::Generating
                }

                Step::Success(generated, rows) => {
                    return CorrectionReport {
                        outcome: CorrectionOutcome::Success {
                            query: generated.query,
                            reasoning: generated.reasoning,
                            rows,
                        },
                        attempts,
                        path,
                    }
                }

                Step::Exhausted(last_error) => {
                    return CorrectionReport {
                        outcome: CorrectionOutcome::Exhausted { last_error },
                        attempts,
                        path,
                    }
                }

                Step::Aborted(reason) => {
                    return CorrectionReport {
                        outcome: CorrectionOutcome::Aborted { reason },
                        attempts,
                        path,
                    }
                }
            };
        }
    }

    async fn generate(&self, request: &GenerationRequest, attempt: usize, trace: &mut Trace) -> Step {
        let limit = self.policy.generation_timeout_ms;
        let result =
            tokio::time::timeout(Duration::from_millis(limit), self.generator.generate(request)).await;

        match result {
            Ok(Ok(generated)) => {
                trace.complete(
                    TraceStep::Generation,
                    format!("Generated query (attempt {})", attempt + 1),
                );
                tracing::debug!(attempt, query = %generated.query, "Generated query");
                Step::Validating(generated)
            }
            Ok(Err(GenerationError::Unavailable(reason))) => {
                tracing::error!(%reason, "Text generation unavailable");
                trace.error(TraceStep::Generation, format!("Generator unavailable: {}", reason));
                Step::Aborted(NlsqlError::from(GenerationError::Unavailable(reason)).to_string())
            }
            Ok(Err(GenerationError::Malformed(detail))) => {
                trace.error(TraceStep::Generation, format!("Unusable completion: {}", detail));
                Step::Classifying(Failure {
                    stage: AttemptStage::Generation,
                    query: String::new(),
                    classification: Some(ErrorClassification::generation_failed(&detail)),
                    error: detail,
                })
            }
            Err(_) => {
                let classification = ErrorClassification::generation_timeout(limit);
                trace.error(TraceStep::Generation, classification.analysis.clone());
                Step::Classifying(Failure {
                    stage: AttemptStage::Generation,
                    query: String::new(),
                    error: classification.analysis.clone(),
                    classification: Some(classification),
                })
            }
        }
    }

    /// Build the regeneration directive. A required join also widens the
    /// projected schema with the join table.
    fn directive(
        &self,
        failure: &Failure,
        classification: &ErrorClassification,
        projection: &mut SchemaView,
    ) -> RetryDirective {
        let mut fk_edges = Vec::new();

        if let Some(table) = classification.join_table.as_deref() {
            for (from, fk) in edges_touching(self.schema, table) {
                fk_edges.push(format!(
                    "{}.{} → {}.{}",
                    from, fk.column, fk.target_table, fk.target_column
                ));
            }
            if let Some(info) = self.schema.table(table) {
                projection.tables.insert(table.to_string(), info.clone());
            }
        }

        RetryDirective {
            failed_query: failure.query.clone(),
            error: failure.error.clone(),
            analysis: classification.analysis.clone(),
            fix_hint: classification.fix_hint.clone(),
            join_table: classification.join_table.clone(),
            fk_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::ErrorKind;
    use crate::intent::{plan, PlannerConfig};
    use crate::schema::test_support::chinook;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays scripted generator responses and records every request.
    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<GeneratedQuery, GenerationError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn new(queries: &[&str]) -> Self {
            Self::with_results(queries.iter().map(|q| Ok(GeneratedQuery::new(*q))).collect())
        }

        fn with_results(results: Vec<Result<GeneratedQuery, GenerationError>>) -> Self {
            Self {
                responses: Mutex::new(results.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedQuery, GenerationError> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Malformed("script exhausted".into())))
        }

        async fn summarize(&self, _: &str, _: &str, _: &QueryRows) -> Result<String, GenerationError> {
            Ok("summary".into())
        }

        fn description(&self) -> String {
            "scripted".into()
        }
    }

    /// Fails queries containing a configured fragment with the paired error.
    struct RuleExecutor {
        failures: Vec<(&'static str, &'static str)>,
        executed: Mutex<Vec<String>>,
    }

    impl RuleExecutor {
        fn new(failures: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                failures,
                executed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for RuleExecutor {
        async fn execute(&self, query: &str) -> Result<QueryRows, ExecutionError> {
            self.executed.lock().push(query.to_string());
            for (fragment, error) in &self.failures {
                if query.contains(fragment) {
                    return Err(ExecutionError::Query(error.to_string()));
                }
            }
            Ok(QueryRows::new(vec!["n".into()], vec![vec![json!(1)]]))
        }

        fn description(&self) -> String {
            "rules".into()
        }
    }

    struct OfflineExecutor;

    #[async_trait]
    impl QueryExecutor for OfflineExecutor {
        async fn execute(&self, _: &str) -> Result<QueryRows, ExecutionError> {
            Err(ExecutionError::Connection("database is locked".into()))
        }

        fn description(&self) -> String {
            "offline".into()
        }
    }

    fn request(schema: &SchemaView, question: &str) -> GenerationRequest {
        GenerationRequest {
            question: question.into(),
            context: None,
            plan: plan(question, schema, &PlannerConfig::default()),
            schema: schema.clone(),
            directive: None,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&["SELECT COUNT(*) FROM Track"]);
        let executor = RuleExecutor::new(vec![]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "How many tracks?"), &mut trace)
            .await;

        assert!(matches!(report.outcome, CorrectionOutcome::Success { .. }));
        assert_eq!(report.attempts.len(), 1);
        assert!(report.attempts[0].is_success());
        assert_eq!(
            report.path,
            vec![
                CorrectionState::Generating,
                CorrectionState::Validating,
                CorrectionState::Executing,
                CorrectionState::Success
            ]
        );
        assert_eq!(
            trace.steps(),
            vec![TraceStep::Generation, TraceStep::Validation, TraceStep::Execution]
        );
    }

    #[tokio::test]
    async fn test_deterministic_rename_skips_generation() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&["SELECT Nmae FROM Artist"]);
        let executor = RuleExecutor::new(vec![("Nmae", "no such column: Nmae")]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List artist names"), &mut trace)
            .await;

        match &report.outcome {
            CorrectionOutcome::Success { query, .. } => assert_eq!(query, "SELECT Name FROM Artist"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(generator.requests.lock().len(), 1);
        assert_eq!(report.attempts.len(), 2);
        assert!(report.path.contains(&CorrectionState::DeterministicFix));
        assert!(!report.path.contains(&CorrectionState::Regenerating));
    }

    #[tokio::test]
    async fn test_join_upgrade_regenerates_with_fk_edges() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&[
            "SELECT t.Name, t.Genre FROM Track t",
            "SELECT t.Name, g.Name FROM Track t JOIN Genre g ON t.GenreId = g.GenreId",
        ]);
        let executor = RuleExecutor::new(vec![("t.Genre ", "no such column: t.Genre")]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        // Start from a projection that lacks Genre
        let mut req = request(&schema, "List tracks and their genre");
        req.schema.tables.remove("Genre");

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(req, &mut trace)
            .await;

        assert!(matches!(report.outcome, CorrectionOutcome::Success { .. }));
        let requests = generator.requests.lock();
        assert_eq!(requests.len(), 2);
        let directive = requests[1].directive.as_ref().unwrap();
        assert_eq!(directive.join_table.as_deref(), Some("Genre"));
        assert!(directive
            .fk_edges
            .contains(&"Track.GenreId → Genre.GenreId".to_string()));
        assert!(requests[1].schema.table("Genre").is_some());
        assert!(trace.contains(TraceStep::Regenerate));
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&[
            "SELECT Foo FROM Track",
            "SELECT Foo FROM Track",
            "SELECT Foo FROM Track",
            "SELECT Foo FROM Track",
        ]);
        let executor = RuleExecutor::new(vec![("Foo", "something exploded")]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List tracks"), &mut trace)
            .await;

        match &report.outcome {
            CorrectionOutcome::Exhausted { last_error } => {
                assert_eq!(last_error.kind, ErrorKind::Unrecognized)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(report.attempts.len(), policy.max_attempts());
        assert_eq!(generator.requests.lock().len(), 3);
        let indices: Vec<usize> = report.attempts.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(trace.entries().last().map(|e| e.step), Some(TraceStep::Failed));
    }

    #[tokio::test]
    async fn test_rejected_query_is_never_executed() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&["DROP TABLE Track", "SELECT TrackId FROM Track"]);
        let executor = RuleExecutor::new(vec![]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List tracks"), &mut trace)
            .await;

        assert!(matches!(report.outcome, CorrectionOutcome::Success { .. }));
        assert_eq!(*executor.executed.lock(), vec!["SELECT TrackId FROM Track".to_string()]);
        assert_eq!(report.attempts[0].stage, AttemptStage::Validation);
    }

    #[tokio::test]
    async fn test_unavailable_generator_aborts() {
        let schema = chinook();
        let generator =
            ScriptedGenerator::with_results(vec![Err(GenerationError::Unavailable("503".into()))]);
        let executor = RuleExecutor::new(vec![]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List tracks"), &mut trace)
            .await;

        match &report.outcome {
            CorrectionOutcome::Aborted { reason } => {
                assert_eq!(reason, "Generation error: Text generation unavailable: 503");
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(report.attempts.is_empty());
        assert!(executor.executed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_lost_database_aborts_after_one_attempt() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&["SELECT Name FROM Track"]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &OfflineExecutor, &schema, &policy)
            .run(request(&schema, "List tracks"), &mut trace)
            .await;

        match &report.outcome {
            CorrectionOutcome::Aborted { reason } => assert_eq!(
                reason,
                "Execution error: Database unavailable: database is locked"
            ),
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].error(), Some("database is locked"));
    }

    #[tokio::test]
    async fn test_malformed_completion_is_retried() {
        let schema = chinook();
        let generator = ScriptedGenerator::with_results(vec![
            Err(GenerationError::Malformed("no query".into())),
            Ok(GeneratedQuery::new("SELECT Name FROM Genre")),
        ]);
        let executor = RuleExecutor::new(vec![]);
        let policy = RetryPolicy::default();
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List genres"), &mut trace)
            .await;

        assert!(matches!(report.outcome, CorrectionOutcome::Success { .. }));
        assert_eq!(report.attempts[0].stage, AttemptStage::Generation);
        let directive = generator.requests.lock()[1].directive.clone().unwrap();
        assert!(directive.analysis.contains("no usable query"));
    }

    #[tokio::test]
    async fn test_zero_retries_allows_one_attempt() {
        let schema = chinook();
        let generator = ScriptedGenerator::new(&["SELECT Foo FROM Track", "SELECT 1"]);
        let executor = RuleExecutor::new(vec![("Foo", "boom")]);
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let mut trace = Trace::new();

        let report = SelfCorrection::new(&generator, &executor, &schema, &policy)
            .run(request(&schema, "List tracks"), &mut trace)
            .await;

        assert!(matches!(report.outcome, CorrectionOutcome::Exhausted { .. }));
        assert_eq!(report.attempts.len(), 1);
    }
}

//! The per-turn entry point tying detection, planning and correction together.

pub mod answer;
pub mod context;
pub mod session;
pub mod trace;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correction::{CorrectionOutcome, ErrorKind, ExecutionAttempt, RetryPolicy, SelfCorrection};
use crate::error::NlsqlError;
use crate::executor::{QueryExecutor, QueryRows};
use crate::intent::{
    chat, detect, detect_chat, detect_meta, merge, meta_query, plan, ChatKind,
    ClarificationState, MetaKind, MetaTable, PlannerConfig, QueryPlan, Question,
};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::schema::refiner::{refine_schema, RefineConfig};

pub use answer::{fallback_answer, NO_ROWS_ANSWER};
pub use context::{build_context, strip_context};
pub use session::{ConversationMemory, Role, SessionState};
pub use trace::{Trace, TraceEntry, TraceStatus, TraceStep};

/// Tunables for one [`Pipeline`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub refine: RefineConfig,
    /// Exchanges of history handed to the generator
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

fn default_context_turns() -> usize {
    3
}

/// What a turn produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The question is ambiguous; the next turn is read as the reply.
    Clarification {
        question: String,
        term: String,
        options: Vec<String>,
        trace: Trace,
    },
    /// Greeting or help request answered without a query.
    Chat {
        kind: ChatKind,
        reply: String,
        trace: Trace,
    },
    MetaAnswer {
        kind: MetaKind,
        summary: String,
        table: MetaTable,
        trace: Trace,
    },
    QueryResult {
        answer: String,
        query: String,
        reasoning: Option<String>,
        rows: QueryRows,
        plan: QueryPlan,
        attempts: Vec<ExecutionAttempt>,
        trace: Trace,
    },
    Failure {
        reason: String,
        attempts: Vec<ExecutionAttempt>,
        trace: Trace,
    },
}

impl TurnOutcome {
    pub fn trace(&self) -> &Trace {
        match self {
            Self::Clarification { trace, .. }
            | Self::Chat { trace, .. }
            | Self::MetaAnswer { trace, .. }
            | Self::QueryResult { trace, .. }
            | Self::Failure { trace, .. } => trace,
        }
    }

    pub fn attempts(&self) -> &[ExecutionAttempt] {
        match self {
            Self::QueryResult { attempts, .. } | Self::Failure { attempts, .. } => attempts,
            _ => &[],
        }
    }

    /// Main user-facing text of the outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::Clarification { question, .. } => question,
            Self::Chat { reply, .. } => reply,
            Self::MetaAnswer { summary, .. } => summary,
            Self::QueryResult { answer, .. } => answer,
            Self::Failure { reason, .. } => reason,
        }
    }
}

pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    executor: Arc<dyn QueryExecutor>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        executor: Arc<dyn QueryExecutor>,
        config: PipelineConfig,
    ) -> Self {
        tracing::debug!(
            generator = %generator.description(),
            executor = %executor.description(),
            max_retries = config.retry.max_retries,
            "Pipeline ready"
        );
        Self {
            generator,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one user turn.
    pub async fn process(&self, input: &str, session: &mut SessionState) -> TurnOutcome {
        let mut trace = Trace::new();
        let text = strip_context(input);

        if text.is_empty() {
            trace.error(TraceStep::Analyze, "Empty question");
            return TurnOutcome::Failure {
                reason: NlsqlError::EmptyQuestion.to_string(),
                attempts: Vec::new(),
                trace,
            };
        }

        tracing::info!(session = %session.id, turn_id = %trace.turn_id, "Processing turn");
        trace.complete(TraceStep::Analyze, "Analyzing question");
        let schema = Arc::clone(&session.schema);

        // Chat and meta turns leave a pending clarification in place
        if let Some(kind) = detect_chat(text) {
            let reply = chat::reply(kind, &schema);
            trace.complete(TraceStep::Answer, format!("Answered without a query ({:?})", kind));
            trace.complete(TraceStep::Done, "Done");
            session.memory.push_user(text);
            session.memory.push_system(reply.clone());
            tracing::info!(turn_id = %trace.turn_id, ?kind, "Chat turn answered");
            return TurnOutcome::Chat { kind, reply, trace };
        }

        if let Some(meta) = detect_meta(text, &schema) {
            let answer = meta_query::answer(&meta, &schema);
            trace.complete(
                TraceStep::Schema,
                format!("Answered from schema metadata ({:?})", answer.kind),
            );
            trace.complete(TraceStep::Done, "Done");
            session.memory.push_user(text);
            session.memory.push_system(answer.summary.clone());
            tracing::info!(turn_id = %trace.turn_id, kind = ?answer.kind, "Meta-query answered");
            return TurnOutcome::MetaAnswer {
                kind: answer.kind,
                summary: answer.summary,
                table: answer.table,
                trace,
            };
        }

        // A merged reply skips detection: one clarification round per question
        let question = match session.clarification.take() {
            Some(pending) => {
                let term = pending.finding.term.clone();
                let merged = merge(pending, text);
                trace.complete(
                    TraceStep::Merge,
                    format!("Resolved '{}': {}", term, merged.text()),
                );
                merged
            }
            None => {
                let question = Question::new(text);
                if let Some(finding) = detect(question.text(), &schema) {
                    trace.complete(
                        TraceStep::Ambiguity,
                        format!("Ambiguous term '{}' needs clarification", finding.term),
                    );
                    session.memory.push_user(text);
                    session.memory.push_system(finding.prompt.clone());
                    tracing::info!(turn_id = %trace.turn_id, term = %finding.term, "Asking for clarification");
                    let outcome = TurnOutcome::Clarification {
                        question: finding.prompt.clone(),
                        term: finding.term.clone(),
                        options: finding.options.clone(),
                        trace,
                    };
                    session.clarification = Some(ClarificationState::new(question, finding));
                    return outcome;
                }
                question
            }
        };

        let resolved = question.text();
        let context = build_context(&session.memory, self.config.context_turns);
        session.memory.push_user(resolved);

        let projection = refine_schema(&schema, resolved, &self.config.refine);
        trace.complete(
            TraceStep::Schema,
            format!(
                "Using {} of {} tables: {}",
                projection.tables.len(),
                schema.tables.len(),
                projection.table_names().collect::<Vec<_>>().join(", ")
            ),
        );
        let edges = projection.foreign_key_edges().len();
        trace.complete(
            TraceStep::Relationships,
            format!("{} foreign key relationships in scope", edges),
        );

        let query_plan = plan(resolved, &schema, &self.config.planner);
        trace.complete(
            TraceStep::Planning,
            format!(
                "Intent {:?}, tables [{}]",
                query_plan.intent,
                query_plan.tables.join(", ")
            ),
        );
        trace.complete(
            TraceStep::Complexity,
            format!("Complexity: {}", query_plan.complexity),
        );

        let request = GenerationRequest {
            question: resolved.to_string(),
            context,
            plan: query_plan.clone(),
            schema: projection,
            directive: None,
        };

        let report = SelfCorrection::new(
            self.generator.as_ref(),
            self.executor.as_ref(),
            &schema,
            &self.config.retry,
        )
        .run(request, &mut trace)
        .await;

        match report.outcome {
            CorrectionOutcome::Success {
                query,
                reasoning,
                rows,
            } => {
                let answer = self.answer(resolved, &query, &rows, &mut trace).await;
                trace.complete(TraceStep::Done, "Done");
                session.memory.push_system(answer.clone());
                tracing::info!(
                    turn_id = %trace.turn_id,
                    rows = rows.len(),
                    attempts = report.attempts.len(),
                    "Turn answered"
                );
                TurnOutcome::QueryResult {
                    answer,
                    query,
                    reasoning,
                    rows,
                    plan: query_plan,
                    attempts: report.attempts,
                    trace,
                }
            }
            CorrectionOutcome::Exhausted { last_error } => {
                let reason = format!(
                    "Could not produce a working query after {} attempts ({}). Last error: {}",
                    report.attempts.len(),
                    ErrorKind::RetriesExhausted,
                    last_error.analysis
                );
                session.memory.push_system(reason.clone());
                TurnOutcome::Failure {
                    reason,
                    attempts: report.attempts,
                    trace,
                }
            }
            CorrectionOutcome::Aborted { reason } => {
                trace.error(TraceStep::Failed, reason.clone());
                session.memory.push_system(reason.clone());
                TurnOutcome::Failure {
                    reason,
                    attempts: report.attempts,
                    trace,
                }
            }
        }
    }

    async fn answer(&self, question: &str, query: &str, rows: &QueryRows, trace: &mut Trace) -> String {
        if rows.is_empty() {
            trace.complete(TraceStep::Answer, "No rows matched");
            return NO_ROWS_ANSWER.to_string();
        }

        let limit = Duration::from_millis(self.config.retry.generation_timeout_ms);
        match tokio::time::timeout(limit, self.generator.summarize(question, query, rows)).await {
            Ok(Ok(summary)) => {
                trace.complete(TraceStep::Answer, "Summarized results");
                summary
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Summary failed, using template answer");
                trace.complete(TraceStep::Answer, "Built answer from rows");
                fallback_answer(question, rows)
            }
            Err(_) => {
                tracing::warn!("Summary timed out, using template answer");
                trace.complete(TraceStep::Answer, "Built answer from rows");
                fallback_answer(question, rows)
            }
        }
    }
}

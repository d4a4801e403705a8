//! End-to-end turns through `Pipeline::process` with scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{pipeline, session, RuleExecutor, ScriptedGenerator};
use nlsql_lib::correction::{AttemptStage, RetryPolicy};
use nlsql_lib::intent::{ChatKind, MetaKind};
use nlsql_lib::llm::{GeneratedQuery, GenerationError};
use nlsql_lib::pipeline::{TraceStatus, TraceStep, NO_ROWS_ANSWER};
use nlsql_lib::{PipelineConfig, TurnOutcome};

#[tokio::test]
async fn test_clarification_then_merged_reply() {
    let generator = Arc::new(ScriptedGenerator::new(&[
        "SELECT * FROM Invoice WHERE InvoiceDate >= date('now', '-30 days')",
    ]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let first = pipeline.process("Show me recent orders", &mut session).await;
    match &first {
        TurnOutcome::Clarification {
            term, options, question, ..
        } => {
            assert_eq!(term, "recent");
            assert!(options.contains(&"last 7 days".to_string()));
            assert!(options.contains(&"last 30 days".to_string()));
            assert!(question.contains("last 30 days"));
        }
        other => panic!("expected clarification, got {:?}", other),
    }
    assert!(first.trace().contains(TraceStep::Ambiguity));
    assert!(session.awaiting_clarification());
    assert_eq!(generator.request_count(), 0);
    assert_eq!(executor.executed_count(), 0);

    let second = pipeline.process("last 30 days", &mut session).await;
    assert!(
        matches!(second, TurnOutcome::QueryResult { .. }),
        "unexpected outcome: {:?}",
        second
    );
    assert!(!session.awaiting_clarification());
    assert!(second.trace().contains(TraceStep::Merge));
    assert!(!second.trace().contains(TraceStep::Ambiguity));

    let requests = generator.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].question.contains("last 30 days"));
    assert!(!requests[0].question.contains("recent"));
}

#[tokio::test]
async fn test_meta_query_skips_collaborators() {
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline
        .process("What tables are in this database?", &mut session)
        .await;

    match &outcome {
        TurnOutcome::MetaAnswer { kind, table, .. } => {
            assert_eq!(*kind, MetaKind::ListTables);
            assert_eq!(table.rows.len(), 6);
        }
        other => panic!("expected meta answer, got {:?}", other),
    }
    assert_eq!(generator.request_count(), 0);
    assert_eq!(generator.summary_count(), 0);
    assert_eq!(executor.executed_count(), 0);
    assert_eq!(outcome.trace().steps().last(), Some(&TraceStep::Done));
}

#[tokio::test]
async fn test_greeting_answered_without_query() {
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("Hello!", &mut session).await;

    match &outcome {
        TurnOutcome::Chat { kind, reply, .. } => {
            assert_eq!(*kind, ChatKind::Greeting);
            assert!(reply.contains("Track"));
        }
        other => panic!("expected chat reply, got {:?}", other),
    }
    assert_eq!(generator.request_count(), 0);
    assert_eq!(executor.executed_count(), 0);
    assert_eq!(session.memory.len(), 2);
}

#[tokio::test]
async fn test_destructive_query_never_executes() {
    let generator = Arc::new(ScriptedGenerator::repeating("DROP TABLE Track", 3));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    match &outcome {
        TurnOutcome::Failure { attempts, reason, .. } => {
            assert_eq!(attempts.len(), 3);
            assert!(attempts.iter().all(|a| a.stage == AttemptStage::Validation));
            assert!(reason.contains("after 3 attempts"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(executor.executed_count(), 0);
    assert_eq!(generator.request_count(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_after_budget() {
    let generator = Arc::new(ScriptedGenerator::repeating("SELECT COUNT(*) FROM Track", 5));
    let executor = Arc::new(RuleExecutor::new(vec![("Track", "disk I/O error")]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    assert!(matches!(outcome, TurnOutcome::Failure { .. }));
    assert_eq!(outcome.attempts().len(), 3);
    assert_eq!(executor.executed_count(), 3);
    assert!(outcome.message().contains("retries_exhausted"));

    let trace = outcome.trace();
    let retries = trace
        .entries()
        .iter()
        .filter(|e| e.status == TraceStatus::Retry && e.step == TraceStep::Retry)
        .count();
    assert_eq!(retries, 2);
    assert_eq!(trace.steps().last(), Some(&TraceStep::Failed));
}

#[tokio::test]
async fn test_missing_join_regenerates_with_join_table() {
    let generator = Arc::new(ScriptedGenerator::new(&[
        "SELECT t.Name, t.Genre FROM Track t",
        "SELECT t.Name, g.Name FROM Track t JOIN Genre g ON t.GenreId = g.GenreId",
    ]));
    let executor = Arc::new(RuleExecutor::new(vec![(
        "t.Genre FROM",
        "no such column: t.Genre",
    )]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline
        .process("Show track names with their genre", &mut session)
        .await;

    match &outcome {
        TurnOutcome::QueryResult { query, attempts, .. } => {
            assert!(query.contains("JOIN Genre"));
            assert_eq!(attempts.len(), 2);
            assert!(!attempts[0].is_success());
            assert!(attempts[1].is_success());
        }
        other => panic!("expected query result, got {:?}", other),
    }

    let requests = generator.requests.lock();
    assert_eq!(requests.len(), 2);
    let directive = requests[1].directive.as_ref().expect("retry carries a directive");
    assert_eq!(directive.join_table.as_deref(), Some("Genre"));
    assert!(directive
        .fk_edges
        .iter()
        .any(|e| e == "Track.GenreId → Genre.GenreId"));
    assert!(requests[1].schema.tables.contains_key("Genre"));
    assert!(outcome.trace().contains(TraceStep::Regenerate));
}

#[tokio::test]
async fn test_empty_result_skips_summary() {
    let generator = Arc::new(ScriptedGenerator::new(&[
        "SELECT Name FROM Artist WHERE Name = 'Nobody'",
    ]));
    let executor = Arc::new(RuleExecutor::returning(&["Name"], vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline
        .process("Which artists are named Nobody?", &mut session)
        .await;

    match &outcome {
        TurnOutcome::QueryResult { answer, rows, attempts, .. } => {
            assert_eq!(answer, NO_ROWS_ANSWER);
            assert!(rows.is_empty());
            assert_eq!(attempts.len(), 1);
        }
        other => panic!("expected query result, got {:?}", other),
    }
    assert_eq!(generator.summary_count(), 0);
}

#[tokio::test]
async fn test_summary_failure_falls_back_to_template() {
    let generator = Arc::new(
        ScriptedGenerator::new(&["SELECT COUNT(*) FROM Track"])
            .with_summary(Err(GenerationError::Unavailable("rate limited".into()))),
    );
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    assert!(matches!(outcome, TurnOutcome::QueryResult { .. }));
    assert_eq!(outcome.message(), "There are **3,503** matching records.");
    assert_eq!(generator.summary_count(), 1);
}

#[tokio::test]
async fn test_execution_timeout_is_an_attempt() {
    let generator = Arc::new(ScriptedGenerator::new(&["SELECT COUNT(*) FROM Track"]));
    let executor = Arc::new(RuleExecutor::slow(Duration::from_millis(500)));
    let config = PipelineConfig {
        retry: RetryPolicy {
            max_retries: 0,
            execution_timeout_ms: 20,
            ..RetryPolicy::default()
        },
        ..PipelineConfig::default()
    };
    let pipeline = pipeline(&generator, &executor, config);
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    assert!(matches!(outcome, TurnOutcome::Failure { .. }));
    let attempts = outcome.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].stage, AttemptStage::Execution);
    assert!(attempts[0].error().unwrap_or_default().contains("20ms"));
}

#[tokio::test]
async fn test_generator_outage_aborts_without_attempts() {
    let generator = Arc::new(ScriptedGenerator::with_results(vec![Err(
        GenerationError::Unavailable("connection refused".into()),
    )]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    match &outcome {
        TurnOutcome::Failure { reason, attempts, trace } => {
            assert!(reason.contains("connection refused"));
            assert!(attempts.is_empty());
            assert_eq!(trace.steps().last(), Some(&TraceStep::Failed));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(generator.request_count(), 1);
    assert_eq!(executor.executed_count(), 0);
}

#[tokio::test]
async fn test_malformed_completion_is_retried() {
    let generator = Arc::new(ScriptedGenerator::with_results(vec![
        Err(GenerationError::Malformed("no SQL found".into())),
        Ok(GeneratedQuery::new("SELECT COUNT(*) FROM Track")),
    ]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("How many tracks are there?", &mut session).await;

    assert!(matches!(outcome, TurnOutcome::QueryResult { .. }));
    let attempts = outcome.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].stage, AttemptStage::Generation);
}

#[tokio::test]
async fn test_context_carries_previous_turn() {
    let generator = Arc::new(ScriptedGenerator::new(&[
        "SELECT COUNT(*) FROM Track",
        "SELECT COUNT(*) FROM Album",
    ]));
    let executor = Arc::new(RuleExecutor::returning(&["COUNT(*)"], vec![vec![json!(347)]]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    pipeline.process("How many tracks are there?", &mut session).await;
    let enriched = "Conversation context:\nUser: How many tracks are there?\n\nCurrent question: And albums?";
    pipeline.process(enriched, &mut session).await;

    let requests = generator.requests.lock();
    assert!(requests[0].context.is_none());
    assert_eq!(requests[1].question, "And albums?");
    let context = requests[1].context.as_deref().unwrap_or_default();
    assert!(context.contains("User: How many tracks are there?"));
    assert!(context.contains("System: Here is what I found."));
}

#[tokio::test]
async fn test_empty_question_fails_fast() {
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let executor = Arc::new(RuleExecutor::new(vec![]));
    let pipeline = pipeline(&generator, &executor, PipelineConfig::default());
    let mut session = session();

    let outcome = pipeline.process("   ", &mut session).await;

    assert!(matches!(outcome, TurnOutcome::Failure { .. }));
    assert_eq!(outcome.message(), "Question cannot be empty");
    assert_eq!(generator.request_count(), 0);
}

#[test]
fn test_outcome_serializes_with_type_tag() {
    let outcome = TurnOutcome::Failure {
        reason: "nope".into(),
        attempts: Vec::new(),
        trace: nlsql_lib::pipeline::Trace::new(),
    };
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["type"], "failure");
    assert_eq!(value["reason"], "nope");
}

//! Narrows a [`SchemaView`] to the tables relevant to one question.
//!
//! Seed tables are scored by keyword hits (table name weighs 3, each column
//! name 1), the best `top_k` are expanded along foreign keys, and columns of
//! non-seed tables are pruned to the ones the question mentions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{names_match, FkGraph, SchemaView};

/// Configuration for schema projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Whether projection runs at all; when false the full view is used
    #[serde(default = "default_refine")]
    pub refine: bool,

    /// Number of seed tables kept after scoring
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Foreign-key hops followed from the seeds
    #[serde(default = "default_fk_hops")]
    pub fk_hops: usize,
}

fn default_refine() -> bool {
    true
}

fn default_top_k() -> usize {
    3
}

fn default_fk_hops() -> usize {
    1
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            refine: default_refine(),
            top_k: default_top_k(),
            fk_hops: default_fk_hops(),
        }
    }
}

const TABLE_WEIGHT: usize = 3;
const COLUMN_WEIGHT: usize = 1;

fn keywords(question: &str) -> Vec<String> {
    question
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn mentions(keywords: &[String], identifier: &str) -> bool {
    keywords.iter().any(|k| names_match(k, identifier))
}

/// Return a disposable narrowed copy of `schema` for `question`.
pub fn refine_schema(schema: &SchemaView, question: &str, config: &RefineConfig) -> SchemaView {
    if !config.refine || schema.is_empty() {
        return schema.clone();
    }

    let words = keywords(question);

    let mut scored: Vec<(&str, usize)> = schema
        .tables
        .iter()
        .map(|(name, info)| {
            let mut score = 0;
            if mentions(&words, name) {
                score += TABLE_WEIGHT;
            }
            score += info
                .columns
                .iter()
                .filter(|c| mentions(&words, c))
                .count()
                * COLUMN_WEIGHT;
            (name.as_str(), score)
        })
        .filter(|(_, score)| *score > 0)
        .collect();

    let seeds: Vec<String> = if scored.is_empty() {
        schema.table_names().take(config.top_k).map(String::from).collect()
    } else {
        // Stable sort keeps table-name order for equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
            .into_iter()
            .take(config.top_k)
            .map(|(name, _)| name.to_string())
            .collect()
    };

    let graph = FkGraph::build(schema);
    let expanded = graph.expand(&seeds, config.fk_hops);

    let mut tables = BTreeMap::new();
    for name in expanded {
        let Some(info) = schema.table(&name) else {
            continue;
        };
        let mut info = info.clone();
        if !seeds.contains(&name) {
            let relevant: Vec<String> = info
                .columns
                .iter()
                .filter(|c| mentions(&words, c))
                .cloned()
                .collect();
            if !relevant.is_empty() {
                info.columns = relevant;
            }
        }
        tables.insert(name, info);
    }

    tracing::debug!(
        seeds = ?seeds,
        tables = tables.len(),
        "Refined schema for question"
    );

    SchemaView::new(tables)
}

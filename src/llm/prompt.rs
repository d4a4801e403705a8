//! Prompt construction for query generation and answer summaries.

use crate::correction::RetryDirective;
use crate::executor::QueryRows;
use crate::intent::{Complexity, QueryPlan};
use crate::schema::SchemaView;

use super::GenerationRequest;

/// System prompt for query generation
pub const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert at translating questions about a relational database into SQLite queries.

## Rules
- Generate ONE read-only query: SELECT or WITH ... SELECT
- Never use INSERT, UPDATE, DELETE, DROP, ALTER or CREATE
- Use only the tables and columns listed in the schema
- Never use SELECT *; name the columns you need
- No SQL comments and no markdown fences
- Qualify column names when joining (c.CustomerId, not CustomerId)
- Handle NULLs with IS NULL / IS NOT NULL

## Patterns
- "has", "with": EXISTS or INNER JOIN
- "only", "every": NOT EXISTS to exclude the other cases
- "never", "without": NOT EXISTS or LEFT JOIN ... IS NULL
- "both X and Y": GROUP BY ... HAVING COUNT(DISTINCT ...) = 2, or INTERSECT
- "top", "most": ORDER BY ... DESC with LIMIT

## Format
REASONING:
- Entity: what is being queried
- Constraints: conditions that must hold
- Pattern: the SQL pattern used

SQL:
<the query>"#;

/// System prompt for answer summaries
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are a helpful data analyst. Answer the user's question from the query results in two or three sentences. Use the actual numbers and names from the results and bold the key figures. Do not describe the SQL."#;

fn complexity_guide(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => {
            "This is a simple query:\n- Use a single SELECT statement\n- Apply basic WHERE conditions"
        }
        Complexity::Moderate => {
            "This is a moderate query:\n- Use JOINs to connect related tables\n- Pair aggregations with GROUP BY\n- Use table aliases\n- Consider ORDER BY and LIMIT"
        }
        Complexity::Complex => {
            "This is a complex query:\n- Consider subqueries or CTEs for multi-step logic\n- For \"never\"/\"without\", use NOT EXISTS or LEFT JOIN with a NULL check\n- Compare against averages with a scalar subquery"
        }
        Complexity::MultiStep => {
            "This is a multi-step query:\n- Use CTEs (WITH clause) to break down the logic\n- One CTE per condition, then combine them in the final SELECT\n- For \"both X and Y\", INTERSECT the per-condition results"
        }
    }
}

/// `Table: X` blocks with typed columns, key markers and FK lines.
pub fn format_schema(schema: &SchemaView) -> String {
    let mut lines = Vec::new();
    for (name, info) in &schema.tables {
        lines.push(format!("Table: {}", name));

        let columns: Vec<String> = info
            .columns
            .iter()
            .map(|col| {
                let pk = if info.primary_key.contains(col) { " [PK]" } else { "" };
                match info.column_types.get(col).filter(|t| !t.is_empty()) {
                    Some(ty) => format!("{} ({}){}", col, ty, pk),
                    None => format!("{}{}", col, pk),
                }
            })
            .collect();
        lines.push(format!("  Columns: {}", columns.join(", ")));

        if !info.foreign_keys.is_empty() {
            let fks: Vec<String> = info
                .foreign_keys
                .iter()
                .map(|fk| format!("{} → {}.{}", fk.column, fk.target_table, fk.target_column))
                .collect();
            lines.push(format!("  Foreign Keys: {}", fks.join(", ")));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

/// Flag concepts and the column-name words that signal them.
const FLAG_CONCEPTS: &[(&str, &[&str])] = &[
    ("discontinued", &["discontinued"]),
    ("active", &["active"]),
    ("status", &["status"]),
    ("shipped", &["shipped"]),
    ("completed", &["completed", "complete"]),
    ("enabled", &["enabled"]),
    ("verified", &["verified"]),
    ("deleted", &["deleted"]),
    ("archived", &["archived"]),
    ("published", &["published"]),
];

/// `IsActive` -> [is, active], `is_shipped` -> [is, shipped]
fn name_words(column: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in column.chars() {
        if !c.is_alphanumeric() {
            prev_lower = false;
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn flag_guidance(concept: &str, ty: &str) -> String {
    let upper = ty.to_uppercase();
    if upper.contains("BOOL") {
        format!("BOOLEAN flag: TRUE = {concept}, FALSE = not {concept}")
    } else if upper.contains("INT") {
        format!("INTEGER flag: 1 = {concept}, 0 = not {concept}")
    } else if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
        "TEXT flag: infer the stored values from context (e.g. 'active'/'inactive', 'Y'/'N')"
            .to_string()
    } else {
        format!("{} column: check how {} is represented before filtering on it", ty, concept)
    }
}

/// Guidance for columns that encode yes/no or status concepts, keyed on
/// each column's declared type. `None` when the schema has no such column.
pub fn value_inference(schema: &SchemaView) -> Option<String> {
    let mut flags = Vec::new();
    for (table, info) in &schema.tables {
        for column in &info.columns {
            let words = name_words(column);
            let Some((concept, _)) = FLAG_CONCEPTS
                .iter()
                .find(|(_, keys)| keys.iter().any(|k| words.iter().any(|w| w == k)))
            else {
                continue;
            };
            let ty = info
                .column_types
                .get(column)
                .map(String::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or("UNKNOWN");
            flags.push(format!(
                "- {}.{} ({}): {}",
                table,
                column,
                ty,
                flag_guidance(concept, ty)
            ));
        }
    }
    if flags.is_empty() {
        return None;
    }
    Some(format!(
        "## Value inference\nFlag-like columns in the schema:\n{}\n\n\
         Do not hardcode values like 0, 1, 'Y' or 'N' without inferring them from the column type, \
         and state the inference in REASONING.",
        flags.join("\n")
    ))
}

pub fn format_plan(plan: &QueryPlan) -> String {
    let mut lines = vec![
        format!("Intent: {}", format!("{:?}", plan.intent).to_uppercase()),
        format!("Complexity: {}", plan.complexity),
    ];
    if !plan.tables.is_empty() {
        lines.push(format!("Tables: {}", plan.tables.join(", ")));
    }
    if plan.needs_join {
        lines.push("Join Required: Yes".to_string());
    }
    if let Some(agg) = plan.aggregation {
        lines.push(format!("Aggregation: {}", agg.as_sql()));
    }
    if plan.grouping {
        lines.push(format!(
            "Group By: {}",
            plan.group_by.as_deref().unwrap_or("yes")
        ));
    }
    if let Some(order) = plan.sorting {
        lines.push(format!("Sorting: {}", order.as_sql()));
    }
    if let Some(limit) = plan.limit {
        lines.push(format!("Limit: {}", limit));
    }
    if plan.distinct {
        lines.push("Distinct: Yes".to_string());
    }
    if plan.negation {
        lines.push("Negation: Yes".to_string());
    }
    if plan.subquery_needed {
        lines.push("Subquery: Yes".to_string());
    }
    if !plan.filter_hints.is_empty() {
        let hints: Vec<&str> = plan.filter_hints.iter().take(3).map(String::as_str).collect();
        lines.push(format!("Filters: {}", hints.join(", ")));
    }
    if !plan.reasoning.is_empty() {
        lines.push(String::new());
        lines.push("Reasoning:".to_string());
        for (i, step) in plan.reasoning.iter().take(5).enumerate() {
            lines.push(format!("  {}. {}", i + 1, step));
        }
    }
    lines.join("\n")
}

fn format_retry(directive: &RetryDirective) -> String {
    let mut section = format!(
        "## Previous attempt (failed)\nQuery:\n{}\n\nError:\n{}\n\nAnalysis:\n{}",
        directive.failed_query, directive.error, directive.analysis
    );
    if let Some(hint) = &directive.fix_hint {
        section.push_str(&format!("\n\nHint:\n{}", hint));
    }
    if let Some(table) = &directive.join_table {
        section.push_str(&format!(
            "\n\nIMPORTANT: JOIN the {} table to access its columns.",
            table
        ));
    }
    if !directive.fk_edges.is_empty() {
        section.push_str("\n\nRelevant foreign keys:");
        for edge in &directive.fk_edges {
            section.push_str(&format!("\n  {}", edge));
        }
    }
    section.push_str("\n\nAvoid the same mistake and use only the listed tables and columns.");
    section
}

/// User prompt for one generation attempt.
pub fn generation_prompt(request: &GenerationRequest) -> String {
    let mut sections = Vec::new();

    if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
        sections.push(format!("## Conversation so far\n{}", context));
    }
    sections.push(format!("## Database schema\n{}", format_schema(&request.schema)));
    if let Some(guidance) = value_inference(&request.schema) {
        sections.push(guidance);
    }
    sections.push(format!("## Query plan\n{}", format_plan(&request.plan)));
    sections.push(complexity_guide(request.plan.complexity).to_string());
    if let Some(directive) = &request.directive {
        sections.push(format_retry(directive));
    }
    sections.push(format!("## Question\n{}", request.question));
    sections.push("REASONING:".to_string());

    sections.join("\n\n")
}

/// User prompt for the answer summary. Only a preview of the rows is sent.
pub fn summary_prompt(question: &str, query: &str, rows: &QueryRows) -> String {
    format!(
        "## Question\n{}\n\n## Query\n{}\n\n## Results ({} rows{})\n{}",
        question,
        query,
        rows.len(),
        if rows.truncated { ", truncated" } else { "" },
        rows.preview(20)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{plan, PlannerConfig};
    use crate::schema::test_support::chinook;

    #[test]
    fn test_format_schema_lists_keys() {
        let schema = chinook();
        let text = format_schema(&schema);
        assert!(text.contains("Table: Track"));
        assert!(text.contains("TrackId (INTEGER) [PK]"));
        assert!(text.contains("Foreign Keys: AlbumId → Album.AlbumId, GenreId → Genre.GenreId"));
    }

    fn flagged_schema() -> SchemaView {
        let mut schema = chinook();
        let track = schema.tables.get_mut("Track").unwrap();
        for (column, ty) in [("Discontinued", "INTEGER"), ("is_published", "BOOLEAN")] {
            track.columns.push(column.to_string());
            track.column_types.insert(column.to_string(), ty.to_string());
        }
        let invoice = schema.tables.get_mut("Invoice").unwrap();
        invoice.columns.push("ShippingStatus".to_string());
        invoice
            .column_types
            .insert("ShippingStatus".to_string(), "VARCHAR(20)".to_string());
        schema
    }

    #[test]
    fn test_value_inference_by_type() {
        let text = value_inference(&flagged_schema()).unwrap();
        assert!(text.starts_with("## Value inference"));
        assert!(text.contains("- Track.Discontinued (INTEGER): INTEGER flag: 1 = discontinued, 0 = not discontinued"));
        assert!(text.contains("- Track.is_published (BOOLEAN): BOOLEAN flag: TRUE = published"));
        assert!(text.contains("- Invoice.ShippingStatus (VARCHAR(20)): TEXT flag"));
    }

    #[test]
    fn test_value_inference_skips_plain_schemas() {
        // BillingCountry, UnitPrice and friends carry no flag words
        assert_eq!(value_inference(&chinook()), None);
        assert_eq!(name_words("IsActive"), vec!["is", "active"]);
        assert_eq!(name_words("is_shipped"), vec!["is", "shipped"]);
    }

    #[test]
    fn test_generation_prompt_carries_value_inference() {
        let schema = flagged_schema();
        let request = GenerationRequest {
            question: "How many discontinued tracks are there?".into(),
            context: None,
            plan: plan("How many discontinued tracks are there?", &schema, &PlannerConfig::default()),
            schema,
            directive: None,
        };
        let prompt = generation_prompt(&request);
        let schema_at = prompt.find("## Database schema").unwrap();
        let inference_at = prompt.find("## Value inference").unwrap();
        let plan_at = prompt.find("## Query plan").unwrap();
        assert!(schema_at < inference_at && inference_at < plan_at);
    }

    #[test]
    fn test_format_plan() {
        let schema = chinook();
        let p = plan("Top 5 customers by total spend", &schema, &PlannerConfig::default());
        let text = format_plan(&p);
        assert!(text.starts_with("Intent: "));
        assert!(text.contains("Limit: 5"));
        assert!(text.contains("Tables: Customer"));
    }

    #[test]
    fn test_retry_section_included() {
        let schema = chinook();
        let request = GenerationRequest {
            question: "List tracks with their genre".into(),
            context: None,
            plan: plan("List tracks with their genre", &schema, &PlannerConfig::default()),
            schema: schema.clone(),
            directive: Some(RetryDirective {
                failed_query: "SELECT t.Genre FROM Track t".into(),
                error: "no such column: t.Genre".into(),
                analysis: "Genre is a table".into(),
                fix_hint: Some("JOIN Genre".into()),
                join_table: Some("Genre".into()),
                fk_edges: vec!["Track.GenreId → Genre.GenreId".into()],
            }),
        };
        let prompt = generation_prompt(&request);
        assert!(prompt.contains("## Previous attempt (failed)"));
        assert!(prompt.contains("JOIN the Genre table"));
        assert!(prompt.contains("  Track.GenreId → Genre.GenreId"));
        assert!(prompt.ends_with("REASONING:"));
    }
}

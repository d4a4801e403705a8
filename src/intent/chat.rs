//! Greetings and help requests, answered without generation or execution.

use super::patterns::{ChatKind, CHAT_PHRASINGS};
use crate::schema::SchemaView;

/// Classify a whole question as a chat turn.
pub fn detect_chat(question: &str) -> Option<ChatKind> {
    let q = question.trim();
    if q.is_empty() {
        return None;
    }
    CHAT_PHRASINGS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(q)))
        .map(|(kind, _)| *kind)
}

fn example_table(schema: &SchemaView) -> &str {
    schema
        .tables
        .iter()
        .max_by_key(|(_, info)| info.row_count)
        .map(|(name, _)| name.as_str())
        .unwrap_or("a table")
}

/// Reply text for a chat turn, mentioning what the loaded database holds.
pub fn reply(kind: ChatKind, schema: &SchemaView) -> String {
    let tables: Vec<&str> = schema.table_names().collect();
    match kind {
        ChatKind::Greeting => format!(
            "Hello! Ask me a question about this database ({} tables: {}) and I will look it up.",
            tables.len(),
            tables.join(", ")
        ),
        ChatKind::Help => {
            let example = example_table(schema);
            format!(
                "I answer questions about this database in plain language by writing \
                 and running read-only SQL.\n\
                 - Data questions: \"How many rows are in {example}?\", \"Top 5 ... by ...\"\n\
                 - Schema questions: \"What tables are there?\", \"Describe the {example} table\", \
                 \"Show the relationships\"\n\
                 - If a question is vague (\"recent\", \"top\"), I will ask what you mean first."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::chinook;

    #[test]
    fn test_detect_chat() {
        assert_eq!(detect_chat("Hello!"), Some(ChatKind::Greeting));
        assert_eq!(detect_chat("  good morning "), Some(ChatKind::Greeting));
        assert_eq!(detect_chat("What can you do?"), Some(ChatKind::Help));
        assert_eq!(detect_chat("help"), Some(ChatKind::Help));
    }

    #[test]
    fn test_data_questions_are_not_chat() {
        assert_eq!(detect_chat("help me find the top customers"), None);
        assert_eq!(detect_chat("hi, how many tracks are there?"), None);
        assert_eq!(detect_chat("Which artists say hello in a title?"), None);
        assert_eq!(detect_chat(""), None);
    }

    #[test]
    fn test_replies_mention_schema() {
        let schema = chinook();
        let greeting = reply(ChatKind::Greeting, &schema);
        assert!(greeting.contains("7 tables"));
        assert!(greeting.contains("InvoiceLine"));

        let help = reply(ChatKind::Help, &schema);
        assert!(help.contains("Describe the Track table"));
    }
}

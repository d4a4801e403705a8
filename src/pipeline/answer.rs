//! Template answers built from rows when no summary is available.

use serde_json::Value;

use crate::executor::{display_value, QueryRows};

/// Fixed answer for a query that matched nothing.
pub const NO_ROWS_ANSWER: &str = "No rows matched your question.";

const NAME_HINTS: &[&str] = &["name", "title", "artist", "customer"];

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{}{}", sign, out)
}

/// Numbers with thousands separators (two decimals for floats).
pub fn format_number(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or_default();
            let fixed = format!("{:.2}", f);
            match fixed.split_once('.') {
                Some((int, frac)) => format!("{}.{}", group_thousands(int), frac),
                None => fixed,
            }
        }
        Value::Number(n) => group_thousands(&n.to_string()),
        other => display_value(other),
    }
}

/// `InvoiceDate` -> `Invoice Date`, `unit_price` -> `Unit Price`
fn readable_column(column: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in column.chars() {
        if c == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_lowercase();
        out.push(c);
    }
    out.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar_answer(value: &Value, column: &str, question: &str) -> String {
    if value.is_null() {
        return "The result is **NULL** (no value found).".to_string();
    }
    let col = column.to_lowercase();
    let q = question.to_lowercase();
    let formatted = format_number(value);
    let has = |needle: &str| col.contains(needle) || q.contains(needle);

    if has("count") || q.contains("how many") {
        return match value.as_i64() {
            Some(0) => "The count is **0**: no matching records found.".to_string(),
            Some(1) => "There is **1** matching record.".to_string(),
            _ => format!("There are **{}** matching records.", formatted),
        };
    }
    if has("sum") || has("total") {
        return format!("The total is **{}**.", formatted);
    }
    if has("avg") || has("average") {
        return format!("The average is **{}**.", formatted);
    }
    if has("min") || q.contains("lowest") {
        return format!("The minimum value is **{}**.", formatted);
    }
    if has("max") || q.contains("highest") {
        return format!("The maximum value is **{}**.", formatted);
    }
    format!("The result is **{}**.", formatted)
}

fn name_index(columns: &[String]) -> usize {
    columns
        .iter()
        .position(|c| {
            let c = c.to_lowercase();
            NAME_HINTS.iter().any(|h| c.contains(h))
        })
        .unwrap_or(0)
}

/// Answer text derived from the rows alone.
pub fn fallback_answer(question: &str, rows: &QueryRows) -> String {
    if rows.is_empty() {
        return NO_ROWS_ANSWER.to_string();
    }
    if let (Some(value), Some(column)) = (rows.scalar(), rows.columns.first()) {
        return scalar_answer(value, column, question);
    }

    if rows.len() == 1 {
        let details: Vec<String> = rows
            .columns
            .iter()
            .zip(&rows.rows[0])
            .map(|(col, val)| format!("**{}**: {}", readable_column(col), format_number(val)))
            .collect();
        return format!("Found **1 result**:\n\n{}", details.join("  \n"));
    }

    let mut answer = format!(
        "Found **{} results**.",
        group_thousands(&rows.len().to_string())
    );

    let q = question.to_lowercase();
    if rows.columns.len() >= 2 {
        let first = &rows.rows[0];
        let name = first.get(name_index(&rows.columns)).map(display_value);
        if let Some(name) = name {
            if ["top", "best", "highest", "most"].iter().any(|w| q.contains(w)) {
                answer.push_str(&format!(" The top result is **{}**.", name));
            } else if ["least", "lowest", "worst", "fewest"].iter().any(|w| q.contains(w)) {
                answer.push_str(&format!(" The lowest is **{}**.", name));
            }
        }
    }
    if rows.truncated {
        answer.push_str(" *(Results were truncated)*");
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> QueryRows {
        QueryRows::new(columns.iter().map(|c| c.to_string()).collect(), data)
    }

    #[test]
    fn test_scalar_count() {
        let r = rows(&["COUNT(*)"], vec![vec![json!(3503)]]);
        assert_eq!(
            fallback_answer("How many tracks are there?", &r),
            "There are **3,503** matching records."
        );
    }

    #[test]
    fn test_scalar_total_and_average() {
        let r = rows(&["Revenue"], vec![vec![json!(2328.6)]]);
        assert_eq!(fallback_answer("What is the total revenue?", &r), "The total is **2,328.60**.");

        let r = rows(&["AVG(UnitPrice)"], vec![vec![json!(1.05)]]);
        assert_eq!(fallback_answer("average price", &r), "The average is **1.05**.");
    }

    #[test]
    fn test_single_row() {
        let r = rows(&["FirstName", "InvoiceDate"], vec![vec![json!("Luís"), json!("2021-01-01")]]);
        assert_eq!(
            fallback_answer("who", &r),
            "Found **1 result**:\n\n**First Name**: Luís  \n**Invoice Date**: 2021-01-01"
        );
    }

    #[test]
    fn test_multi_row_top_result() {
        let r = rows(
            &["Total", "Name"],
            vec![vec![json!(10), json!("Iron Maiden")], vec![json!(5), json!("U2")]],
        );
        assert_eq!(
            fallback_answer("top artists by sales", &r),
            "Found **2 results**. The top result is **Iron Maiden**."
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("-1000"), "-1,000");
        assert_eq!(group_thousands("999"), "999");
    }
}

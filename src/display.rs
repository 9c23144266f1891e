//! Console rendering: section banners and result text.

use crate::runner::QueryResult;
use serde::Serialize;
use std::fmt::Display;

const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";
const RULE_WIDTH: usize = 52;

/// Cyan section header: a rule of `#`, the text, another rule.
#[must_use]
pub fn banner(text: &str) -> String {
    let rule = "#".repeat(RULE_WIDTH);
    format!("{CYAN}{rule}\n{text}\n{rule}\n{RESET}")
}

fn summary<S: Serialize + std::fmt::Debug>(report: &S) -> String {
    serde_json::to_string(report).unwrap_or_else(|e| {
        log::warn!("cannot serialize {report:?}: {e}");
        format!("{report:?}")
    })
}

/// Text form of a result: one document per line, `[]` when empty, `null` when absent,
/// counts as numbers and write summaries as compact JSON.
#[must_use]
pub fn render<M: Display>(result: &QueryResult<M>) -> String {
    match result {
        QueryResult::Documents(docs) if docs.is_empty() => "[]".to_string(),
        QueryResult::Documents(docs) => docs.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"),
        QueryResult::Document(Some(doc)) => doc.to_string(),
        QueryResult::Document(None) => "null".to_string(),
        QueryResult::Count(n) => n.to_string(),
        QueryResult::Updated(report) => summary(report),
        QueryResult::Deleted(report) => summary(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;
    use crate::query::{DeleteReport, UpdateReport};

    #[test]
    fn banner_wraps_text_in_cyan_rules() {
        let b = banner("Find all the notes");
        let rule = "#".repeat(52);
        assert_eq!(b, format!("\x1b[36m{rule}\nFind all the notes\n{rule}\n\x1b[0m"));
    }

    #[test]
    fn renders_absent_and_empty_results() {
        assert_eq!(render::<Note>(&QueryResult::Document(None)), "null");
        assert_eq!(render::<Note>(&QueryResult::Documents(Vec::new())), "[]");
        assert_eq!(render::<Note>(&QueryResult::Count(20)), "20");
    }

    #[test]
    fn renders_summaries_as_compact_json() {
        let updated = QueryResult::<Note>::Updated(UpdateReport { acknowledged: true, matched: 6, modified: 5 });
        assert_eq!(render(&updated), r#"{"acknowledged":true,"matchedCount":6,"modifiedCount":5}"#);
        let deleted = QueryResult::<Note>::Deleted(DeleteReport { acknowledged: true, deleted: 3 });
        assert_eq!(render(&deleted), r#"{"acknowledged":true,"deletedCount":3}"#);
    }
}

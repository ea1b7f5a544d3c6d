use std::collections::BTreeSet;

use crate::vcs::Author;

/// Message of a sync commit: a summary line naming the project and the
/// updated locales, then one `Co-authored-by` trailer per distinct
/// translator, sorted.
pub fn commit_message(
    prefix: &str,
    project: &str,
    locales: &BTreeSet<String>,
    co_authors: &BTreeSet<Author>,
) -> String {
    let locales = locales.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    let mut msg = format!("{prefix}: Update {project} ({locales})");
    if !co_authors.is_empty() {
        msg.push_str("\n\n");
        let trailers: Vec<String> = co_authors
            .iter()
            .map(|a| format!("Co-authored-by: {}", a.signature()))
            .collect();
        msg.push_str(&trailers.join("\n"));
    }
    msg.push('\n');
    msg
}

/// The commit author: the translator with the most recent change, or the
/// bot when no human contributed.
pub(crate) fn commit_author(authors: &[(String, Author)], bot: &Author) -> Author {
    authors
        .iter()
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, a)| a.clone())
        .unwrap_or_else(|| bot.clone())
}

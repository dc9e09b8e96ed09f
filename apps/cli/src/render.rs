use std::fmt::Write as _;

use client_core::{SessionPhase, SessionSnapshot, View};

pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    if !snapshot.message.is_empty() {
        let _ = writeln!(out, "{}", snapshot.message);
    }
    if snapshot.view != View::Articles || snapshot.phase != SessionPhase::LoggedIn {
        return out;
    }
    if snapshot.articles.is_empty() {
        let _ = writeln!(out, "No articles available");
        return out;
    }
    for article in &snapshot.articles {
        let marker = if snapshot.edit_target == Some(article.id) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{marker}[{}] {} ({})\n    {}",
            article.id, article.title, article.topic, article.text
        );
    }
    out
}

//! Display cleanup for model-written Markdown.
//!
//! The analysis text stored in [`crate::output::AnalysisResult`] is kept
//! exactly as the model returned it; these rules only run when a report is
//! rendered. They fix transport artefacts (CRLF, zero-width characters) and
//! the usual formatting slips of chat models: wrapping the whole answer in a
//! ```` ```markdown ```` fence and emitting result tables without the GFM
//! header separator.

use once_cell::sync::Lazy;
use regex::Regex;

type Rule = fn(&str) -> String;

/// Cleanup passes, applied in order. Fences go first so later rules see the
/// real first and last lines.
const RULES: &[(&str, Rule)] = &[
    ("unwrap_fence", unwrap_fence),
    ("line_endings", line_endings),
    ("strip_invisible", strip_invisible),
    ("trailing_whitespace", trailing_whitespace),
    ("table_separators", table_separators),
    ("blank_runs", blank_runs),
    ("final_newline", final_newline),
];

/// Apply every cleanup rule to `input`.
pub fn clean_markdown(input: &str) -> String {
    RULES
        .iter()
        .fold(input.to_string(), |text, (_, rule)| rule(&text))
}

static RE_WRAPPING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn unwrap_fence(input: &str) -> String {
    match RE_WRAPPING_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_invisible(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

fn trailing_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end());
    }
    out
}

/// Insert a `| --- |` row under a table header that lacks one.
fn table_separators(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 2);

    for (i, line) in lines.iter().enumerate() {
        out.push(line.to_string());

        let is_header = is_pipe_row(line)
            && !is_separator(line)
            && (i == 0 || !is_pipe_row(lines[i - 1]));
        if !is_header {
            continue;
        }
        if let Some(next) = lines.get(i + 1) {
            if is_pipe_row(next) && !is_separator(next) {
                let cols = line.trim().trim_matches('|').split('|').count();
                out.push(format!("|{}", " --- |".repeat(cols.max(1))));
            }
        }
    }

    out.join("\n")
}

fn is_pipe_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// At most one blank line between blocks.
fn blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn final_newline(input: &str) -> String {
    let body = input.trim_end();
    let mut out = String::with_capacity(body.len() + 1);
    out.push_str(body);
    out.push('\n');
    out
}

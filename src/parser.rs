// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Shell command parser.
//!
//! Turns a source string into an ordered list of [`Segment`] values, one per
//! command between the shell operators `|`, `||`, `&&`, and `;`. Before
//! splitting, the bodies of `$(...)`, backtick pairs, process substitutions
//! `<(...)`/`>(...)`, and interpreter heredocs are lifted and appended to the
//! source joined by `;`, so embedded commands become ordinary segments that
//! every analyzer sees.
//!
//! The parser is deliberately lossy: arithmetic expansion, parameter
//! expansion flags, functions, and loops carry no risk signal and are
//! tokenized as plain text. The only fatal error is the input length cap --
//! unmatched quotes and parentheses are handled best-effort by taking the
//! remaining text as the content.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Commands longer than this are rejected outright.
pub const MAX_COMMAND_LEN: usize = 10_000;

/// Interpreters whose heredoc bodies are executable code and therefore
/// lifted. A heredoc fed to anything else (`cat <<EOF`) is plain data.
const HEREDOC_INTERPRETERS: &[&str] = &[
    "bash", "sh", "zsh", "dash", "python", "python3", "node", "ruby", "perl",
];

/// Shell operator that follows a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainOperator {
    Pipe,
    Or,
    And,
    Semicolon,
}

impl fmt::Display for ChainOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainOperator::Pipe => write!(f, "|"),
            ChainOperator::Or => write!(f, "||"),
            ChainOperator::And => write!(f, "&&"),
            ChainOperator::Semicolon => write!(f, ";"),
        }
    }
}

/// Output redirect kind: `>>` appends, `>` truncates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RedirectKind {
    Append,
    Truncate,
}

/// An output redirect stripped from a segment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub kind: RedirectKind,
    /// Redirect target with tilde already expanded
    pub target: String,
}

/// One parsed command segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// First token; empty only for pathological inputs (e.g. a bare redirect)
    pub verb: String,
    /// Tokens after the verb, tildes expanded
    pub args: Vec<String>,
    /// The operator that *follows* this segment; `None` for the terminal
    /// segment in a chain
    pub operator: Option<ChainOperator>,
    /// Redirects stripped from the segment body
    pub redirects: Vec<Redirect>,
    /// Trimmed pre-tokenization text; analyzers run regex scans against this
    pub raw: String,
    /// Zero-based index within the flattened segment list
    pub position: usize,
}

/// Parse a command string into segments.
///
/// `home` is the user's home directory, used for tilde expansion of args and
/// redirect targets at parse time. The only error is the length cap; every
/// other malformed input parses best-effort.
pub fn parse(command: &str, home: &str) -> Result<Vec<Segment>> {
    if command.len() > MAX_COMMAND_LEN {
        bail!(
            "command exceeds the maximum length of {} characters",
            MAX_COMMAND_LEN
        );
    }

    // Lift embedded command bodies and append them joined by ';' so they
    // become ordinary segments downstream.
    let mut bodies: Vec<String> = Vec::new();
    collect_embedded(command, &mut bodies);
    collect_heredocs(command, &mut bodies);

    let mut full = command.trim().to_string();
    for body in &bodies {
        let body = body.trim();
        if !body.is_empty() {
            full.push_str("; ");
            full.push_str(body);
        }
    }

    let mut segments = Vec::new();
    for (text, operator) in split_operators(&full) {
        let raw = text.trim().to_string();
        if raw.is_empty() {
            continue;
        }
        let (body, redirects) = extract_redirects(&raw, home);
        let tokens = tokenize(&body);
        let verb = tokens.first().cloned().unwrap_or_default();
        let args: Vec<String> = tokens
            .iter()
            .skip(1)
            .map(|t| expand_tilde(t, home))
            .collect();
        let position = segments.len();
        segments.push(Segment {
            verb,
            args,
            operator,
            redirects,
            raw,
            position,
        });
    }

    Ok(segments)
}

/// Expand a standalone `~` or a `~/` prefix to the home directory.
pub fn expand_tilde(token: &str, home: &str) -> String {
    if token == "~" {
        home.to_string()
    } else if let Some(rest) = token.strip_prefix("~/") {
        format!("{}/{}", home.trim_end_matches('/'), rest)
    } else {
        token.to_string()
    }
}

/// Recursively collect the bodies of `$(...)`, backtick pairs, and process
/// substitutions `<(...)`/`>(...)` in discovery order.
fn collect_embedded(source: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if (c == '$' || c == '<' || c == '>') && chars.get(i + 1) == Some(&'(') {
            let (body, end) = balanced_parens(&chars, i + 1);
            out.push(body.clone());
            collect_embedded(&body, out);
            i = end + 1;
            continue;
        }
        if c == '`' {
            let close = chars[i + 1..].iter().position(|&ch| ch == '`');
            let (body, next): (String, usize) = match close {
                Some(off) => (chars[i + 1..i + 1 + off].iter().collect(), i + off + 2),
                // Unmatched backtick: take the rest of the string.
                None => (chars[i + 1..].iter().collect(), chars.len()),
            };
            out.push(body.clone());
            collect_embedded(&body, out);
            i = next;
            continue;
        }
        i += 1;
    }
}

/// Extract the body of a balanced parenthesis group starting at `open`
/// (which must index a `(`). Returns the body and the index of the closing
/// paren. An unmatched group takes the remaining text as its body.
fn balanced_parens(chars: &[char], open: usize) -> (String, usize) {
    let mut depth = 0i32;
    let mut j = open;
    while j < chars.len() {
        match chars[j] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (chars[open + 1..j].iter().collect(), j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    (chars[open + 1..].iter().collect(), chars.len().saturating_sub(1))
}

static HEREDOC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<<-?\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).expect("heredoc regex")
});

/// Collect interpreter heredoc bodies. The verb is the first token of the
/// command portion preceding the `<<` marker; only verbs in the fixed
/// interpreter set have their bodies lifted.
fn collect_heredocs(source: &str, out: &mut Vec<String>) {
    for caps in HEREDOC_RE.captures_iter(source) {
        let m = caps.get(0).expect("heredoc match");
        let delim = caps.get(1).map(|g| g.as_str()).unwrap_or("");

        let before = &source[..m.start()];
        let cmd_start = before
            .rfind(|c| matches!(c, ';' | '|' | '&' | '(' | '\n'))
            .map(|p| p + 1)
            .unwrap_or(0);
        let verb = before[cmd_start..].split_whitespace().next().unwrap_or("");
        let verb = verb.rsplit('/').next().unwrap_or(verb);
        if !HEREDOC_INTERPRETERS.contains(&verb) {
            continue;
        }

        // Body runs from the line after the marker to the delimiter line,
        // or to end of input for an unterminated heredoc.
        let Some(nl) = source[m.end()..].find('\n') else {
            continue;
        };
        let body_start = m.end() + nl + 1;
        let mut body_lines = Vec::new();
        for line in source[body_start..].lines() {
            if line.trim() == delim {
                break;
            }
            body_lines.push(line);
        }
        if !body_lines.is_empty() {
            out.push(body_lines.join("\n"));
        }
    }
}

/// Split on shell operators, tracking single/double quote state with `\`
/// escaping outside quotes. Two-character operators are matched before
/// single-character ones.
fn split_operators(input: &str) -> Vec<(String, Option<ChainOperator>)> {
    let chars: Vec<char> = input.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !in_single && !in_double && c == '\\' {
            current.push(c);
            if let Some(&next) = chars.get(i + 1) {
                current.push(next);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if c == '\'' && !in_double {
            in_single = !in_single;
            current.push(c);
            i += 1;
            continue;
        }
        if c == '"' && !in_single {
            in_double = !in_double;
            current.push(c);
            i += 1;
            continue;
        }
        if !in_single && !in_double {
            if c == '&' && chars.get(i + 1) == Some(&'&') {
                pieces.push((std::mem::take(&mut current), Some(ChainOperator::And)));
                i += 2;
                continue;
            }
            if c == '|' && chars.get(i + 1) == Some(&'|') {
                pieces.push((std::mem::take(&mut current), Some(ChainOperator::Or)));
                i += 2;
                continue;
            }
            if c == '|' {
                pieces.push((std::mem::take(&mut current), Some(ChainOperator::Pipe)));
                i += 1;
                continue;
            }
            if c == ';' {
                pieces.push((std::mem::take(&mut current), Some(ChainOperator::Semicolon)));
                i += 1;
                continue;
            }
        }
        current.push(c);
        i += 1;
    }
    pieces.push((current, None));
    pieces
}

/// Extract `>`/`>>` redirects from a segment body, honoring the same quote
/// rules as tokenization (a quoted `>` is data). Returns the body with the
/// redirect text removed, plus the recorded redirects with tildes expanded.
fn extract_redirects(text: &str, home: &str) -> (String, Vec<Redirect>) {
    let chars: Vec<char> = text.chars().collect();
    let mut redirects = Vec::new();
    let mut body = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !in_single && !in_double && c == '\\' {
            body.push(c);
            if let Some(&next) = chars.get(i + 1) {
                body.push(next);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if c == '\'' && !in_double {
            in_single = !in_single;
            body.push(c);
            i += 1;
            continue;
        }
        if c == '"' && !in_single {
            in_double = !in_double;
            body.push(c);
            i += 1;
            continue;
        }
        if !in_single && !in_double && c == '>' {
            let kind = if chars.get(i + 1) == Some(&'>') {
                i += 2;
                RedirectKind::Append
            } else {
                i += 1;
                RedirectKind::Truncate
            };
            while chars.get(i).is_some_and(|ch| ch.is_whitespace()) {
                i += 1;
            }
            let mut target = String::new();
            while let Some(&ch) = chars.get(i) {
                if ch.is_whitespace() || ch == '>' {
                    break;
                }
                target.push(ch);
                i += 1;
            }
            if !target.is_empty() {
                redirects.push(Redirect {
                    kind,
                    target: expand_tilde(&target, home),
                });
            }
            continue;
        }
        body.push(c);
        i += 1;
    }
    (body, redirects)
}

/// Split a segment body on whitespace, respecting quotes. Quote characters
/// are removed from tokens; backslash outside quotes escapes the next char.
fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                current.push(c);
            }
            i += 1;
            continue;
        }
        if in_double {
            if c == '"' {
                in_double = false;
            } else {
                current.push(c);
            }
            i += 1;
            continue;
        }
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    current.push(next);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            '\'' => {
                in_single = true;
                i += 1;
            }
            '"' => {
                in_double = true;
                i += 1;
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

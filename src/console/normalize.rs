//! Rewrites `ClassName.verb(args)` into the canonical `verb ClassName id args`.
//!
//! The heuristics are loose on purpose and kept that way for compatibility:
//! every `"` is removed from the id (so `""` becomes an empty id), and
//! commas are dropped from positional arguments even when they sit inside a
//! quoted value.

use super::args::parse_mapping;
use super::command::Verb;

/// Normalize one input line.
///
/// Lines without a `.`, a `(` and a `)` pass through unchanged, and so does
/// any line that doesn't parse as a dot-call.
pub fn normalize(line: &str) -> String {
    if !(line.contains('.') && line.contains('(') && line.contains(')')) {
        return line.to_string();
    }
    rewrite(line).unwrap_or_else(|| line.to_string())
}

fn rewrite(line: &str) -> Option<String> {
    let dot = line.find('.')?;
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if open < dot || close < open {
        return None;
    }

    let class = &line[..dot];
    let verb = &line[dot + 1..open];
    Verb::parse(verb).filter(Verb::is_dot_verb)?;

    let inner = &line[open + 1..close];
    let mut id = String::new();
    let mut args = String::new();

    if !inner.is_empty() {
        let (head, tail) = inner.split_once(", ").unwrap_or((inner, ""));
        id = head.replace('"', "");

        let tail = tail.trim();
        if !tail.is_empty() {
            args = if tail.starts_with('{') && tail.ends_with('}') {
                // a brace literal that isn't a mapping aborts the rewrite
                parse_mapping(tail)?;
                tail.to_string()
            } else {
                tail.replace(',', "")
            };
        }
    }

    Some([verb, class, id.as_str(), args.as_str()].join(" "))
}

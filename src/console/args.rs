//! Argument parsing for console commands.

use serde_json::{Number, Value};
use tracing::warn;

use crate::models::{ModelClass, Record};

/// Split off the first whitespace-delimited word.
pub fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

/// Split on whitespace, keeping double-quoted runs together.
///
/// Quotes are stripped; `\"` inside a quoted run is a literal quote. An
/// unterminated quote runs to the end of the text.
pub fn split_args(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.peek() == Some(&'"') => {
                        token.push('"');
                        chars.next();
                    }
                    '"' => break,
                    c => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Parse a brace-delimited mapping literal such as
/// `{'first_name': "John", "age": 89}`.
///
/// Keys must be quoted strings. Values are quoted strings, integers or
/// floats. Returns `None` if the text isn't such a mapping.
pub fn parse_mapping(text: &str) -> Option<Vec<(String, Value)>> {
    let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut scanner = Scanner::new(inner);
    let mut pairs = Vec::new();

    loop {
        scanner.skip_whitespace();
        if scanner.at_end() {
            break;
        }
        let key = match scanner.literal()? {
            Value::String(key) => key,
            _ => return None,
        };
        scanner.skip_whitespace();
        scanner.expect(':')?;
        scanner.skip_whitespace();
        let value = scanner.literal()?;
        pairs.push((key, value));

        scanner.skip_whitespace();
        match scanner.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }

    Some(pairs)
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Option<()> {
        (self.next()? == want).then_some(())
    }

    fn literal(&mut self) -> Option<Value> {
        match self.peek()? {
            quote @ ('\'' | '"') => {
                self.pos += 1;
                let mut s = String::new();
                loop {
                    match self.next()? {
                        '\\' => s.push(self.next()?),
                        c if c == quote => break,
                        c => s.push(c),
                    }
                }
                Some(Value::String(s))
            }
            _ => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && c != ',' && c != ':')
                {
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                parse_number(&raw)
            }
        }
    }
}

/// Integer if it parses as one, otherwise float.
fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::from(i));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Parse one `key=value` parameter of `create`.
///
/// `"..."` values are strings with `\"` unescaped and `_` read as a space.
/// Declared fields take their declared type; undeclared bare values must be
/// numeric. Anything else is skipped.
pub fn parse_create_param(class: ModelClass, param: &str) -> Option<(String, Value)> {
    let (key, raw) = param.split_once('=')?;
    if key.is_empty() || Record::is_reserved(key) {
        return None;
    }

    let declared = class.field_type(key);
    let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let text = raw[1..raw.len() - 1].replace("\\\"", "\"").replace('_', " ");
        match declared {
            Some(ty) => ty.parse(&text)?,
            None => Value::String(text),
        }
    } else {
        match declared {
            Some(ty) => ty.parse(raw)?,
            None if raw.contains('.') => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)?,
            None => Value::from(raw.parse::<i64>().ok()?),
        }
    };

    Some((key.to_string(), value))
}

/// Parse every `create` parameter, logging the ones that are skipped.
pub fn parse_create_params(class: ModelClass, params: &str) -> Vec<(String, Value)> {
    params
        .split_whitespace()
        .filter_map(|param| {
            let parsed = parse_create_param(class, param);
            if parsed.is_none() {
                warn!(%class, param, "skipping create parameter");
            }
            parsed
        })
        .collect()
}

/// Coerce a positional `update` value: declared fields take their declared
/// type, everything else stays a string.
pub fn coerce_text(class: ModelClass, name: &str, raw: &str) -> Option<Value> {
    match class.field_type(name) {
        Some(ty) => ty.parse(raw),
        None => Some(Value::String(raw.to_string())),
    }
}

/// Coerce a mapping `update` value: declared fields take their declared
/// type, everything else keeps the type it was written with.
pub fn coerce_value(class: ModelClass, name: &str, value: Value) -> Option<Value> {
    match class.field_type(name) {
        Some(ty) => ty.coerce(value),
        None => Some(value),
    }
}

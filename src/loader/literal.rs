//! Tolerant conversion of JavaScript object literals and Python dict literals into JSON.
//!
//! This is a token-level rewrite, not a parser for either language. It handles the
//! constructs that show up in hand-written metadata blocks: unquoted keys, single/back-tick/
//! triple-quoted strings, comments, trailing commas, `True`/`False`/`None`, tuples, numeric
//! separators and adjacent string concatenation. Anything that looks like a reference to a
//! variable or a call is replaced by `null` so the rest of the block still loads.

use crate::module::SourceLanguage;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiteralError {
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unterminated comment starting at offset {0}")]
    UnterminatedComment(usize),

    #[error("unexpected character '{ch}' at offset {offset}")]
    Unexpected { ch: char, offset: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("literal is not valid after normalization: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a literal block written in `language` into a JSON value.
pub fn parse_literal(text: &str, language: SourceLanguage) -> Result<Value, LiteralError> {
    let json = normalize(text, language)?;
    Ok(serde_json::from_str(&json)?)
}

/// Byte length of the bracketed block starting at `source[start..]`, which must begin with
/// `{`, `[` or `(`. Brackets inside strings and comments are ignored. Returns `None` if the
/// block never closes.
pub fn balanced_span(source: &str, start: usize, language: SourceLanguage) -> Option<usize> {
    let indexed: Vec<(usize, char)> = source[start..].char_indices().collect();
    let chars: Vec<char> = indexed.iter().map(|(_, c)| *c).collect();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(indexed[i].0 + c.len_utf8());
                }
            }
            '"' | '\'' => {
                i = skip_string(&chars, i, language)?;
                continue;
            }
            '`' if language == SourceLanguage::TypeScript => {
                i = skip_string(&chars, i, language)?;
                continue;
            }
            '/' if language == SourceLanguage::TypeScript => {
                if let Some(next) = skip_js_comment(&chars, i) {
                    i = next?;
                    continue;
                }
            }
            '#' if language == SourceLanguage::Python => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Index just past the string opening at `chars[start]`.
fn skip_string(chars: &[char], start: usize, language: SourceLanguage) -> Option<usize> {
    let quote = chars[start];
    let triple = language == SourceLanguage::Python
        && chars.get(start + 1) == Some(&quote)
        && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if !triple {
                return Some(i + 1);
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// `Some(Some(next))` past a `//` or `/* */` comment, `Some(None)` for an unterminated block
/// comment, `None` when `chars[start]` does not open a comment.
fn skip_js_comment(chars: &[char], start: usize) -> Option<Option<usize>> {
    match chars.get(start + 1) {
        Some('/') => {
            let mut i = start + 2;
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            Some(Some(i))
        }
        Some('*') => {
            let mut i = start + 2;
            while i + 1 < chars.len() {
                if chars[i] == '*' && chars[i + 1] == '/' {
                    return Some(Some(i + 2));
                }
                i += 1;
            }
            Some(None)
        }
        _ => None,
    }
}

struct Normalizer {
    chars: Vec<char>,
    language: SourceLanguage,
    out: String,
    /// Start offset in `out` and decoded value of the previous token, when it was a string.
    last_string: Option<(usize, String)>,
    /// Open brackets, innermost last.
    groups: Vec<Group>,
}

struct Group {
    /// Offset of the `[` emitted for a Python `(`; `None` for braces and brackets.
    paren_at: Option<usize>,
    comma: bool,
}

/// Rewrite a literal into JSON text without parsing the result.
pub fn normalize(text: &str, language: SourceLanguage) -> Result<String, LiteralError> {
    let mut normalizer = Normalizer {
        chars: text.chars().collect(),
        language,
        out: String::with_capacity(text.len()),
        last_string: None,
        groups: Vec::new(),
    };
    normalizer.run()?;
    Ok(normalizer.out)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Normalizer {
    fn js(&self) -> bool {
        self.language == SourceLanguage::TypeScript
    }

    fn peek(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    fn run(&mut self) -> Result<(), LiteralError> {
        let mut i = 0;
        while i < self.chars.len() {
            let c = self.chars[i];

            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if let Some(next) = self.skip_comment(i)? {
                i = next;
                continue;
            }

            match c {
                '"' | '\'' => i = self.string(i, false)?,
                '`' if self.js() => i = self.string(i, false)?,
                '{' | '[' => {
                    self.groups.push(Group {
                        paren_at: None,
                        comma: false,
                    });
                    self.emit(c);
                    i += 1;
                }
                '(' if !self.js() => {
                    self.groups.push(Group {
                        paren_at: Some(self.out.len()),
                        comma: false,
                    });
                    self.emit('[');
                    i += 1;
                }
                '}' | ']' => {
                    self.groups.pop();
                    self.trim_trailing_comma();
                    self.emit(c);
                    i += 1;
                }
                ')' if !self.js() => {
                    self.trim_trailing_comma();
                    match self.groups.pop() {
                        // (x) groups a single value; only (x,) and () are tuples
                        Some(Group {
                            paren_at: Some(open),
                            comma: false,
                        }) if self.out.len() > open + 1 => {
                            self.out.remove(open);
                            self.last_string = None;
                        }
                        _ => self.emit(']'),
                    }
                    i += 1;
                }
                ',' | ':' => {
                    if c == ',' {
                        if let Some(group) = self.groups.last_mut() {
                            group.comma = true;
                        }
                    }
                    self.emit(c);
                    i += 1;
                }
                '-' | '+' if self.peek(i + 1).map_or(false, is_ident_start) => {
                    // -Infinity, -math.inf: the sign has no JSON form once the value is null
                    i = self.identifier(i + 1)?;
                }
                '+' if self.last_string.is_some() => {
                    // "a" + "b" keeps the pending string open for concatenation
                    i += 1;
                }
                '.' if self.js() && self.peek(i + 1) == Some('.') && self.peek(i + 2) == Some('.') => {
                    i = self.skip_spread(i + 3)?;
                }
                c if c.is_ascii_digit()
                    || ((c == '-' || c == '+' || c == '.')
                        && self.peek(i + 1).map_or(false, |n| n.is_ascii_digit() || n == '.')) =>
                {
                    i = self.number(i)?;
                }
                c if is_ident_start(c) => i = self.identifier(i)?,
                _ => return Err(LiteralError::Unexpected { ch: c, offset: i }),
            }
        }
        Ok(())
    }

    fn emit(&mut self, c: char) {
        self.out.push(c);
        self.last_string = None;
    }

    fn emit_str(&mut self, s: &str) {
        self.out.push_str(s);
        self.last_string = None;
    }

    fn trim_trailing_comma(&mut self) {
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        if self.out.ends_with(',') {
            self.out.pop();
        }
    }

    /// `Ok(Some(next))` when a comment starts at `i`.
    fn skip_comment(&self, i: usize) -> Result<Option<usize>, LiteralError> {
        let c = self.chars[i];
        if self.js() && c == '/' {
            return match skip_js_comment(&self.chars, i) {
                Some(Some(next)) => Ok(Some(next)),
                Some(None) => Err(LiteralError::UnterminatedComment(i)),
                None => Ok(None),
            };
        }
        if !self.js() && c == '#' {
            let mut j = i + 1;
            while j < self.chars.len() && self.chars[j] != '\n' {
                j += 1;
            }
            return Ok(Some(j));
        }
        Ok(None)
    }

    fn next_significant(&self, mut i: usize) -> Option<char> {
        while i < self.chars.len() {
            if self.chars[i].is_whitespace() {
                i += 1;
                continue;
            }
            match self.skip_comment(i) {
                Ok(Some(next)) => i = next,
                Ok(None) => return Some(self.chars[i]),
                Err(_) => return None,
            }
        }
        None
    }

    fn string(&mut self, start: usize, raw: bool) -> Result<usize, LiteralError> {
        let quote = self.chars[start];
        let triple = !self.js()
            && self.peek(start + 1) == Some(quote)
            && self.peek(start + 2) == Some(quote);
        let mut i = if triple { start + 3 } else { start + 1 };
        let mut value = String::new();

        loop {
            let c = self
                .peek(i)
                .ok_or(LiteralError::UnterminatedString(start))?;

            if c == '\\' {
                let next = self
                    .peek(i + 1)
                    .ok_or(LiteralError::UnterminatedString(start))?;
                if raw {
                    value.push('\\');
                    value.push(next);
                    i += 2;
                    continue;
                }
                i = self.escape(i + 1, &mut value)?;
                continue;
            }

            if c == quote {
                if !triple {
                    i += 1;
                    break;
                }
                if self.peek(i + 1) == Some(quote) && self.peek(i + 2) == Some(quote) {
                    i += 3;
                    break;
                }
            }

            value.push(c);
            i += 1;
        }

        self.push_string(value)?;
        Ok(i)
    }

    /// Decode the escape whose letter is at `i`; returns the index after it.
    fn escape(&self, i: usize, value: &mut String) -> Result<usize, LiteralError> {
        let c = self.chars[i];
        let simple = match c {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'v' => Some('\u{b}'),
            '0' => Some('\0'),
            _ => None,
        };
        if let Some(decoded) = simple {
            value.push(decoded);
            return Ok(i + 1);
        }

        match c {
            '\n' => Ok(i + 1),
            'x' => self.hex_escape(i + 1, 2, value).map(|n| n.unwrap_or(i + 1)),
            'u' if self.peek(i + 1) == Some('{') => {
                let mut j = i + 2;
                let mut digits = String::new();
                while let Some(d) = self.peek(j).filter(|d| *d != '}') {
                    digits.push(d);
                    j += 1;
                }
                if let Some(ch) = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    value.push(ch);
                }
                Ok(j + 1)
            }
            'u' => self.hex_escape(i + 1, 4, value).map(|n| n.unwrap_or(i + 1)),
            other => {
                value.push(other);
                Ok(i + 1)
            }
        }
    }

    fn hex_escape(
        &self,
        start: usize,
        len: usize,
        value: &mut String,
    ) -> Result<Option<usize>, LiteralError> {
        let digits: String = (start..start + len).filter_map(|j| self.peek(j)).collect();
        if digits.len() != len {
            return Ok(None);
        }
        match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
            Some(ch) => {
                value.push(ch);
                Ok(Some(start + len))
            }
            None => Ok(None),
        }
    }

    fn push_string(&mut self, value: String) -> Result<(), LiteralError> {
        let (start, joined) = match self.last_string.take() {
            Some((start, previous)) => {
                self.out.truncate(start);
                (start, previous + &value)
            }
            None => (self.out.len(), value),
        };
        self.out.push_str(&serde_json::to_string(&joined)?);
        self.last_string = Some((start, joined));
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<usize, LiteralError> {
        let mut i = start;
        let mut raw = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek(i) {
            raw.push(sign);
            i += 1;
        }
        while let Some(c) = self.peek(i) {
            let exponent_sign =
                (c == '-' || c == '+') && matches!(raw.chars().last(), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                raw.push(c);
                i += 1;
            } else {
                break;
            }
        }

        let literal = normalize_number(&raw).ok_or_else(|| LiteralError::InvalidNumber(raw))?;
        if self.next_significant(i) == Some(':') {
            let quoted = serde_json::to_string(&literal)?;
            self.emit_str(&quoted);
        } else {
            self.emit_str(&literal);
        }
        Ok(i)
    }

    fn identifier(&mut self, start: usize) -> Result<usize, LiteralError> {
        let mut i = start;
        while self.peek(i).map_or(false, is_ident_char) {
            i += 1;
        }
        let ident: String = self.chars[start..i].iter().collect();

        // Python string prefixes: r"...", b'...', f"""..."""
        if !self.js()
            && ident.len() <= 2
            && ident.chars().all(|c| "rRbBuUfF".contains(c))
            && matches!(self.peek(i), Some('"' | '\''))
        {
            let raw = ident.contains(['r', 'R']);
            return self.string(i, raw);
        }

        if self.next_significant(i) == Some(':') {
            let quoted = serde_json::to_string(&ident)?;
            self.emit_str(&quoted);
            return Ok(i);
        }

        if self.js() && (ident == "as" || ident == "satisfies") {
            while self.peek(i).map_or(false, char::is_whitespace) {
                i += 1;
            }
            while self.peek(i).map_or(false, is_ident_char) {
                i += 1;
            }
            return Ok(self.skip_reference(i));
        }

        let keyword = match ident.as_str() {
            "true" | "True" => Some("true"),
            "false" | "False" => Some("false"),
            "null" | "None" | "undefined" | "NaN" | "Infinity" => Some("null"),
            _ => None,
        };
        match keyword {
            Some(json) => self.emit_str(json),
            None => {
                i = self.skip_reference(i);
                self.emit_str("null");
            }
        }
        Ok(i)
    }

    /// Skip property accesses, calls, indexing and generic arguments following an identifier.
    fn skip_reference(&self, mut i: usize) -> usize {
        loop {
            let mut j = i;
            while self.peek(j).map_or(false, char::is_whitespace) {
                j += 1;
            }
            match self.peek(j) {
                Some('.') if self.peek(j + 1).map_or(false, is_ident_start) => {
                    j += 1;
                    while self.peek(j).map_or(false, is_ident_char) {
                        j += 1;
                    }
                    i = j;
                }
                Some('(') | Some('[') => match self.skip_group(j) {
                    Some(next) => i = next,
                    None => return i,
                },
                // generic arguments only when written directly after the name
                Some('<') if j == i => match self.skip_group(j) {
                    Some(next) => i = next,
                    None => return i,
                },
                _ => return i,
            }
        }
    }

    /// Skip a balanced `(...)`, `[...]` or `<...>` group starting at `i`.
    fn skip_group(&self, i: usize) -> Option<usize> {
        let open = self.peek(i)?;
        let close = match open {
            '(' => ')',
            '[' => ']',
            '<' => '>',
            _ => return None,
        };
        let mut depth = 0usize;
        let mut j = i;
        while let Some(c) = self.peek(j) {
            if c == '"' || c == '\'' || c == '`' {
                j = skip_string(&self.chars, j, self.language)?;
                continue;
            }
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Some(j + 1);
                }
            }
            j += 1;
        }
        None
    }

    /// Drop `...expr` and the comma that follows it.
    fn skip_spread(&self, mut i: usize) -> Result<usize, LiteralError> {
        while self.peek(i).map_or(false, char::is_whitespace) {
            i += 1;
        }
        if self.peek(i).map_or(false, is_ident_start) {
            while self.peek(i).map_or(false, is_ident_char) {
                i += 1;
            }
            i = self.skip_reference(i);
        } else if matches!(self.peek(i), Some('{' | '[')) {
            let rest: String = self.chars[i..].iter().collect();
            let span = balanced_span(&rest, 0, self.language)
                .ok_or(LiteralError::Unexpected { ch: '.', offset: i })?;
            i += rest[..span].chars().count();
        }
        while self.peek(i).map_or(false, char::is_whitespace) {
            i += 1;
        }
        if self.peek(i) == Some(',') {
            i += 1;
        }
        Ok(i)
    }
}

/// JSON spelling of a JS/Python numeric literal, or `None` if it is not a number.
fn normalize_number(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, cleaned.trim_start_matches('+').to_string()),
    };
    let sign = if negative { "-" } else { "" };

    let lower = digits.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(body) = lower.strip_prefix(prefix) {
            let value = i64::from_str_radix(body, radix).ok()?;
            return Some(format!("{}{}", sign, value));
        }
    }

    let mut text = digits.trim_end_matches('n').to_string();
    if text.starts_with('.') {
        text.insert(0, '0');
    }
    if text.ends_with('.') {
        text.push('0');
    }
    if text.len() > 1 && text.starts_with('0') && text.as_bytes()[1].is_ascii_digit() {
        text = text.trim_start_matches('0').to_string();
        if text.is_empty() || text.starts_with('.') {
            text.insert(0, '0');
        }
    }
    text.parse::<f64>().ok()?;
    Some(format!("{}{}", sign, text))
}

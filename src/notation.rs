//! Object notation: a restricted object-literal grammar evaluated against a
//! scope.
//!
//! Supported: object and array literals, quoted strings, backtick templates
//! (whose `${path}` parts read the scope), numbers, `true`, `false`, `null`,
//! `undefined`, and identifier paths such as `user.scores[0]` that name
//! values in the scope. Nothing else is executed.

use crate::error::{NotationError, Position};
use crate::json::from_serde;
use crate::navigate::lookup;
use crate::resolve::substitute;
use crate::tree::{Mapping, Value};

/// Maximum nesting of object/array literals.
const MAX_DEPTH: usize = 128;

/// Parser state: tracks position in the input string.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    scope: &'a Value,
    depth: usize,
}

/// True if `text` has the shape of a brace-delimited literal.
pub fn looks_like_object(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Evaluate a notation expression against `scope`.
///
/// `undefined` evaluates to `None`.
pub fn evaluate(input: &str, scope: &Value) -> Result<Option<Value>, NotationError> {
    let mut parser = Parser {
        input,
        pos: 0,
        scope,
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.parse_expression()?;
    parser.skip_ws();
    if parser.pos < parser.input.len() {
        return Err(parser.error_point("Unexpected trailing input".to_string()));
    }
    Ok(value)
}

/// Evaluate an object literal, falling back to strict JSON when the
/// evaluator rejects it.
pub fn parse_object(input: &str, scope: &Value) -> Result<Value, NotationError> {
    let eval_err = match evaluate(input, scope) {
        Ok(value) => return Ok(value.unwrap_or(Value::Null)),
        Err(err) => err,
    };
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json) => {
            tracing::debug!(error = %eval_err, "notation rejected, read as JSON instead");
            Ok(from_serde(json))
        }
        Err(json_err) => Err(NotationError::malformed(&eval_err, &json_err)),
    }
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), NotationError> {
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.error_point(format!("Expected '{}'", ch)))
        }
    }

    /// Current position in the source.
    fn position(&self) -> Position {
        let consumed = &self.input[..self.pos];
        let line = consumed.matches('\n').count();
        let last_newline = consumed.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = self.pos - last_newline;
        Position {
            line,
            column,
            offset: self.pos,
        }
    }

    fn error_point(&self, message: String) -> NotationError {
        let pos = self.position();
        NotationError::syntax_error(message, pos, pos)
    }

    fn error_span(&self, message: String, begin: Position) -> NotationError {
        NotationError::syntax_error(message, begin, self.position())
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
    }

    fn enter(&mut self) -> Result<(), NotationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_point("Literal nested too deeply".to_string()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Option<Value>, NotationError> {
        match self.peek_char() {
            Some('{') => self.parse_object().map(Some),
            Some('[') => self.parse_array().map(Some),
            Some(q @ ('"' | '\'')) => self.parse_quoted_string(q).map(|s| Some(Value::String(s))),
            Some('`') => self.parse_template().map(|s| Some(Value::String(s))),
            Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '+' || ch == '.' => {
                self.parse_number().map(|n| Some(Value::Number(n)))
            }
            Some(ch) if is_ident_start(ch) => self.parse_identifier_expression(),
            Some(ch) => Err(self.error_point(format!("Unexpected character '{}'", ch))),
            None => Err(self.error_point("Expected a value".to_string())),
        }
    }

    fn parse_object(&mut self) -> Result<Value, NotationError> {
        let begin = self.position();
        self.expect_char('{')?;
        self.enter()?;
        let mut map = Mapping::new();
        loop {
            self.skip_ws();
            if self.eat_char('}') {
                break;
            }
            if self.pos >= self.input.len() {
                return Err(self.error_span("Unclosed '{'".to_string(), begin));
            }

            let key_begin = self.position();
            let (key, is_bare) = self.parse_property_key()?;
            self.skip_ws();

            let value = if self.eat_char(':') {
                self.skip_ws();
                self.parse_expression()?
            } else if is_bare && matches!(self.peek_char(), Some(',') | Some('}')) {
                // Shorthand `{ name }` reads `name` from the scope.
                Some(self.lookup_identifier(&key, key_begin)?)
            } else {
                return Err(self.error_point("Expected ':' after property name".to_string()));
            };
            if let Some(value) = value {
                map.insert(key, value);
            }

            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            if self.eat_char('}') {
                break;
            }
            if self.pos >= self.input.len() {
                return Err(self.error_span("Unclosed '{'".to_string(), begin));
            }
            return Err(self.error_point("Expected ',' or '}' in object".to_string()));
        }
        self.leave();
        Ok(Value::Mapping(map))
    }

    /// Returns the key and whether it was written as a bare identifier.
    fn parse_property_key(&mut self) -> Result<(String, bool), NotationError> {
        match self.peek_char() {
            Some(q @ ('"' | '\'')) => Ok((self.parse_quoted_string(q)?, false)),
            Some(ch) if ch.is_ascii_digit() => {
                let n = self.parse_number()?;
                Ok((crate::tree::format_number(n), false))
            }
            Some(ch) if is_ident_start(ch) => Ok((self.parse_identifier()?, true)),
            _ => Err(self.error_point("Expected a property name".to_string())),
        }
    }

    fn parse_array(&mut self) -> Result<Value, NotationError> {
        let begin = self.position();
        self.expect_char('[')?;
        self.enter()?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_char(']') {
                break;
            }
            if self.pos >= self.input.len() {
                return Err(self.error_span("Unclosed '['".to_string(), begin));
            }
            let item = self.parse_expression()?;
            items.push(item.unwrap_or(Value::Null));
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            if self.eat_char(']') {
                break;
            }
            if self.pos >= self.input.len() {
                return Err(self.error_span("Unclosed '['".to_string(), begin));
            }
            return Err(self.error_point("Expected ',' or ']' in array".to_string()));
        }
        self.leave();
        Ok(Value::Sequence(items))
    }

    // ── Identifiers ─────────────────────────────────────────────────

    fn parse_identifier(&mut self) -> Result<String, NotationError> {
        let start = self.pos;
        match self.peek_char() {
            Some(ch) if is_ident_start(ch) => self.advance(ch.len_utf8()),
            _ => return Err(self.error_point("Expected an identifier".to_string())),
        }
        while let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// `true`, `false`, `null`, `undefined`, or a scope path such as
    /// `user.scores[0]` with optional `()` calls that force thunks.
    fn parse_identifier_expression(&mut self) -> Result<Option<Value>, NotationError> {
        let begin = self.position();
        let name = self.parse_identifier()?;
        match name.as_str() {
            "true" => return Ok(Some(Value::Bool(true))),
            "false" => return Ok(Some(Value::Bool(false))),
            "null" => return Ok(Some(Value::Null)),
            "undefined" => return Ok(None),
            _ => {}
        }

        let mut members = Vec::new();
        loop {
            if self.starts_with("()") {
                // Thunks are forced on lookup.
                self.advance(2);
            } else if self.peek_char() == Some('.') {
                self.advance(1);
                members.push(self.parse_identifier()?);
            } else if self.peek_char() == Some('[') {
                self.advance(1);
                self.skip_ws();
                let member = match self.peek_char() {
                    Some(q @ ('"' | '\'')) => self.parse_quoted_string(q)?,
                    Some(ch) if ch.is_ascii_digit() => {
                        crate::tree::format_number(self.parse_number()?)
                    }
                    _ => return Err(self.error_point("Expected an index".to_string())),
                };
                self.skip_ws();
                self.expect_char(']')?;
                members.push(member);
            } else {
                break;
            }
        }

        let root = self.lookup_identifier(&name, begin)?;
        if members.is_empty() {
            return Ok(Some(root));
        }
        Ok(lookup(&root, &members))
    }

    fn lookup_identifier(&self, name: &str, begin: Position) -> Result<Value, NotationError> {
        lookup(self.scope, &[name.to_string()])
            .ok_or_else(|| NotationError::unknown_identifier(name, begin, self.position()))
    }

    // ── Numbers ─────────────────────────────────────────────────────

    fn parse_number(&mut self) -> Result<f64, NotationError> {
        let begin = self.position();
        let start = self.pos;

        if let Some('+' | '-') = self.peek_char() {
            self.advance(1);
        }

        let int_start = self.pos;
        self.skip_digits();
        let has_int_digits = self.pos > int_start;

        let mut has_frac_digits = false;
        if self.peek_char() == Some('.') {
            self.advance(1);
            let frac_start = self.pos;
            self.skip_digits();
            has_frac_digits = self.pos > frac_start;
        }

        if !has_int_digits && !has_frac_digits {
            return Err(self.error_span("Expected a number".to_string(), begin));
        }

        if let Some('e' | 'E') = self.peek_char() {
            self.advance(1);
            if let Some('+' | '-') = self.peek_char() {
                self.advance(1);
            }
            let exp_start = self.pos;
            self.skip_digits();
            if self.pos == exp_start {
                return Err(self.error_span("Expected exponent digits".to_string(), begin));
            }
        }

        if let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                return Err(self.error_span("Invalid number".to_string(), begin));
            }
        }

        let text = &self.input[start..self.pos];
        let text = text.strip_prefix('+').unwrap_or(text);
        text.parse()
            .map_err(|_| self.error_span(format!("Invalid number: {}", text), begin))
    }

    fn skip_digits(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }
    }

    // ── Strings ─────────────────────────────────────────────────────

    fn parse_quoted_string(&mut self, quote: char) -> Result<String, NotationError> {
        let begin = self.position();
        self.expect_char(quote)?;
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None | Some('\r') | Some('\n') => {
                    return Err(self.error_span("Unterminated string".to_string(), begin));
                }
                Some(ch) if ch == quote => {
                    self.advance(1);
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance(1);
                    self.parse_escape_char(&mut result)?;
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }

    /// A backtick template. Newlines are allowed; `${path}` parts are
    /// substituted from the scope once the text is read.
    fn parse_template(&mut self) -> Result<String, NotationError> {
        let begin = self.position();
        self.expect_char('`')?;
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error_span("Unterminated template".to_string(), begin));
                }
                Some('`') => {
                    self.advance(1);
                    return Ok(substitute(&result, self.scope).into_owned());
                }
                Some('\\') => {
                    self.advance(1);
                    self.parse_escape_char(&mut result)?;
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }

    fn parse_escape_char(&mut self, out: &mut String) -> Result<(), NotationError> {
        match self.peek_char() {
            None => return Err(self.error_point("Unterminated escape sequence".to_string())),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{000B}'),
            Some('0') => out.push('\0'),
            // Line continuation
            Some('\n') => {}
            Some('u') => {
                let begin = self.position();
                self.advance(1);
                let start = self.pos;
                for _ in 0..4 {
                    match self.peek_char() {
                        Some(ch) if ch.is_ascii_hexdigit() => self.advance(1),
                        _ => {
                            return Err(self
                                .error_span("Expected 4 hex digits in \\uXXXX".to_string(), begin))
                        }
                    }
                }
                let hex = &self.input[start..self.pos];
                let code_point = u32::from_str_radix(hex, 16).map_err(|_| {
                    self.error_span(format!("Invalid hex in \\u escape: {}", hex), begin)
                })?;
                return match char::from_u32(code_point) {
                    Some(ch) => {
                        out.push(ch);
                        Ok(())
                    }
                    None => Err(self
                        .error_span(format!("Invalid unicode code point: \\u{}", hex), begin)),
                };
            }
            // Passthrough: \x -> x
            Some(ch) => out.push(ch),
        }
        if let Some(ch) = self.peek_char() {
            self.advance(ch.len_utf8());
        }
        Ok(())
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

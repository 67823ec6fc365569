//! Tokenizer for the DOT-family pipeline dialect (§4.A).
//!
//! Comments are stripped in a pre-pass that replaces their contents with spaces and
//! newlines so every token downstream keeps the line/column it would have had in the
//! original source — the parser never needs to know comments existed.

use crate::error::{GraphError, Result};

/// Keyword and symbol tokens the grammar recognises, plus the four literal kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Digraph,
    Subgraph,
    GraphKw,
    NodeKw,
    EdgeKw,
    True,
    False,

    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Arrow,
    Comma,
    Semicolon,
    Dot,

    Identifier(String),
    String(String),
    Integer(i64),
    Float(f64),
    /// `(milliseconds, unit suffix)` — the raw token text is reconstructed by the caller.
    Duration(f64, String),

    Eof,
}

/// A token plus its position, carried through parsing for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    /// Exact source text the token was read from (used to rebuild duration literals).
    pub text: String,
}

const MS_PER_UNIT: [(&str, f64); 5] = [
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
    ("d", 86_400_000.0),
];

/// Strip `//` and `/* */` comments, preserving line/column of everything that remains
/// by replacing comment bytes with spaces (and keeping embedded newlines intact).
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    let mut in_string = false;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1] as char);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == '/' && i + 1 < bytes.len() && bytes[i + 1] as char == '/' {
            while i < bytes.len() && bytes[i] as char != '\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if c == '/' && i + 1 < bytes.len() && bytes[i + 1] as char == '*' {
            out.push(' ');
            out.push(' ');
            i += 2;
            while i < bytes.len() && !(bytes[i] as char == '*' && i + 1 < bytes.len() && bytes[i + 1] as char == '/') {
                out.push(if bytes[i] as char == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            if i < bytes.len() {
                out.push(' ');
                out.push(' ');
                i += 2;
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Tokenize `source` into a flat stream ending with `TokenKind::Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let cleaned = strip_comments(source);
    let chars: Vec<char> = cleaned.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut column = 1usize;

    let advance = |i: &mut usize, line: &mut usize, column: &mut usize, chars: &[char]| {
        if chars[*i] == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut column, &chars);
            continue;
        }

        let start_line = line;
        let start_col = column;
        let start_off = i;

        match c {
            '{' => {
                tokens.push(tok(TokenKind::LBrace, start_line, start_col, start_off, "{"));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            '}' => {
                tokens.push(tok(TokenKind::RBrace, start_line, start_col, start_off, "}"));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            '[' => {
                tokens.push(tok(TokenKind::LBracket, start_line, start_col, start_off, "["));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            ']' => {
                tokens.push(tok(TokenKind::RBracket, start_line, start_col, start_off, "]"));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            ',' => {
                tokens.push(tok(TokenKind::Comma, start_line, start_col, start_off, ","));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            ';' => {
                tokens.push(tok(TokenKind::Semicolon, start_line, start_col, start_off, ";"));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            '.' => {
                tokens.push(tok(TokenKind::Dot, start_line, start_col, start_off, "."));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            '=' => {
                tokens.push(tok(TokenKind::Equals, start_line, start_col, start_off, "="));
                advance(&mut i, &mut line, &mut column, &chars);
            }
            '-' if i + 1 < chars.len() && chars[i + 1] == '>' => {
                advance(&mut i, &mut line, &mut column, &chars);
                advance(&mut i, &mut line, &mut column, &chars);
                tokens.push(tok(TokenKind::Arrow, start_line, start_col, start_off, "->"));
            }
            '"' => {
                advance(&mut i, &mut line, &mut column, &chars);
                let mut s = String::new();
                let mut terminated = false;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch == '"' {
                        advance(&mut i, &mut line, &mut column, &chars);
                        terminated = true;
                        break;
                    }
                    if ch == '\\' && i + 1 < chars.len() {
                        let next = chars[i + 1];
                        let mapped = match next {
                            'n' => '\n',
                            't' => '\t',
                            '\\' => '\\',
                            '"' => '"',
                            other => {
                                s.push('\\');
                                other
                            }
                        };
                        s.push(mapped);
                        advance(&mut i, &mut line, &mut column, &chars);
                        advance(&mut i, &mut line, &mut column, &chars);
                        continue;
                    }
                    s.push(ch);
                    advance(&mut i, &mut line, &mut column, &chars);
                }
                if !terminated {
                    return Err(GraphError::LexUnterminatedString {
                        line: start_line,
                        column: start_col,
                    });
                }
                tokens.push(tok(TokenKind::String(s.clone()), start_line, start_col, start_off, &s));
            }
            c if c.is_ascii_digit() || (c == '-' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) => {
                let mut raw = String::new();
                if c == '-' {
                    raw.push('-');
                    advance(&mut i, &mut line, &mut column, &chars);
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    raw.push(chars[i]);
                    advance(&mut i, &mut line, &mut column, &chars);
                }
                let mut is_float = false;
                if i < chars.len() && chars[i] == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    is_float = true;
                    raw.push('.');
                    advance(&mut i, &mut line, &mut column, &chars);
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        raw.push(chars[i]);
                        advance(&mut i, &mut line, &mut column, &chars);
                    }
                }

                // Duration suffix: digits immediately followed by ms|s|m|h|d, and the
                // character after the suffix (if any) must not continue an identifier.
                let mut matched_unit: Option<(&str, f64)> = None;
                if !is_float {
                    for (unit, factor) in MS_PER_UNIT {
                        let ulen = unit.len();
                        if i + ulen <= chars.len() && chars[i..i + ulen].iter().collect::<String>() == unit {
                            let after = chars.get(i + ulen);
                            let continues_ident = after.map(|c| c.is_alphanumeric() || *c == '_').unwrap_or(false);
                            if !continues_ident {
                                matched_unit = Some((unit, factor));
                                break;
                            }
                        }
                    }
                }

                if let Some((unit, factor)) = matched_unit {
                    let n: f64 = raw.parse().unwrap_or(0.0);
                    let mut full_raw = raw.clone();
                    full_raw.push_str(unit);
                    for _ in 0..unit.len() {
                        advance(&mut i, &mut line, &mut column, &chars);
                    }
                    tokens.push(tok(
                        TokenKind::Duration(n * factor, unit.to_string()),
                        start_line,
                        start_col,
                        start_off,
                        &full_raw,
                    ));
                } else if is_float {
                    let f: f64 = raw.parse().unwrap_or(0.0);
                    tokens.push(tok(TokenKind::Float(f), start_line, start_col, start_off, &raw));
                } else {
                    let n: i64 = raw.parse().unwrap_or(0);
                    tokens.push(tok(TokenKind::Integer(n), start_line, start_col, start_off, &raw));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut raw = String::new();
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    raw.push(chars[i]);
                    advance(&mut i, &mut line, &mut column, &chars);
                }
                let kind = match raw.as_str() {
                    "digraph" => TokenKind::Digraph,
                    "subgraph" => TokenKind::Subgraph,
                    "graph" => TokenKind::GraphKw,
                    "node" => TokenKind::NodeKw,
                    "edge" => TokenKind::EdgeKw,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => TokenKind::Identifier(raw.clone()),
                };
                tokens.push(tok(kind, start_line, start_col, start_off, &raw));
            }
            other => {
                return Err(GraphError::LexUnexpectedChar {
                    ch: other,
                    line: start_line,
                    column: start_col,
                });
            }
        }
    }

    tokens.push(tok(TokenKind::Eof, line, column, chars.len(), ""));
    Ok(tokens)
}

fn tok(kind: TokenKind, line: usize, column: usize, offset: usize, text: &str) -> Token {
    Token {
        kind,
        line,
        column,
        offset,
        text: text.to_string(),
    }
}

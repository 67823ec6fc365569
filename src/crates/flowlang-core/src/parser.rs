//! Recursive-descent parser over the lexer's token stream (§4.B).
//!
//! The grammar is small enough to hand-write without a parser-combinator dependency:
//! one function per production, each consuming tokens from a cursor and returning the
//! corresponding AST node or a `PARSE_EXPECTED_X_GOT_Y` error.

use crate::ast::{AstAttrs, AstGraph, AstStatement, AstValue};
use crate::error::{GraphError, Result};
use crate::lexer::{Token, TokenKind};

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &str, pred: impl Fn(&TokenKind) -> bool) -> Result<Token> {
        if pred(&self.peek().kind) {
            Ok(self.advance().clone())
        } else {
            let found = self.peek();
            Err(GraphError::ParseExpected {
                expected: expected.to_string(),
                found: describe(&found.kind),
                line: found.line,
                column: found.column,
            })
        }
    }

    fn eat_semicolons(&mut self) {
        while matches!(self.peek().kind, TokenKind::Semicolon) {
            self.advance();
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Identifier(s) => format!("identifier '{s}'"),
        TokenKind::String(s) => format!("string \"{s}\""),
        other => format!("{other:?}"),
    }
}

/// Parse a full source document into an [`AstGraph`].
pub fn parse(tokens: &[Token]) -> Result<AstGraph> {
    let mut cur = Cursor::new(tokens);

    if !matches!(cur.peek().kind, TokenKind::Digraph) {
        return Err(GraphError::ParseExpectedDigraph);
    }
    cur.advance();

    let id_tok = cur.expect("graph identifier", |k| matches!(k, TokenKind::Identifier(_)))?;
    let id = match id_tok.kind {
        TokenKind::Identifier(s) => s,
        _ => unreachable!(),
    };

    cur.expect("'{'", |k| matches!(k, TokenKind::LBrace))?;
    let statements = parse_statements(&mut cur)?;
    cur.expect("'}'", |k| matches!(k, TokenKind::RBrace))?;

    Ok(AstGraph { id, statements })
}

fn parse_statements(cur: &mut Cursor) -> Result<Vec<AstStatement>> {
    let mut statements = Vec::new();
    cur.eat_semicolons();
    while !matches!(cur.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
        statements.push(parse_statement(cur)?);
        cur.eat_semicolons();
    }
    Ok(statements)
}

fn parse_statement(cur: &mut Cursor) -> Result<AstStatement> {
    match cur.peek().kind.clone() {
        TokenKind::Subgraph => parse_subgraph(cur),
        TokenKind::GraphKw => {
            cur.advance();
            let attrs = parse_attr_list(cur)?;
            Ok(AstStatement::GraphAttrBlock { attrs })
        }
        TokenKind::NodeKw => {
            cur.advance();
            let attrs = parse_attr_list(cur)?;
            Ok(AstStatement::NodeDefaults { attrs })
        }
        TokenKind::EdgeKw => {
            cur.advance();
            let attrs = parse_attr_list(cur)?;
            Ok(AstStatement::EdgeDefaults { attrs })
        }
        TokenKind::Identifier(_) => parse_id_led_statement(cur),
        other => Err(GraphError::ParseExpected {
            expected: "a statement".to_string(),
            found: describe(&other),
            line: cur.peek().line,
            column: cur.peek().column,
        }),
    }
}

fn parse_subgraph(cur: &mut Cursor) -> Result<AstStatement> {
    cur.advance(); // 'subgraph'
    let id = if let TokenKind::Identifier(s) = cur.peek().kind.clone() {
        cur.advance();
        Some(s)
    } else {
        None
    };
    cur.expect("'{'", |k| matches!(k, TokenKind::LBrace))?;
    let body = parse_statements(cur)?;
    cur.expect("'}'", |k| matches!(k, TokenKind::RBrace))?;
    Ok(AstStatement::Subgraph { id, body })
}

/// Handles the three statement shapes that all start with an identifier:
/// `key = value`, `node [attrs]`, and `a -> b -> ... [attrs]`.
fn parse_id_led_statement(cur: &mut Cursor) -> Result<AstStatement> {
    let first = match cur.advance().kind.clone() {
        TokenKind::Identifier(s) => s,
        other => unreachable!("{other:?}"),
    };

    if matches!(cur.peek().kind, TokenKind::Equals) {
        cur.advance();
        let value = parse_value(cur)?;
        return Ok(AstStatement::GraphAttrDecl { key: first, value });
    }

    if matches!(cur.peek().kind, TokenKind::Arrow) {
        let mut chain = vec![first];
        while matches!(cur.peek().kind, TokenKind::Arrow) {
            cur.advance();
            let next = cur.expect("identifier", |k| matches!(k, TokenKind::Identifier(_)))?;
            if let TokenKind::Identifier(s) = next.kind {
                chain.push(s);
            }
        }
        let attrs = parse_attr_list(cur)?;
        return Ok(AstStatement::Edge { chain, attrs });
    }

    let attrs = parse_attr_list(cur)?;
    Ok(AstStatement::Node { id: first, attrs })
}

fn parse_attr_list(cur: &mut Cursor) -> Result<AstAttrs> {
    if !matches!(cur.peek().kind, TokenKind::LBracket) {
        return Ok(Vec::new());
    }
    cur.advance();
    let mut attrs = Vec::new();
    while !matches!(cur.peek().kind, TokenKind::RBracket) {
        let key_tok = cur.expect("attribute key", |k| matches!(k, TokenKind::Identifier(_)))?;
        let key = match key_tok.kind {
            TokenKind::Identifier(s) => s,
            _ => unreachable!(),
        };
        cur.expect("'='", |k| matches!(k, TokenKind::Equals))?;
        let value = parse_value(cur)?;
        attrs.push((key, value));
        if matches!(cur.peek().kind, TokenKind::Comma | TokenKind::Semicolon) {
            cur.advance();
        }
    }
    cur.advance(); // ']'
    Ok(attrs)
}

fn parse_value(cur: &mut Cursor) -> Result<AstValue> {
    let tok = cur.advance().clone();
    match tok.kind {
        TokenKind::String(s) => Ok(AstValue::String(s)),
        TokenKind::Integer(i) => Ok(AstValue::Integer(i)),
        TokenKind::Float(f) => Ok(AstValue::Float(f)),
        TokenKind::Duration(ms, unit) => Ok(AstValue::Duration(ms, unit, tok.text)),
        TokenKind::True => Ok(AstValue::Boolean(true)),
        TokenKind::False => Ok(AstValue::Boolean(false)),
        TokenKind::Identifier(s) => Ok(AstValue::Identifier(s)),
        other => Err(GraphError::ParseExpected {
            expected: "a value".to_string(),
            found: describe(&other),
            line: tok.line,
            column: tok.column,
        }),
    }
}

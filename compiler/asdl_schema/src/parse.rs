//! ASDL reader.
//!
//! A logos tokenizer feeding a small recursive-descent parser. The grammar:
//!
//! ```text
//! module     := "module" Id "{" definition* "}"
//! definition := Id "=" (record | union)
//! record     := fields ["attributes" fields]
//! union      := variant ("|" variant)* ["attributes" fields]
//! variant    := Id [fields]
//! fields     := "(" field ("," field)* ")"
//! field      := Id ["?" | "*"] Id
//! ```
//!
//! `--` starts a comment running to end of line. Record attributes are
//! appended to the record's fields.

use std::ops::Range;

use logos::Logos;

use crate::model::{Cardinality, Field, Schema, TypeDef, Variant};

/// Raw token from logos.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"--[^\n]*")]
enum RawToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[token("=")]
    Eq,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
}

impl RawToken {
    fn describe(self) -> &'static str {
        match self {
            RawToken::Ident => "identifier",
            RawToken::Eq => "`=`",
            RawToken::Pipe => "`|`",
            RawToken::LParen => "`(`",
            RawToken::RParen => "`)`",
            RawToken::LBrace => "`{`",
            RawToken::RBrace => "`}`",
            RawToken::Comma => "`,`",
            RawToken::Question => "`?`",
            RawToken::Star => "`*`",
        }
    }
}

/// Error reading an ASDL schema. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{line}:{column}: invalid character `{text}`")]
    InvalidCharacter {
        text: String,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: expected {expected}, found `{found}`")]
    Unexpected {
        expected: &'static str,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("unexpected end of schema, expected {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("type `{name}` is defined more than once")]
    DuplicateDefinition { name: String },
}

#[derive(Clone, Copy)]
struct Token<'src> {
    kind: RawToken,
    text: &'src str,
    offset: usize,
}

/// Parse ASDL source into a [`Schema`].
///
/// Only syntax and duplicate type names are checked here; type references
/// are resolved by the generator.
pub fn parse_schema(source: &str) -> Result<Schema, SchemaError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    parser.module()
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, SchemaError> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let Range { start, .. } = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice(),
                offset: start,
            }),
            Err(()) => {
                let (line, column) = line_column(source, start);
                return Err(SchemaError::InvalidCharacter {
                    text: lexer.slice().to_string(),
                    line,
                    column,
                });
            }
        }
    }
    Ok(tokens)
}

fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
    (line, column)
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<RawToken> {
        self.peek().map(|t| t.kind)
    }

    fn peek_is_word(&self, word: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == RawToken::Ident && t.text == word)
    }

    fn error_at(&self, token: Token<'_>, expected: &'static str) -> SchemaError {
        let (line, column) = line_column(self.source, token.offset);
        SchemaError::Unexpected {
            expected,
            found: token.text.to_string(),
            line,
            column,
        }
    }

    fn expect(&mut self, kind: RawToken) -> Result<Token<'src>, SchemaError> {
        let Some(token) = self.peek() else {
            return Err(SchemaError::UnexpectedEof {
                expected: kind.describe(),
            });
        };
        if token.kind != kind {
            return Err(self.error_at(token, kind.describe()));
        }
        self.pos += 1;
        Ok(token)
    }

    fn expect_word(&mut self, word: &'static str) -> Result<(), SchemaError> {
        let token = self.expect(RawToken::Ident)?;
        if token.text == word {
            Ok(())
        } else {
            Err(self.error_at(token, word))
        }
    }

    fn eat(&mut self, kind: RawToken) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn module(&mut self) -> Result<Schema, SchemaError> {
        self.expect_word("module")?;
        let name = self.expect(RawToken::Ident)?.text;
        self.expect(RawToken::LBrace)?;

        let mut schema = Schema::new(name);
        loop {
            match self.peek_kind() {
                Some(RawToken::RBrace) => {
                    self.pos += 1;
                    break;
                }
                None => return Err(SchemaError::UnexpectedEof { expected: "`}`" }),
                Some(_) => {}
            }
            let def = self.definition()?;
            if schema.get(&def.name).is_some() {
                return Err(SchemaError::DuplicateDefinition { name: def.name });
            }
            schema.definitions.push(def);
        }

        if let Some(trailing) = self.peek() {
            return Err(self.error_at(trailing, "end of schema"));
        }
        Ok(schema)
    }

    fn definition(&mut self) -> Result<TypeDef, SchemaError> {
        let name = self.expect(RawToken::Ident)?.text;
        self.expect(RawToken::Eq)?;

        if self.peek_kind() == Some(RawToken::LParen) {
            let mut fields = self.fields()?;
            if self.peek_is_word("attributes") {
                self.pos += 1;
                fields.extend(self.fields()?);
            }
            return Ok(TypeDef::record(name, fields));
        }

        let mut variants = vec![self.variant()?];
        while self.eat(RawToken::Pipe) {
            variants.push(self.variant()?);
        }
        let attributes = if self.peek_is_word("attributes") {
            self.pos += 1;
            self.fields()?
        } else {
            Vec::new()
        };
        Ok(TypeDef::union(name, variants, attributes))
    }

    fn variant(&mut self) -> Result<Variant, SchemaError> {
        let name = self.expect(RawToken::Ident)?.text;
        let fields = if self.peek_kind() == Some(RawToken::LParen) {
            self.fields()?
        } else {
            Vec::new()
        };
        Ok(Variant::new(name, fields))
    }

    fn fields(&mut self) -> Result<Vec<Field>, SchemaError> {
        self.expect(RawToken::LParen)?;
        let mut fields = vec![self.field()?];
        while self.eat(RawToken::Comma) {
            fields.push(self.field()?);
        }
        self.expect(RawToken::RParen)?;
        Ok(fields)
    }

    fn field(&mut self) -> Result<Field, SchemaError> {
        let ty = self.expect(RawToken::Ident)?.text;
        let cardinality = if self.eat(RawToken::Question) {
            Cardinality::Optional
        } else if self.eat(RawToken::Star) {
            Cardinality::Sequence
        } else {
            Cardinality::Scalar
        };
        let name = self.expect(RawToken::Ident)?.text;
        Ok(Field::new(ty, name, cardinality))
    }
}

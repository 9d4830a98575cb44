//! Recursive descent parser for description files.
//!
//! Every top-level call becomes one [`Target`]. Function names are looked up
//! in the [`Registry`] as soon as they are read, so an unknown function is
//! reported at the call site before its parameters are parsed.

use std::fs;
use std::path::{Path, PathBuf};

use super::lexer::tokenize;
use super::{Category, Location, Token};
use crate::error::{Error, Result};
use crate::expr::{Call, Expr, Params};
use crate::function::{ANONYMOUS, Registry};
use crate::target::Target;

/// Parser state: a cursor over the significant tokens of one file.
pub struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'r Registry,
    file: PathBuf,
}

impl<'r> Parser<'r> {
    /// Create a parser over a token stream that ends with an end-of-file token.
    pub fn new(mut tokens: Vec<Token>, file: impl Into<PathBuf>, registry: &'r Registry) -> Self {
        let file = file.into();
        if tokens.last().is_none_or(|t| t.category != Category::Eof) {
            let line = tokens.last().map_or(1, |t| t.location.line);
            tokens.push(Token {
                location: Location {
                    file: file.clone(),
                    line,
                },
                category: Category::Eof,
                text: String::new(),
            });
        }
        Self {
            tokens,
            pos: 0,
            registry,
            file,
        }
    }

    /// Parse every top-level call into a target, in source order.
    pub fn parse(mut self) -> Result<Vec<Target>> {
        let mut targets = Vec::new();
        while self.peek_category() == Category::UpperIdent {
            let call = self.call()?;
            targets.push(Target::new(self.file.clone(), call));
        }
        self.expect(Category::Eof)?;
        Ok(targets)
    }

    fn call(&mut self) -> Result<Call> {
        let token = self.expect(Category::UpperIdent)?;
        let factory = self
            .registry
            .lookup(&token.text)
            .ok_or_else(|| Error::UnknownFunction {
                location: token.location.clone(),
                name: token.text.clone(),
            })?;
        let params = self.params(&token.text, &token.location)?;
        let function = factory(params)?;
        Ok(Call::new(token.text, token.location, function))
    }

    fn params(&mut self, name: &str, location: &Location) -> Result<Params> {
        let mut params = Params::new(name, location.clone());
        self.expect(Category::OpenParen)?;
        match self.peek_category() {
            Category::CloseParen => {}
            Category::LowerIdent => {
                while self.peek_category() == Category::LowerIdent {
                    let key = self.advance();
                    self.expect(Category::Assign)?;
                    let value = self.expr()?;
                    if !params.insert(key.text.clone(), value) {
                        return Err(Error::DuplicateParameter {
                            location: key.location,
                            key: key.text,
                        });
                    }
                }
            }
            _ => {
                let value = self.expr()?;
                params.insert(ANONYMOUS, value);
            }
        }
        self.expect(Category::CloseParen)?;
        Ok(params)
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.peek_category() {
            Category::UpperIdent => Ok(Expr::Call(self.call()?)),
            Category::OpenBracket => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    match self.peek_category() {
                        Category::CloseBracket => {
                            self.advance();
                            return Ok(Expr::List(items));
                        }
                        Category::Eof => {
                            self.expect(Category::CloseBracket)?;
                        }
                        _ => items.push(self.expr()?),
                    }
                }
            }
            _ => {
                let token = self.expect(Category::StringLiteral)?;
                Ok(Expr::Literal(unquote(&token.text).to_string()))
            }
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_category(&self) -> Category {
        self.peek().category
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Category) -> Result<Token> {
        let token = self.peek();
        if token.category == expected {
            Ok(self.advance())
        } else {
            Err(Error::Syntax {
                location: token.location.clone(),
                expected,
                found: token.category,
                value: token.text.clone(),
            })
        }
    }
}

fn unquote(text: &str) -> &str {
    let mut chars = text.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

/// Parse description text that was read from (or stands in for) `file`.
pub fn parse_str(source: &str, file: impl Into<PathBuf>, registry: &Registry) -> Result<Vec<Target>> {
    let file = file.into();
    let tokens = tokenize(source, file.clone())?;
    Parser::new(tokens, file, registry).parse()
}

/// Read and parse one description file.
pub fn parse_file(path: &Path, registry: &Registry) -> Result<Vec<Target>> {
    let source = fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    parse_str(&source, path, registry)
}

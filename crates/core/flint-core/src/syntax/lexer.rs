//! Maximal-munch tokenizer for description files.
//!
//! Characters are fed one at a time into a candidate string. While the
//! candidate matches some rule and candidate+char still matches some rule the
//! candidate keeps growing; once the extension stops matching, the candidate
//! becomes the next token and the new character starts the next candidate.
//! Candidates that match nothing keep growing too, so multi-character rules
//! such as comments and string literals are reached through unmatched
//! prefixes.

use std::mem;
use std::path::PathBuf;
use std::str::Chars;

use super::{Category, Lexeme, Location, Token, lexemes};
use crate::error::{Error, Result};

/// Streaming tokenizer over one source text.
pub struct Lexer<'a> {
    chars: Chars<'a>,
    rules: &'a [Lexeme],
    file: PathBuf,
    line: usize,
    candidate: String,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source` using the given rule table.
    pub fn new(source: &'a str, file: impl Into<PathBuf>, rules: &'a [Lexeme]) -> Self {
        Self {
            chars: source.chars(),
            rules,
            file: file.into(),
            line: 1,
            candidate: String::new(),
        }
    }

    /// The line the lexer is currently on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the next significant token.
    ///
    /// Newlines, comments and whitespace are consumed here; the first two
    /// advance the line counter. After the end of input every call returns
    /// an end-of-file token.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            let token = self.raw_token()?;
            match token.category {
                Category::Newline | Category::Comment => self.line += 1,
                Category::Whitespace => {}
                _ => return Ok(token),
            }
        }
    }

    fn raw_token(&mut self) -> Result<Token> {
        while let Some(ch) = self.chars.next() {
            let current = self.classify(&self.candidate);
            self.candidate.push(ch);
            if let Some(category) = current {
                if self.classify(&self.candidate).is_none() {
                    self.candidate.pop();
                    let text = mem::replace(&mut self.candidate, ch.to_string());
                    return Ok(self.token(category, text));
                }
            }
        }

        if !self.candidate.is_empty() {
            let text = mem::take(&mut self.candidate);
            if let Some(category) = self.classify(&text) {
                return Ok(self.token(category, text));
            }
            // A comment on the last line has no newline to terminate it.
            if self.classify(&format!("{text}\n")) == Some(Category::Comment) {
                return Ok(self.token(Category::Comment, text));
            }
            return Err(Error::Lex {
                location: self.location(),
                text,
            });
        }

        Ok(self.token(Category::Eof, String::new()))
    }

    fn classify(&self, text: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(Lexeme::category)
    }

    fn location(&self) -> Location {
        Location {
            file: self.file.clone(),
            line: self.line,
        }
    }

    fn token(&self, category: Category, text: String) -> Token {
        Token {
            location: self.location(),
            category,
            text,
        }
    }
}

/// Tokenize a whole description file with the default rules.
///
/// The returned stream holds only significant tokens and always ends with
/// exactly one end-of-file token.
pub fn tokenize(source: &str, file: impl Into<PathBuf>) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source, file, lexemes());
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.category == Category::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

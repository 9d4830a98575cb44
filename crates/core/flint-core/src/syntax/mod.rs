//! Front end for flint description files.
//!
//! The [`lexer`] turns source text into classified [`Token`]s using an
//! ordered table of [`Lexeme`] rules; the [`parser`] consumes them and builds
//! one [`Target`](crate::Target) per top-level function call.

pub mod lexer;
pub mod parser;

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

/// Token categories. Two identifier classes keep function names apart from
/// parameter names in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Synthetic token after the last character.
    Eof,
    /// `\n`.
    Newline,
    /// Any other single whitespace character.
    Whitespace,
    /// `#` through the end of the line.
    Comment,
    /// `=`.
    Assign,
    /// `(`.
    OpenParen,
    /// `)`.
    CloseParen,
    /// `[`.
    OpenBracket,
    /// `]`.
    CloseBracket,
    /// A double-quoted string, quotes included.
    StringLiteral,
    /// Function names: `[A-Z][-a-zA-Z0-9]*`.
    UpperIdent,
    /// Parameter names: `[a-z][-a-zA-Z0-9]*`.
    LowerIdent,
}

impl Category {
    /// Returns `true` for tokens the parser never sees.
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Newline | Self::Whitespace | Self::Comment)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eof => "end of file",
            Self::Newline => "newline",
            Self::Whitespace => "whitespace",
            Self::Comment => "comment",
            Self::Assign => "`=`",
            Self::OpenParen => "`(`",
            Self::CloseParen => "`)`",
            Self::OpenBracket => "`[`",
            Self::CloseBracket => "`]`",
            Self::StringLiteral => "string literal",
            Self::UpperIdent => "function name",
            Self::LowerIdent => "parameter name",
        })
    }
}

/// Source location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// The description file.
    pub file: PathBuf,
    /// One-based line number.
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A classified run of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Where the token starts.
    pub location: Location,
    /// The rule that classified it.
    pub category: Category,
    /// The matched source text.
    pub text: String,
}

/// A lexical rule: a category and the pattern a whole token must match.
#[derive(Debug, Clone)]
pub struct Lexeme {
    category: Category,
    pattern: Regex,
}

impl Lexeme {
    /// Compile a rule. The pattern is anchored at both ends.
    pub fn new(category: Category, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            category,
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }

    /// The category tokens matching this rule receive.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns `true` if `text` matches the rule in full.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Rule table in priority order; the first matching rule classifies a token.
const RULES: &[(Category, &str)] = &[
    (Category::Newline, r"\n"),
    (Category::Whitespace, r"\s"),
    (Category::Assign, "="),
    (Category::Comment, r"#.*\n"),
    (Category::OpenParen, r"\("),
    (Category::CloseParen, r"\)"),
    (Category::OpenBracket, r"\["),
    (Category::CloseBracket, r"\]"),
    (Category::StringLiteral, r#"".*""#),
    (Category::UpperIdent, "[A-Z][-a-zA-Z0-9]*"),
    (Category::LowerIdent, "[a-z][-a-zA-Z0-9]*"),
];

static LEXEMES: LazyLock<Vec<Lexeme>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|&(category, pattern)| {
            Lexeme::new(category, pattern).expect("built-in lexeme patterns are valid")
        })
        .collect()
});

/// The default rule table for description files.
pub fn lexemes() -> &'static [Lexeme] {
    &LEXEMES
}

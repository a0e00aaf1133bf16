//! Tokenizer for Ember source text.
//!
//! The token definitions are driven by `logos`; a thin wrapper turns byte
//! spans into `Location`s and applies the negative-literal rule: a `-`
//! directly followed by digits is part of the number unless the previous
//! token can end a value, in which case the lexeme is split into `-` and a
//! positive literal.

use logos::Logos;
use std::fmt;
use thiserror::Error;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // --- Keywords ---
    #[token("package")]
    Package,
    #[token("func")]
    Func,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("int")]
    Int,
    #[token("string")]
    String,
    #[token("bool")]
    Bool,
    #[token("void")]
    Void,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // --- Identifiers and literals ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Number(i64),

    /// String literal body with escape pairs preserved literally; escape
    /// interpretation is a backend concern.
    #[regex(r#""(?:\\.|[^"\\])*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    // --- Multi-character operators ---
    #[token("->")]
    Arrow,
    #[token(":=")]
    Walrus,
    #[token("::")]
    ColonColon,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // --- Single-character operators ---
    #[token("=")]
    Assign,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("@")]
    At,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
}

impl TokenKind {
    /// Whether a token of this kind can end a value expression. Used to
    /// decide if a following `-digits` lexeme is a negative literal or a
    /// binary minus.
    pub fn ends_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Caret
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Short description used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Package => "'package'",
            TokenKind::Func => "'func'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::For => "'for'",
            TokenKind::Int => "'int'",
            TokenKind::String => "'string'",
            TokenKind::Bool => "'bool'",
            TokenKind::Void => "'void'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Number(_) => "number",
            TokenKind::Str(_) => "string literal",
            TokenKind::Arrow => "'->'",
            TokenKind::Walrus => "':='",
            TokenKind::ColonColon => "'::'",
            TokenKind::EqEq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::Shl => "'<<'",
            TokenKind::Shr => "'>>'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Assign => "'='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::At => "'@'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Caret => "'^'",
            TokenKind::Amp => "'&'",
            TokenKind::Pipe => "'|'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Package => write!(f, "package"),
            TokenKind::Func => write!(f, "func"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::For => write!(f, "for"),
            TokenKind::Int => write!(f, "int"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Bool => write!(f, "bool"),
            TokenKind::Void => write!(f, "void"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Str(s) => write!(f, "\"{s}\""),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Walrus => write!(f, ":="),
            TokenKind::ColonColon => write!(f, "::"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Ne => write!(f, "!="),
            TokenKind::Le => write!(f, "<="),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::Shl => write!(f, "<<"),
            TokenKind::Shr => write!(f, ">>"),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Assign => write!(f, "="),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::At => write!(f, "@"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
        }
    }
}

/// Position of a token or node in the source text. Immutable once set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Location {
    pub fn new(file: &str, line: usize, column: usize, offset: usize) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.kind, self.location)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal at {location}")]
    UnterminatedString { location: Location },

    #[error("invalid character '{ch}' at {location}")]
    InvalidCharacter { location: Location, ch: char },

    #[error("malformed numeric literal '{text}' at {location}")]
    MalformedNumber {
        location: Location,
        text: String,
    },
}

/// Byte-offset to line/column conversion, 1-based.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    fn to_line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

/// Tokenize `source`, attributing locations to `file`. The whole token
/// sequence is produced eagerly; the parser consumes it with lookahead and
/// rollback.
pub fn lex(file: &str, source: &str) -> Result<Vec<Token>, LexError> {
    let index = LineIndex::new(source);
    let at = |offset: usize| {
        let (line, column) = index.to_line_col(offset);
        Location::new(file, line, column, offset)
    };

    let mut tokens: Vec<Token> = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();

        let kind = match result {
            Ok(kind) => kind,
            Err(()) => return Err(classify_error(source, span.start, at(span.start))),
        };

        // Split `ident-1` style lexemes back into a binary minus.
        if let TokenKind::Number(n) = kind {
            let negative = source.as_bytes()[span.start] == b'-';
            let follows_value = tokens.last().map_or(false, |t| t.kind.ends_value());

            if negative && follows_value {
                let value = n.checked_neg().ok_or_else(|| LexError::MalformedNumber {
                    location: at(span.start),
                    text: lexer.slice().to_string(),
                })?;

                tokens.push(Token {
                    kind: TokenKind::Minus,
                    location: at(span.start),
                });
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    location: at(span.start + 1),
                });

                continue;
            }
        }

        tokens.push(Token {
            kind,
            location: at(span.start),
        });
    }

    Ok(tokens)
}

fn classify_error(source: &str, offset: usize, location: Location) -> LexError {
    let rest = &source[offset..];
    let first = rest.chars().next().unwrap_or('\0');

    if first == '"' {
        return LexError::UnterminatedString { location };
    }

    // An overlong run of digits fails the i64 conversion in the callback
    // and surfaces here as an error over the same slice.
    let digits = first.is_ascii_digit()
        || (first == '-' && rest[1..].chars().next().is_some_and(|c| c.is_ascii_digit()));
    if digits {
        let text: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '-')
            .collect();
        return LexError::MalformedNumber { location, text };
    }

    LexError::InvalidCharacter {
        location,
        ch: first,
    }
}

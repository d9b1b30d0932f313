//! Lexer for script source.
//!
//! Tokenization is done by logos; this module maps byte ranges back to
//! line/column positions and converts the internal token enum into [`Token`].

use logos::Logos;

use crate::parser::token::{Span, Token};

/// Logos-based token enum for lexing.
///
/// Converted to [`Token`] after lexing.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f\u{feff}]+")]
enum LogosToken {
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment,

    // Keywords (take priority over identifiers)
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("function")]
    Function,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("new")]
    New,
    #[token("delete")]
    Delete,
    #[token("typeof")]
    Typeof,
    #[token("void")]
    Void,
    #[token("in")]
    In,
    #[token("instanceof")]
    Instanceof,
    #[token("this")]
    This,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", parse_decimal)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", parse_decimal)]
    #[regex(r"0[xX][0-9a-fA-F]+", parse_hex)]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", parse_string)]
    String(String),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Brackets
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,

    // Punctuation
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    LessLess,
    #[token(">>")]
    GreaterGreater,
    #[token(">>>")]
    GreaterGreaterGreater,
    #[token("!")]
    Bang,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("==")]
    EqualEqual,
    #[token("===")]
    EqualEqualEqual,
    #[token("!=")]
    BangEqual,
    #[token("!==")]
    BangEqualEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("=")]
    Equal,
    #[token("+=")]
    PlusEqual,
    #[token("-=")]
    MinusEqual,
    #[token("*=")]
    StarEqual,
    #[token("/=")]
    SlashEqual,
    #[token("%=")]
    PercentEqual,
}

fn lex_block_comment(lex: &mut logos::Lexer<'_, LogosToken>) -> logos::Skip {
    // "/*" already consumed
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(remainder.len()),
    }
    logos::Skip
}

fn parse_decimal(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_hex(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<f64> {
    u64::from_str_radix(&lex.slice()[2..], 16)
        .ok()
        .map(|n| n as f64)
}

fn parse_string(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<String> {
    let s = lex.slice();
    unescape_string(&s[1..s.len() - 1])
}

fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next()? {
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            't' => result.push('\t'),
            'b' => result.push('\u{8}'),
            'f' => result.push('\u{c}'),
            'v' => result.push('\u{b}'),
            '0' => result.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                result.push(char::from_u32(code)?);
            }
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                // Lone surrogates cannot be represented in a Rust string
                result.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => result.push(other),
        }
    }

    Some(result)
}

/// Byte offset of the start of every line, for offset → line/column mapping.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn position(&self, source: &str, offset: usize) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let column = source[self.starts[line]..offset].chars().count() + 1;
        (line as u32 + 1, column as u32)
    }
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Invalid or unexpected token '{text}'")]
    UnexpectedToken { text: String, span: Span },
}

impl LexError {
    /// Get the span of this error
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnexpectedToken { span, .. } => span,
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenize the whole source. The last token is always [`Token::Eof`].
    pub fn tokenize(self) -> Result<Vec<(Token, Span)>, LexError> {
        let index = LineIndex::new(self.source);
        let mut tokens = Vec::new();
        let mut lexer = LogosToken::lexer(self.source);

        while let Some(result) = lexer.next() {
            let range = lexer.span();
            let (line, column) = index.position(self.source, range.start);
            let span = Span::new(range.start, range.end, line, column);
            match result {
                Ok(token) => tokens.push((convert_token(token), span)),
                Err(()) => {
                    return Err(LexError::UnexpectedToken {
                        text: lexer.slice().to_string(),
                        span,
                    })
                }
            }
        }

        let end = self.source.len();
        let (line, column) = index.position(self.source, end);
        tokens.push((Token::Eof, Span::new(end, end, line, column)));
        Ok(tokens)
    }
}

fn convert_token(token: LogosToken) -> Token {
    match token {
        LogosToken::Var => Token::Var,
        LogosToken::Let => Token::Let,
        LogosToken::Const => Token::Const,
        LogosToken::Function => Token::Function,
        LogosToken::If => Token::If,
        LogosToken::Else => Token::Else,
        LogosToken::For => Token::For,
        LogosToken::While => Token::While,
        LogosToken::Do => Token::Do,
        LogosToken::Break => Token::Break,
        LogosToken::Continue => Token::Continue,
        LogosToken::Return => Token::Return,
        LogosToken::Throw => Token::Throw,
        LogosToken::Try => Token::Try,
        LogosToken::Catch => Token::Catch,
        LogosToken::Finally => Token::Finally,
        LogosToken::New => Token::New,
        LogosToken::Delete => Token::Delete,
        LogosToken::Typeof => Token::Typeof,
        LogosToken::Void => Token::Void,
        LogosToken::In => Token::In,
        LogosToken::Instanceof => Token::Instanceof,
        LogosToken::This => Token::This,
        LogosToken::Null => Token::Null,
        LogosToken::True => Token::True,
        LogosToken::False => Token::False,
        LogosToken::Number(n) => Token::Number(n),
        LogosToken::String(s) => Token::String(s),
        LogosToken::Identifier(name) => Token::Identifier(name),
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Dot => Token::Dot,
        LogosToken::Question => Token::Question,
        LogosToken::Colon => Token::Colon,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::PlusPlus => Token::PlusPlus,
        LogosToken::MinusMinus => Token::MinusMinus,
        LogosToken::Amp => Token::Amp,
        LogosToken::Pipe => Token::Pipe,
        LogosToken::Caret => Token::Caret,
        LogosToken::Tilde => Token::Tilde,
        LogosToken::LessLess => Token::LessLess,
        LogosToken::GreaterGreater => Token::GreaterGreater,
        LogosToken::GreaterGreaterGreater => Token::GreaterGreaterGreater,
        LogosToken::Bang => Token::Bang,
        LogosToken::AmpAmp => Token::AmpAmp,
        LogosToken::PipePipe => Token::PipePipe,
        LogosToken::EqualEqual => Token::EqualEqual,
        LogosToken::EqualEqualEqual => Token::EqualEqualEqual,
        LogosToken::BangEqual => Token::BangEqual,
        LogosToken::BangEqualEqual => Token::BangEqualEqual,
        LogosToken::Less => Token::Less,
        LogosToken::LessEqual => Token::LessEqual,
        LogosToken::Greater => Token::Greater,
        LogosToken::GreaterEqual => Token::GreaterEqual,
        LogosToken::Equal => Token::Equal,
        LogosToken::PlusEqual => Token::PlusEqual,
        LogosToken::MinusEqual => Token::MinusEqual,
        LogosToken::StarEqual => Token::StarEqual,
        LogosToken::SlashEqual => Token::SlashEqual,
        LogosToken::PercentEqual => Token::PercentEqual,
        // Skipped by logos callbacks
        LogosToken::LineComment | LogosToken::BlockComment => Token::Eof,
    }
}

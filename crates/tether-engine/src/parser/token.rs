//! Token definitions for the script language.

use std::fmt;

/// A token in script source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Declarations
    Var,
    Let,
    Const,
    Function,

    // Control flow
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Finally,

    // Operators spelled as keywords
    New,
    Delete,
    Typeof,
    Void,
    In,
    Instanceof,

    // Keyword literals
    This,
    Null,
    True,
    False,

    // Literals
    Number(f64),
    String(String),
    Identifier(String),

    // Brackets
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Punctuation
    Semicolon,
    Comma,
    Dot,
    Question,
    Colon,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    // Bitwise
    Amp,
    Pipe,
    Caret,
    Tilde,
    LessLess,
    GreaterGreater,
    GreaterGreaterGreater,

    // Logical
    Bang,
    AmpAmp,
    PipePipe,

    // Comparison
    EqualEqual,
    EqualEqualEqual,
    BangEqual,
    BangEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,

    /// End of input
    Eof,
}

impl Token {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Var
                | Token::Let
                | Token::Const
                | Token::Function
                | Token::If
                | Token::Else
                | Token::For
                | Token::While
                | Token::Do
                | Token::Break
                | Token::Continue
                | Token::Return
                | Token::Throw
                | Token::Try
                | Token::Catch
                | Token::Finally
                | Token::New
                | Token::Delete
                | Token::Typeof
                | Token::Void
                | Token::In
                | Token::Instanceof
                | Token::This
                | Token::Null
                | Token::True
                | Token::False
        )
    }

    /// Spelling of a keyword, usable as a property name after `.`
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::Var => "var",
            Token::Let => "let",
            Token::Const => "const",
            Token::Function => "function",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Do => "do",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Throw => "throw",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Finally => "finally",
            Token::New => "new",
            Token::Delete => "delete",
            Token::Typeof => "typeof",
            Token::Void => "void",
            Token::In => "in",
            Token::Instanceof => "instanceof",
            Token::This => "this",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "{}", text);
        }
        let text = match self {
            Token::Number(n) => return write!(f, "{}", n),
            Token::String(s) => return write!(f, "\"{}\"", s),
            Token::Identifier(name) => return write!(f, "{}", name),
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::LessLess => "<<",
            Token::GreaterGreater => ">>",
            Token::GreaterGreaterGreater => ">>>",
            Token::Bang => "!",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::EqualEqual => "==",
            Token::EqualEqualEqual => "===",
            Token::BangEqual => "!=",
            Token::BangEqualEqual => "!==",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Equal => "=",
            Token::PlusEqual => "+=",
            Token::MinusEqual => "-=",
            Token::StarEqual => "*=",
            Token::SlashEqual => "/=",
            Token::PercentEqual => "%=",
            Token::Eof => "end of input",
            _ => "?",
        };
        write!(f, "{}", text)
    }
}

/// Source location of a token or syntax node.
///
/// `start`/`end` are byte offsets; `line` and `column` are 1-based and refer
/// to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

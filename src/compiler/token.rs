use std::fmt::{self, Display, Formatter};

use crate::common::span::Spanned;

/// A lexed token. The set is closed: the lexer can produce nothing outside
/// this enum, and the parser matches on it exhaustively. Literal-carrying
/// variants keep their decoded value; everything else is identified by the
/// variant alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // literals and names
    Number(f64),
    String(String),
    Boolean(bool),
    Iden(String),

    // keywords
    If,
    Else,
    While,
    Return,
    Def,
    Break,
    Continue,
    Not,
    And,
    Or,
    End,

    // distinguished glyphs
    /// `﷽`: opens the program's top-level executable block.
    Entry,
    /// `☪`: reserved decorator marker.
    Decorator,
    /// `=` or `۝`.
    Assign,
    /// `۩`: string concatenation.
    Concat,

    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,

    // delimiters
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    /// Statement separator: newline, `;`, or `۞` (runs collapse to one).
    Sep,
    Eof,
}

pub type Tokens = Vec<Spanned<Token>>;

impl Token {
    /// Looks up an identifier in the reserved-keyword table. Identifiers
    /// that match are retagged to the keyword's token.
    pub fn keyword(iden: &str) -> Option<Token> {
        match iden {
            "if" => Some(Token::If),
            "else" => Some(Token::Else),
            "while" => Some(Token::While),
            "return" => Some(Token::Return),
            "def" => Some(Token::Def),
            "break" => Some(Token::Break),
            "continue" => Some(Token::Continue),
            "not" => Some(Token::Not),
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "end" => Some(Token::End),
            "true" => Some(Token::Boolean(true)),
            "false" => Some(Token::Boolean(false)),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number `{}`", n),
            Token::String(s) => write!(f, "string {:?}", s),
            Token::Boolean(b) => write!(f, "boolean `{}`", b),
            Token::Iden(name) => write!(f, "identifier `{}`", name),
            Token::If => write!(f, "keyword `if`"),
            Token::Else => write!(f, "keyword `else`"),
            Token::While => write!(f, "keyword `while`"),
            Token::Return => write!(f, "keyword `return`"),
            Token::Def => write!(f, "keyword `def`"),
            Token::Break => write!(f, "keyword `break`"),
            Token::Continue => write!(f, "keyword `continue`"),
            Token::Not => write!(f, "keyword `not`"),
            Token::And => write!(f, "keyword `and`"),
            Token::Or => write!(f, "keyword `or`"),
            Token::End => write!(f, "keyword `end`"),
            Token::Entry => write!(f, "entry marker `﷽`"),
            Token::Decorator => write!(f, "decorator `☪`"),
            Token::Assign => write!(f, "`=`"),
            Token::Concat => write!(f, "`۩`"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Star => write!(f, "`*`"),
            Token::Slash => write!(f, "`/`"),
            Token::Percent => write!(f, "`%`"),
            Token::Equal => write!(f, "`==`"),
            Token::NotEqual => write!(f, "`!=`"),
            Token::Less => write!(f, "`<`"),
            Token::LessEqual => write!(f, "`<=`"),
            Token::Greater => write!(f, "`>`"),
            Token::GreaterEqual => write!(f, "`>=`"),
            Token::AndAnd => write!(f, "`&&`"),
            Token::OrOr => write!(f, "`||`"),
            Token::Bang => write!(f, "`!`"),
            Token::OpenParen => write!(f, "`(`"),
            Token::CloseParen => write!(f, "`)`"),
            Token::Comma => write!(f, "`,`"),
            Token::Colon => write!(f, "`:`"),
            Token::Sep => write!(f, "end of statement"),
            Token::Eof => write!(f, "end of source"),
        }
    }
}

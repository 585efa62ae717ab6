use std::{rc::Rc, str::Chars};

use crate::common::{
    error::Error,
    source::Source,
    span::{Span, Spanned},
};
use crate::compiler::token::{Token, Tokens};

/// The table of distinguished glyphs and multi-character operators, longest
/// match first. Single-character ASCII operators and delimiters are handled
/// after this table, so `==` wins over `=`, and `۝` is an exact alias for
/// `=`. `×` and `÷` are lexer-level aliases for `*` and `/`.
const GLYPHS: &[(&str, Token)] = &[
    ("﷽", Token::Entry),
    ("۝", Token::Assign),
    ("۩", Token::Concat),
    ("☪", Token::Decorator),
    ("×", Token::Star),
    ("÷", Token::Slash),
    ("==", Token::Equal),
    ("!=", Token::NotEqual),
    ("<=", Token::LessEqual),
    (">=", Token::GreaterEqual),
    ("&&", Token::AndAnd),
    ("||", Token::OrOr),
];

/// Turns source text into a flat sequence of spanned tokens, always
/// terminated by a single `Eof` token. Whitespace and `#`-comments are
/// discarded between tokens; newlines, `;`, and `۞` become separator
/// tokens (a run of them collapses to one).
#[derive(Debug)]
pub struct Lexer {
    source: Rc<Source>,
    index: usize,
    tokens: Tokens,
}

impl Lexer {
    /// Lexes a source file into a stream of tokens.
    pub fn lex(source: Rc<Source>) -> Result<Tokens, Error> {
        let mut lexer = Lexer {
            source,
            index: 0,
            tokens: vec![],
        };

        // prime the lexer
        lexer.strip();

        while lexer.index < lexer.source.contents.len() {
            let token = lexer.next_token()?;
            lexer.tokens.push(token);
            lexer.strip();
        }

        let end = Span::point(&lexer.source, lexer.index);
        lexer.tokens.push(Spanned::new(Token::Eof, end));
        Ok(lexer.tokens)
    }

    /// All characters after the current index position.
    fn remaining(&self) -> Chars {
        self.source.contents[self.index..].chars()
    }

    /// Selects `len` bytes of the source from the current index position.
    fn grab_from_index(&self, len: usize) -> &str {
        &self.source.contents[self.index..self.index + len]
    }

    /// Discards whitespace (except newlines, which separate statements)
    /// and `#` comments.
    fn strip(&mut self) {
        let mut index = self.index;
        loop {
            let old_index = index;
            let mut remaining = self.source.contents[index..].chars().peekable();

            while let Some(c) = remaining.peek() {
                if !c.is_whitespace() || *c == '\n' {
                    break;
                }
                index += c.len_utf8();
                remaining.next();
            }

            if let Some('#') = remaining.peek() {
                for c in remaining {
                    if c == '\n' {
                        break;
                    }
                    index += c.len_utf8();
                }
            }

            if index == old_index {
                break;
            }
        }
        self.index = index;
    }

    /// Measures a run of characters matching `pred` from the current
    /// position, starting with `first`.
    fn eat_while(
        &self,
        first: char,
        remaining: &mut impl Iterator<Item = char>,
        pred: impl Fn(char) -> bool,
    ) -> usize {
        let mut len = first.len_utf8();
        for c in remaining {
            if !pred(c) {
                break;
            }
            len += c.len_utf8();
        }
        len
    }

    /// Matches the glyph/operator table against the remaining source.
    fn glyph(&self) -> Option<(Token, usize)> {
        let rest = &self.source.contents[self.index..];
        GLYPHS
            .iter()
            .find(|(glyph, _)| rest.starts_with(glyph))
            .map(|(glyph, token)| (token.clone(), glyph.len()))
    }

    /// Lexes a numeric literal: an integer or decimal run of digits,
    /// decoded to a 64-bit float.
    fn number(
        &self,
        first: char,
        remaining: &mut std::iter::Peekable<impl Iterator<Item = char>>,
    ) -> Result<(Token, usize), Error> {
        let mut len = first.len_utf8();
        let mut seen_dot = false;

        while let Some(c) = remaining.peek() {
            match c {
                '0'..='9' => len += 1,
                '.' if !seen_dot => {
                    seen_dot = true;
                    len += 1;
                },
                _ => break,
            }
            remaining.next();
        }

        let lexeme = self.grab_from_index(len);
        let number = lexeme.parse::<f64>().map_err(|_| {
            Error::syntax(
                &format!("Malformed number literal `{}`", lexeme),
                &Span::new(&self.source, self.index, len),
            )
        })?;

        Ok((Token::Number(number), len))
    }

    /// Lexes a quoted string literal. The opening quote has already been
    /// consumed. Escapes are passed through: the common C-style ones are
    /// decoded, anything else after a backslash is kept as-is.
    fn string(
        &self,
        quote: char,
        remaining: impl Iterator<Item = char>,
    ) -> Result<(Token, usize), Error> {
        let mut len = quote.len_utf8();
        let mut escape = false;
        let mut string = String::new();

        for c in remaining {
            len += c.len_utf8();
            if escape {
                escape = false;
                string.push(match c {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    other => other,
                });
            } else {
                match c {
                    '\\' => escape = true,
                    c if c == quote => return Ok((Token::String(string), len)),
                    c => string.push(c),
                }
            }
        }

        Err(Error::syntax(
            "Unexpected end of source while lexing string literal",
            &Span::new(&self.source, self.index, len),
        ))
    }

    /// Lexes the next token. Expects whitespace and comments to have been
    /// stripped.
    fn next_token(&mut self) -> Result<Spanned<Token>, Error> {
        // the symbolic glyph table wins over everything else
        if let Some((token, len)) = self.glyph() {
            let spanned =
                Spanned::new(token, Span::new(&self.source, self.index, len));
            self.index += len;
            return Ok(spanned);
        }

        let mut remaining = self.remaining().peekable();
        let first = match remaining.next() {
            Some(c) => c,
            None => unreachable!("Lexer ran past the end of the source"),
        };

        let (token, len) = match first {
            // statement separator; a run collapses into one token
            c @ ('\n' | ';' | '۞') => {
                let len = self.eat_while(c, &mut remaining, |n| {
                    n.is_whitespace() || n == ';' || n == '۞'
                });
                (Token::Sep, len)
            },

            c @ '0'..='9' => self.number(c, &mut remaining)?,

            c @ ('"' | '\'') => self.string(c, remaining)?,

            c if c.is_alphabetic() || c == '_' => {
                let len = self.eat_while(c, &mut remaining, |n| {
                    n.is_alphanumeric() || n == '_'
                });
                let name = self.grab_from_index(len);
                let token = Token::keyword(name)
                    .unwrap_or_else(|| Token::Iden(name.to_string()));
                (token, len)
            },

            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '=' => (Token::Assign, 1),
            '<' => (Token::Less, 1),
            '>' => (Token::Greater, 1),
            '!' => (Token::Bang, 1),
            '(' => (Token::OpenParen, 1),
            ')' => (Token::CloseParen, 1),
            ',' => (Token::Comma, 1),
            ':' => (Token::Colon, 1),

            unknown => {
                return Err(Error::syntax(
                    &format!("The character `{}` matches no rule of the language", unknown),
                    &Span::new(&self.source, self.index, unknown.len_utf8()),
                ))
            },
        };

        let spanned = Spanned::new(token, Span::new(&self.source, self.index, len));
        self.index += len;
        Ok(spanned)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::lex(Source::source(source))
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.item)
            .collect()
    }

    #[test]
    fn empty() {
        assert_eq!(tokens(""), vec![Token::Eof]);
    }

    #[test]
    fn single_number() {
        assert_eq!(tokens("42"), vec![Token::Number(42.0), Token::Eof]);
    }

    #[test]
    fn decimal_number() {
        assert_eq!(tokens("3.25"), vec![Token::Number(3.25), Token::Eof]);
    }

    #[test]
    fn glyphs() {
        assert_eq!(
            tokens("﷽ ۝ ۩"),
            vec![Token::Entry, Token::Assign, Token::Concat, Token::Eof],
        );
    }

    #[test]
    fn math_aliases() {
        assert_eq!(
            tokens("2 × 3 ÷ 4"),
            vec![
                Token::Number(2.0),
                Token::Star,
                Token::Number(3.0),
                Token::Slash,
                Token::Number(4.0),
                Token::Eof,
            ],
        );
    }

    #[test]
    fn longest_match() {
        assert_eq!(
            tokens("x <= y == z = w"),
            vec![
                Token::Iden("x".to_string()),
                Token::LessEqual,
                Token::Iden("y".to_string()),
                Token::Equal,
                Token::Iden("z".to_string()),
                Token::Assign,
                Token::Iden("w".to_string()),
                Token::Eof,
            ],
        );
    }

    #[test]
    fn keywords_retagged() {
        assert_eq!(
            tokens("while whilst"),
            vec![Token::While, Token::Iden("whilst".to_string()), Token::Eof],
        );
    }

    #[test]
    fn separators_collapse() {
        assert_eq!(
            tokens("1 ;;\n۞; 2"),
            vec![Token::Number(1.0), Token::Sep, Token::Number(2.0), Token::Eof],
        );
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            tokens("\"he\\\"llo\" 'wo\\nrld'"),
            vec![
                Token::String("he\"llo".to_string()),
                Token::String("wo\nrld".to_string()),
                Token::Eof,
            ],
        );
    }

    #[test]
    fn comments_stripped() {
        assert_eq!(
            tokens("1 # the loneliest number\n2"),
            vec![Token::Number(1.0), Token::Sep, Token::Number(2.0), Token::Eof],
        );
    }

    #[test]
    fn comment_only_source() {
        assert_eq!(tokens("   # nothing but commentary\t "), vec![Token::Eof]);
    }

    #[test]
    fn unknown_character() {
        let result = Lexer::lex(Source::source("1 ¤ 2"));
        assert!(result.is_err());
    }

    #[test]
    fn unterminated_string() {
        let result = Lexer::lex(Source::source("\"runs right off the"));
        assert!(result.is_err());
    }
}

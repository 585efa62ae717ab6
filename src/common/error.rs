use std::fmt::{self, Display, Formatter};

use crate::common::span::Span;

/// Every way a program can fail, from the first lexed character to the last
/// executed instruction. The set is closed on purpose: each pipeline stage
/// matches exhaustively on the values it can produce, and callers can rely
/// on nothing else ever coming out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Type,
    Runtime,
    DivisionByZero,
    UndefinedVariable,
    UndefinedFunction,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "Syntax Error",
            ErrorKind::Name => "Name Error",
            ErrorKind::Type => "Type Error",
            ErrorKind::Runtime => "Runtime Error",
            ErrorKind::DivisionByZero => "Division By Zero",
            ErrorKind::UndefinedVariable => "Undefined Variable",
            ErrorKind::UndefinedFunction => "Undefined Function",
        };
        write!(f, "{}", name)
    }
}

/// An error produced by any stage of the pipeline: a kind from the closed
/// taxonomy, a message, and the span it occurred at when one is known.
/// Compile-time errors always know their span; runtime errors usually
/// don't, since bytecode carries no location info.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: &str) -> Error {
        Error {
            kind,
            message: message.to_string(),
            span: None,
        }
    }

    pub fn spanned(kind: ErrorKind, message: &str, span: &Span) -> Error {
        Error {
            kind,
            message: message.to_string(),
            span: Some(span.clone()),
        }
    }

    pub fn syntax(message: &str, span: &Span) -> Error {
        Error::spanned(ErrorKind::Syntax, message, span)
    }

    pub fn name(message: &str, span: &Span) -> Error {
        Error::spanned(ErrorKind::Name, message, span)
    }

    pub fn ty(message: &str, span: &Span) -> Error {
        Error::spanned(ErrorKind::Type, message, span)
    }

    pub fn runtime(message: &str) -> Error {
        Error::new(ErrorKind::Runtime, message)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref span) = self.span {
            write!(f, "{}", span.format())?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;

    #[test]
    fn display_with_span() {
        let source = Source::source("x = \"Hello, world\" + 1");
        let error = Error::syntax(
            "Unexpected token `\"Hello, world\"`",
            &Span::new(&source, 4, 14),
        );

        let target = "In ./source:1:5
  |
1 | x = \"Hello, world\" + 1
  |     ^^^^^^^^^^^^^^
Syntax Error: Unexpected token `\"Hello, world\"`";

        assert_eq!(format!("{}", error), target);
    }

    #[test]
    fn display_without_span() {
        let error = Error::new(ErrorKind::DivisionByZero, "division by zero");
        assert_eq!(format!("{}", error), "Division By Zero: division by zero");
    }
}

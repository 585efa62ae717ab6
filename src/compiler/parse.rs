use crate::common::{
    error::Error,
    opcode::{BinOp, UnOp},
    span::{Span, Spanned},
};
use crate::compiler::{
    ast::Ast,
    token::{Token, Tokens},
};

/// Precedence levels for the expression grammar, lowest binding first.
/// Each successive level binds tighter, so, for example, multiplication
/// wins over addition: `* > +`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prec {
    /// No precedence; the floor the expression entry point climbs from.
    None = 0,
    /// `=` (handled at the statement level, kept for the climb order).
    Assign,
    /// `||`, `or`
    Or,
    /// `&&`, `and`
    And,
    /// `==`, `!=`
    Equality,
    /// `<`, `>`, `<=`, `>=`
    Comparison,
    /// `+`, `-`, `۩`
    Term,
    /// `*`, `/`, `%`
    Factor,
    /// `-x`, `!x`, `not x`
    Unary,
    /// `f(...)`
    Call,
    /// Highest precedence.
    End,
}

/// A recursive-descent parser with precedence climbing for binary
/// expressions. Consumes the whole token stream and produces a single
/// `Ast::Program` root, or fails on the first malformed construct: there
/// is no error recovery.
#[derive(Debug)]
pub struct Parser {
    tokens: Tokens,
    index: usize,
}

impl Parser {
    /// Parses a token stream into a syntax tree.
    pub fn parse(tokens: Tokens) -> Result<Spanned<Ast>, Error> {
        let mut parser = Parser { tokens, index: 0 };

        let mut items = vec![];
        parser.skip_seps();
        while !parser.check(&Token::Eof) {
            items.push(parser.item()?);
            parser.end_of_statement()?;
        }

        let span = match items.as_slice() {
            [] => parser.peek().span.clone(),
            [only] => only.span.clone(),
            [first, .., last] => Span::combine(&first.span, &last.span),
        };
        parser.consume(Token::Eof)?;

        Ok(Spanned::new(Ast::Program(items), span))
    }

    // token plumbing

    /// The current token. Safe at any index because the stream is always
    /// terminated by `Eof`.
    fn peek(&self) -> &Spanned<Token> {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn check(&self, token: &Token) -> bool {
        &self.peek().item == token
    }

    fn advance(&mut self) -> Spanned<Token> {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    /// Consumes the expected token, or fails naming expected vs. actual
    /// and where in the stream the mismatch happened.
    fn consume(&mut self, expected: Token) -> Result<Spanned<Token>, Error> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            let actual = self.peek();
            Err(Error::syntax(
                &format!(
                    "Expected {}, found {} (token {})",
                    expected, actual.item, self.index
                ),
                &actual.span,
            ))
        }
    }

    fn skip_seps(&mut self) {
        while self.check(&Token::Sep) {
            self.advance();
        }
    }

    /// A statement ends at a separator or right before a block terminator.
    fn end_of_statement(&mut self) -> Result<(), Error> {
        match &self.peek().item {
            Token::Sep => {
                self.skip_seps();
                Ok(())
            },
            Token::End | Token::Else | Token::Eof => Ok(()),
            found => Err(Error::syntax(
                &format!("Expected end of statement, found {}", found),
                &self.peek().span,
            )),
        }
    }

    // statements

    /// A top-level item: the entry block, a function definition, or any
    /// ordinary statement.
    fn item(&mut self) -> Result<Spanned<Ast>, Error> {
        match &self.peek().item {
            Token::Entry => self.entry_block(),
            _ => self.statement(),
        }
    }

    fn statement(&mut self) -> Result<Spanned<Ast>, Error> {
        match &self.peek().item {
            Token::If => self.if_statement(),
            Token::While => self.while_statement(),
            Token::Def => self.function_def(),
            Token::Return => self.return_statement(),
            Token::Break => {
                let token = self.advance();
                Ok(Spanned::new(Ast::Break, token.span))
            },
            Token::Continue => {
                let token = self.advance();
                Ok(Spanned::new(Ast::Continue, token.span))
            },
            Token::Decorator => Err(Error::syntax(
                "Decorators are a work in progress",
                &self.peek().span,
            )),
            Token::Iden(_) if self.tokens[self.index + 1].item == Token::Assign => {
                self.assignment()
            },
            _ => self.expression(Prec::None),
        }
    }

    /// The statements between a `:` header and the matching terminator.
    /// Does not consume the terminator.
    fn block(&mut self) -> Result<Vec<Spanned<Ast>>, Error> {
        let mut statements = vec![];
        self.skip_seps();
        while !matches!(self.peek().item, Token::End | Token::Else | Token::Eof) {
            statements.push(self.statement()?);
            self.end_of_statement()?;
        }
        Ok(statements)
    }

    /// `﷽ : statements end`: the program's executable entry block.
    fn entry_block(&mut self) -> Result<Spanned<Ast>, Error> {
        let start = self.consume(Token::Entry)?;
        self.consume(Token::Colon)?;
        let statements = self.block()?;
        let end = self.consume(Token::End)?;

        Ok(Spanned::new(
            Ast::Entry(statements),
            Span::combine(&start.span, &end.span),
        ))
    }

    /// `def name(a, b) : body end`
    fn function_def(&mut self) -> Result<Spanned<Ast>, Error> {
        let start = self.consume(Token::Def)?;
        let name = self.identifier()?;

        self.consume(Token::OpenParen)?;
        let mut params = vec![];
        while !self.check(&Token::CloseParen) {
            params.push(self.identifier()?.item);
            if !self.check(&Token::CloseParen) {
                self.consume(Token::Comma)?;
            }
        }
        self.consume(Token::CloseParen)?;
        self.consume(Token::Colon)?;

        let body = self.block()?;
        let end = self.consume(Token::End)?;

        Ok(Spanned::new(
            Ast::FunctionDef {
                name: name.item,
                params,
                body,
            },
            Span::combine(&start.span, &end.span),
        ))
    }

    /// `if condition : then [else : otherwise] end`
    fn if_statement(&mut self) -> Result<Spanned<Ast>, Error> {
        let start = self.consume(Token::If)?;
        let condition = self.expression(Prec::None)?;
        self.consume(Token::Colon)?;

        let then = self.spanned_block(&condition.span)?;
        let otherwise = if self.check(&Token::Else) {
            let else_token = self.advance();
            self.consume(Token::Colon)?;
            Some(Box::new(self.spanned_block(&else_token.span)?))
        } else {
            None
        };
        let end = self.consume(Token::End)?;

        Ok(Spanned::new(
            Ast::If {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise,
            },
            Span::combine(&start.span, &end.span),
        ))
    }

    /// `while condition : body end`
    fn while_statement(&mut self) -> Result<Spanned<Ast>, Error> {
        let start = self.consume(Token::While)?;
        let condition = self.expression(Prec::None)?;
        self.consume(Token::Colon)?;

        let body = self.spanned_block(&condition.span)?;
        let end = self.consume(Token::End)?;

        Ok(Spanned::new(
            Ast::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            Span::combine(&start.span, &end.span),
        ))
    }

    fn return_statement(&mut self) -> Result<Spanned<Ast>, Error> {
        let start = self.consume(Token::Return)?;
        let value = match self.peek().item {
            Token::Sep | Token::End | Token::Else | Token::Eof => None,
            _ => Some(Box::new(self.expression(Prec::None)?)),
        };

        let span = match &value {
            Some(expression) => Span::combine(&start.span, &expression.span),
            None => start.span,
        };
        Ok(Spanned::new(Ast::Return(value), span))
    }

    /// `name = expression` (also spelled `name ۝ expression`).
    fn assignment(&mut self) -> Result<Spanned<Ast>, Error> {
        let name = self.identifier()?;
        self.consume(Token::Assign)?;
        let value = self.expression(Prec::Assign)?;

        let span = Span::combine(&name.span, &value.span);
        Ok(Spanned::new(
            Ast::Assign {
                name: name.item,
                value: Box::new(value),
            },
            span,
        ))
    }

    /// Parses a block and wraps it in a single spanned `Ast::Block` node.
    fn spanned_block(&mut self, fallback: &Span) -> Result<Spanned<Ast>, Error> {
        let statements = self.block()?;
        let span = match statements.as_slice() {
            [] => fallback.clone(),
            [only] => only.span.clone(),
            [first, .., last] => Span::combine(&first.span, &last.span),
        };
        Ok(Spanned::new(Ast::Block(statements), span))
    }

    fn identifier(&mut self) -> Result<Spanned<String>, Error> {
        match self.peek().item.clone() {
            Token::Iden(name) => {
                let token = self.advance();
                Ok(Spanned::new(name, token.span))
            },
            found => Err(Error::syntax(
                &format!("Expected an identifier, found {}", found),
                &self.peek().span,
            )),
        }
    }

    // expressions

    /// Precedence climbing: parse a prefix expression, then fold in every
    /// infix operator that binds tighter than `min`. Operators are
    /// left-associative because the right side is parsed at the operator's
    /// own precedence.
    fn expression(&mut self, min: Prec) -> Result<Spanned<Ast>, Error> {
        let mut left = self.prefix()?;

        while Parser::infix_prec(&self.peek().item) > min {
            let token = self.advance();
            let op = Parser::infix_op(&token.item);
            let right = self.expression(Parser::infix_prec(&token.item))?;

            let span = Span::combine(&left.span, &right.span);
            left = Spanned::new(
                Ast::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn prefix(&mut self) -> Result<Spanned<Ast>, Error> {
        match self.peek().item.clone() {
            Token::Number(n) => {
                let token = self.advance();
                Ok(Spanned::new(Ast::Number(n), token.span))
            },
            Token::String(s) => {
                let token = self.advance();
                Ok(Spanned::new(Ast::String(s), token.span))
            },
            Token::Boolean(b) => {
                let token = self.advance();
                Ok(Spanned::new(Ast::Boolean(b), token.span))
            },
            Token::Iden(name) => {
                let token = self.advance();
                if self.check(&Token::OpenParen) {
                    self.call(name, token.span)
                } else {
                    Ok(Spanned::new(Ast::Identifier(name), token.span))
                }
            },
            Token::OpenParen => {
                self.advance();
                let inner = self.expression(Prec::None)?;
                self.consume(Token::CloseParen)?;
                Ok(inner)
            },
            Token::Minus => self.unary(UnOp::Neg),
            Token::Bang | Token::Not => self.unary(UnOp::Not),
            found => Err(Error::syntax(
                &format!("Expected an expression, found {}", found),
                &self.peek().span,
            )),
        }
    }

    fn unary(&mut self, op: UnOp) -> Result<Spanned<Ast>, Error> {
        let token = self.advance();
        let operand = self.expression(Prec::Unary)?;

        let span = Span::combine(&token.span, &operand.span);
        Ok(Spanned::new(
            Ast::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `name(a, b, c)`: the name has already been consumed.
    fn call(&mut self, name: String, name_span: Span) -> Result<Spanned<Ast>, Error> {
        self.consume(Token::OpenParen)?;
        let mut args = vec![];
        while !self.check(&Token::CloseParen) {
            args.push(self.expression(Prec::None)?);
            if !self.check(&Token::CloseParen) {
                self.consume(Token::Comma)?;
            }
        }
        let close = self.consume(Token::CloseParen)?;

        Ok(Spanned::new(
            Ast::Call { name, args },
            Span::combine(&name_span, &close.span),
        ))
    }

    /// Precedence of a token used in infix position; `Prec::None` for
    /// anything that can't continue an expression.
    fn infix_prec(token: &Token) -> Prec {
        match token {
            Token::OrOr | Token::Or => Prec::Or,
            Token::AndAnd | Token::And => Prec::And,
            Token::Equal | Token::NotEqual => Prec::Equality,
            Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => {
                Prec::Comparison
            },
            Token::Plus | Token::Minus | Token::Concat => Prec::Term,
            Token::Star | Token::Slash | Token::Percent => Prec::Factor,
            _ => Prec::None,
        }
    }

    /// The operator an infix token denotes. Only called on tokens
    /// `infix_prec` accepted.
    fn infix_op(token: &Token) -> BinOp {
        match token {
            Token::OrOr | Token::Or => BinOp::Or,
            Token::AndAnd | Token::And => BinOp::And,
            Token::Equal => BinOp::Equal,
            Token::NotEqual => BinOp::NotEqual,
            Token::Less => BinOp::Less,
            Token::LessEqual => BinOp::LessEqual,
            Token::Greater => BinOp::Greater,
            Token::GreaterEqual => BinOp::GreaterEqual,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Concat => BinOp::Concat,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Rem,
            _ => unreachable!("not an infix operator: {}", token),
        }
    }
}

//! This module contains the compilation pipeline:
//! lexing, parsing, semantic analysis, tree optimization,
//! and bytecode generation.
//!
//! Each stage is usable on its own; the chained functions at the
//! bottom run the pipeline from a source up to a given stage.

use std::rc::Rc;

pub mod token;
pub use token::{Token, Tokens};

pub mod lex;
pub use lex::Lexer;

pub mod parse;
pub use parse::Parser;

pub mod ast;
pub use ast::Ast;

pub mod analyze;
pub use analyze::Analyzer;

pub mod optimize;
pub use optimize::{Optimizer, Pass};

pub mod gen;
pub use gen::Compiler;

use crate::common::{error::Error, program::Program, source::Source, span::Spanned};

#[inline(always)]
pub fn lex(source: Rc<Source>) -> Result<Tokens, Error> {
    Lexer::lex(source)
}

#[inline(always)]
pub fn parse(source: Rc<Source>) -> Result<Spanned<Ast>, Error> {
    let tokens = lex(source)?;
    Parser::parse(tokens)
}

#[inline(always)]
pub fn analyze(source: Rc<Source>) -> Result<Spanned<Ast>, Error> {
    let tree = parse(source)?;
    Analyzer::analyze(&tree)?;
    Ok(tree)
}

#[inline(always)]
pub fn optimize(source: Rc<Source>) -> Result<Spanned<Ast>, Error> {
    let tree = analyze(source)?;
    Ok(Optimizer::full().optimize(tree))
}

#[inline(always)]
pub fn gen(source: Rc<Source>) -> Result<Program, Error> {
    let tree = optimize(source)?;
    gen::gen(&tree)
}

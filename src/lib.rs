//! # Sigil
//! This crate contains the core of the Sigil scripting language: a lexer,
//! parser, semantic analyzer, tree optimizer, bytecode compiler, and the
//! virtual machine that runs the result, with a budgeted mark-and-sweep
//! heap behind it.
//!
//! ## Embedding Sigil in Rust
//! ```ignore
//! use sigil;
//!
//! fn main() {
//!     let result = sigil::run("x = 42\nx + 8").unwrap();
//!     // result is Some(Data::Number(50.0))
//! }
//! ```
//!
//! ## Overview of the pipeline
//! Source code is wrapped in a `Source` and handed through the stages in
//! `compiler`: `lex` produces tokens, `parse` a syntax tree, `analyze`
//! validates names and contexts, `optimize` rewrites the tree to a fixed
//! point, and `gen` lowers it to a `Program`. A `Vm` then executes the
//! program's root chunk. Every stage returns `Result` with the same
//! `Error` type, so a failure anywhere falls straight out of `run`.

pub mod common;
pub mod compiler;
pub mod vm;

use std::rc::Rc;

use common::{data::Data, error::Error, program::Program, source::Source};
use vm::Vm;

/// Compiles a source all the way down to a runnable program.
pub fn compile(source: Rc<Source>) -> Result<Program, Error> {
    compiler::gen(source)
}

/// Compiles and runs a string of source code, returning the program's
/// result.
pub fn run(source: &str) -> Result<Option<Data>, Error> {
    let program = compile(Source::source(source))?;
    Vm::run_program(program)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn run_wires_the_whole_pipeline() {
        assert_eq!(run("x = 42\nx + 8").unwrap(), Some(Data::Number(50.0)));
    }

    #[test]
    fn compile_errors_fall_out_of_run() {
        assert!(run("y = x + 1").is_err());
    }
}

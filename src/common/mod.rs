//! Data structures shared between the compiler and the VM.

pub mod data;
pub mod error;
pub mod opcode;
pub mod program;
pub mod source;
pub mod span;

pub use data::{Data, Handle};
pub use error::{Error, ErrorKind};
pub use opcode::{BinOp, Op, UnOp};
pub use program::{Chunk, Function, Program};
pub use source::Source;
pub use span::{Span, Spanned};

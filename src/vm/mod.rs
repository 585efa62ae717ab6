//! This module contains the runtime:
//! the managed heap, call frames, the standard library,
//! and the interpreter itself.

pub mod frame;
pub use frame::{CallStack, Frame};

pub mod heap;
pub use heap::{Composite, Heap};

pub mod stdlib;

pub mod vm;
pub use vm::Vm;

use std::{collections::HashMap, rc::Rc};

use crate::common::{data::Data, opcode::Op};

/// A single interpretable run of instructions paired with its constant
/// pool. The root of a program is a chunk, and so is every function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub code: Vec<Op>,
    pub constants: Vec<Data>,
}

impl Chunk {
    /// Creates a new empty `Chunk` to be filled.
    pub fn empty() -> Chunk {
        Chunk {
            code: vec![],
            constants: vec![],
        }
    }

    /// Appends an instruction, returning its index so jumps emitted with
    /// placeholder targets can be patched later.
    pub fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    /// Overwrites a previously emitted instruction. This is the second half
    /// of backpatching: reserve with `emit`, overwrite once the jump
    /// distance is known.
    pub fn patch(&mut self, index: usize, op: Op) {
        self.code[index] = op;
    }

    /// The index the next emitted instruction will land on.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Adds some data to the constant pool and returns its index. The pool
    /// is append-only and deduplicated by structural equality, so an index,
    /// once handed out, is stable for the life of the chunk.
    pub fn index_data(&mut self, data: Data) -> usize {
        match self.constants.iter().position(|d| d == &data) {
            Some(index) => index,
            None => {
                self.constants.push(data);
                self.constants.len() - 1
            },
        }
    }
}

/// A user-defined function: its parameter names, in binding order, and its
/// compiled body. No call frame is allocated until the VM actually calls
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub chunk: Rc<Chunk>,
}

/// The output of the code generator: the root chunk plus a flat table of
/// every function defined anywhere in the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub chunk: Rc<Chunk>,
    pub functions: HashMap<String, Rc<Function>>,
}

use std::fmt::{self, Display, Formatter};

use proptest_derive::Arbitrary;

/// A binary operator, shared between the syntax tree and the instruction
/// set. The code generator lowers a `Binary` node to the same operator the
/// parser produced; the VM is the only place that gives them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let glyph = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Concat => "۩",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::Less => "<",
            BinOp::LessEqual => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEqual => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", glyph)
    }
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum UnOp {
    Neg,
    Not,
}

impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}

/// A single instruction. Operands are carried inline rather than in a
/// trailing byte stream, so backpatching a jump is a plain slot overwrite.
/// Indices point into the owning chunk's constant pool (`Constant`, `Load`,
/// `Store`, `Call`) or into its code (`Jump`, `JumpIfFalse`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Push constant-pool entry `n`.
    Constant(usize),
    /// Read the named variable (name is constant `n`) and push its value.
    Load(usize),
    /// Pop a value into the named variable (name is constant `n`).
    Store(usize),
    /// Pop and discard the top of the stack.
    Del,
    /// Pop two operands, apply, push the result.
    Binary(BinOp),
    /// Pop one operand, apply, push the result.
    Unary(UnOp),
    /// Set the instruction pointer to `n`.
    Jump(usize),
    /// Pop a value; if it's falsy, set the instruction pointer to `n`.
    JumpIfFalse(usize),
    /// Call the function named by constant `name` with `argc` popped
    /// arguments. The standard library shadows user definitions.
    Call { name: usize, argc: usize },
    /// Pop the current frame, handing the top of the stack to the caller.
    Return,
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Op::Constant(n) => write!(f, "Constant\t{}", n),
            Op::Load(n) => write!(f, "Load    \t{}", n),
            Op::Store(n) => write!(f, "Store   \t{}", n),
            Op::Del => write!(f, "Del"),
            Op::Binary(op) => write!(f, "Binary  \t{}", op),
            Op::Unary(op) => write!(f, "Unary   \t{}", op),
            Op::Jump(n) => write!(f, "Jump    \t{}", n),
            Op::JumpIfFalse(n) => write!(f, "JumpIfF \t{}", n),
            Op::Call { name, argc } => write!(f, "Call    \t{} ({} args)", name, argc),
            Op::Return => write!(f, "Return"),
        }
    }
}

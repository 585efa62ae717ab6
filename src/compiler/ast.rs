use std::fmt::{self, Display, Formatter};

use crate::common::{
    opcode::{BinOp, UnOp},
    span::Spanned,
};

/// A node in the abstract syntax tree. The tree is produced by the parser,
/// rewritten wholesale by the optimizer, and read (never mutated) by the
/// code generator. Each node exclusively owns its children; the tree has no
/// sharing and no cycles.
///
/// This is a closed set of tagged variants, so every later stage matches on
/// it exhaustively and a new construct can't be half-supported by accident.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// The root: every top-level item of the source in order.
    Program(Vec<Spanned<Ast>>),
    /// The `﷽` block: the program's distinguished executable entry.
    Entry(Vec<Spanned<Ast>>),
    /// A statement block (function body, branch body, loop body).
    Block(Vec<Spanned<Ast>>),
    /// `def name(params) : body end`
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Spanned<Ast>>,
    },
    /// `name = value`
    Assign {
        name: String,
        value: Box<Spanned<Ast>>,
    },
    If {
        condition: Box<Spanned<Ast>>,
        then: Box<Spanned<Ast>>,
        otherwise: Option<Box<Spanned<Ast>>>,
    },
    While {
        condition: Box<Spanned<Ast>>,
        body: Box<Spanned<Ast>>,
    },
    Return(Option<Box<Spanned<Ast>>>),
    Break,
    Continue,
    Binary {
        op: BinOp,
        left: Box<Spanned<Ast>>,
        right: Box<Spanned<Ast>>,
    },
    Unary {
        op: UnOp,
        operand: Box<Spanned<Ast>>,
    },
    /// `name(args)`: resolved against the standard library, then against
    /// user definitions, at run time.
    Call {
        name: String,
        args: Vec<Spanned<Ast>>,
    },
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),
}

impl Ast {
    /// The node's kind as a name, for error messages that must point at a
    /// construct rather than at source text.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Ast::Program(_) => "program",
            Ast::Entry(_) => "entry block",
            Ast::Block(_) => "block",
            Ast::FunctionDef { .. } => "function definition",
            Ast::Assign { .. } => "assignment",
            Ast::If { .. } => "if",
            Ast::While { .. } => "while",
            Ast::Return(_) => "return",
            Ast::Break => "break",
            Ast::Continue => "continue",
            Ast::Binary { .. } => "binary operation",
            Ast::Unary { .. } => "unary operation",
            Ast::Call { .. } => "call",
            Ast::Number(_) => "number",
            Ast::String(_) => "string",
            Ast::Boolean(_) => "boolean",
            Ast::Identifier(_) => "identifier",
        }
    }

    /// Whether the node leaves a value on the stack when compiled as a
    /// statement. Assignments and control flow are stack-neutral;
    /// everything else is an expression.
    pub fn is_expression(&self) -> bool {
        !matches!(
            self,
            Ast::Program(_)
                | Ast::Entry(_)
                | Ast::Block(_)
                | Ast::FunctionDef { .. }
                | Ast::Assign { .. }
                | Ast::If { .. }
                | Ast::While { .. }
                | Ast::Return(_)
                | Ast::Break
                | Ast::Continue
        )
    }
}

impl Display for Ast {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_name())
    }
}

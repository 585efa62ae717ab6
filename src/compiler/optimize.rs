use crate::common::{
    opcode::BinOp,
    span::Spanned,
};
use crate::compiler::ast::Ast;

/// One peephole tree-rewrite pass. Each pass looks at a single node whose
/// children have already been rewritten and either produces a replacement
/// node or leaves it alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// A binary operation over two numeric literals becomes the literal
    /// result. Division by a literal zero is left alone so it still fails
    /// at run time, not at compile time.
    ConstantFolding,
    /// An `if` on a literal boolean condition becomes its taken branch.
    DeadCodeElimination,
    /// `x * 1`, `x + 0`, and `0 + x` become `x`. A syntactic pattern match
    /// on node shape, not algebraic simplification.
    ExpressionSimplification,
}

impl Pass {
    /// Tries to rewrite a single node. Returns `None` if the pass does not
    /// apply; the node is left as it was.
    fn rewrite(&self, node: &Spanned<Ast>) -> Option<Spanned<Ast>> {
        match self {
            Pass::ConstantFolding => Pass::fold(node),
            Pass::DeadCodeElimination => Pass::prune(node),
            Pass::ExpressionSimplification => Pass::simplify(node),
        }
    }

    fn fold(node: &Spanned<Ast>) -> Option<Spanned<Ast>> {
        if let Ast::Binary { op, left, right } = &node.item {
            if let (Ast::Number(a), Ast::Number(b)) = (&left.item, &right.item) {
                let folded = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div if *b != 0.0 => a / b,
                    _ => return None,
                };
                return Some(Spanned::new(Ast::Number(folded), node.span.clone()));
            }
        }
        None
    }

    fn prune(node: &Spanned<Ast>) -> Option<Spanned<Ast>> {
        if let Ast::If { condition, then, otherwise } = &node.item {
            match condition.item {
                Ast::Boolean(true) => return Some(*then.clone()),
                Ast::Boolean(false) => {
                    return Some(match otherwise {
                        Some(otherwise) => *otherwise.clone(),
                        None => Spanned::new(Ast::Block(vec![]), node.span.clone()),
                    })
                },
                _ => (),
            }
        }
        None
    }

    fn simplify(node: &Spanned<Ast>) -> Option<Spanned<Ast>> {
        if let Ast::Binary { op, left, right } = &node.item {
            match (op, &left.item, &right.item) {
                (BinOp::Mul, _, Ast::Number(n)) if *n == 1.0 => Some(*left.clone()),
                (BinOp::Add, _, Ast::Number(n)) if *n == 0.0 => Some(*left.clone()),
                (BinOp::Add, Ast::Number(n), _) if *n == 0.0 => Some(*right.clone()),
                _ => None,
            }
        } else {
            None
        }
    }
}

/// Applies a fixed, ordered list of rewrite passes over the whole tree
/// until a full sweep changes nothing. Passes are independently
/// toggleable; an `Optimizer` with no passes is the identity transform.
#[derive(Debug)]
pub struct Optimizer {
    passes: Vec<Pass>,
}

impl Optimizer {
    /// An optimizer with every pass enabled, in the standard order.
    pub fn full() -> Optimizer {
        Optimizer {
            passes: vec![
                Pass::ConstantFolding,
                Pass::DeadCodeElimination,
                Pass::ExpressionSimplification,
            ],
        }
    }

    /// An optimizer running only the given passes.
    pub fn with_passes(passes: Vec<Pass>) -> Optimizer {
        Optimizer { passes }
    }

    /// Rewrites the tree to its fixed point: sweeps run until one sweep of
    /// every pass produces no further rewrite. Running out of rewrites is
    /// the success condition, not an error.
    pub fn optimize(&self, mut tree: Spanned<Ast>) -> Spanned<Ast> {
        loop {
            let mut changed = false;
            for pass in &self.passes {
                let (rewritten, pass_changed) = self.sweep(tree, *pass);
                tree = rewritten;
                changed |= pass_changed;
            }
            if !changed {
                return tree;
            }
        }
    }

    /// One bottom-up sweep of a single pass: children are rewritten before
    /// their parent is reconsidered.
    fn sweep(&self, node: Spanned<Ast>, pass: Pass) -> (Spanned<Ast>, bool) {
        let span = node.span;
        let mut changed = false;

        let item = match node.item {
            Ast::Program(items) => Ast::Program(self.sweep_all(items, pass, &mut changed)),
            Ast::Entry(items) => Ast::Entry(self.sweep_all(items, pass, &mut changed)),
            Ast::Block(items) => Ast::Block(self.sweep_all(items, pass, &mut changed)),
            Ast::FunctionDef { name, params, body } => Ast::FunctionDef {
                name,
                params,
                body: self.sweep_all(body, pass, &mut changed),
            },
            Ast::Assign { name, value } => Ast::Assign {
                name,
                value: self.sweep_box(value, pass, &mut changed),
            },
            Ast::If { condition, then, otherwise } => Ast::If {
                condition: self.sweep_box(condition, pass, &mut changed),
                then: self.sweep_box(then, pass, &mut changed),
                otherwise: otherwise
                    .map(|otherwise| self.sweep_box(otherwise, pass, &mut changed)),
            },
            Ast::While { condition, body } => Ast::While {
                condition: self.sweep_box(condition, pass, &mut changed),
                body: self.sweep_box(body, pass, &mut changed),
            },
            Ast::Return(value) => Ast::Return(
                value.map(|value| self.sweep_box(value, pass, &mut changed)),
            ),
            Ast::Binary { op, left, right } => Ast::Binary {
                op,
                left: self.sweep_box(left, pass, &mut changed),
                right: self.sweep_box(right, pass, &mut changed),
            },
            Ast::Unary { op, operand } => Ast::Unary {
                op,
                operand: self.sweep_box(operand, pass, &mut changed),
            },
            Ast::Call { name, args } => Ast::Call {
                name,
                args: self.sweep_all(args, pass, &mut changed),
            },
            leaf => leaf,
        };

        let node = Spanned::new(item, span);
        match pass.rewrite(&node) {
            Some(rewritten) => (rewritten, true),
            None => (node, changed),
        }
    }

    fn sweep_box(
        &self,
        child: Box<Spanned<Ast>>,
        pass: Pass,
        changed: &mut bool,
    ) -> Box<Spanned<Ast>> {
        let (rewritten, child_changed) = self.sweep(*child, pass);
        *changed |= child_changed;
        Box::new(rewritten)
    }

    fn sweep_all(
        &self,
        items: Vec<Spanned<Ast>>,
        pass: Pass,
        changed: &mut bool,
    ) -> Vec<Spanned<Ast>> {
        items
            .into_iter()
            .map(|item| {
                let (rewritten, item_changed) = self.sweep(item, pass);
                *changed |= item_changed;
                rewritten
            })
            .collect()
    }
}

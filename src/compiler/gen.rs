use std::{collections::HashMap, mem, rc::Rc};

use crate::common::{
    data::Data,
    error::Error,
    opcode::Op,
    program::{Chunk, Function, Program},
    span::Spanned,
};
use crate::compiler::ast::Ast;

/// Lowers a validated (and optionally optimized) syntax tree into a
/// `Program`: a flat instruction sequence, a deduplicated constant pool,
/// and the table of compiled functions.
pub fn gen(tree: &Spanned<Ast>) -> Result<Program, Error> {
    let mut compiler = Compiler::base();
    compiler.walk(tree)?;
    Ok(Program {
        chunk: Rc::new(compiler.chunk),
        functions: compiler.functions,
    })
}

/// The jump slots a loop hands out while its body is being compiled.
/// `continue` jumps backward to the recorded condition offset; `break`
/// can't know its target until the loop is fully emitted, so its jumps are
/// collected here and backpatched afterwards.
#[derive(Debug)]
struct LoopBounds {
    condition: usize,
    breaks: Vec<usize>,
}

/// A bytecode generator that walks the tree and emits instructions into a
/// chunk. Function bodies get a nested compiler (and therefore their own
/// chunk); the enclosing compiler is stashed and restored around the body,
/// and every compiled function ends up in one flat program-wide table.
#[derive(Debug)]
pub struct Compiler {
    enclosing: Option<Box<Compiler>>,
    chunk: Chunk,
    loops: Vec<LoopBounds>,
    functions: HashMap<String, Rc<Function>>,
}

impl Compiler {
    pub fn base() -> Compiler {
        Compiler {
            enclosing: None,
            chunk: Chunk::empty(),
            loops: vec![],
            functions: HashMap::new(),
        }
    }

    /// Replaces the current compiler with a fresh one, keeping the old one
    /// in `self.enclosing`. Called when entering a function body.
    fn enter_function(&mut self) {
        let enclosing = mem::replace(self, Compiler::base());
        self.enclosing = Some(Box::new(enclosing));
    }

    /// Restores the enclosing compiler, returning the nested one so its
    /// chunk and function table can be extracted.
    fn exit_function(&mut self) -> Compiler {
        let enclosing = self.enclosing.take();
        match enclosing {
            Some(compiler) => mem::replace(self, *compiler),
            None => panic!("Can not exit the base compiler"),
        }
    }

    fn walk(&mut self, tree: &Spanned<Ast>) -> Result<(), Error> {
        match &tree.item {
            Ast::Program(items) | Ast::Entry(items) | Ast::Block(items) => {
                self.statements(items)
            },
            Ast::FunctionDef { name, params, body } => {
                self.function_def(name, params, body)
            },
            Ast::Assign { name, value } => self.assign(name, value),
            Ast::If { condition, then, otherwise } => {
                self.branch(condition, then, otherwise.as_deref())
            },
            Ast::While { condition, body } => self.repeat(condition, body),
            Ast::Return(value) => self.early_return(value.as_deref()),
            Ast::Break => self.break_jump(tree),
            Ast::Continue => self.continue_jump(tree),
            Ast::Binary { op, left, right } => {
                self.walk(left)?;
                self.walk(right)?;
                self.chunk.emit(Op::Binary(*op));
                Ok(())
            },
            Ast::Unary { op, operand } => {
                self.walk(operand)?;
                self.chunk.emit(Op::Unary(*op));
                Ok(())
            },
            Ast::Call { name, args } => {
                for arg in args {
                    self.walk(arg)?;
                }
                let name = self.chunk.index_data(Data::String(name.clone()));
                self.chunk.emit(Op::Call { name, argc: args.len() });
                Ok(())
            },
            Ast::Number(n) => self.constant(Data::Number(*n)),
            Ast::String(s) => self.constant(Data::String(s.clone())),
            Ast::Boolean(b) => self.constant(Data::Boolean(*b)),
            Ast::Identifier(name) => {
                let name = self.chunk.index_data(Data::String(name.clone()));
                self.chunk.emit(Op::Load(name));
                Ok(())
            },
        }
    }

    /// Loads a literal through the constant pool.
    fn constant(&mut self, data: Data) -> Result<(), Error> {
        let index = self.chunk.index_data(data);
        self.chunk.emit(Op::Constant(index));
        Ok(())
    }

    /// Compiles a run of statements. Every expression statement except the
    /// last is deleted off the stack, so a block's value is its final
    /// expression and the stack stays balanced across control flow.
    ///
    /// A bare `Block` in statement position only arises when the optimizer
    /// replaces a literal-condition `if` with its taken branch; it stays
    /// stack-neutral, exactly like the `if` it stands in for.
    fn statements(&mut self, items: &[Spanned<Ast>]) -> Result<(), Error> {
        for (index, item) in items.iter().enumerate() {
            if let Ast::Block(_) = item.item {
                self.neutral(item)?;
                continue;
            }
            self.walk(item)?;
            if item.item.is_expression() && index + 1 != items.len() {
                self.chunk.emit(Op::Del);
            }
        }
        Ok(())
    }

    /// Whether a run of statements leaves a value on the stack.
    fn leaves_value(items: &[Spanned<Ast>]) -> bool {
        items.last().map(|last| last.item.is_expression()).unwrap_or(false)
    }

    /// Statement bodies (branches, loops) must be stack-neutral: whatever
    /// their last expression produced is deleted.
    fn neutral(&mut self, body: &Spanned<Ast>) -> Result<(), Error> {
        let leaves = match &body.item {
            Ast::Block(items) => Compiler::leaves_value(items),
            other => other.is_expression(),
        };
        self.walk(body)?;
        if leaves {
            self.chunk.emit(Op::Del);
        }
        Ok(())
    }

    /// Compiles a function definition. The body is lowered into its own
    /// chunk by a nested compiler; the function is registered by name in
    /// the flat program-wide table, and nested definitions bubble up into
    /// the same table. No call frame exists until the VM calls it.
    fn function_def(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Spanned<Ast>],
    ) -> Result<(), Error> {
        self.enter_function();
        let result = self.statements(body);
        if result.is_err() {
            // restore the enclosing compiler before bailing
            self.exit_function();
            return result;
        }

        // a body that ends on a non-expression returns unit
        if !Compiler::leaves_value(body) {
            self.constant(Data::Unit)?;
        }
        self.chunk.emit(Op::Return);

        let nested = self.exit_function();
        self.functions.extend(nested.functions);
        self.functions.insert(
            name.to_string(),
            Rc::new(Function {
                name: name.to_string(),
                params: params.to_vec(),
                chunk: Rc::new(nested.chunk),
            }),
        );
        Ok(())
    }

    fn assign(&mut self, name: &str, value: &Spanned<Ast>) -> Result<(), Error> {
        self.walk(value)?;
        let name = self.chunk.index_data(Data::String(name.to_string()));
        self.chunk.emit(Op::Store(name));
        Ok(())
    }

    /// Compiles an `if`. The conditional jump is reserved with a
    /// placeholder target and overwritten once the size of the branch it
    /// skips is known; an `else` adds one more patched jump past itself.
    fn branch(
        &mut self,
        condition: &Spanned<Ast>,
        then: &Spanned<Ast>,
        otherwise: Option<&Spanned<Ast>>,
    ) -> Result<(), Error> {
        self.walk(condition)?;
        let skip_then = self.chunk.emit(Op::JumpIfFalse(usize::MAX));
        self.neutral(then)?;

        match otherwise {
            Some(otherwise) => {
                let skip_else = self.chunk.emit(Op::Jump(usize::MAX));
                let target = self.chunk.offset();
                self.chunk.patch(skip_then, Op::JumpIfFalse(target));

                self.neutral(otherwise)?;
                let target = self.chunk.offset();
                self.chunk.patch(skip_else, Op::Jump(target));
            },
            None => {
                let target = self.chunk.offset();
                self.chunk.patch(skip_then, Op::JumpIfFalse(target));
            },
        }
        Ok(())
    }

    /// Compiles a `while`. The exit jump is backpatched exactly like an
    /// `if`'s; the body ends with an unconditional jump back to the
    /// condition. Any `break` inside patched to the loop's end.
    fn repeat(
        &mut self,
        condition: &Spanned<Ast>,
        body: &Spanned<Ast>,
    ) -> Result<(), Error> {
        let top = self.chunk.offset();
        self.walk(condition)?;
        let exit = self.chunk.emit(Op::JumpIfFalse(usize::MAX));

        self.loops.push(LoopBounds { condition: top, breaks: vec![] });
        let result = self.neutral(body);
        let bounds = self.loops.pop().expect("loop bounds pushed above");
        result?;

        self.chunk.emit(Op::Jump(top));
        let target = self.chunk.offset();
        self.chunk.patch(exit, Op::JumpIfFalse(target));
        for break_jump in bounds.breaks {
            self.chunk.patch(break_jump, Op::Jump(target));
        }
        Ok(())
    }

    fn break_jump(&mut self, tree: &Spanned<Ast>) -> Result<(), Error> {
        let jump = self.chunk.emit(Op::Jump(usize::MAX));
        match self.loops.last_mut() {
            Some(bounds) => {
                bounds.breaks.push(jump);
                Ok(())
            },
            None => Err(Error::syntax(
                "No lowering rule for `break` outside a loop",
                &tree.span,
            )),
        }
    }

    fn continue_jump(&mut self, tree: &Spanned<Ast>) -> Result<(), Error> {
        match self.loops.last() {
            Some(bounds) => {
                let condition = bounds.condition;
                self.chunk.emit(Op::Jump(condition));
                Ok(())
            },
            None => Err(Error::syntax(
                "No lowering rule for `continue` outside a loop",
                &tree.span,
            )),
        }
    }

    fn early_return(&mut self, value: Option<&Spanned<Ast>>) -> Result<(), Error> {
        match value {
            Some(value) => self.walk(value)?,
            None => self.constant(Data::Unit)?,
        }
        self.chunk.emit(Op::Return);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{opcode::BinOp, source::Source};
    use crate::compiler::{lex::Lexer, parse::Parser};

    fn compile(source: &str) -> Program {
        let tree = Parser::parse(Lexer::lex(Source::source(source)).unwrap()).unwrap();
        gen(&tree).unwrap()
    }

    #[test]
    fn literal_emits_constant() {
        let program = compile("42");
        assert_eq!(program.chunk.code, vec![Op::Constant(0)]);
        assert_eq!(program.chunk.constants, vec![Data::Number(42.0)]);
    }

    #[test]
    fn constants_deduplicated() {
        let program = compile("1 + 1 + 1");
        assert_eq!(program.chunk.constants, vec![Data::Number(1.0)]);
    }

    #[test]
    fn binary_compiles_left_then_right() {
        let program = compile("1 + 2");
        assert_eq!(
            program.chunk.code,
            vec![Op::Constant(0), Op::Constant(1), Op::Binary(BinOp::Add)],
        );
    }

    #[test]
    fn if_backpatches_past_then() {
        let program = compile("x = 1\nif x :\n x = 2\nend");
        // constant, store, load, jump-if-false, constant, store, <target>
        let jump = program
            .chunk
            .code
            .iter()
            .find_map(|op| match op {
                Op::JumpIfFalse(target) => Some(*target),
                _ => None,
            })
            .expect("no conditional jump emitted");
        assert_eq!(jump, program.chunk.code.len());
    }

    #[test]
    fn if_else_backpatches_both_jumps() {
        let program = compile("x = 1\nif x :\n x = 2\nelse :\n x = 3\nend");
        let code = &program.chunk.code;

        let conditional = code
            .iter()
            .position(|op| matches!(op, Op::JumpIfFalse(_)))
            .expect("no conditional jump");
        let unconditional = code
            .iter()
            .position(|op| matches!(op, Op::Jump(_)))
            .expect("no unconditional jump");

        // the conditional jump lands right past the then-branch's exit jump
        assert_eq!(code[conditional], Op::JumpIfFalse(unconditional + 1));
        // the exit jump lands past the else branch
        assert_eq!(code[unconditional], Op::Jump(code.len()));
    }

    #[test]
    fn while_jumps_back_to_condition() {
        let program = compile("i = 0\nwhile i < 3 :\n i = i + 1\nend");
        let code = &program.chunk.code;

        // the loop closes with a jump back to the condition
        let back = code
            .iter()
            .rev()
            .find_map(|op| match op {
                Op::Jump(target) => Some(*target),
                _ => None,
            })
            .expect("no back jump");
        assert!(matches!(code[back + 2], Op::Binary(BinOp::Less)));

        // and the exit jump lands one past the end
        let exit = code
            .iter()
            .find_map(|op| match op {
                Op::JumpIfFalse(target) => Some(*target),
                _ => None,
            })
            .expect("no exit jump");
        assert_eq!(exit, code.len());
    }

    #[test]
    fn function_registered_not_called() {
        let program = compile("def double(n) :\n return n * 2\nend");
        // nothing at the top level but the definition itself
        assert!(program.chunk.code.is_empty());

        let function = &program.functions["double"];
        assert_eq!(function.params, vec!["n".to_string()]);
        assert_eq!(*function.chunk.code.last().unwrap(), Op::Return);
    }

    #[test]
    fn nested_functions_bubble_up() {
        let program =
            compile("def outer() :\n def inner() :\n  return 1\n end\n return 2\nend");
        assert!(program.functions.contains_key("outer"));
        assert!(program.functions.contains_key("inner"));
    }

    #[test]
    fn implicit_unit_return() {
        let program = compile("def noop() :\n x = 1\nend");
        let chunk = &program.functions["noop"].chunk;
        let len = chunk.code.len();
        assert_eq!(chunk.code[len - 2], Op::Constant(chunk.constants.len() - 1));
        assert_eq!(chunk.constants.last(), Some(&Data::Unit));
        assert_eq!(chunk.code[len - 1], Op::Return);
    }

    #[test]
    fn pruned_branch_stays_stack_neutral() {
        use crate::compiler::optimize::Optimizer;

        // dead-code elimination turns the `if` into a bare block; its
        // value must be deleted exactly as the branch would have been
        let tree = Parser::parse(
            Lexer::lex(Source::source("x = 1\nif true :\n 2\nend")).unwrap(),
        )
        .unwrap();
        let program = gen(&Optimizer::full().optimize(tree)).unwrap();

        assert_eq!(*program.chunk.code.last().unwrap(), Op::Del);
    }

    #[test]
    fn intermediate_expressions_deleted() {
        let program = compile("1\n2\n3");
        assert_eq!(
            program.chunk.code,
            vec![
                Op::Constant(0),
                Op::Del,
                Op::Constant(1),
                Op::Del,
                Op::Constant(2),
            ],
        );
    }
}

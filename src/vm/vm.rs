use std::collections::HashMap;
use std::rc::Rc;

use crate::common::{
    data::{Data, Handle},
    error::{Error, ErrorKind},
    opcode::{BinOp, Op, UnOp},
    program::{Function, Program},
};
use crate::vm::{
    frame::{self, CallStack, Frame},
    heap::{self, Heap},
    stdlib,
};

/// Executes a compiled program. Each `Vm`'s state is self-contained (call
/// stack, heap, function table), so more than one can run side by side.
///
/// The root frame's locals are the program's globals: loads fall back to
/// them from any frame, stores always hit the current frame.
#[derive(Debug)]
pub struct Vm {
    frames: CallStack,
    heap: Heap,
    functions: HashMap<String, Rc<Function>>,
}

impl Vm {
    pub fn new(program: Program) -> Vm {
        Vm::with_limits(program, frame::MAX_DEPTH, heap::DEFAULT_MAX_MEMORY)
    }

    /// A machine with an explicit call-depth ceiling and heap budget.
    pub fn with_limits(
        program: Program,
        max_depth: usize,
        heap_capacity: usize,
    ) -> Vm {
        Vm {
            frames: CallStack::with_max_depth(
                Frame::new(Rc::clone(&program.chunk)),
                max_depth,
            ),
            heap: Heap::with_capacity(heap_capacity),
            functions: program.functions,
        }
    }

    /// Compiles nothing, allocates nothing up front: just runs. Returns the
    /// program's result, which is the value of its last expression, the
    /// operand of a root-level `return`, or nothing.
    pub fn run_program(program: Program) -> Result<Option<Data>, Error> {
        Vm::new(program).run()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Runs a collection seeded with precise roots: everything reachable
    /// from any live frame, on top of the heap's own reference counts.
    pub fn collect_garbage(&mut self) -> usize {
        let roots: Vec<Handle> = self
            .frames
            .reachable()
            .filter_map(|data| match data {
                Data::List(handle) => Some(*handle),
                _ => None,
            })
            .collect();
        self.heap.collect(&roots)
    }

    // core interpreter loop

    pub fn run(&mut self) -> Result<Option<Data>, Error> {
        loop {
            let op = {
                let frame = self.frames.current_mut();
                if frame.ip >= frame.chunk.code.len() {
                    // running off the end of a chunk ends the activation
                    match self.frames.pop() {
                        Some(_) => {
                            self.frames.current_mut().push(Data::Unit);
                            continue;
                        },
                        None => return Ok(self.frames.current_mut().stack.pop()),
                    }
                }
                let op = frame.chunk.code[frame.ip];
                frame.ip += 1;
                op
            };

            match op {
                Op::Constant(index) => {
                    let frame = self.frames.current_mut();
                    let data = frame.chunk.constants[index].clone();
                    frame.push(data);
                },
                Op::Load(index) => self.load(index)?,
                Op::Store(index) => self.store(index)?,
                Op::Del => {
                    self.frames.current_mut().pop();
                },
                Op::Binary(op) => {
                    let frame = self.frames.current_mut();
                    let right = frame.pop();
                    let left = frame.pop();
                    let result = Vm::binary(op, left, right)?;
                    self.frames.current_mut().push(result);
                },
                Op::Unary(op) => {
                    let frame = self.frames.current_mut();
                    let operand = frame.pop();
                    let result = Vm::unary(op, operand)?;
                    frame.push(result);
                },
                Op::Jump(target) => {
                    self.frames.current_mut().ip = target;
                },
                Op::JumpIfFalse(target) => {
                    let frame = self.frames.current_mut();
                    if !frame.pop().is_truthy() {
                        frame.ip = target;
                    }
                },
                Op::Call { name, argc } => self.call(name, argc)?,
                Op::Return => {
                    let value = self.frames.current_mut().pop();
                    match self.frames.pop() {
                        Some(_) => self.frames.current_mut().push(value),
                        // a root-level return ends the program with a value
                        None => return Ok(Some(value)),
                    }
                },
            }
        }
    }

    /// Reads the name a `Load`/`Store`/`Call` operand points at.
    fn name(&self, index: usize) -> Result<String, Error> {
        match &self.frames.current().chunk.constants[index] {
            Data::String(name) => Ok(name.clone()),
            other => Err(Error::runtime(&format!(
                "Corrupt constant pool: expected a name, found a {}",
                other.type_name(),
            ))),
        }
    }

    fn load(&mut self, index: usize) -> Result<(), Error> {
        let name = self.name(index)?;
        let value = match self.frames.current().locals.get(&name) {
            Some(value) => value.clone(),
            None => match self.frames.globals().get(&name) {
                Some(value) => value.clone(),
                None => {
                    return Err(Error::new(
                        ErrorKind::UndefinedVariable,
                        &format!("Undefined variable `{}`", name),
                    ))
                },
            },
        };
        self.frames.current_mut().push(value);
        Ok(())
    }

    fn store(&mut self, index: usize) -> Result<(), Error> {
        let name = self.name(index)?;
        let frame = self.frames.current_mut();
        let value = frame.pop();
        frame.locals.insert(name, value);
        Ok(())
    }

    fn call(&mut self, name: usize, argc: usize) -> Result<(), Error> {
        let name = self.name(name)?;

        let frame = self.frames.current_mut();
        let at = frame.stack.len().saturating_sub(argc);
        let args: Vec<Data> = frame.stack.split_off(at);

        // the standard library shadows user definitions
        if let Some(builtin) = stdlib::lookup(&name) {
            let result = builtin(&mut self.heap, args)?;
            self.frames.current_mut().push(result);
            return Ok(());
        }

        let function = match self.functions.get(&name) {
            Some(function) => Rc::clone(function),
            None => {
                return Err(Error::new(
                    ErrorKind::UndefinedFunction,
                    &format!("Undefined function `{}`", name),
                ))
            },
        };

        // parameters bind positionally; extra arguments are dropped and
        // missing ones are simply left unbound
        let mut frame = Frame::new(Rc::clone(&function.chunk));
        for (param, arg) in function.params.iter().zip(args) {
            frame.locals.insert(param.clone(), arg);
        }
        self.frames.push(frame)
    }

    // operator implementations

    fn binary(op: BinOp, left: Data, right: Data) -> Result<Data, Error> {
        match op {
            BinOp::Add => Vm::arithmetic(op, left, right, |a, b| a + b),
            BinOp::Sub => Vm::arithmetic(op, left, right, |a, b| a - b),
            BinOp::Mul => Vm::arithmetic(op, left, right, |a, b| a * b),
            BinOp::Div => match (&left, &right) {
                (_, Data::Number(divisor)) if *divisor == 0.0 => Err(Error::new(
                    ErrorKind::DivisionByZero,
                    "Division by zero",
                )),
                _ => Vm::arithmetic(op, left, right, |a, b| a / b),
            },
            BinOp::Rem => match (&left, &right) {
                (_, Data::Number(divisor)) if *divisor == 0.0 => Err(Error::new(
                    ErrorKind::DivisionByZero,
                    "Remainder by zero",
                )),
                _ => Vm::arithmetic(op, left, right, |a, b| a % b),
            },
            BinOp::Concat => {
                Ok(Data::String(format!("{}{}", left, right)))
            },
            BinOp::Equal => Ok(Data::Boolean(left == right)),
            BinOp::NotEqual => Ok(Data::Boolean(left != right)),
            BinOp::Less => Vm::comparison(op, left, right, |a, b| a < b),
            BinOp::LessEqual => Vm::comparison(op, left, right, |a, b| a <= b),
            BinOp::Greater => Vm::comparison(op, left, right, |a, b| a > b),
            BinOp::GreaterEqual => Vm::comparison(op, left, right, |a, b| a >= b),
            // both operands are already evaluated by the time these run
            BinOp::And => Ok(Data::Boolean(left.is_truthy() && right.is_truthy())),
            BinOp::Or => Ok(Data::Boolean(left.is_truthy() || right.is_truthy())),
        }
    }

    fn arithmetic(
        op: BinOp,
        left: Data,
        right: Data,
        apply: fn(f64, f64) -> f64,
    ) -> Result<Data, Error> {
        match (left, right) {
            (Data::Number(a), Data::Number(b)) => Ok(Data::Number(apply(a, b))),
            (left, right) => Err(Vm::operand_error(op, &left, &right)),
        }
    }

    fn comparison(
        op: BinOp,
        left: Data,
        right: Data,
        apply: fn(f64, f64) -> bool,
    ) -> Result<Data, Error> {
        match (left, right) {
            (Data::Number(a), Data::Number(b)) => Ok(Data::Boolean(apply(a, b))),
            (Data::String(a), Data::String(b)) => {
                Ok(Data::Boolean(Vm::order(op, &a, &b)))
            },
            (left, right) => Err(Vm::operand_error(op, &left, &right)),
        }
    }

    /// String ordering for the strict comparisons.
    fn order(op: BinOp, a: &str, b: &str) -> bool {
        match op {
            BinOp::Less => a < b,
            BinOp::LessEqual => a <= b,
            BinOp::Greater => a > b,
            BinOp::GreaterEqual => a >= b,
            _ => false,
        }
    }

    fn operand_error(op: BinOp, left: &Data, right: &Data) -> Error {
        Error::new(
            ErrorKind::Type,
            &format!(
                "Unsupported operands for `{}`: {} and {}",
                op,
                left.type_name(),
                right.type_name(),
            ),
        )
    }

    fn unary(op: UnOp, operand: Data) -> Result<Data, Error> {
        match op {
            UnOp::Neg => match operand {
                Data::Number(n) => Ok(Data::Number(-n)),
                other => Err(Error::new(
                    ErrorKind::Type,
                    &format!("Can not negate a {}", other.type_name()),
                )),
            },
            UnOp::Not => Ok(Data::Boolean(!operand.is_truthy())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;
    use crate::compiler::{gen, lex::Lexer, parse::Parser};

    /// Lex, parse, and lower without semantic analysis, so root-level
    /// `return` can be exercised too.
    fn run(source: &str) -> Result<Option<Data>, Error> {
        let tree = Parser::parse(Lexer::lex(Source::source(source)).unwrap()).unwrap();
        Vm::run_program(gen::gen(&tree).unwrap())
    }

    #[test]
    fn last_expression_is_the_result() {
        assert_eq!(run("1 + 2").unwrap(), Some(Data::Number(3.0)));
    }

    #[test]
    fn variables_round_trip() {
        assert_eq!(run("x = 4\nx * x").unwrap(), Some(Data::Number(16.0)));
    }

    #[test]
    fn root_level_return() {
        let result = run("x = 42\ny = x + 8\nreturn y").unwrap();
        assert_eq!(result, Some(Data::Number(50.0)));
    }

    #[test]
    fn program_without_result() {
        assert_eq!(run("x = 1").unwrap(), None);
    }

    #[test]
    fn division_by_zero() {
        let error = run("1 / 0").unwrap_err();
        assert_eq!(error.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn remainder_by_zero() {
        let error = run("5 % 0").unwrap_err();
        assert_eq!(error.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn undefined_variable_at_runtime() {
        let error = run("missing + 1").unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedVariable);
    }

    #[test]
    fn undefined_function_at_runtime() {
        let error = run("missing(1)").unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedFunction);
    }

    #[test]
    fn branches_take_the_right_arm() {
        let source = "x = 10\nif x > 5 :\n y = 1\nelse :\n y = 2\nend\ny";
        assert_eq!(run(source).unwrap(), Some(Data::Number(1.0)));
    }

    #[test]
    fn while_loop_terminates() {
        let source = "total = 0\ni = 0\nwhile i < 5 :\n total = total + i\n i = i + 1\nend\ntotal";
        assert_eq!(run(source).unwrap(), Some(Data::Number(10.0)));
    }

    #[test]
    fn break_exits_the_loop() {
        let source = "i = 0\nwhile true :\n i = i + 1\n if i == 3 :\n  break\n end\nend\ni";
        assert_eq!(run(source).unwrap(), Some(Data::Number(3.0)));
    }

    #[test]
    fn function_call_and_return() {
        let source = "def double(n) :\n return n * 2\nend\ndouble(21)";
        assert_eq!(run(source).unwrap(), Some(Data::Number(42.0)));
    }

    #[test]
    fn recursion_works_within_depth() {
        let source = "def fact(n) :\n if n < 2 :\n  return 1\n end\n return n * fact(n - 1)\nend\nfact(5)";
        assert_eq!(run(source).unwrap(), Some(Data::Number(120.0)));
    }

    #[test]
    fn runaway_recursion_is_cut_off() {
        let source = "def loop(n) :\n return loop(n + 1)\nend\nloop(0)";
        let error = run(source).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Runtime);
        assert!(error.message.contains("recursion depth"));
    }

    #[test]
    fn depth_limit_is_configurable() {
        let tree = Parser::parse(
            Lexer::lex(Source::source("def f(n) :\n return f(n + 1)\nend\nf(0)"))
                .unwrap(),
        )
        .unwrap();
        let mut vm = Vm::with_limits(gen::gen(&tree).unwrap(), 4, 1024);

        let error = vm.run().unwrap_err();
        assert_eq!(error.kind, ErrorKind::Runtime);
        assert!(error.message.contains("recursion depth of 4"));
    }

    #[test]
    fn heap_budget_is_configurable() {
        let tree = Parser::parse(
            Lexer::lex(Source::source("range(100)")).unwrap(),
        )
        .unwrap();
        let mut vm = Vm::with_limits(gen::gen(&tree).unwrap(), 1000, 64);

        let error = vm.run().unwrap_err();
        assert!(error.message.contains("Out of memory"));
    }

    #[test]
    fn globals_visible_inside_functions() {
        let source = "base = 10\ndef bump(n) :\n return base + n\nend\nbump(5)";
        assert_eq!(run(source).unwrap(), Some(Data::Number(15.0)));
    }

    #[test]
    fn function_locals_do_not_leak() {
        let source = "def f() :\n y = 1\n return y\nend\nf()\ny";
        let error = run(source).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UndefinedVariable);
    }

    #[test]
    fn extra_arguments_are_dropped() {
        let source = "def first(a) :\n return a\nend\nfirst(1, 2, 3)";
        assert_eq!(run(source).unwrap(), Some(Data::Number(1.0)));
    }

    #[test]
    fn concat_renders_both_sides() {
        assert_eq!(
            run("\"n = \" ۩ 42").unwrap(),
            Some(Data::String("n = 42".to_string())),
        );
    }

    #[test]
    fn logic_evaluates_both_sides() {
        assert_eq!(run("true && false").unwrap(), Some(Data::Boolean(false)));
        assert_eq!(run("0 || 3").unwrap(), Some(Data::Boolean(true)));
    }

    #[test]
    fn stdlib_resolves_before_user_functions() {
        let source = "def len(x) :\n return 999\nend\nlen(\"four\")";
        assert_eq!(run(source).unwrap(), Some(Data::Number(4.0)));
    }

    #[test]
    fn builtin_results_survive_collection() {
        let tree = Parser::parse(
            Lexer::lex(Source::source("xs = range(4)\nlen(xs)")).unwrap(),
        )
        .unwrap();
        let mut vm = Vm::new(gen::gen(&tree).unwrap());
        let result = vm.run().unwrap();

        assert_eq!(result, Some(Data::Number(4.0)));
        assert_eq!(vm.collect_garbage(), 0);
        assert_eq!(vm.heap().block_count(), 1);
    }

    #[test]
    fn type_errors_name_both_operands() {
        let error = run("1 + \"one\"").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Type);
        assert!(error.message.contains("number"));
        assert!(error.message.contains("string"));
    }
}

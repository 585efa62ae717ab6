use std::collections::HashMap;

use crate::common::{error::Error, span::Spanned};
use crate::compiler::ast::Ast;

/// A named binding: what kind of thing it is, whether it can be
/// reassigned, and whether it has a value yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: SymbolType,
    pub mutable: bool,
    pub initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Any,
    Function,
}

/// One scope frame: its bindings, plus the index of the enclosing scope in
/// the arena. Scopes form a strict stack (a frame is pushed on function
/// entry and popped on exit), so an integer parent index is all the chain
/// needs; there is no pointer graph to manage.
#[derive(Debug)]
struct Scope {
    symbols: HashMap<String, Symbol>,
    parent: Option<usize>,
}

/// Walks the syntax tree depth-first, validating names and contexts before
/// anything is lowered. On success the tree is guaranteed to reference only
/// defined variables, never rebind an immutable name, and use
/// `return`/`break`/`continue` only where they mean something.
///
/// Assignment follows first-reference-defines: assigning a name with no
/// prior declaration in scope implicitly declares it in the current scope.
#[derive(Debug)]
pub struct Analyzer {
    /// Arena of every scope ever entered; dead frames are simply
    /// unreachable from `current`.
    scopes: Vec<Scope>,
    current: usize,
    loop_depth: usize,
    function_depth: usize,
}

impl Analyzer {
    /// Validates a whole syntax tree. The symbol table is built and
    /// discarded as a side effect; the tree itself is untouched.
    pub fn analyze(tree: &Spanned<Ast>) -> Result<(), Error> {
        let mut analyzer = Analyzer {
            scopes: vec![Scope {
                symbols: HashMap::new(),
                parent: None,
            }],
            current: 0,
            loop_depth: 0,
            function_depth: 0,
        };

        analyzer.walk(tree)
    }

    fn enter_scope(&mut self) {
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            parent: Some(self.current),
        });
        self.current = self.scopes.len() - 1;
    }

    fn exit_scope(&mut self) {
        self.current = self.scopes[self.current]
            .parent
            .expect("Can not exit the root scope");
    }

    /// Innermost-first lookup, falling outward along parent indices.
    fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut index = Some(self.current);
        while let Some(scope) = index {
            if let Some(symbol) = self.scopes[scope].symbols.get(name) {
                return Some(symbol);
            }
            index = self.scopes[scope].parent;
        }
        None
    }

    /// Defines a symbol in the current scope; defining a name twice in the
    /// same scope is an error.
    fn define(
        &mut self,
        name: &str,
        ty: SymbolType,
        mutable: bool,
        span: &Spanned<Ast>,
    ) -> Result<(), Error> {
        let symbols = &mut self.scopes[self.current].symbols;
        if symbols.contains_key(name) {
            return Err(Error::name(
                &format!("`{}` is already defined in this scope", name),
                &span.span,
            ));
        }
        symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                ty,
                mutable,
                initialized: true,
            },
        );
        Ok(())
    }

    fn walk(&mut self, tree: &Spanned<Ast>) -> Result<(), Error> {
        match &tree.item {
            Ast::Program(items) | Ast::Entry(items) | Ast::Block(items) => {
                for item in items {
                    self.walk(item)?;
                }
                Ok(())
            },

            Ast::FunctionDef { name, params, body } => {
                // the name is bound immutably in the enclosing scope
                self.define(name, SymbolType::Function, false, tree)?;

                self.function_depth += 1;
                self.enter_scope();
                for param in params {
                    self.define(param, SymbolType::Any, true, tree)?;
                }
                for statement in body {
                    self.walk(statement)?;
                }
                self.exit_scope();
                self.function_depth -= 1;
                Ok(())
            },

            Ast::Assign { name, value } => {
                let existing = self.lookup(name).cloned();
                if let Some(symbol) = &existing {
                    if !symbol.mutable {
                        return Err(Error::ty(
                            &format!("Can not assign to immutable binding `{}`", name),
                            &tree.span,
                        ));
                    }
                }

                // the right side sees the world before the binding exists,
                // so `x = x + 1` with no prior `x` is an undefined reference
                self.walk(value)?;

                if existing.is_none() {
                    self.define(name, SymbolType::Any, true, tree)?;
                }
                Ok(())
            },

            Ast::If { condition, then, otherwise } => {
                self.walk(condition)?;
                self.walk(then)?;
                if let Some(otherwise) = otherwise {
                    self.walk(otherwise)?;
                }
                Ok(())
            },

            Ast::While { condition, body } => {
                self.walk(condition)?;
                self.loop_depth += 1;
                self.walk(body)?;
                self.loop_depth -= 1;
                Ok(())
            },

            Ast::Return(value) => {
                if self.function_depth == 0 {
                    return Err(Error::ty("`return` outside function", &tree.span));
                }
                if let Some(value) = value {
                    self.walk(value)?;
                }
                Ok(())
            },

            Ast::Break => {
                if self.loop_depth == 0 {
                    return Err(Error::ty("`break` outside loop", &tree.span));
                }
                Ok(())
            },

            Ast::Continue => {
                if self.loop_depth == 0 {
                    return Err(Error::ty("`continue` outside loop", &tree.span));
                }
                Ok(())
            },

            Ast::Binary { left, right, .. } => {
                self.walk(left)?;
                self.walk(right)
            },

            Ast::Unary { operand, .. } => self.walk(operand),

            // call targets resolve at run time (the standard library is a
            // runtime table), only the arguments are checked here
            Ast::Call { args, .. } => {
                for arg in args {
                    self.walk(arg)?;
                }
                Ok(())
            },

            Ast::Identifier(name) => {
                if self.lookup(name).is_none() {
                    return Err(Error::name(
                        &format!("Undefined variable `{}`", name),
                        &tree.span,
                    ));
                }
                Ok(())
            },

            Ast::Number(_) | Ast::String(_) | Ast::Boolean(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{error::ErrorKind, source::Source};
    use crate::compiler::{lex::Lexer, parse::Parser};

    fn analyze(source: &str) -> Result<(), Error> {
        let tree = Parser::parse(Lexer::lex(Source::source(source)).unwrap()).unwrap();
        Analyzer::analyze(&tree)
    }

    #[test]
    fn first_reference_defines() {
        assert!(analyze("x = 1\ny = x + 1").is_ok());
    }

    #[test]
    fn undefined_variable() {
        let error = analyze("y = x + 1").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Name);
    }

    #[test]
    fn self_reference_before_definition() {
        let error = analyze("x = x + 1").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Name);
    }

    #[test]
    fn scopes_fall_outward() {
        assert!(analyze("x = 1\ndef f() :\n return x\nend").is_ok());
    }

    #[test]
    fn function_locals_stay_local() {
        let error = analyze("def f() :\n y = 1\nend\nz = y").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Name);
    }

    #[test]
    fn function_names_are_immutable() {
        let error = analyze("def f() :\n return 1\nend\nf = 2").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Type);
    }

    #[test]
    fn redefinition_in_same_scope() {
        let error = analyze("def f() : end\ndef f() : end").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Name);
    }

    #[test]
    fn duplicate_parameters() {
        let error = analyze("def f(a, a) : end").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Name);
    }

    #[test]
    fn return_outside_function() {
        let error = analyze("return 1").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Type);
    }

    #[test]
    fn break_outside_loop() {
        let error = analyze("break").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Type);
    }

    #[test]
    fn break_inside_loop() {
        assert!(analyze("i = 0\nwhile i < 3 :\n break\nend").is_ok());
    }

    #[test]
    fn shadowing_in_function_scope() {
        assert!(analyze("x = 1\ndef f(x) :\n return x\nend").is_ok());
    }

    #[test]
    fn call_targets_resolve_at_runtime() {
        // `print` is a stdlib name; the analyzer leaves call targets alone
        assert!(analyze("print(1)").is_ok());
    }
}

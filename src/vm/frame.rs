use std::{collections::HashMap, rc::Rc};

use crate::common::{data::Data, error::Error, program::Chunk};

/// Default call-depth ceiling.
pub const MAX_DEPTH: usize = 1000;

/// One activation: the chunk being executed, the instruction pointer into
/// it, the frame's named locals, and its private operand stack. Operands
/// never cross frames except through call arguments and return values.
#[derive(Debug)]
pub struct Frame {
    pub chunk: Rc<Chunk>,
    pub ip: usize,
    pub locals: HashMap<String, Data>,
    pub stack: Vec<Data>,
}

impl Frame {
    pub fn new(chunk: Rc<Chunk>) -> Frame {
        Frame {
            chunk,
            ip: 0,
            locals: HashMap::new(),
            stack: vec![],
        }
    }

    pub fn push(&mut self, data: Data) {
        self.stack.push(data);
    }

    /// Popping an empty operand stack means the generator emitted
    /// unbalanced code, which is a bug, not a user error.
    pub fn pop(&mut self) -> Data {
        self.stack.pop().expect("operand stack underflow")
    }
}

/// The stack of live activations. The bottom frame is the program's root
/// and owns the global bindings; it is pushed at startup and never popped.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(root: Frame) -> CallStack {
        CallStack::with_max_depth(root, MAX_DEPTH)
    }

    pub fn with_max_depth(root: Frame, max_depth: usize) -> CallStack {
        CallStack { frames: vec![root], max_depth }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), Error> {
        if self.frames.len() >= self.max_depth {
            return Err(Error::runtime(&format!(
                "Maximum recursion depth of {} exceeded",
                self.max_depth,
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the current activation. The root frame stays put.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub fn current(&self) -> &Frame {
        self.frames.last().expect("call stack always holds the root frame")
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("call stack always holds the root frame")
    }

    /// The root frame's locals double as the program's globals.
    pub fn globals(&self) -> &HashMap<String, Data> {
        &self.frames[0].locals
    }

    /// Every `Data` currently reachable from any frame, for seeding a
    /// garbage collection with precise roots.
    pub fn reachable(&self) -> impl Iterator<Item = &Data> {
        self.frames
            .iter()
            .flat_map(|frame| frame.stack.iter().chain(frame.locals.values()))
    }
}

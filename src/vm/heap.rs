use std::collections::{HashMap, HashSet};

use crate::common::{
    data::{Data, Handle},
    error::Error,
};

/// Default heap budget, in bytes.
pub const DEFAULT_MAX_MEMORY: usize = 1024 * 1024;

/// Default fraction of the budget at which allocation triggers a
/// collection before going through.
pub const DEFAULT_GC_THRESHOLD: f64 = 0.8;

/// A value too big to live on the operand stack. Scalars are copied by
/// value; anything that owns other values is allocated here and passed
/// around as a `Handle`.
#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    List(Vec<Data>),
}

impl Composite {
    /// Approximate footprint in bytes, charged against the heap budget.
    /// Accounting is coarse on purpose; it only has to be monotone in the
    /// size of the value so the budget means something.
    pub fn size(&self) -> usize {
        match self {
            Composite::List(items) => {
                let elements: usize = items
                    .iter()
                    .map(|item| match item {
                        Data::String(s) => std::mem::size_of::<Data>() + s.len(),
                        _ => std::mem::size_of::<Data>(),
                    })
                    .sum();
                std::mem::size_of::<Composite>() + elements
            },
        }
    }

    /// The handles this value keeps alive.
    fn children(&self) -> Vec<Handle> {
        match self {
            Composite::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    Data::List(handle) => Some(*handle),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// One allocation: the value, its charged size, and an external reference
/// count. Any block with a nonzero count is a collection root.
#[derive(Debug)]
struct Block {
    value: Composite,
    size: usize,
    references: usize,
}

/// The managed heap. Every composite value lives in a block keyed by an
/// integer handle; allocation is budgeted, and crossing the threshold runs
/// a mark-and-sweep collection seeded from reference counts (plus any
/// extra roots the caller names).
///
/// Reference counts are maintained by `retain`/`release` at the
/// allocation sites; the collector itself never changes them.
#[derive(Debug)]
pub struct Heap {
    blocks: HashMap<usize, Block>,
    next: usize,
    used: usize,
    max: usize,
    threshold: f64,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::with_capacity(DEFAULT_MAX_MEMORY)
    }

    pub fn with_capacity(max: usize) -> Heap {
        Heap::with_threshold(max, DEFAULT_GC_THRESHOLD)
    }

    /// A heap collecting at a custom fraction of its budget.
    pub fn with_threshold(max: usize, threshold: f64) -> Heap {
        Heap {
            blocks: HashMap::new(),
            // handle 0 is never allocated, so a zeroed handle is always dangling
            next: 1,
            used: 0,
            max,
            threshold,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Moves a value onto the heap. If the allocation would push usage past
    /// the collection threshold a collection runs first; if it still does
    /// not fit inside the budget, the allocation fails.
    pub fn alloc(&mut self, value: Composite) -> Result<Handle, Error> {
        let size = value.size();

        if (self.used + size) as f64 > self.max as f64 * self.threshold {
            self.collect(&[]);
        }
        if self.used + size > self.max {
            return Err(Error::runtime(&format!(
                "Out of memory: {} bytes requested, {} of {} in use",
                size, self.used, self.max,
            )));
        }

        let handle = Handle(self.next);
        self.next += 1;
        self.used += size;
        self.blocks.insert(handle.0, Block { value, size, references: 0 });
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Result<&Composite, Error> {
        self.blocks
            .get(&handle.0)
            .map(|block| &block.value)
            .ok_or_else(|| Heap::dangling(handle))
    }

    fn dangling(handle: Handle) -> Error {
        Error::runtime(&format!("Dangling handle {}", handle))
    }

    /// Marks a block as externally rooted. A retained block survives every
    /// collection until released as many times as it was retained.
    pub fn retain(&mut self, handle: Handle) {
        if let Some(block) = self.blocks.get_mut(&handle.0) {
            block.references += 1;
        }
    }

    pub fn release(&mut self, handle: Handle) {
        if let Some(block) = self.blocks.get_mut(&handle.0) {
            block.references = block.references.saturating_sub(1);
        }
    }

    /// Immediately frees a block regardless of its reference count.
    pub fn free(&mut self, handle: Handle) {
        if let Some(block) = self.blocks.remove(&handle.0) {
            self.used -= block.size;
        }
    }

    /// Mark and sweep. Roots are every block with a nonzero reference count
    /// plus `extra_roots`; marking follows handles stored inside composite
    /// values, and everything unmarked is freed. Returns the number of
    /// blocks swept.
    pub fn collect(&mut self, extra_roots: &[Handle]) -> usize {
        let mut marked = HashSet::new();
        let mut pending: Vec<Handle> = self
            .blocks
            .iter()
            .filter(|(_, block)| block.references > 0)
            .map(|(index, _)| Handle(*index))
            .collect();
        pending.extend_from_slice(extra_roots);

        while let Some(handle) = pending.pop() {
            if !marked.insert(handle.0) {
                continue;
            }
            if let Some(block) = self.blocks.get(&handle.0) {
                pending.extend(block.value.children());
            }
        }

        let dead: Vec<usize> = self
            .blocks
            .keys()
            .filter(|index| !marked.contains(index))
            .copied()
            .collect();
        let swept = dead.len();
        for index in dead {
            self.free(Handle(index));
        }
        swept
    }
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}

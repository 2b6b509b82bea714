// Per-batch value cache
//
// The cache is the only channel through which one step hands a computed value
// to a later step of the same batch. It is a bounded stack: `pop` is strictly
// last-in-first-out, while `peek_at` reads a frame below the top without
// consuming it, so one output can feed several downstream steps.
//
// A cache lives exactly as long as one `Proxy::execute` call. It is created
// empty when the batch starts and dropped on every exit path.

use crate::errors::{KernelError, Result};
use crate::types::StackValue;

#[derive(Debug)]
pub struct Cache {
    frames: Vec<StackValue>,
    max_depth: usize,
}

impl Cache {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Append a value on top of the stack
    pub fn push(&mut self, value: StackValue) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(KernelError::StackOverflow {
                max_depth: self.max_depth,
            });
        }
        self.frames.push(value);
        Ok(())
    }

    /// Remove and return the most recently pushed value
    pub fn pop(&mut self) -> Result<StackValue> {
        self.frames.pop().ok_or(KernelError::StackUnderflow {
            offset: 0,
            depth: 0,
        })
    }

    /// Read the value `offset` frames below the top (0 is the top)
    pub fn peek_at(&self, offset: usize) -> Result<&StackValue> {
        if offset >= self.max_depth {
            return Err(KernelError::InvalidReference {
                offset,
                max_depth: self.max_depth,
            });
        }
        let depth = self.frames.len();
        if offset >= depth {
            return Err(KernelError::StackUnderflow { offset, depth });
        }
        Ok(&self.frames[depth - 1 - offset])
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Discard every frame
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

//! Symbolic stack used by the validator.
//!
//! Slots carry provenance rather than values: a slot is either a constant that
//! came straight from a push-literal (and was at most moved by `dupN`/`swapN`
//! since), or `Unknown`. Only the former can name a jump destination.

use crate::errors::StackError;
use crate::jumpdests::JumpDestIndex;
use primitive_types::U256;

/// Capacity of both the data stack and the return-address stack.
pub const STACK_LIMIT: usize = 1024;

/// A tagged stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Constant(U256),
    Unknown,
}

impl Slot {
    pub fn constant(v: u64) -> Self {
        Slot::Constant(U256::from(v))
    }

    /// Whether the slot is statically known.
    pub fn is_static(&self) -> bool {
        matches!(self, Slot::Constant(_))
    }

    pub fn as_constant(&self) -> Option<U256> {
        match self {
            Slot::Constant(v) => Some(*v),
            Slot::Unknown => None,
        }
    }
}

/// A symbolic data stack with a movable base.
///
/// Slots below `base` belong to the caller of the current routine and cannot be
/// popped, duplicated or swapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    items: Vec<Slot>,
    base: usize,
}

impl Stack {
    /// Create a new empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stack from existing slots, with the base at the bottom.
    pub fn from_vec(items: Vec<Slot>) -> Self {
        Self { items, base: 0 }
    }

    /// Return the current stack depth (`sp`).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Depth at entry to the current routine (`bp`).
    pub fn base(&self) -> usize {
        self.base
    }

    /// `sp - bp`: slots pushed since the current routine was entered.
    pub fn relative_depth(&self) -> usize {
        self.items.len() - self.base
    }

    pub fn items(&self) -> &[Slot] {
        &self.items
    }

    /// Peek at the top element without removing it.
    pub fn peek(&self) -> Option<&Slot> {
        self.items.last()
    }

    /// Push a slot. Fails at the 1024-slot ceiling.
    pub fn push(&mut self, slot: Slot) -> Result<(), StackError> {
        if self.items.len() >= STACK_LIMIT {
            return Err(StackError::Overflow { limit: STACK_LIMIT });
        }
        self.items.push(slot);
        Ok(())
    }

    /// Push `n` slots of unknown provenance.
    pub fn push_unknown(&mut self, n: usize) -> Result<(), StackError> {
        if self.items.len() + n > STACK_LIMIT {
            return Err(StackError::Overflow { limit: STACK_LIMIT });
        }
        self.items.resize(self.items.len() + n, Slot::Unknown);
        Ok(())
    }

    /// Pop the top element. Fails if nothing is left above the base.
    pub fn pop(&mut self) -> Result<Slot, StackError> {
        if self.relative_depth() == 0 {
            return Err(StackError::Underflow { needed: 1, have: 0 });
        }
        self.items.pop().ok_or(StackError::Underflow { needed: 1, have: 0 })
    }

    /// Pop `n` elements at once.
    pub fn pop_n(&mut self, n: usize) -> Result<(), StackError> {
        let have = self.relative_depth();
        if have < n {
            return Err(StackError::Underflow { needed: n, have });
        }
        self.items.truncate(self.items.len() - n);
        Ok(())
    }

    /// Duplicate the n-th element from the top, keeping its tag.
    pub fn dup(&mut self, n: usize) -> Result<(), StackError> {
        let have = self.relative_depth();
        if n == 0 || n > have {
            return Err(StackError::Underflow { needed: n, have });
        }
        let slot = self.items[self.items.len() - n];
        self.push(slot)
    }

    /// Swap the top element with the n-th element below it.
    pub fn swap(&mut self, n: usize) -> Result<(), StackError> {
        let have = self.relative_depth();
        if n == 0 || have <= n {
            return Err(StackError::Underflow { needed: n + 1, have });
        }
        let top = self.items.len() - 1;
        self.items.swap(top, top - n);
        Ok(())
    }

    /// Generic stack effect: pop `pops`, then push `pushes` unknowns.
    pub fn apply(&mut self, pops: usize, pushes: usize) -> Result<(), StackError> {
        self.pop_n(pops)?;
        self.push_unknown(pushes)
    }

    /// Move the base to the current top and return the previous base.
    pub fn rebase(&mut self) -> usize {
        std::mem::replace(&mut self.base, self.items.len())
    }

    /// Restore a base saved by [`Stack::rebase`].
    pub fn set_base(&mut self, base: usize) {
        self.base = base.min(self.items.len());
    }

    /// Turn the top `n` slots above the base into `Unknown`.
    pub fn forget(&mut self, n: usize) {
        let from = self.items.len() - n.min(self.relative_depth());
        self.items[from..].fill(Slot::Unknown);
    }

    /// Pop a jump destination. It must be a static constant naming a member
    /// of the jump-destination index.
    pub fn pop_destination(&mut self, index: &JumpDestIndex) -> Result<usize, StackError> {
        let value = match self.pop()? {
            Slot::Constant(v) => v,
            Slot::Unknown => return Err(StackError::DynamicJump),
        };
        if value.bits() > 64 {
            return Err(StackError::InvalidDestination(value));
        }
        match usize::try_from(value.low_u64()) {
            Ok(offset) if index.contains(offset) => Ok(offset),
            _ => Err(StackError::InvalidDestination(value)),
        }
    }
}

/// The routine a path is executing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Routine {
    /// Top-level code, entered at offset 0.
    Main,
    /// A subroutine, identified by its entry offset.
    Sub(usize),
}

/// One entry of the return-address stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnFrame {
    /// Successor of the `jumpsub` that opened the frame.
    pub return_to: usize,
    /// The caller's base, restored on return.
    pub caller_base: usize,
    /// Entry offset of the called routine.
    pub entry: usize,
}

/// Path-local abstract machine state: data stack plus return-address stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolicState {
    pub stack: Stack,
    returns: Vec<ReturnFrame>,
}

impl SymbolicState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routine of the innermost open frame.
    pub fn routine(&self) -> Routine {
        self.returns.last().map_or(Routine::Main, |f| Routine::Sub(f.entry))
    }

    /// `rp`: number of open frames.
    pub fn return_depth(&self) -> usize {
        self.returns.len()
    }

    /// Fails if another frame would exceed the return-stack ceiling.
    pub fn check_call(&self) -> Result<(), StackError> {
        if self.returns.len() >= STACK_LIMIT {
            return Err(StackError::ReturnOverflow { limit: STACK_LIMIT });
        }
        Ok(())
    }

    /// Open a frame for the routine at `entry`; the current top becomes its base.
    pub fn call(&mut self, entry: usize, return_to: usize) -> Result<(), StackError> {
        self.check_call()?;
        let caller_base = self.stack.rebase();
        self.returns.push(ReturnFrame { return_to, caller_base, entry });
        Ok(())
    }

    /// Close the innermost frame and restore the caller's base.
    pub fn ret(&mut self) -> Result<ReturnFrame, StackError> {
        let frame = self.returns.pop().ok_or(StackError::ReturnUnderflow)?;
        self.stack.set_base(frame.caller_base);
        Ok(frame)
    }
}

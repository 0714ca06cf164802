//! Jump-destination index.
//!
//! The set of offsets a jump or subroutine call may land on: every `jumpdest`
//! that starts an instruction. A `0x5b` byte inside push data is not a target.

use crate::decoder::Decoder;
use crate::utils::opcodes::OpClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpDestIndex {
    marks: Vec<bool>,
    count: usize,
}

impl JumpDestIndex {
    /// One pass over the decoder's instruction boundaries.
    pub fn new(decoder: &Decoder<'_>) -> Self {
        let mut marks = vec![false; decoder.len()];
        let mut count = 0;
        for ins in decoder.instructions().flatten() {
            if ins.class == OpClass::JumpDest {
                marks[ins.offset] = true;
                count += 1;
            }
        }
        Self { marks, count }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.marks.get(offset).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Destinations in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.marks
            .iter()
            .enumerate()
            .filter(|(_, mark)| **mark)
            .map(|(offset, _)| offset)
    }
}

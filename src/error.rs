use thiserror::Error;

use crate::constants::MAX_PROGRAM_SIZE;

/// Everything that can stop a program from loading or a cycle from completing.
///
/// Only `UnknownOpcode` is recoverable; what happens to the pc afterwards is
/// decided by the engine's `UnknownOpcodePolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("program is {size} bytes but at most {max} bytes fit in memory")]
    RomTooLarge { size: usize, max: usize },

    #[error("memory access out of bounds at {address:#06X}")]
    OutOfBounds { address: usize },

    #[error("call stack overflow")]
    StackOverflow,

    #[error("return with an empty call stack")]
    StackUnderflow,

    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),
}

impl Fault {
    pub(crate) fn rom_too_large(size: usize) -> Self {
        Fault::RomTooLarge {
            size,
            max: MAX_PROGRAM_SIZE,
        }
    }

    /// Whether emulation can carry on after this fault
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Fault::UnknownOpcode(_))
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::run_state::RunState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("can't open rom file '{}': {source}", .path.display())]
    RomNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rom doesn't fit in the {max} bytes of program memory (read {size} bytes)")]
    RomTooLarge { size: usize, max: usize },
    #[error("io error while reading rom: {0}")]
    Io(#[from] std::io::Error),
    #[error("a rom can only be loaded into a ready machine (machine is {0:?})")]
    NotReady(RunState),
    #[error("call stack overflow at pc {pc:#06X}")]
    StackOverflow { pc: u16 },
    #[error("return with an empty call stack at pc {pc:#06X}")]
    StackUnderflow { pc: u16 },
    #[error("memory access out of bounds at {addr:#06X}")]
    MemoryOutOfBounds { addr: usize },
}

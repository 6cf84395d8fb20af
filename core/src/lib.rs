pub use chip8::{Chip8, Step};
pub use constants::{CLOCK_SPEED, TIMER_SPEED};
pub use error::{Error, Result};
pub use instruction::Instruction;
pub use operations::Keypad;
pub use run_state::RunState;

mod chip8;
pub mod constants;
pub mod diagnostics;
mod error;
pub mod instruction;
pub mod opcode;
mod operations;
mod run_state;
pub mod state;

//! Host shell for the interpreter in `chip8-core`: pacing, host commands and
//! the seam to whatever displays frames and reads keys.

pub mod host;
pub mod run;

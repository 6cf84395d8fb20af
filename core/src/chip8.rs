use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, trace, warn};

use crate::constants::{KEY_COUNT, MAX_ROM_SIZE, PROGRAM_START};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::instruction::{Flow, Instruction};
use crate::operations::Keypad;
use crate::run_state::RunState;
use crate::state::{FrameBuffer, State};

/// Outcome of a single call to `Chip8::advance_cpu`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The machine isn't playing so nothing ran
    Idle,
    Executed(Instruction),
    /// FX0A ran without a pressed key; the pc didn't move
    AwaitingKey,
    /// No instruction matches this opcode; it was skipped
    Unhandled(u16),
}

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// Tracks:
///  - current `state`
///  - `pressed_keys` with public interfaces for manipulating them
///  - the `run_state` lifecycle
///
/// Supplies interfaces for:
/// - loading roms
/// - pressing and releasing keys
/// - advancing the CPU by one instruction
/// - advancing its timers
/// - inspecting its frame buffer for rendering by some display
/// - pausing, resuming and quitting
pub struct Chip8 {
    state: State,
    pressed_keys: Keypad,
    run_state: RunState,
    rng: StdRng,
    last_opcode: u16,
    unhandled_opcodes: u64,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A machine whose random numbers are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Chip8 {
            state: State::new(),
            pressed_keys: [false; KEY_COUNT],
            run_state: RunState::Ready,
            rng,
            last_opcode: 0,
            unhandled_opcodes: 0,
        }
    }

    /// Load a rom from a source file
    ///
    /// # Arguments
    /// * `path` location of a raw rom image
    pub fn load_rom_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|source| Error::RomNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_rom(&mut file)
    }

    /// Load a rom from a reader
    /// Reads at most one byte past the largest rom, so oversized sources are rejected early.
    ///
    /// # Arguments
    /// * `reader` a reader that contains a ROM
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> Result<()> {
        let mut rom = Vec::with_capacity(MAX_ROM_SIZE + 1);
        reader.take(MAX_ROM_SIZE as u64 + 1).read_to_end(&mut rom)?;
        self.load_bytes(&rom)
    }

    /// Copies `rom` to the program origin and starts playing.
    /// Nothing is written unless the whole rom fits.
    pub fn load_bytes(&mut self, rom: &[u8]) -> Result<()> {
        if self.run_state != RunState::Ready {
            return Err(Error::NotReady(self.run_state));
        }
        if rom.len() > MAX_ROM_SIZE {
            return Err(Error::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let start = PROGRAM_START as usize;
        self.state.memory[start..start + rom.len()].copy_from_slice(rom);
        self.state.pc = PROGRAM_START;
        self.run_state = RunState::Playing;
        info!(bytes = rom.len(), "loaded rom");
        Ok(())
    }

    /// Advances the CPU by a single instruction
    /// - does nothing unless playing
    /// - gets, decodes and executes the next opcode
    pub fn advance_cpu(&mut self) -> Result<Step> {
        if !self.run_state.is_running() {
            return Ok(Step::Idle);
        }

        let pc = self.state.pc;
        let op = self.state.fetch()?;
        self.last_opcode = op;
        let instruction = Instruction::decode(op);
        trace!(
            "{:04X} {:<16} v{:02X?} i{:04X} pc{:04X}",
            op,
            instruction.to_string(),
            self.state.v,
            self.state.i,
            pc
        );

        let flow = instruction.execute(&mut self.state, &self.pressed_keys, &mut self.rng)?;
        Ok(match (instruction, flow) {
            (Instruction::Unknown(op), _) => {
                self.unhandled_opcodes += 1;
                warn!("skipping unhandled opcode {:04X} at {:04X}", op, pc);
                Step::Unhandled(op)
            }
            (_, Flow::Wait) => Step::AwaitingKey,
            (instruction, Flow::Continue) => Step::Executed(instruction),
        })
    }

    /// Counts both timers down by one; called at 60Hz while playing
    pub fn advance_timers(&mut self) {
        if !self.run_state.is_running() {
            return;
        }
        if self.state.delay_timer > 0 {
            self.state.delay_timer -= 1;
        }
        if self.state.sound_timer > 0 {
            self.state.sound_timer -= 1;
        }
    }

    /// The buzzer sounds for as long as the sound timer is running
    pub fn buzzer_active(&self) -> bool {
        self.state.sound_timer > 0
    }

    /// Set the pressed status of key
    ///
    /// # Arguments
    /// * `key` the 4-bit representation of the key that was pressed
    pub fn key_press(&mut self, key: u8) {
        if let Some(pressed) = self.pressed_keys.get_mut(key as usize) {
            *pressed = true;
        }
    }

    /// Unset the pressed status of key
    ///
    /// # Arguments
    /// * `key` the 4-bit representation of the key that was released
    pub fn key_release(&mut self, key: u8) {
        if let Some(pressed) = self.pressed_keys.get_mut(key as usize) {
            *pressed = false;
        }
    }

    /// Replace the pressed status of every key at once
    pub fn set_keys(&mut self, pressed_keys: Keypad) {
        self.pressed_keys = pressed_keys;
    }

    pub fn pressed_keys(&self) -> &Keypad {
        &self.pressed_keys
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.state.frame_buffer
    }

    /// Returns the FrameBuffer if the display should be redrawn
    pub fn get_frame(&self) -> Option<&FrameBuffer> {
        if self.state.draw_flag {
            Some(&self.state.frame_buffer)
        } else {
            None
        }
    }

    /// The host has shown the current frame
    pub fn frame_presented(&mut self) {
        self.state.draw_flag = false;
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn toggle_pause(&mut self) {
        let next = self.run_state.toggled();
        if next != self.run_state {
            info!("{:?} -> {:?}", self.run_state, next);
            self.run_state = next;
        }
    }

    pub fn quit(&mut self) {
        info!("{:?} -> {:?}", self.run_state, RunState::Quit);
        self.run_state = RunState::Quit;
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The opcode fetched by the most recent `advance_cpu`
    pub fn last_opcode(&self) -> u16 {
        self.last_opcode
    }

    /// How many opcodes were skipped for want of an instruction
    pub fn unhandled_opcodes(&self) -> u64 {
        self.unhandled_opcodes
    }

    pub fn dump_pc(&self) -> String {
        diagnostics::dump_pc(&self.state, self.last_opcode)
    }

    pub fn dump_registers(&self) -> String {
        diagnostics::dump_registers(&self.state)
    }

    pub fn dump_memory(&self) -> String {
        diagnostics::dump_memory(&self.state)
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

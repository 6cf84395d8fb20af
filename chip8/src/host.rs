use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use tracing::{debug, trace, warn};

use chip8_core::constants::KEY_COUNT;
use chip8_core::state::FrameBuffer;
use chip8_core::{Chip8, Keypad, Result, Step};

/// Requests from the user that aren't keypad input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    TogglePause,
    Quit,
    /// Dump the machine once; further requests are ignored until released
    DebugDump,
    DebugDumpReleased,
}

/// # Frontend
/// Whatever shows the frame buffer, plays the buzzer and reads the keyboard.
/// The host owns its frontend, so the frontend is dropped on every way out of a run.
pub trait Frontend {
    /// Updates `keys` to the keypad as it is now.
    /// Returns any commands issued since the last poll.
    fn poll(&mut self, keys: &mut Keypad) -> Vec<HostCommand>;

    fn present(&mut self, frame: &FrameBuffer);

    fn set_buzzer(&mut self, active: bool);

    fn debug_dump(&mut self, dump: &str);
}

/// # Host
/// Everything a running machine needs from the outside world, in one place:
/// - the machine itself
/// - the frontend it renders to and reads input from
/// - whether a debug dump has already been shown for the current request
/// - the last buzzer state handed to the frontend
pub struct Host<F: Frontend> {
    chip8: Chip8,
    frontend: F,
    dump_latched: bool,
    buzzer: bool,
}

impl<F: Frontend> Host<F> {
    pub fn new(chip8: Chip8, frontend: F) -> Self {
        Host {
            chip8,
            frontend,
            dump_latched: false,
            buzzer: false,
        }
    }

    pub fn chip8(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// Reads the keypad and applies any host commands
    pub fn handle_input(&mut self) {
        let mut keys = *self.chip8.pressed_keys();
        let commands = self.frontend.poll(&mut keys);
        self.chip8.set_keys(keys);
        for command in commands {
            self.command(command);
        }
    }

    pub fn command(&mut self, command: HostCommand) {
        debug!(?command, "host command");
        match command {
            HostCommand::TogglePause => self.chip8.toggle_pause(),
            HostCommand::Quit => self.chip8.quit(),
            HostCommand::DebugDump => {
                if !self.dump_latched {
                    self.dump();
                    self.dump_latched = true;
                }
            }
            HostCommand::DebugDumpReleased => self.dump_latched = false,
        }
    }

    /// Sends the pc, register and memory dumps to the frontend
    pub fn dump(&mut self) {
        let dump = format!(
            "{}\n{}\n{}",
            self.chip8.dump_pc(),
            self.chip8.dump_registers(),
            self.chip8.dump_memory()
        );
        self.frontend.debug_dump(&dump);
    }

    pub fn step(&mut self) -> Result<Step> {
        self.chip8.advance_cpu()
    }

    /// Advances the timers and tells the frontend when the buzzer starts or stops
    pub fn tick(&mut self) {
        self.chip8.advance_timers();
        let buzzer = self.chip8.buzzer_active();
        if buzzer != self.buzzer {
            self.buzzer = buzzer;
            self.frontend.set_buzzer(buzzer);
        }
    }

    /// Hands the frame to the frontend if it changed since it was last shown
    pub fn present(&mut self) {
        let presented = match self.chip8.get_frame() {
            Some(frame) => {
                self.frontend.present(frame);
                true
            }
            None => false,
        };
        if presented {
            self.chip8.frame_presented();
        }
    }

    pub fn quit(&mut self) {
        self.chip8.quit();
    }
}

/// A frontend with no window and no sound.
/// Frames and buzzer changes are only logged; dumps go to stdout.
/// Keys and commands can be fed to it as text lines, see `parse_line`.
#[derive(Default)]
pub struct HeadlessFrontend {
    frames: u64,
    keys: Keypad,
    lines: Option<Receiver<String>>,
}

impl HeadlessFrontend {
    /// Takes its input from lines sent down `lines`
    pub fn from_lines(lines: Receiver<String>) -> Self {
        HeadlessFrontend {
            lines: Some(lines),
            ..HeadlessFrontend::default()
        }
    }

    /// Takes its input from lines typed on stdin.
    /// The reader thread ends with stdin; it is left detached.
    pub fn reading_stdin() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let sent = match line {
                    Ok(line) => tx.send(line).is_ok(),
                    Err(_) => false,
                };
                if !sent {
                    break;
                }
            }
        });
        Self::from_lines(rx)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// One line of headless input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineInput {
    Command(HostCommand),
    /// A single hex digit key and whether it is now held
    Key(u8, bool),
    Dump,
}

/// Understands `pause`, `quit`, `dump`, `press <key>` and `release <key>`,
/// where `<key>` is a hex digit 0-F.
pub fn parse_line(line: &str) -> Option<LineInput> {
    let mut words = line.split_whitespace();
    let input = match (words.next()?, words.next()) {
        ("pause", None) => LineInput::Command(HostCommand::TogglePause),
        ("quit", None) => LineInput::Command(HostCommand::Quit),
        ("dump", None) => LineInput::Dump,
        ("press", Some(key)) => LineInput::Key(parse_key(key)?, true),
        ("release", Some(key)) => LineInput::Key(parse_key(key)?, false),
        _ => return None,
    };
    match words.next() {
        Some(_) => None,
        None => Some(input),
    }
}

fn parse_key(word: &str) -> Option<u8> {
    match u8::from_str_radix(word, 16) {
        Ok(key) if (key as usize) < KEY_COUNT && word.len() == 1 => Some(key),
        _ => None,
    }
}

impl Frontend for HeadlessFrontend {
    fn poll(&mut self, keys: &mut Keypad) -> Vec<HostCommand> {
        let mut commands = Vec::new();
        if let Some(lines) = &self.lines {
            for line in lines.try_iter() {
                match parse_line(&line) {
                    Some(LineInput::Command(command)) => commands.push(command),
                    Some(LineInput::Key(key, held)) => self.keys[key as usize] = held,
                    Some(LineInput::Dump) => {
                        commands.push(HostCommand::DebugDump);
                        commands.push(HostCommand::DebugDumpReleased);
                    }
                    None => warn!(line = line.as_str(), "ignoring unrecognised input"),
                }
            }
        }
        *keys = self.keys;
        commands
    }

    fn present(&mut self, frame: &FrameBuffer) {
        self.frames += 1;
        let lit: usize = frame
            .iter()
            .map(|row| row.iter().filter(|&&p| p == 1).count())
            .sum();
        trace!(frame = self.frames, lit, "frame");
    }

    fn set_buzzer(&mut self, active: bool) {
        debug!(active, "buzzer");
    }

    fn debug_dump(&mut self, dump: &str) {
        println!("\n{}", dump);
    }
}

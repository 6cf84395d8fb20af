use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{error, info};

use chip8_core::{Chip8, RunState, Step, CLOCK_SPEED, TIMER_SPEED};

use crate::host::{Frontend, HeadlessFrontend, Host};

/// How long to wait between input polls while paused
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Everything needed to start a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rom: PathBuf,
    /// Instructions per second
    pub clock_speed: u32,
    /// Timer decrements per second
    pub timer_speed: u32,
    /// Quit after this many instructions
    pub max_cycles: Option<u64>,
    pub dump_on_exit: bool,
    /// Take keys and commands from stdin lines
    pub read_stdin: bool,
}

impl RunConfig {
    pub fn new(rom: PathBuf) -> Self {
        RunConfig {
            rom,
            clock_speed: CLOCK_SPEED,
            timer_speed: TIMER_SPEED,
            max_cycles: None,
            dump_on_exit: false,
            read_stdin: false,
        }
    }

    pub fn cycle_time(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.clock_speed.max(1)))
    }

    pub fn timer_time(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.timer_speed.max(1)))
    }
}

/// Loads the rom and runs it headless until it quits or faults
pub fn run(config: &RunConfig) -> anyhow::Result<()> {
    let mut chip8 = Chip8::new();
    chip8
        .load_rom_file(&config.rom)
        .with_context(|| format!("failed to load rom '{}'", config.rom.display()))?;

    let frontend = if config.read_stdin {
        HeadlessFrontend::reading_stdin()
    } else {
        HeadlessFrontend::default()
    };
    let mut host = Host::new(chip8, frontend);
    let result = run_loop(&mut host, config);

    if config.dump_on_exit {
        host.dump();
    }
    info!(
        frames = host.frontend().frames(),
        unhandled = host.chip8().unhandled_opcodes(),
        "stopped"
    );
    result.map(|executed| info!(executed, "run complete"))
}

/// Paces the machine against the wall clock
/// - polls input every pass, and keeps polling while paused
/// - executes one instruction every `cycle_time`
/// - ticks the timers once `timer_time` has passed, checked after each instruction
/// - presents a frame whenever the frame buffer changed
///
/// Returns the number of instructions executed.
pub fn run_loop<F: Frontend>(host: &mut Host<F>, config: &RunConfig) -> anyhow::Result<u64> {
    if host.chip8().run_state() == RunState::Ready {
        bail!("no rom loaded");
    }

    let cycle_time = config.cycle_time();
    let timer_time = config.timer_time();
    let mut last_cycle = Instant::now();
    let mut last_timer = last_cycle;
    let mut executed: u64 = 0;

    while host.chip8().run_state() != RunState::Quit {
        host.handle_input();
        if host.chip8().run_state() == RunState::Paused {
            thread::sleep(PAUSE_POLL);
            continue;
        }

        let now = Instant::now();
        if now - last_cycle >= cycle_time {
            last_cycle = now;
            match host.step() {
                Ok(Step::Idle) => {}
                Ok(_) => executed += 1,
                Err(e) => {
                    error!("{}", e);
                    error!("{}", host.chip8().dump_pc());
                    return Err(anyhow::Error::new(e).context("machine fault"));
                }
            }
            if now - last_timer >= timer_time {
                last_timer = now;
                host.tick();
            }
        }

        host.present();

        if let Some(max) = config.max_cycles {
            if executed >= max {
                host.quit();
            }
        }

        let elapsed = last_cycle.elapsed();
        if cycle_time > elapsed {
            thread::sleep(cycle_time - elapsed);
        }
    }
    Ok(executed)
}

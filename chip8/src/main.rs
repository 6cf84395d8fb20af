use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chip8::run::{run, RunConfig};
use chip8_core::{CLOCK_SPEED, TIMER_SPEED};

/// Chip-8 interpreter
#[derive(Parser, Debug)]
#[command(name = "chip8")]
#[command(about = "Runs a Chip-8 rom", long_about = None)]
struct Args {
    /// Path to a raw Chip-8 rom image
    rom: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = CLOCK_SPEED, value_parser = clap::value_parser!(u32).range(1..))]
    clock_hz: u32,

    /// Delay and sound timer decrements per second
    #[arg(long, default_value_t = TIMER_SPEED, value_parser = clap::value_parser!(u32).range(1..))]
    timer_hz: u32,

    /// Quit after executing this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Dump the pc, registers and memory when the run ends
    #[arg(long)]
    dump_on_exit: bool,

    /// Read input from stdin, one per line: pause, quit, dump, press <key>, release <key>.
    /// Without it the run only ends at --max-cycles or on a fault
    #[arg(long)]
    stdin: bool,
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig {
            rom: args.rom,
            clock_speed: args.clock_hz,
            timer_speed: args.timer_hz,
            max_cycles: args.max_cycles,
            dump_on_exit: args.dump_on_exit,
            read_stdin: args.stdin,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(&RunConfig::from(args))
}

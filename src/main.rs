// Headless host: no window, no audio. Steps the ROM at a fixed rate with
// the timer clock running alongside, and reports how the run ended.

use std::{
    io::Write,
    path::PathBuf,
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use emuchip::{Cycle, Emulator, EmulatorError, FrameBuffer, Screen, TimerClock};

// CPU: 400 steps per second unless told otherwise
// Timer: 60 times per second, on its own thread
const DEFAULT_HZ: u32 = 400;

#[derive(Parser, Debug)]
#[command(about = "Run a CHIP-8 program image")]
struct Args {
    /// path to the program image
    rom: PathBuf,

    /// instruction steps per second
    #[arg(long, default_value_t = DEFAULT_HZ, value_parser = clap::value_parser!(u32).range(1..))]
    hz: u32,

    /// seed for the random source
    #[arg(long)]
    seed: Option<u64>,

    /// stop normally after this many steps
    #[arg(long)]
    max_cycles: Option<u64>,
}

/// Counts frames instead of drawing them.
#[derive(Default)]
struct HeadlessScreen {
    frames: u64,
}

impl Screen for HeadlessScreen {
    fn present(&mut self, fb: &FrameBuffer) {
        self.frames += 1;
        log::trace!("frame {}: {} pixels lit", self.frames, fb.lit_count());
    }
}

fn run(args: &Args) -> Result<u64, EmulatorError> {
    let mut emu = match args.seed {
        Some(seed) => Emulator::with_seed(HeadlessScreen::default(), seed),
        None => Emulator::new(HeadlessScreen::default()),
    };
    emu.init();
    emu.load_program_file(&args.rom)?;

    // stopped on drop, whichever way we leave
    let _clock = TimerClock::spawn(emu.timers());

    let period = Duration::from_nanos(1_000_000_000 / args.hz as u64);
    let mut next_cycle = Instant::now() + period;
    let mut cycles = 0;
    let mut beeping = false;
    log::info!("running {} at {} Hz", args.rom.display(), args.hz);

    while args.max_cycles.map_or(true, |max| cycles < max) {
        if emu.tick()? == Cycle::AwaitingKey {
            log::trace!("waiting for key at {:#05x}", emu.pc());
        }
        cycles += 1;

        if emu.sound_active() != beeping {
            beeping = !beeping;
            log::debug!("sound cue {}", if beeping { "on" } else { "off" });
        }

        let now = Instant::now();
        if now < next_cycle {
            thread::sleep(next_cycle - now);
        }
        next_cycle += period;
    }

    log::info!(
        "stopped after {} cycles, {} frames presented",
        cycles,
        emu.screen().frames
    );
    Ok(cycles)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::builder()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

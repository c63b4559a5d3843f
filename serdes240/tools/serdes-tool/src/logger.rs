use std::sync::atomic::{AtomicU64, Ordering};

use console::{style, Color};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Control tick of the simulation currently stepping, stamped on every line.
static TICK: AtomicU64 = AtomicU64::new(0);

static LOGGER: ConsoleLogger = ConsoleLogger;

pub fn set_tick(tick: u64) {
    TICK.store(tick, Ordering::Relaxed);
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = match record.level() {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug => Color::Cyan,
            Level::Trace => Color::White,
        };

        eprintln!("[{:>10}] {:>5}({}): {}",
            TICK.load(Ordering::Relaxed),
            style(record.level()).fg(color),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

pub fn level(verbose: usize) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the console logger. `-v` raises the level one step per flag.
pub fn init(verbose: usize) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level(verbose));
    Ok(())
}

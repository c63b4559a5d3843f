use std::process;
use std::thread;

use clap::{Parser, Subcommand, Args, ArgEnum};

use crossbeam::channel::{unbounded, Receiver, Sender};
use serdes240_core::{PhyEvent, Timing};
use serdes240_pac::device::Device;
use serdes240_pac::register::STATUS;

use bench::SimulatedBus;
use default::{register_defaults, DefaultsMode};
use dump::{registers_dump, registers_dump_raw};
use error::Result;
use status::{print_event, print_link_report, print_status};
use link::{run_link_test, start_pattern_link, LinkOptions, LinkTestMode};

mod bench;
mod default;
mod dump;
mod error;
mod link;
mod logger;
mod status;

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Log more; repeat for more detail.
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: usize,

    #[clap(flatten)]
    pub timing: TimingArgs,
}

#[derive(Args)]
pub(crate) struct TimingArgs {
    /// Serial ticks per control tick.
    #[clap(long, default_value_t = 8)]
    pub serial_ratio: u32,

    /// Control ticks from synthesizer reset release to raw lock.
    #[clap(long)]
    pub pll_latency: Option<u16>,
}

impl TimingArgs {
    fn timing(&self) -> Timing {
        let defaults = Timing::default();
        Timing {
            serial_ratio: self.serial_ratio,
            pll_lock_latency: self.pll_latency.unwrap_or(defaults.pll_lock_latency),
            ..defaults
        }
    }
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum TestMode {
    PrbsLoopback,
    BufferLoopback,
    IdlePattern,
}

impl From<TestMode> for LinkTestMode {
    fn from(mode: TestMode) -> Self {
        match mode {
            TestMode::PrbsLoopback   => LinkTestMode::PrbsLoopback,
            TestMode::BufferLoopback => LinkTestMode::BufferLoopback,
            TestMode::IdlePattern    => LinkTestMode::IdlePattern,
        }
    }
}

#[derive(Args)]
pub(crate) struct LinkArgs {
    /// Use the short phase-lock qualification interval.
    #[clap(long)]
    pub fast_lock: bool,

    /// Control ticks to run once the link is up.
    #[clap(long, default_value_t = 1000)]
    pub ticks: usize,
}

impl LinkArgs {
    fn options(&self) -> LinkOptions {
        LinkOptions {
            fast_lock: self.fast_lock,
            ticks: self.ticks,
            ..LinkOptions::default()
        }
    }
}

#[derive(Args)]
pub(crate) struct TestArgs {
    #[clap(arg_enum)]
    mode: TestMode,

    #[clap(flatten)]
    link: LinkArgs,
}

#[derive(Subcommand, Clone)]
pub(crate) enum DumpMode {
    #[clap(name="raw")]
    Raw,

    #[clap(name="registers")]
    Registers,
}

#[derive(Args)]
pub(crate) struct DumpArgs {
    #[clap(subcommand)]
    mode: DumpMode,

    /// Bring a link up before dumping.
    #[clap(long, arg_enum)]
    link: Option<TestMode>,
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum DefaultsArg {
    Write,
    Check,
}

#[derive(Args)]
pub(crate) struct DefaultsArgs {
    #[clap(arg_enum)]
    mode: DefaultsArg,
}

#[derive(Args)]
pub(crate) struct MonitorArgs {
    #[clap(flatten)]
    link: LinkArgs,

    /// Control ticks between status reads.
    #[clap(long, default_value_t = 500)]
    pub interval: usize,

    /// Force the recovery loop out of range at this control tick.
    #[clap(long)]
    pub fault_at: Option<u64>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[clap(name="test")]
    Test(TestArgs),

    #[clap(name="dump")]
    Dump(DumpArgs),

    #[clap(name="defaults")]
    Defaults(DefaultsArgs),

    #[clap(name="monitor")]
    Monitor(MonitorArgs),
}

fn main() -> Result<()> {
    let args = Cli::parse();
    logger::init(args.verbose)?;

    let timing = args.timing.timing();

    match args.command {
        Commands::Test(a) => {
            let device = Device::new(SimulatedBus::new(timing)?);
            let report = run_link_test(&device, a.mode.into(), &a.link.options())?;
            print_link_report(&report);
            if !report.passed() {
                process::exit(1);
            }
        },
        Commands::Dump(a) => {
            let device = Device::new(SimulatedBus::new(timing)?);
            match a.link {
                Some(mode) => { run_link_test(&device, mode.into(), &LinkOptions::default())?; },
                None => { device.transport().power_up()?; },
            }
            match a.mode {
                DumpMode::Raw => registers_dump_raw(&device)?,
                DumpMode::Registers => registers_dump(&device)?,
            }
        },
        Commands::Defaults(a) => {
            let device = Device::new(SimulatedBus::new(timing)?);
            device.transport().power_up()?;
            let mode = match a.mode {
                DefaultsArg::Write => DefaultsMode::Write,
                DefaultsArg::Check => DefaultsMode::Check,
            };
            let mismatches = register_defaults(&device, mode)?;
            if mode == DefaultsMode::Check {
                println!("{} registers differ", mismatches.len());
            }
        },
        Commands::Monitor(a) => {
            let (event_sender, event_receiver) = unbounded();

            thread::Builder::new()
                .name("phy_sim".to_string())
                .spawn({
                    let options = a.link.options();
                    move || {
                        if let Err(e) = simulate(timing, options, a.interval, a.fault_at, event_sender) {
                            eprintln!("error: simulation: {e:?}");
                        }
                        eprintln!("done: simulation");
                    }
                })?;

            monitor(event_receiver);
            eprintln!("done: monitor");
        },
    }

    Ok(())
}

///////////////////////////////////////////////////////////////////////

pub(crate) enum MonitorMessage {
    Event(u64, PhyEvent),
    Status(u64, STATUS),
}

/// Bring up the PRBS link and stream its events and periodic status reads.
/// Returns when the run is over or the monitor hangs up.
fn simulate(timing: Timing, options: LinkOptions, interval: usize, fault_at: Option<u64>, sender: Sender<MonitorMessage>) -> Result<()> {
    let device = Device::new(SimulatedBus::new(timing)?);
    let bus = device.transport();

    let forward = |bus: &SimulatedBus| {
        bus.drain_events().into_iter()
            .all(|(tick, event)| sender.send(MonitorMessage::Event(tick, event)).is_ok())
    };

    bus.power_up()?;
    start_pattern_link(&device, &options)?;
    if !forward(bus) {
        return Ok(());
    }

    let interval = interval.max(1);
    let mut remaining = options.ticks;
    while remaining > 0 {
        let step = remaining.min(interval);
        bus.run(step);
        remaining -= step;

        if let Some(tick) = fault_at {
            if bus.ticks() >= tick {
                bus.with_harness(|h| h.phy_mut().inject_cdr_out_of_range(true));
            }
        }

        let status = device.status().read()?;
        if !forward(bus) || sender.send(MonitorMessage::Status(bus.ticks(), status)).is_err() {
            break;
        }
    }

    Ok(())
}

fn monitor(receiver: Receiver<MonitorMessage>) {
    while let Ok(m) = receiver.recv() {
        match m {
            MonitorMessage::Event(tick, event) => print_event(tick, &event),
            MonitorMessage::Status(tick, status) => print_status(tick, &status),
        }
    }
}

use console::{style, Color};
use serdes240_core::phy::LockLoop;
use serdes240_core::PhyEvent;
use serdes240_pac::register::STATUS;

use crate::link::LinkReport;

pub fn print_status(tick: u64, status: &STATUS) {
    let good = |v| if v != 0 { Color::Green } else { Color::Red };
    let bad = |v| if v != 0 { Color::Red } else { Color::Green };

    println!("[{tick:>10}] STATUS:[{}][{}][{}][{}][{}][{}][{}][{}]",
        style("FLOCK").fg(good(status.FREQ_LOCK())),
        style("PLOCK").fg(good(status.PHASE_LOCK())),
        style("TXF").fg(bad(status.TX_FULL())),
        style("TXE").fg(bad(status.TX_EMPTY())),
        style("RXF").fg(bad(status.RX_FULL())),
        style("RXE").fg(bad(status.RX_EMPTY())),
        style("PATERR").fg(bad(status.PATTERN_ERR())),
        style("BUFERR").fg(bad(status.BUFFER_ERR())),
    );
}

fn loop_name(which: LockLoop) -> &'static str {
    match which {
        LockLoop::Frequency => "pll",
        LockLoop::Phase => "cdr",
    }
}

pub fn describe_event(event: &PhyEvent) -> String {
    match event {
        PhyEvent::RegisterWrite { address, value } => format!("write {address:02x} = {value:02x}"),
        PhyEvent::BusError => "bus conflict".to_string(),
        PhyEvent::Por(state) => format!("por {state:?} ({})", state.code()),
        PhyEvent::Lock { which, locked } => format!("{} {}", loop_name(*which), if *locked { "locked" } else { "unlocked" }),
        PhyEvent::LockError(which) => format!("{} out of range", loop_name(*which)),
        PhyEvent::Alignment { locked } => format!("alignment {}", if *locked { "locked" } else { "lost" }),
        PhyEvent::Tx(state) => format!("tx {state:?} ({})", state.code()),
        PhyEvent::Rx(state) => format!("rx {state:?} ({})", state.code()),
    }
}

pub fn print_event(tick: u64, event: &PhyEvent) {
    let color = match event {
        PhyEvent::BusError | PhyEvent::LockError(_) => Color::Red,
        PhyEvent::Lock { locked: false, .. } | PhyEvent::Alignment { locked: false } => Color::Yellow,
        PhyEvent::RegisterWrite { .. } => Color::Cyan,
        _ => Color::White,
    };
    println!("[{tick:>10}] {}", style(describe_event(event)).fg(color));
}

pub fn print_link_report(report: &LinkReport) {
    let verdict = if report.passed() {
        style("PASS").fg(Color::Green)
    } else {
        style("FAIL").fg(Color::Red)
    };

    println!("{:?}: {verdict}", report.mode);
    println!("\tlocked after {} ticks", report.lock_ticks);
    println!("\taligned: {}, pattern errors: {}", report.aligned, report.pattern_errors);
    if let Some(delivered) = report.delivered {
        println!("\tdelivered: {delivered}");
    }
    println!("\t{:?}", report.status);
}

#[cfg(test)]
mod tests {
    use serdes240_core::datapath::PipelineState;
    use serdes240_core::por::PorState;

    use super::*;

    #[test]
    fn event_descriptions() {
        let expected = [
            (PhyEvent::RegisterWrite { address: 0x01, value: 0x05 }, "write 01 = 05"),
            (PhyEvent::Por(PorState::Ready), "por Ready (6)"),
            (PhyEvent::Lock { which: LockLoop::Phase, locked: true }, "cdr locked"),
            (PhyEvent::LockError(LockLoop::Frequency), "pll out of range"),
            (PhyEvent::Alignment { locked: false }, "alignment lost"),
            (PhyEvent::Rx(PipelineState::Active), "rx Active (3)"),
            (PhyEvent::Tx(PipelineState::Error), "tx Error (7)"),
        ];
        for (event, text) in expected {
            assert_eq!(describe_event(&event), text, "{:?}", event);
        }
    }
}

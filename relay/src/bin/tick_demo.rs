//! Minimal task-stepping demo.
//!
//! Usage:
//!     cargo run --bin tick_demo
//!
//! Wraps two payloads — a control-loop stand-in and a housekeeping stand-in —
//! and steps both for a handful of ticks, printing the heartbeats a
//! supervisor would watch.

use relay::task::{Heartbeat, Task, TaskWrapper};

/// Stand-in for a high-priority control payload.
#[derive(Default)]
struct ControlLoop {
    iterations: u32,
}

impl Task for ControlLoop {
    fn step(&mut self, _now: u32) {
        self.iterations += 1;
    }

    fn init(&mut self) {
        println!("control: armed");
    }

    fn done(&mut self) {
        println!("control: disarmed after {} iterations", self.iterations);
    }
}

/// Stand-in for a background housekeeping payload; no lifecycle hooks.
#[derive(Default)]
struct Housekeeping {
    work_items: u32,
}

impl Task for Housekeeping {
    fn step(&mut self, _now: u32) {
        self.work_items += 1;
    }
}

fn main() {
    relay::trace::init_tracing();

    let mut control = ControlLoop::default();
    let mut housekeeping = Housekeeping::default();

    let hb_control = Heartbeat::new();
    let hb_housekeeping = Heartbeat::new();

    let mut control_task = TaskWrapper::new(&mut control, &hb_control);
    let mut housekeeping_task = TaskWrapper::new(&mut housekeeping, &hb_housekeeping);

    control_task.init();
    housekeeping_task.init();

    for now in 0..5 {
        control_task.step(now);
        housekeeping_task.step(now);
        println!(
            "tick={now} hb_control={} hb_housekeeping={}",
            hb_control.latest(),
            hb_housekeeping.latest()
        );
    }

    control_task.done();
    housekeeping_task.done();

    println!("housekeeping: {} work items processed", housekeeping.work_items);
}

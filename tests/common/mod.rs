#![allow(dead_code)]

use latchbench::model::{Circuit, ModelSim, Pins, Port};
use latchbench::SimResult;

fn latch_ports() -> Vec<Port> {
    vec![
        Port::input("clk", 1),
        Port::input("rst_n", 1),
        Port::input("ena", 1),
        Port::input("ui_in", 8),
        Port::input("uio_in", 8),
        Port::output("uo_out", 8),
    ]
}

/// Level-sensitive latch with asynchronous active-low reset.
#[derive(Default)]
pub struct IdealLatch {
    q: u32,
}

impl Circuit for IdealLatch {
    fn ports(&self) -> Vec<Port> {
        latch_ports()
    }

    fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
        if pins.get("rst_n")? == 0 {
            self.q = 0;
        } else if pins.get("clk")? == 1 && pins.get("ena")? == 1 {
            self.q = pins.get("ui_in")? & 1;
        }
        pins.drive("uo_out", self.q)
    }
}

/// Sets while transparent but only clears on reset. Passes the reference
/// sequence, whose checks never expect Q to fall.
#[derive(Default)]
pub struct SetOnlyLatch {
    q: u32,
}

impl Circuit for SetOnlyLatch {
    fn ports(&self) -> Vec<Port> {
        latch_ports()
    }

    fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
        if pins.get("rst_n")? == 0 {
            self.q = 0;
        } else if pins.get("clk")? == 1 && pins.get("ena")? == 1 && pins.bit("ui_in", 0)? {
            self.q = 1;
        }
        pins.drive("uo_out", self.q)
    }
}

/// Q follows D unconditionally.
#[derive(Default)]
pub struct TransparentWire;

impl Circuit for TransparentWire {
    fn ports(&self) -> Vec<Port> {
        latch_ports()
    }

    fn eval(&mut self, pins: &mut Pins<'_>) -> SimResult<()> {
        let d = pins.get("ui_in")? & 1;
        pins.drive("uo_out", d)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Fixture {
    Ideal,
    SetOnly,
    Wire,
}

pub fn sim(fixture: Fixture) -> ModelSim {
    let sim = match fixture {
        Fixture::Ideal => ModelSim::new("tb", IdealLatch::default()),
        Fixture::SetOnly => ModelSim::new("tb", SetOnlyLatch::default()),
        Fixture::Wire => ModelSim::new("tb", TransparentWire),
    };
    sim.expect("fixture ports are valid")
        .quiet()
        .with_time_limit(10, "ms")
        .expect("time limit converts to steps")
}

use crate::prelude::*;

/// Free-running clock driver, meant to be forked next to the test.
///
/// ```ignore
/// Task::fork(Clock::new(dut.c("clk")?, 10, "us").start());
/// ```
#[derive(Clone, Debug)]
pub struct Clock {
    signal: SimObject,
    period: u64,
    unit: String,
    start_high: bool,
}

impl Clock {
    pub fn new(signal: SimObject, period: u64, unit: &str) -> Self {
        Clock {
            signal,
            period,
            unit: unit.to_string(),
            start_high: true,
        }
    }

    /// Drive the low phase first instead of the high phase.
    pub fn start_low(mut self) -> Self {
        self.start_high = false;
        self
    }

    pub fn half_periods(&self) -> (u64, u64) {
        let high_t = self.period / 2;
        (high_t, self.period - high_t)
    }

    pub async fn start(self) -> RstbResult {
        let (high_t, low_t) = self.half_periods();
        if self.period % 2 != 0 {
            sim_if().log(&format!(
                "Warning: Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.",
                period = self.period,
                unit = self.unit,
                high = high_t,
                low = low_t
            ));
        }
        let high = sim_if().get_sim_steps(high_t as f64, &self.unit)?;
        let low = sim_if().get_sim_steps(low_t as f64, &self.unit)?;
        let phases = match self.start_high {
            true => [(1, high), (0, low)],
            false => [(0, low), (1, high)],
        };
        loop {
            for (level, steps) in phases {
                self.signal.set(level)?;
                Trigger::timer_steps(steps).await?;
            }
        }
    }
}

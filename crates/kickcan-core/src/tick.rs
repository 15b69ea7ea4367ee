/// Clock handed to every per-tick step of the simulation.
///
/// All timing in the authority is expressed in whole ticks; seconds only
/// appear at configuration time and for continuous motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
}

impl TickContext {
    pub fn new(tick_rate_hz: u32) -> Self {
        Self {
            tick: 0,
            dt_seconds: 1.0 / tick_rate_hz.max(1) as f32,
        }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Tick at which something lasting `ticks` ticks from now completes.
    pub fn after(&self, ticks: u64) -> u64 {
        self.tick.saturating_add(ticks)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.tick as f64 * f64::from(self.dt_seconds)
    }
}

/// Whole ticks covering `seconds`, rounded up so a timer never ends early.
pub fn seconds_to_ticks(seconds: f32, tick_rate_hz: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let ticks = f64::from(seconds) * f64::from(tick_rate_hz);
    // f32 inputs like 0.1 land a hair above the exact product.
    ((ticks - 1e-4).ceil() as u64).max(1)
}

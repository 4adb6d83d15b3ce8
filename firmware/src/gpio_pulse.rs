use az::SaturatingCast;
use embassy_rp::gpio::{self, Level, Pin};
use embassy_time::{Duration, Instant};
use polarizer::PulseInput;

/// Busy-waiting pulse-width measurement on the servo feedback pin.
///
/// Runs inside the controller's critical section, so it only relies on the
/// free-running timer and never on interrupts.
pub struct GpioPulseInput<'d, T: Pin> {
    input: gpio::Input<'d, T>,
    timeout: Duration,
}

impl<'d, T: Pin> GpioPulseInput<'d, T> {
    // A few periods of the 910 Hz feedback signal.
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5);

    pub fn new(mut input: gpio::Input<'d, T>) -> Self {
        input.set_schmitt(true);
        Self {
            input,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Width of the next complete pulse at `level`, or 0 on timeout.
    fn measure(&mut self, level: Level) -> u32 {
        let deadline = Instant::now() + self.timeout;

        // Skip a pulse already in progress; its start was missed.
        if !self.wait_while(level, deadline) {
            return 0;
        }
        if !self.wait_while(opposite(level), deadline) {
            return 0;
        }

        let start = Instant::now();
        if !self.wait_while(level, deadline) {
            return 0;
        }
        Instant::now()
            .duration_since(start)
            .as_micros()
            .saturating_cast()
    }

    /// Spin while the pin reads `level`. False if `deadline` passed first.
    fn wait_while(&self, level: Level, deadline: Instant) -> bool {
        while self.input.get_level() == level {
            if Instant::now() >= deadline {
                return false;
            }
        }
        true
    }
}

fn opposite(level: Level) -> Level {
    match level {
        Level::High => Level::Low,
        Level::Low => Level::High,
    }
}

impl<'d, T: Pin> PulseInput for GpioPulseInput<'d, T> {
    fn measure_high(&mut self) -> u32 {
        self.measure(Level::High)
    }

    fn measure_low(&mut self) -> u32 {
        self.measure(Level::Low)
    }
}

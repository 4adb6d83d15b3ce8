use embassy_rp::pwm::{self, Config, Pwm};
use embassy_rp::Peripheral;
use fixed::traits::ToFixed;
use polarizer::Actuator;

/// Servo control output on channel A of an RP2040 PWM slice.
///
/// The slice counts in µs, so the compare value is the pulse width.
pub struct PwmActuator<'d, CH: pwm::Channel> {
    pwm: Pwm<'d, CH>,
    config: Config,
}

impl<'d, CH: pwm::Channel> PwmActuator<'d, CH> {
    // 125 MHz system clock / 125 = 1 count per µs.
    const DIVIDER: u8 = 125;
    const PERIOD_US: u16 = 20_000;

    pub fn new_a(
        peripheral: impl Peripheral<P = CH> + 'd,
        pin: impl Peripheral<P = impl pwm::PwmPinA<CH>> + 'd,
    ) -> Self {
        let mut config: pwm::Config = Default::default();
        config.divider = Self::DIVIDER.to_fixed();
        config.top = Self::PERIOD_US - 1;
        config.compare_a = 0;
        // Held low until attached.
        config.enable = false;

        let pwm = Pwm::new_output_a(peripheral, pin, config.clone());

        Self { pwm, config }
    }
}

impl<'d, CH: pwm::Channel> Actuator for PwmActuator<'d, CH> {
    fn attach(&mut self) {
        self.config.enable = true;
        self.pwm.set_config(&self.config);
    }

    fn write_micros(&mut self, micros: u16) {
        self.config.compare_a = micros.min(Self::PERIOD_US);
        self.pwm.set_config(&self.config);
    }
}

#![no_std]
#![no_main]

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_futures::join::join;
use embassy_rp::bind_interrupts;
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::gpio::{self, Pull};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::InterruptHandler;
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, pipe::Pipe};
use polarizer::{CommandHandler, CommandLineChannel, EmbassyClock, MotorConfig, PolarizerMotor};
use polarizer_rp2040::{gpio_pulse::GpioPulseInput, pwm_actuator::PwmActuator, usb};

use {defmt_rtt as _, panic_probe as _};

const FLASH_SIZE: usize = 2 * 1024 * 1024;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let mut flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let mut unique_id = [0u8; 8];
    if flash.blocking_unique_id(&mut unique_id).is_err() {
        error!("could not read flash unique id");
    }

    let mut cdc_output_pipe = Pipe::<NoopRawMutex, 256>::new();
    let (reply_reader, reply_writer) = cdc_output_pipe.split();

    let command_channel = CommandLineChannel::<2>::new();

    let usb = usb::Usb::new(reply_reader, command_channel.sender());
    let usb_future = usb.run(p.USB, Irqs, &unique_id);

    let mut motor = match PolarizerMotor::new(
        PwmActuator::new_a(p.PWM_CH0, p.PIN_16),
        GpioPulseInput::new(gpio::Input::new(p.PIN_17, Pull::None)),
        EmbassyClock,
        MotorConfig::default(),
    ) {
        Ok(motor) => motor,
        Err(e) => defmt::panic!("bad motor config: {}", e),
    };
    match motor.initialize() {
        Ok(angle) => info!("motor at {} degrees", angle.to_num::<f32>()),
        Err(e) => error!("motor init failed: {}", e),
    }

    let mut command_handler = CommandHandler::new(motor, reply_writer);
    let command_future = command_handler.run(command_channel.receiver());

    join(usb_future, command_future).await;
}

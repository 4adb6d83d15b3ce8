use base64::{engine::general_purpose, Engine as _};
use defmt::warn;
use embassy_futures::join::join;
use embassy_rp::interrupt::typelevel::Binding;
use embassy_rp::usb::{Driver, Instance, InterruptHandler};
use embassy_rp::Peripheral;
use embassy_usb::class::cdc_acm::{self, CdcAcmClass};
use embassy_usb::{Builder, Config};
use embedded_io_async::Read;
use heapless::{String, Vec};
use polarizer::CommandLineSender;

mod line_interface;

pub struct Usb<'a, const COMMAND_CHANNEL_LEN: usize, OutputReader: Read> {
    reply_reader: OutputReader,
    command_sender: CommandLineSender<'a, COMMAND_CHANNEL_LEN>,
}

impl<'a, const COMMAND_CHANNEL_LEN: usize, OutputReader: Read>
    Usb<'a, COMMAND_CHANNEL_LEN, OutputReader>
{
    pub fn new(
        reply_reader: OutputReader,
        command_sender: CommandLineSender<'a, COMMAND_CHANNEL_LEN>,
    ) -> Self {
        Self {
            reply_reader,
            command_sender,
        }
    }

    pub async fn run<'d, T: Instance>(
        self,
        usb_peripheral: impl Peripheral<P = T> + 'd,
        irq: impl Binding<T::Interrupt, InterruptHandler<T>>,
        unique_id: &[u8; 8],
    ) {
        let driver = Driver::new(usb_peripheral, irq);
        let serial = unique_id_string(unique_id);
        if serial.is_none() {
            warn!("could not encode serial number");
        }

        // pid.codes test VID/PID.
        let mut config = Config::new(0x1209, 0x0001);
        config.manufacturer = Some("Polarizer");
        config.product = Some("Polarizer motor");
        config.serial_number = serial.as_ref().map(|s| s.as_str());
        config.max_power = 100;
        config.max_packet_size_0 = 64;

        // Required for windows compatibility.
        // https://developer.nordicsemi.com/nRF_Connect_SDK/doc/1.9.1/kconfig/CONFIG_CDC_ACM_IAD.html#help
        config.device_class = 0xef;
        config.device_sub_class = 0x02;
        config.device_protocol = 0x01;
        config.composite_with_iads = true;

        // Buffers in which to store USB descriptors
        let mut device_descriptor = [0; 256];
        let mut config_descriptor = [0; 256];
        let mut bos_descriptor = [0; 256];

        // USB control endpoint descriptor
        let mut control_buf = [0; 64];

        let mut cdc_acm_state = cdc_acm::State::new();

        let mut builder = Builder::new(
            driver,
            config,
            &mut device_descriptor,
            &mut config_descriptor,
            &mut bos_descriptor,
            &mut [], // no msos descriptors
            &mut control_buf,
        );

        let cdc_acm_class = CdcAcmClass::new(&mut builder, &mut cdc_acm_state, 64);

        // Finish building USB device.
        let mut usb = builder.build();

        let mut lines = line_interface::LineInterface::new(
            cdc_acm_class,
            self.reply_reader,
            self.command_sender,
        );

        let usb_future = usb.run();
        let lines_future = lines.run();
        join(usb_future, lines_future).await;
    }
}

const SERIAL_LEN: usize = match base64::encoded_len(8, false) {
    Some(len) => len,
    None => 0,
};

fn unique_id_string(id: &[u8; 8]) -> Option<String<SERIAL_LEN>> {
    let mut buf = Vec::<u8, SERIAL_LEN>::new();
    buf.resize_default(SERIAL_LEN).ok()?;
    let len = general_purpose::STANDARD_NO_PAD
        .encode_slice(id, &mut buf)
        .ok()?;
    buf.truncate(len);
    String::from_utf8(buf).ok()
}

use core::fmt::Write as _;
use core::pin::pin;

use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_rp::usb::{Driver, Instance};
use embassy_usb::{
    class::cdc_acm::{self, CdcAcmClass},
    driver::EndpointError,
};
use embedded_io_async::Read;
use heapless::String;
use polarizer::{CommandLine, CommandLineSender, Error, LineReader, Result};

fn to_error(val: EndpointError) -> Error {
    match val {
        EndpointError::BufferOverflow => Error::InputBufferOverflow,
        EndpointError::Disabled => Error::Disconnected,
    }
}

/// Moves command lines from the CDC-ACM port to the command handler, and its
/// replies back out.
pub struct LineInterface<
    'd,
    'c,
    const COMMAND_CHANNEL_LEN: usize,
    OutputReader: Read,
    T: Instance + 'd,
> {
    cdc_sender: cdc_acm::Sender<'d, Driver<'d, T>>,
    cdc_receiver: cdc_acm::Receiver<'d, Driver<'d, T>>,
    reply_reader: OutputReader,
    command_sender: CommandLineSender<'c, COMMAND_CHANNEL_LEN>,
}

impl<'d, 'c, const COMMAND_CHANNEL_LEN: usize, OutputReader: Read, T: Instance + 'd>
    LineInterface<'d, 'c, COMMAND_CHANNEL_LEN, OutputReader, T>
{
    pub fn new(
        class: CdcAcmClass<'d, Driver<'d, T>>,
        reply_reader: OutputReader,
        command_sender: CommandLineSender<'c, COMMAND_CHANNEL_LEN>,
    ) -> Self {
        let (cdc_sender, cdc_receiver) = class.split();
        Self {
            cdc_sender,
            cdc_receiver,
            reply_reader,
            command_sender,
        }
    }

    pub async fn run(&mut self) {
        loop {
            info!("Waiting for connection");
            self.cdc_sender.wait_connection().await;
            info!("USB Connected");
            if let Err(e) = self.handle_connection().await {
                warn!("connection ended: {}", e);
            }
            info!("USB Disconnected");
        }
    }

    async fn handle_connection(&mut self) -> Result<()> {
        let mut usb_buf = [0; 64];
        let mut reply_buf = [0; 64];
        let mut line_reader = LineReader::<64>::new();
        loop {
            match select(
                self.reply_reader.read(&mut reply_buf),
                self.cdc_receiver.read_packet(&mut usb_buf),
            )
            .await
            {
                Either::First(read_len) => {
                    let read_len = read_len.map_err(|_| Error::Io)?;
                    self.write(&reply_buf[..read_len]).await?;
                }
                Either::Second(read_len) => {
                    let read_len = read_len.map_err(to_error)?;
                    for b in &usb_buf[..read_len] {
                        match line_reader.handle_byte(*b) {
                            Ok(Some(line)) => {
                                let mut command = CommandLine::new();
                                // Fits: the reader holds at most 64 bytes.
                                let _ = command.push_str(line);
                                self.forward(command, &mut reply_buf).await?;
                            }
                            Ok(None) => {}
                            Err(e) => self.write_error(e).await?,
                        }
                    }
                }
            }
        }
    }

    /// Queue `command` for the handler, passing its replies on meanwhile.
    ///
    /// The handler blocks on a full reply pipe, so the pipe is drained until
    /// the channel has room.
    async fn forward(&mut self, command: CommandLine, reply_buf: &mut [u8]) -> Result<()> {
        let mut send = pin!(self.command_sender.send(command));
        loop {
            match select(&mut send, self.reply_reader.read(reply_buf)).await {
                Either::First(()) => return Ok(()),
                Either::Second(read_len) => {
                    let read_len = read_len.map_err(|_| Error::Io)?;
                    self.cdc_sender
                        .write_packet(&reply_buf[..read_len])
                        .await
                        .map_err(to_error)?;
                }
            }
        }
    }

    async fn write_error(&mut self, e: Error) -> Result<()> {
        let mut s = String::<64>::new();
        write!(s, "error: {}\r\n", e).ok();
        self.write(s.as_bytes()).await
    }

    async fn write(&mut self, buffer: &[u8]) -> Result<()> {
        self.cdc_sender.write_packet(buffer).await.map_err(to_error)
    }
}

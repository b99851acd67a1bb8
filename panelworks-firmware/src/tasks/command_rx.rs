//! Command UART receive task
//!
//! Assembles bytes into lines and dispatches panel commands to the
//! controller. Lines addressed to other peripherals are logged and dropped.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use panelworks_protocol::{parse_line, Command, LineAssembler};

use crate::channels::COMMAND_CHANNEL;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Command RX task - receives and parses command lines
#[embassy_executor::task]
pub async fn command_rx_task(mut rx: BufferedUartRx) {
    info!("Command RX task started");

    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);

                for &byte in &buf[..n] {
                    match assembler.feed(byte) {
                        Ok(Some(line)) => handle_line(&line),
                        Ok(None) => {}
                        Err(e) => warn!("Line dropped: {:?}", e),
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}

/// Handle one complete line
fn handle_line(line: &str) {
    match parse_line(line) {
        Ok(Command::Empty) => {}
        Ok(Command::Panel(cmd)) => {
            debug!("Command: {:?}", cmd);
            if COMMAND_CHANNEL.try_send(cmd).is_err() {
                warn!("Command channel full, dropping {:?}", cmd);
            }
        }
        Ok(Command::Forward { kind, text }) => {
            debug!("Not for the panels ({:?}): {=str}", kind, text);
        }
        Err(e) => {
            warn!("Bad command {=str}: {:?}", line, e);
        }
    }
}

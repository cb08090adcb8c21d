//! # Command channel
//!
//! Builds outgoing frames with a monotonic sequence id and turns a decoded
//! response body into a `Result`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::connection::Connection;
use crate::error::{AutoloaderError, DeviceError, FrameError};
use crate::frame;

/// Fixed client address byte used on every outgoing frame.
const TO_ID: u8 = 1;
/// Fixed host address byte used on every outgoing frame.
const FROM_ID: u8 = 0;

/// Command codes the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    GetVersion = 0,
    Home = 4,
    Stop = 6,
    GetStatus = 7,
    SetSlotState = 12,
    Load = 16,
    LoadCassette = 18,
    Evac = 22,
    ClearLastError = 23,
}

/// A framed request/response channel layered on one [`Connection`].
///
/// Stateless beyond the sequence counter — it owns no per-command state
/// machine.
pub struct CommandChannel {
    connection: Connection,
    sequence: AtomicU8,
}

impl CommandChannel {
    pub fn new(connection: Connection) -> Self {
        CommandChannel {
            connection,
            sequence: AtomicU8::new(0),
        }
    }

    pub fn address_active(&self) -> Option<String> {
        self.connection.address_active()
    }

    /// Next sequence id: wraps `255 -> 1`, never yields `0`.
    fn next_sequence(&self) -> u8 {
        let mut current = self.sequence.load(Ordering::SeqCst);
        loop {
            let next = if current >= 255 { 1 } else { current + 1 };
            match self.sequence.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Send `code` with `payload`, wait up to `timeout`, and return the
    /// decoded response body (`[cmd_code, result_code, payload...]`) on
    /// success.
    pub fn command(
        &self,
        code: CommandCode,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, AutoloaderError> {
        let seq = self.next_sequence();
        let request = frame::encode(TO_ID, FROM_ID, seq, code as u8, payload);
        let raw_response = self.connection.send(&request, timeout)?;

        let body = frame::decode(&raw_response).map_err(AutoloaderError::Protocol)?;
        let got = *body.first().ok_or(AutoloaderError::Protocol(FrameError::InvalidResponseLength))?;
        if got != code as u8 {
            return Err(AutoloaderError::UnexpectedCommandCode {
                expected: code as u8,
                got,
            });
        }
        let result_code = *body
            .get(1)
            .ok_or(AutoloaderError::Protocol(FrameError::InvalidResponseLength))?;
        let result = DeviceError::from(result_code);
        if result != DeviceError::NoError {
            return Err(AutoloaderError::Device(result));
        }
        Ok(body.to_vec())
    }
}

/// Response payload begins after the two body prefix bytes (`cmd_code`,
/// `result_code`).
pub fn payload(body: &[u8]) -> &[u8] {
    &body[2..]
}

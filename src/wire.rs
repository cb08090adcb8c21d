//! # Request payload builders
//!
//! One free function per command, each returning the fixed-size payload
//! bytes that follow the command code in the frame body.
//! The frame codec (`frame::encode`) adds the command code, header, CRC,
//! and markers.

/// `HOME` axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Axis {
    Elevator = 0,
    Loader = 1,
    All = 2,
}

/// `GET_VERSION` — no payload.
pub fn get_version_req() -> [u8; 0] {
    []
}

/// `GET_STATUS` — no payload.
pub fn get_status_req() -> [u8; 0] {
    []
}

/// `HOME` — axis to home, and whether the move must stay vacuum-safe.
pub fn home_req(axis: Axis, vacuum_safe: bool) -> [u8; 2] {
    [axis as u8, vacuum_safe as u8]
}

/// `LOAD` — 1-indexed slot to load.
pub fn load_req(slot: u8) -> [u8; 1] {
    [slot]
}

/// `LOAD_CASSETTE` — whether the move must stay vacuum-safe.
pub fn load_cassette_req(vacuum_safe: bool) -> [u8; 1] {
    [vacuum_safe as u8]
}

/// `EVAC` — no payload.
pub fn evac_req() -> [u8; 0] {
    []
}

/// `CLEAR_LAST_ERROR` — no payload.
pub fn clear_last_error_req() -> [u8; 0] {
    []
}

/// `STOP` — no payload. Sent on the status channel, not the command
/// channel.
pub fn stop_req() -> [u8; 0] {
    []
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_encodes_axis_and_vacuum_flag() {
        assert_eq!(home_req(Axis::Elevator, true), [0, 1]);
        assert_eq!(home_req(Axis::Loader, false), [1, 0]);
        assert_eq!(home_req(Axis::All, true), [2, 1]);
    }

    #[test]
    fn load_encodes_slot() {
        assert_eq!(load_req(7), [7]);
    }
}

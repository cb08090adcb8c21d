//! # Telemetry decoder
//!
//! Decodes a `GET_STATUS` response body into two axis records and one main
//! status record. Purely positional — there is no delimiter or
//! self-description in the wire format.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DeviceError, FrameError, LastError};

/// `overall_status` bitset.
pub const ABSOLUTE_POSITION_KNOWN: u16 = 1;
pub const PHASE_DETECTED: u16 = 2;
pub const SERVO_ENABLED: u16 = 4;
pub const IN_MOTION: u16 = 8;

const BETA_AXIS_SIZE: usize = 46;
const ALPHA_AXIS_SIZE: usize = 102;
const MAIN_STATUS_SIZE: usize = 60;
const ALPHA_PRE_STATUS_SIZE: usize = 42;

/// Which hardware generation the connected device is. Selected from
/// `GET_VERSION`'s `version` field: `0` is Alpha, anything else is Beta.
/// This mirrors the original's `version` truthiness check verbatim,
/// including its known blind spot: a Beta device reporting `version == 0`
/// would mis-detect as Alpha. Not silently corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceVariant {
    Alpha,
    Beta,
}

impl DeviceVariant {
    pub fn from_version(version: u16) -> Self {
        if version == 0 {
            DeviceVariant::Alpha
        } else {
            DeviceVariant::Beta
        }
    }

    fn axis_size(self) -> usize {
        match self {
            DeviceVariant::Alpha => ALPHA_AXIS_SIZE,
            DeviceVariant::Beta => BETA_AXIS_SIZE,
        }
    }

    /// Total bytes `decode` consumes for this variant.
    pub fn total_size(self) -> usize {
        2 * self.axis_size() + MAIN_STATUS_SIZE
    }
}

/// Raw drive/motor registers carried alongside a Beta axis's position and
/// status. Not interpreted by this crate — callers that need to decode a
/// specific register do so themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisRegisters {
    pub drive_status: u32,
    pub step_count: u32,
    pub actual_current: u32,
    pub motion_status: u32,
    pub motor_position: u32,
    pub encoder_position: u32,
    pub motor_velocity: u32,
    pub pwm_status: u32,
    pub general_status: u32,
}

/// One axis's decoded telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStatus {
    pub position: f64,
    pub overall_status: u16,
    pub registers: AxisRegisters,
}

impl AxisStatus {
    pub fn has_flag(&self, flag: u16) -> bool {
        self.overall_status & flag != 0
    }

    fn decode_beta(buf: &[u8]) -> Self {
        let position = LittleEndian::read_f64(&buf[0..8]);
        let overall_status = LittleEndian::read_u16(&buf[8..10]);
        let mut regs = [0u32; 9];
        for (i, reg) in regs.iter_mut().enumerate() {
            let start = 10 + i * 4;
            *reg = LittleEndian::read_u32(&buf[start..start + 4]);
        }
        AxisStatus {
            position,
            overall_status,
            registers: AxisRegisters {
                drive_status: regs[0],
                step_count: regs[1],
                actual_current: regs[2],
                motion_status: regs[3],
                motor_position: regs[4],
                encoder_position: regs[5],
                motor_velocity: regs[6],
                pwm_status: regs[7],
                general_status: regs[8],
            },
        }
    }

    /// Alpha's pre-status fields are variable-width placeholders (§3) that
    /// this crate carries as position/status only — the Beta register
    /// table doesn't apply to Alpha's layout, and the trailing 50 padding
    /// bytes are never meaningful.
    fn decode_alpha(buf: &[u8]) -> Self {
        let position = LittleEndian::read_f64(&buf[0..8]);
        let status_start = 8 + ALPHA_PRE_STATUS_SIZE;
        let overall_status = LittleEndian::read_u16(&buf[status_start..status_start + 2]);
        AxisStatus {
            position,
            overall_status,
            registers: AxisRegisters::default(),
        }
    }

    fn decode(variant: DeviceVariant, buf: &[u8]) -> Self {
        match variant {
            DeviceVariant::Beta => Self::decode_beta(buf),
            DeviceVariant::Alpha => Self::decode_alpha(buf),
        }
    }
}

/// Whether a slot bit is known/present/absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unknown,
    Present,
    Absent,
}

/// Decoded main status block, following the two axis records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainStatus {
    pub slot_known: u32,
    pub slot_state: u32,
    pub closest_slot: i32,
    pub percent_extended: f64,
    action_name: [u8; 32],
    pub last_error: u32,
    pub gripped_from_slot: i32,
}

impl MainStatus {
    fn decode(buf: &[u8]) -> Self {
        let mut action_name = [0u8; 32];
        action_name.copy_from_slice(&buf[20..52]);
        MainStatus {
            slot_known: LittleEndian::read_u32(&buf[0..4]),
            slot_state: LittleEndian::read_u32(&buf[4..8]),
            closest_slot: LittleEndian::read_i32(&buf[8..12]),
            percent_extended: LittleEndian::read_f64(&buf[12..20]),
            action_name,
            last_error: LittleEndian::read_u32(&buf[52..56]),
            gripped_from_slot: LittleEndian::read_i32(&buf[56..60]),
        }
    }

    /// `action_name` with trailing NULs trimmed, decoded as ASCII. Trimming
    /// happens here, at the accessor, not in the decoder.
    pub fn action_name(&self) -> String {
        let end = self
            .action_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.action_name.len());
        String::from_utf8_lossy(&self.action_name[..end]).into_owned()
    }

    /// Bit `n-1` of `slot_known`/`slot_state` (1-indexed slot numbers).
    pub fn slot_state(&self, slot: u32) -> SlotState {
        let mask = 1u32 << (slot - 1);
        if self.slot_known & mask == 0 {
            SlotState::Unknown
        } else if self.slot_state & mask != 0 {
            SlotState::Present
        } else {
            SlotState::Absent
        }
    }

    pub fn is_gripped(&self) -> bool {
        self.gripped_from_slot != 0
    }

    pub fn last_error(&self) -> LastError {
        LastError::from(self.last_error as u8)
    }
}

/// Both axes plus the main status, decoded from one `GET_STATUS` body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub elevator_axis: AxisStatus,
    pub loader_axis: AxisStatus,
    pub main_status: MainStatus,
}

impl DeviceStatus {
    /// `elevator_axis ← decode_axis; loader_axis ← decode_axis; main_status
    /// ← decode_main`, failing with `InvalidResponseLength` if `buf` (from
    /// `offset`) is shorter than the variant's total size.
    pub fn decode(buf: &[u8], offset: usize, variant: DeviceVariant) -> Result<Self, FrameError> {
        if buf.len() < offset + variant.total_size() {
            return Err(FrameError::InvalidResponseLength);
        }
        let axis_size = variant.axis_size();
        let mut cursor = offset;
        let elevator_axis = AxisStatus::decode(variant, &buf[cursor..cursor + axis_size]);
        cursor += axis_size;
        let loader_axis = AxisStatus::decode(variant, &buf[cursor..cursor + axis_size]);
        cursor += axis_size;
        let main_status = MainStatus::decode(&buf[cursor..cursor + MAIN_STATUS_SIZE]);
        Ok(DeviceStatus {
            elevator_axis,
            loader_axis,
            main_status,
        })
    }

    /// `(elevator.AbsolutePositionKnown) ∧ (loader.AbsolutePositionKnown)`.
    pub fn is_homed(&self) -> bool {
        self.elevator_axis.has_flag(ABSOLUTE_POSITION_KNOWN)
            && self.loader_axis.has_flag(ABSOLUTE_POSITION_KNOWN)
    }
}

/// `GET_VERSION` response payload: `uint16 version || uint16 sub_version ||
/// uint32 number_of_slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: u16,
    pub sub_version: u16,
    pub number_of_slots: u32,
}

impl VersionInfo {
    pub fn decode(payload: &[u8]) -> Result<Self, DeviceError> {
        if payload.len() < 8 {
            return Err(DeviceError::InvalidResponseLength);
        }
        Ok(VersionInfo {
            version: LittleEndian::read_u16(&payload[0..2]),
            sub_version: LittleEndian::read_u16(&payload[2..4]),
            number_of_slots: LittleEndian::read_u32(&payload[4..8]),
        })
    }

    pub fn variant(&self) -> DeviceVariant {
        DeviceVariant::from_version(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beta_axis_bytes(position: f64, overall_status: u16) -> Vec<u8> {
        let mut buf = vec![0u8; BETA_AXIS_SIZE];
        LittleEndian::write_f64(&mut buf[0..8], position);
        LittleEndian::write_u16(&mut buf[8..10], overall_status);
        buf
    }

    fn main_status_bytes(slot_known: u32, slot_state: u32, gripped: i32) -> Vec<u8> {
        let mut buf = vec![0u8; MAIN_STATUS_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], slot_known);
        LittleEndian::write_u32(&mut buf[4..8], slot_state);
        LittleEndian::write_i32(&mut buf[8..12], 0);
        LittleEndian::write_f64(&mut buf[12..20], 0.0);
        buf[20..24].copy_from_slice(b"IDLE");
        LittleEndian::write_u32(&mut buf[52..56], 0);
        LittleEndian::write_i32(&mut buf[56..60], gripped);
        buf
    }

    #[test]
    fn decodes_beta_status_with_exact_size() {
        let mut body = Vec::new();
        body.extend(beta_axis_bytes(1.0, ABSOLUTE_POSITION_KNOWN));
        body.extend(beta_axis_bytes(2.0, ABSOLUTE_POSITION_KNOWN | IN_MOTION));
        body.extend(main_status_bytes(0b0000_0101, 0b0000_0001, 3));

        assert_eq!(body.len(), DeviceVariant::Beta.total_size());
        let status = DeviceStatus::decode(&body, 0, DeviceVariant::Beta).unwrap();
        assert!(status.is_homed());
        assert_eq!(
            status.loader_axis.overall_status,
            ABSOLUTE_POSITION_KNOWN | IN_MOTION
        );
        assert_eq!(status.main_status.action_name(), "IDLE");
        assert!(status.main_status.is_gripped());
    }

    #[test]
    fn rejects_short_status_buffer() {
        let body = vec![0u8; 10];
        assert_eq!(
            DeviceStatus::decode(&body, 0, DeviceVariant::Beta),
            Err(FrameError::InvalidResponseLength)
        );
    }

    #[test]
    fn slot_state_depends_only_on_its_own_bit() {
        let status = main_status_bytes(0b0000_0101, 0b0000_0001, 0);
        let main = MainStatus::decode(&status);
        assert_eq!(main.slot_state(1), SlotState::Present);
        assert_eq!(main.slot_state(2), SlotState::Unknown);
        assert_eq!(main.slot_state(3), SlotState::Absent);
        assert_eq!(main.slot_state(4), SlotState::Unknown);
    }

    #[test]
    fn is_homed_is_monotone_in_either_axis_flag() {
        let homed = AxisStatus {
            position: 0.0,
            overall_status: ABSOLUTE_POSITION_KNOWN,
            registers: AxisRegisters::default(),
        };
        let not_homed = AxisStatus {
            position: 0.0,
            overall_status: 0,
            registers: AxisRegisters::default(),
        };
        let main = MainStatus::decode(&main_status_bytes(0, 0, 0));

        let both = DeviceStatus {
            elevator_axis: homed,
            loader_axis: homed,
            main_status: main,
        };
        assert!(both.is_homed());
        let one = DeviceStatus {
            elevator_axis: homed,
            loader_axis: not_homed,
            main_status: main,
        };
        assert!(!one.is_homed());
        let neither = DeviceStatus {
            elevator_axis: not_homed,
            loader_axis: not_homed,
            main_status: main,
        };
        assert!(!neither.is_homed());
    }

    #[test]
    fn version_parse_selects_beta_variant() {
        let payload = [0x02, 0x00, 0x01, 0x00, 0x18, 0x00, 0x00, 0x00];
        let version = VersionInfo::decode(&payload).unwrap();
        assert_eq!(version.version, 2);
        assert_eq!(version.sub_version, 1);
        assert_eq!(version.number_of_slots, 24);
        assert_eq!(version.variant(), DeviceVariant::Beta);
    }

    #[test]
    fn total_size_matches_byte_layout() {
        assert_eq!(DeviceVariant::Alpha.total_size(), 264);
        assert_eq!(DeviceVariant::Beta.total_size(), 152);
    }
}

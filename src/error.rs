//! # Error types
//!
//! `DeviceError` mirrors the numeric error codes the autoloader firmware and
//! host protocol can report. `AutoloaderError` is the single error
//! type every fallible public operation returns.

use thiserror::Error;

/// Every error code the device (0..56) or this host stack (100..117) can
/// report. Unknown wire values decode to [`DeviceError::Unknown`] rather
/// than panicking or failing to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceError {
    NoError = 0,
    InvalidMoveType = 1,
    InvalidAxis = 2,
    LoadLockDoorOpen = 3,
    AlreadyLocked = 4,
    AlreadyUnlocked = 5,
    CommFailure = 6,
    InvalidStartByte = 7,
    InvalidAddress = 8,
    InvalidSequenceNumber = 9,
    InvalidCrc = 10,
    MoveTimeout = 11,
    PhaseDetectFailed = 12,
    HomeFailed = 13,
    InvalidDataParameter = 14,
    InvalidOpCode = 15,
    InvalidOpCodeForDynamicMotion = 16,
    InvalidReferenceFrame = 17,
    InvalidBridgeState = 18,
    UserDefinedFault = 19,
    PosFollowingError = 20,
    HomeMoveFailed = 21,
    PositionCaptureAlreadyActive = 22,
    PositionCaptureAlreadyInactive = 23,
    MappingAlreadyActive = 24,
    MappingAlreadyInactive = 25,
    MapSensorAlarm = 26,
    UnsafeMove = 27,
    NotHomed = 28,
    NoActionPending = 29,
    AlreadyGripping = 30,
    NotGripping = 31,
    InvalidSlotNumber = 32,
    EmptySlot = 33,
    FullSlot = 34,
    StepsPending = 35,
    AlreadyExtended = 36,
    NoHardStopFound = 37,
    UnsafeVacuum = 38,
    OverPositionRangeLimit = 39,
    MoveStopped = 40,
    LoadCassetteInProgress = 41,
    NoBeamBreakDetected = 42,
    ExtraBeamBreakDetected = 43,
    BeamInspectInvalid = 44,
    MotionEngineEnableFailed = 45,
    MoveFailed = 46,
    BeamInspectDisabled = 47,
    UnexpectedGripperState = 48,
    UnknownGripperState = 49,
    SteppingUnsupported = 50,
    UnknownSlotState = 51,
    WrongSlot = 52,
    InvalidEvacStartPosition = 53,
    HeartbeatTimeout = 54,
    MotorStall = 55,
    /// Any embedded error not in the table above.
    Unknown = 56,

    // Unused
    SomethingIsUninitialized = 100,
    InvalidResponseDataType = 101,
    InvalidResponseLength = 102,
    // Unused
    MemoryAllocationFailure = 103,
    // Unused
    ThreadFailure = 104,
    // Unused
    UnknownFailure = 105,
    // Unused
    InvalidArgumentValue = 106,
    NotImplemented = 107,
    // Unused
    InvalidLogAddress = 108,
    // Unused
    DriverLoadFailure = 109,
    // Unused
    FileReadFailure = 110,
    // Unused
    DeviceErrorField = 111,
    MalformedMessage = 112,
    ConnectionFailed = 113,
    NetworkReadFailed = 114,
    NetworkWriteFailed = 115,
    EmptyMapData = 116,
    Timeout = 117,
}

impl From<u8> for DeviceError {
    fn from(value: u8) -> Self {
        match value {
            0 => DeviceError::NoError,
            1 => DeviceError::InvalidMoveType,
            2 => DeviceError::InvalidAxis,
            3 => DeviceError::LoadLockDoorOpen,
            4 => DeviceError::AlreadyLocked,
            5 => DeviceError::AlreadyUnlocked,
            6 => DeviceError::CommFailure,
            7 => DeviceError::InvalidStartByte,
            8 => DeviceError::InvalidAddress,
            9 => DeviceError::InvalidSequenceNumber,
            10 => DeviceError::InvalidCrc,
            11 => DeviceError::MoveTimeout,
            12 => DeviceError::PhaseDetectFailed,
            13 => DeviceError::HomeFailed,
            14 => DeviceError::InvalidDataParameter,
            15 => DeviceError::InvalidOpCode,
            16 => DeviceError::InvalidOpCodeForDynamicMotion,
            17 => DeviceError::InvalidReferenceFrame,
            18 => DeviceError::InvalidBridgeState,
            19 => DeviceError::UserDefinedFault,
            20 => DeviceError::PosFollowingError,
            21 => DeviceError::HomeMoveFailed,
            22 => DeviceError::PositionCaptureAlreadyActive,
            23 => DeviceError::PositionCaptureAlreadyInactive,
            24 => DeviceError::MappingAlreadyActive,
            25 => DeviceError::MappingAlreadyInactive,
            26 => DeviceError::MapSensorAlarm,
            27 => DeviceError::UnsafeMove,
            28 => DeviceError::NotHomed,
            29 => DeviceError::NoActionPending,
            30 => DeviceError::AlreadyGripping,
            31 => DeviceError::NotGripping,
            32 => DeviceError::InvalidSlotNumber,
            33 => DeviceError::EmptySlot,
            34 => DeviceError::FullSlot,
            35 => DeviceError::StepsPending,
            36 => DeviceError::AlreadyExtended,
            37 => DeviceError::NoHardStopFound,
            38 => DeviceError::UnsafeVacuum,
            39 => DeviceError::OverPositionRangeLimit,
            40 => DeviceError::MoveStopped,
            41 => DeviceError::LoadCassetteInProgress,
            42 => DeviceError::NoBeamBreakDetected,
            43 => DeviceError::ExtraBeamBreakDetected,
            44 => DeviceError::BeamInspectInvalid,
            45 => DeviceError::MotionEngineEnableFailed,
            46 => DeviceError::MoveFailed,
            47 => DeviceError::BeamInspectDisabled,
            48 => DeviceError::UnexpectedGripperState,
            49 => DeviceError::UnknownGripperState,
            50 => DeviceError::SteppingUnsupported,
            51 => DeviceError::UnknownSlotState,
            52 => DeviceError::WrongSlot,
            53 => DeviceError::InvalidEvacStartPosition,
            54 => DeviceError::HeartbeatTimeout,
            55 => DeviceError::MotorStall,
            100 => DeviceError::SomethingIsUninitialized,
            101 => DeviceError::InvalidResponseDataType,
            102 => DeviceError::InvalidResponseLength,
            103 => DeviceError::MemoryAllocationFailure,
            104 => DeviceError::ThreadFailure,
            105 => DeviceError::UnknownFailure,
            106 => DeviceError::InvalidArgumentValue,
            107 => DeviceError::NotImplemented,
            108 => DeviceError::InvalidLogAddress,
            109 => DeviceError::DriverLoadFailure,
            110 => DeviceError::FileReadFailure,
            111 => DeviceError::DeviceErrorField,
            112 => DeviceError::MalformedMessage,
            113 => DeviceError::ConnectionFailed,
            114 => DeviceError::NetworkReadFailed,
            115 => DeviceError::NetworkWriteFailed,
            116 => DeviceError::EmptyMapData,
            117 => DeviceError::Timeout,
            _ => DeviceError::Unknown,
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?} ({})", *self as u8)
    }
}

/// `last_error` as reported in the main status block: either a code this
/// crate recognizes, or the raw byte if the device used a value outside the
/// known table. Kept as a distinct tagged variant (rather than overloading
/// `DeviceError` the way the original Python client did) so a caller can
/// always recover the exact byte the device sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastError {
    Known(DeviceError),
    Raw(u8),
}

impl From<u8> for LastError {
    fn from(value: u8) -> Self {
        // DeviceError::from never fails to produce a value (falls back to
        // Unknown), so LastError::Raw is only ever hit for bytes that decode
        // to Unknown but are not the canonical Unknown code 56.
        let known = DeviceError::from(value);
        if known as u8 == value {
            LastError::Known(known)
        } else {
            LastError::Raw(value)
        }
    }
}

/// A malformed or unexpected frame, raised before a [`DeviceError`] can even
/// be extracted from the response body.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("response too short to be a valid frame")]
    InvalidResponseLength,
    #[error("response did not start with the expected start marker")]
    InvalidStartByte,
    #[error("CRC mismatch: computed ({0:#04x}, {1:#04x}), received ({2:#04x}, {3:#04x})")]
    InvalidCrc(u8, u8, u8, u8),
}

impl From<FrameError> for DeviceError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::InvalidResponseLength => DeviceError::InvalidResponseLength,
            FrameError::InvalidStartByte => DeviceError::InvalidStartByte,
            FrameError::InvalidCrc(..) => DeviceError::InvalidCrc,
        }
    }
}

/// The single error type returned by every fallible operation in this
/// crate.
#[derive(Debug, Error)]
pub enum AutoloaderError {
    /// The device responded with a non-success result code. The connection
    /// remains usable.
    #[error("device reported error: {0}")]
    Device(DeviceError),

    /// The response was malformed at the framing level (bad CRC, bad start
    /// marker, short frame, wrong command-code echo). The connection has
    /// already been torn down.
    #[error("protocol error: {0}")]
    Protocol(FrameError),

    /// The response's command-code byte did not match the request.
    #[error("response echoed command code {got:#04x}, expected {expected:#04x}")]
    UnexpectedCommandCode { expected: u8, got: u8 },

    /// A transport-level failure (connect, send, or receive). The
    /// connection has already been torn down.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Every candidate address was exhausted without a successful connect.
    #[error("could not connect to any candidate address")]
    ConnectionFailed,

    /// The operation's wall-clock timeout elapsed before a response arrived.
    /// The connection has already been torn down.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled by the process-wide cancel signal. The
    /// underlying connection may still be reused.
    #[error("operation cancelled")]
    Cancelled,
}

impl AutoloaderError {
    /// Best-effort extraction of the [`DeviceError`] this failure
    /// corresponds to, for callers that want a single numeric code
    /// regardless of which layer raised it.
    pub fn device_error(&self) -> DeviceError {
        match self {
            AutoloaderError::Device(code) => *code,
            AutoloaderError::Protocol(err) => DeviceError::from(*err),
            AutoloaderError::UnexpectedCommandCode { .. } => DeviceError::InvalidResponseDataType,
            AutoloaderError::Io(_) => DeviceError::NetworkReadFailed,
            AutoloaderError::ConnectionFailed => DeviceError::ConnectionFailed,
            AutoloaderError::Timeout => DeviceError::Timeout,
            // No wire code exists for cancellation; Unknown is the closest fit.
            AutoloaderError::Cancelled => DeviceError::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_code_falls_back() {
        assert_eq!(DeviceError::from(200), DeviceError::Unknown);
        assert_eq!(DeviceError::from(56), DeviceError::Unknown);
    }

    #[test]
    fn known_codes_round_trip() {
        assert_eq!(DeviceError::from(28), DeviceError::NotHomed);
        assert_eq!(DeviceError::from(117), DeviceError::Timeout);
    }

    #[test]
    fn last_error_distinguishes_raw_from_known() {
        assert_eq!(LastError::from(28), LastError::Known(DeviceError::NotHomed));
        assert_eq!(LastError::from(200), LastError::Raw(200));
    }
}

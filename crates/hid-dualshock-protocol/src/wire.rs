//! Sideband control structures and IOCTL codes.
//!
//! Every structure starts with a `{size: u32, serial_no: u32}` header in
//! little-endian order. The declared size must equal the canonical structure
//! size and the transport buffer length.

use crate::error::{DualShockError, DualShockResult};
use crate::ids::DeviceType;
use crate::types::{
    BD_ADDR_LEN, BdAddr, DeviceSettings, GAMEPAD_STATE_WIRE_LEN, GamepadState, SETTINGS_COUNT,
};

const FILE_DEVICE_BUS_EXTENDER: u32 = 0x0000_002A;
const METHOD_BUFFERED: u32 = 0;
const FILE_READ_ACCESS: u32 = 0x0001;
const FILE_WRITE_ACCESS: u32 = 0x0002;

const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

const IOCTL_FIRESHOCK_BASE: u32 = 0x801;

/// Read the cached gamepad state of a DualShock 3.
pub const IOCTL_FIRESHOCK_REQUEST_REPORT: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE,
    METHOD_BUFFERED,
    FILE_READ_ACCESS | FILE_WRITE_ACCESS,
);

/// Reserved; not serviced.
pub const IOCTL_FIRESHOCK_SUBMIT_REPORT: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x001,
    METHOD_BUFFERED,
    FILE_READ_ACCESS | FILE_WRITE_ACCESS,
);

pub const IOCTL_FIRESHOCK_REQUEST_SETTINGS: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x002,
    METHOD_BUFFERED,
    FILE_READ_ACCESS | FILE_WRITE_ACCESS,
);

pub const IOCTL_FIRESHOCK_SUBMIT_SETTINGS: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x003,
    METHOD_BUFFERED,
    FILE_WRITE_ACCESS,
);

/// Read the Bluetooth address the DualShock 3 is paired with.
pub const IOCTL_FIRESHOCK_GET_HOST_BD_ADDR: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x004,
    METHOD_BUFFERED,
    FILE_READ_ACCESS,
);

/// Read the DualShock 3's own Bluetooth address.
pub const IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x005,
    METHOD_BUFFERED,
    FILE_READ_ACCESS,
);

/// Pair the DualShock 3 with a new host address.
pub const IOCTL_FIRESHOCK_SET_HOST_BD_ADDR: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x006,
    METHOD_BUFFERED,
    FILE_WRITE_ACCESS,
);

pub const IOCTL_FIRESHOCK_GET_DEVICE_TYPE: u32 = ctl_code(
    FILE_DEVICE_BUS_EXTENDER,
    IOCTL_FIRESHOCK_BASE + 0x007,
    METHOD_BUFFERED,
    FILE_READ_ACCESS,
);

/// Sideband request kinds, decoded from an IOCTL code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SidebandCode {
    RequestReport,
    SubmitReport,
    RequestSettings,
    SubmitSettings,
    GetHostAddress,
    GetDeviceAddress,
    SetHostAddress,
    GetDeviceType,
}

impl SidebandCode {
    pub const ALL: [Self; 8] = [
        Self::RequestReport,
        Self::SubmitReport,
        Self::RequestSettings,
        Self::SubmitSettings,
        Self::GetHostAddress,
        Self::GetDeviceAddress,
        Self::SetHostAddress,
        Self::GetDeviceType,
    ];

    pub const fn from_ioctl(code: u32) -> Option<Self> {
        match code {
            IOCTL_FIRESHOCK_REQUEST_REPORT => Some(Self::RequestReport),
            IOCTL_FIRESHOCK_SUBMIT_REPORT => Some(Self::SubmitReport),
            IOCTL_FIRESHOCK_REQUEST_SETTINGS => Some(Self::RequestSettings),
            IOCTL_FIRESHOCK_SUBMIT_SETTINGS => Some(Self::SubmitSettings),
            IOCTL_FIRESHOCK_GET_HOST_BD_ADDR => Some(Self::GetHostAddress),
            IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR => Some(Self::GetDeviceAddress),
            IOCTL_FIRESHOCK_SET_HOST_BD_ADDR => Some(Self::SetHostAddress),
            IOCTL_FIRESHOCK_GET_DEVICE_TYPE => Some(Self::GetDeviceType),
            _ => None,
        }
    }

    pub const fn ioctl(self) -> u32 {
        match self {
            Self::RequestReport => IOCTL_FIRESHOCK_REQUEST_REPORT,
            Self::SubmitReport => IOCTL_FIRESHOCK_SUBMIT_REPORT,
            Self::RequestSettings => IOCTL_FIRESHOCK_REQUEST_SETTINGS,
            Self::SubmitSettings => IOCTL_FIRESHOCK_SUBMIT_SETTINGS,
            Self::GetHostAddress => IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
            Self::GetDeviceAddress => IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR,
            Self::SetHostAddress => IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
            Self::GetDeviceType => IOCTL_FIRESHOCK_GET_DEVICE_TYPE,
        }
    }

    /// Canonical size of the structure exchanged with this code.
    pub const fn structure_len(self) -> usize {
        match self {
            Self::RequestReport | Self::SubmitReport => GamepadReportRequest::LEN,
            Self::RequestSettings | Self::SubmitSettings => SettingsRequest::LEN,
            Self::GetHostAddress | Self::GetDeviceAddress | Self::SetHostAddress => {
                AddressRequest::LEN
            }
            Self::GetDeviceType => DeviceTypeRequest::LEN,
        }
    }
}

/// Sequential little-endian reader over a borrowed buffer.
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> DualShockResult<&'a [u8]> {
        let end = self.position.saturating_add(count);
        let Some(bytes) = self.buffer.get(self.position..end) else {
            return Err(DualShockError::report_too_short(end, self.buffer.len()));
        };
        self.position = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> DualShockResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DualShockResult<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u32_le(&mut self) -> DualShockResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count).min(self.buffer.len());
    }
}

/// Little-endian writer producing a fixed-length structure.
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u32_le(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    /// Zero-pad up to `len` bytes.
    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
        self
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Common sideband header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebandHeader {
    pub size: u32,
    pub serial_no: u32,
}

impl SidebandHeader {
    pub const LEN: usize = 8;

    /// Parse and validate a header against the canonical structure size.
    ///
    /// Fails with [`DualShockError::InvalidSize`] when the declared size
    /// differs from `canonical_len`, and with
    /// [`DualShockError::BufferMismatch`] when the buffer length differs
    /// from the declared size.
    pub fn validate(buffer: &[u8], canonical_len: usize) -> DualShockResult<Self> {
        let mut reader = WireReader::new(buffer);
        let size = reader.read_u32_le()?;
        let serial_no = reader.read_u32_le()?;
        let declared = size as usize;
        if declared != canonical_len {
            return Err(DualShockError::InvalidSize {
                declared,
                canonical: canonical_len,
            });
        }
        if buffer.len() != declared {
            return Err(DualShockError::BufferMismatch {
                declared,
                actual: buffer.len(),
            });
        }
        Ok(Self { size, serial_no })
    }
}

/// Gamepad report query and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadReportRequest {
    pub serial_no: u32,
    pub state: GamepadState,
}

impl GamepadReportRequest {
    pub const LEN: usize = SidebandHeader::LEN + GAMEPAD_STATE_WIRE_LEN;

    pub fn parse(buffer: &[u8]) -> DualShockResult<Self> {
        let header = SidebandHeader::validate(buffer, Self::LEN)?;
        let mut reader = WireReader::new(buffer);
        reader.skip(SidebandHeader::LEN);
        let state = GamepadState::from_wire(&reader.read_array()?);
        Ok(Self {
            serial_no: header.serial_no,
            state,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(Self::LEN);
        writer
            .write_u32_le(Self::LEN as u32)
            .write_u32_le(self.serial_no)
            .write_bytes(&self.state.to_wire());
        writer.into_inner()
    }
}

/// Settings query, response and submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsRequest {
    pub serial_no: u32,
    pub settings: DeviceSettings,
}

impl SettingsRequest {
    /// Header, five flags, three bytes of alignment padding.
    pub const LEN: usize = 16;

    pub fn parse(buffer: &[u8]) -> DualShockResult<Self> {
        let header = SidebandHeader::validate(buffer, Self::LEN)?;
        let mut reader = WireReader::new(buffer);
        reader.skip(SidebandHeader::LEN);
        let flags: [u8; SETTINGS_COUNT] = reader.read_array()?;
        Ok(Self {
            serial_no: header.serial_no,
            settings: DeviceSettings::from_wire(&flags),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(Self::LEN);
        writer
            .write_u32_le(Self::LEN as u32)
            .write_u32_le(self.serial_no)
            .write_bytes(&self.settings.to_wire())
            .pad_to(Self::LEN);
        writer.into_inner()
    }
}

/// Host or device Bluetooth address query, and host address submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRequest {
    pub serial_no: u32,
    pub address: BdAddr,
}

impl AddressRequest {
    pub const LEN: usize = SidebandHeader::LEN + BD_ADDR_LEN;

    pub fn parse(buffer: &[u8]) -> DualShockResult<Self> {
        let header = SidebandHeader::validate(buffer, Self::LEN)?;
        let mut reader = WireReader::new(buffer);
        reader.skip(SidebandHeader::LEN);
        Ok(Self {
            serial_no: header.serial_no,
            address: BdAddr(reader.read_array()?),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(Self::LEN);
        writer
            .write_u32_le(Self::LEN as u32)
            .write_u32_le(self.serial_no)
            .write_bytes(self.address.as_bytes());
        writer.into_inner()
    }
}

/// Device family query. The family occupies one byte followed by padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTypeRequest {
    pub serial_no: u32,
    pub device_type: DeviceType,
}

impl DeviceTypeRequest {
    pub const LEN: usize = 12;

    pub fn parse(buffer: &[u8]) -> DualShockResult<Self> {
        let header = SidebandHeader::validate(buffer, Self::LEN)?;
        let mut reader = WireReader::new(buffer);
        reader.skip(SidebandHeader::LEN);
        Ok(Self {
            serial_no: header.serial_no,
            device_type: DeviceType::from_wire_value(reader.read_u8()?),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(Self::LEN);
        writer
            .write_u32_le(Self::LEN as u32)
            .write_u32_le(self.serial_no)
            .write_u8(self.device_type.wire_value())
            .pad_to(Self::LEN);
        writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_ioctl_codes() {
        assert_eq!(IOCTL_FIRESHOCK_REQUEST_REPORT, 0x002A_E004);
        assert_eq!(IOCTL_FIRESHOCK_SUBMIT_REPORT, 0x002A_E008);
        assert_eq!(IOCTL_FIRESHOCK_REQUEST_SETTINGS, 0x002A_E00C);
        assert_eq!(IOCTL_FIRESHOCK_SUBMIT_SETTINGS, 0x002A_A010);
        assert_eq!(IOCTL_FIRESHOCK_GET_HOST_BD_ADDR, 0x002A_6014);
        assert_eq!(IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR, 0x002A_6018);
        assert_eq!(IOCTL_FIRESHOCK_SET_HOST_BD_ADDR, 0x002A_A01C);
        assert_eq!(IOCTL_FIRESHOCK_GET_DEVICE_TYPE, 0x002A_6020);
        for code in SidebandCode::ALL {
            assert_eq!(SidebandCode::from_ioctl(code.ioctl()), Some(code));
        }
        assert_eq!(SidebandCode::from_ioctl(0x0022_0000), None);
    }

    #[test]
    fn test_structure_sizes() {
        assert_eq!(GamepadReportRequest::LEN, 28);
        assert_eq!(SettingsRequest::LEN, 16);
        let bytes = SettingsRequest {
            serial_no: 3,
            settings: DeviceSettings::default(),
        }
        .to_bytes();
        assert_eq!(bytes.len(), SettingsRequest::LEN);
        assert_eq!(&bytes[..8], &[16, 0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[1, 1, 1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_settings_parse() -> TestResult {
        let mut bytes: Vec<u8> = vec![16, 0, 0, 0, 7, 0, 0, 0];
        bytes.extend_from_slice(&[1, 0, 1, 0, 1, 0, 0, 0]);
        let request = SettingsRequest::parse(&bytes)?;
        assert_eq!(request.serial_no, 7);
        assert_eq!(request.settings.bits(), 0b10101);
        Ok(())
    }

    #[test]
    fn test_declared_size_mismatch_rejected() {
        let mut bytes = SettingsRequest {
            serial_no: 0,
            settings: DeviceSettings::default(),
        }
        .to_bytes();
        bytes[0] = 15;
        assert!(matches!(
            SettingsRequest::parse(&bytes),
            Err(DualShockError::InvalidSize { declared: 15, .. })
        ));
    }

    #[test]
    fn test_buffer_length_mismatch_rejected() {
        let mut bytes = GamepadReportRequest {
            serial_no: 0,
            state: GamepadState::neutral(),
        }
        .to_bytes();
        bytes.push(0);
        assert_eq!(
            GamepadReportRequest::parse(&bytes),
            Err(DualShockError::BufferMismatch {
                declared: 28,
                actual: 29
            })
        );
    }

    #[test]
    fn test_address_request_layout() -> TestResult {
        let request = AddressRequest {
            serial_no: 2,
            address: BdAddr([0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]),
        };
        let bytes = request.to_bytes();
        assert_eq!(bytes.len(), 14);
        assert_eq!(&bytes[..8], &[14, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]);
        assert_eq!(AddressRequest::parse(&bytes)?, request);
        assert!(matches!(
            AddressRequest::parse(&bytes[..13]),
            Err(DualShockError::BufferMismatch { declared: 14, actual: 13 })
        ));
        Ok(())
    }

    #[test]
    fn test_device_type_request_layout() -> TestResult {
        let bytes = DeviceTypeRequest {
            serial_no: 1,
            device_type: DeviceType::DualShock4,
        }
        .to_bytes();
        assert_eq!(bytes, [12, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]);

        let mut unknown = bytes.clone();
        unknown[8] = 9;
        assert_eq!(
            DeviceTypeRequest::parse(&unknown)?.device_type,
            DeviceType::Unknown
        );
        Ok(())
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            SidebandHeader::validate(&[28, 0, 0], GamepadReportRequest::LEN),
            Err(DualShockError::ReportTooShort { .. })
        ));
    }
}

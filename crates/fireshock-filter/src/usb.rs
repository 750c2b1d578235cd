//! USB request block model for the intercepted internal device control path.

use std::fmt;

use crate::error::NtStatus;

/// Internal IOCTL carrying a URB.
pub const IOCTL_INTERNAL_USB_SUBMIT_URB: u32 = 0x0022_0003;
/// Internal IOCTL resetting the upstream port.
pub const IOCTL_INTERNAL_USB_RESET_PORT: u32 = 0x0022_0007;
/// Internal IOCTL querying the upstream port status.
pub const IOCTL_INTERNAL_USB_GET_PORT_STATUS: u32 = 0x0022_0013;

/// URB function codes.
pub mod urb_functions {
    pub const SELECT_CONFIGURATION: u16 = 0x0000;
    pub const SELECT_INTERFACE: u16 = 0x0001;
    pub const ABORT_PIPE: u16 = 0x0002;
    pub const CONTROL_TRANSFER: u16 = 0x0008;
    pub const BULK_OR_INTERRUPT_TRANSFER: u16 = 0x0009;
    pub const GET_DESCRIPTOR_FROM_DEVICE: u16 = 0x000B;
    pub const GET_STATUS_FROM_DEVICE: u16 = 0x0013;
    pub const CLASS_DEVICE: u16 = 0x001A;
    pub const CLASS_INTERFACE: u16 = 0x001B;
    pub const SYNC_RESET_PIPE_AND_CLEAR_STALL: u16 = 0x001E;
    pub const GET_DESCRIPTOR_FROM_INTERFACE: u16 = 0x0028;
}

/// URB function, as classified by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsbFunction {
    SelectConfiguration,
    SelectInterface,
    AbortPipe,
    ControlTransfer,
    BulkOrInterruptTransfer,
    GetDescriptorFromDevice,
    GetStatusFromDevice,
    ClassDevice,
    ClassInterface,
    SyncResetPipeAndClearStall,
    GetDescriptorFromInterface,
    /// Any function the filter does not name.
    Other(u16),
}

impl From<u16> for UsbFunction {
    fn from(code: u16) -> Self {
        match code {
            urb_functions::SELECT_CONFIGURATION => Self::SelectConfiguration,
            urb_functions::SELECT_INTERFACE => Self::SelectInterface,
            urb_functions::ABORT_PIPE => Self::AbortPipe,
            urb_functions::CONTROL_TRANSFER => Self::ControlTransfer,
            urb_functions::BULK_OR_INTERRUPT_TRANSFER => Self::BulkOrInterruptTransfer,
            urb_functions::GET_DESCRIPTOR_FROM_DEVICE => Self::GetDescriptorFromDevice,
            urb_functions::GET_STATUS_FROM_DEVICE => Self::GetStatusFromDevice,
            urb_functions::CLASS_DEVICE => Self::ClassDevice,
            urb_functions::CLASS_INTERFACE => Self::ClassInterface,
            urb_functions::SYNC_RESET_PIPE_AND_CLEAR_STALL => Self::SyncResetPipeAndClearStall,
            urb_functions::GET_DESCRIPTOR_FROM_INTERFACE => Self::GetDescriptorFromInterface,
            other => Self::Other(other),
        }
    }
}

impl UsbFunction {
    pub const fn code(self) -> u16 {
        match self {
            Self::SelectConfiguration => urb_functions::SELECT_CONFIGURATION,
            Self::SelectInterface => urb_functions::SELECT_INTERFACE,
            Self::AbortPipe => urb_functions::ABORT_PIPE,
            Self::ControlTransfer => urb_functions::CONTROL_TRANSFER,
            Self::BulkOrInterruptTransfer => urb_functions::BULK_OR_INTERRUPT_TRANSFER,
            Self::GetDescriptorFromDevice => urb_functions::GET_DESCRIPTOR_FROM_DEVICE,
            Self::GetStatusFromDevice => urb_functions::GET_STATUS_FROM_DEVICE,
            Self::ClassDevice => urb_functions::CLASS_DEVICE,
            Self::ClassInterface => urb_functions::CLASS_INTERFACE,
            Self::SyncResetPipeAndClearStall => urb_functions::SYNC_RESET_PIPE_AND_CLEAR_STALL,
            Self::GetDescriptorFromInterface => urb_functions::GET_DESCRIPTOR_FROM_INTERFACE,
            Self::Other(code) => code,
        }
    }
}

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to device.
    Out,
    /// Device to host.
    In,
}

/// One USB request block and its transfer buffer.
///
/// `buffer` is sized to the requester's transfer buffer; `transfer_length`
/// is the number of valid bytes in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urb {
    pub function: UsbFunction,
    pub direction: Direction,
    pub endpoint: u8,
    /// Descriptor type for GET_DESCRIPTOR functions, otherwise zero.
    pub descriptor_type: u8,
    buffer: Vec<u8>,
    transfer_length: usize,
}

impl Urb {
    /// A URB with no transfer buffer.
    pub fn new(function: UsbFunction) -> Self {
        Self {
            function,
            direction: Direction::Out,
            endpoint: 0,
            descriptor_type: 0,
            buffer: Vec::new(),
            transfer_length: 0,
        }
    }

    /// Interrupt-IN read of up to `length` bytes.
    pub fn interrupt_in(endpoint: u8, length: usize) -> Self {
        Self {
            direction: Direction::In,
            endpoint,
            buffer: vec![0; length],
            transfer_length: length,
            ..Self::new(UsbFunction::BulkOrInterruptTransfer)
        }
    }

    /// Interrupt-OUT write of `data`.
    pub fn interrupt_out(endpoint: u8, data: Vec<u8>) -> Self {
        let transfer_length = data.len();
        Self {
            direction: Direction::Out,
            endpoint,
            buffer: data,
            transfer_length,
            ..Self::new(UsbFunction::BulkOrInterruptTransfer)
        }
    }

    /// GET_DESCRIPTOR from the device into a buffer of `length` bytes.
    pub fn descriptor_from_device(descriptor_type: u8, length: usize) -> Self {
        Self {
            direction: Direction::In,
            descriptor_type,
            buffer: vec![0; length],
            transfer_length: length,
            ..Self::new(UsbFunction::GetDescriptorFromDevice)
        }
    }

    /// GET_DESCRIPTOR from the interface into a buffer of `length` bytes.
    pub fn descriptor_from_interface(descriptor_type: u8, length: usize) -> Self {
        Self {
            direction: Direction::In,
            descriptor_type,
            buffer: vec![0; length],
            transfer_length: length,
            ..Self::new(UsbFunction::GetDescriptorFromInterface)
        }
    }

    pub fn abort_pipe(endpoint: u8) -> Self {
        Self {
            endpoint,
            ..Self::new(UsbFunction::AbortPipe)
        }
    }

    pub fn is_in(&self) -> bool {
        self.direction == Direction::In
    }

    /// Whole transfer buffer as provided by the requester.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn transfer_length(&self) -> usize {
        self.transfer_length
    }

    /// Set the number of valid bytes, clamped to the buffer size.
    pub fn set_transfer_length(&mut self, length: usize) {
        self.transfer_length = length.min(self.buffer.len());
    }

    /// Valid bytes of the transfer.
    pub fn data(&self) -> &[u8] {
        self.buffer.get(..self.transfer_length).unwrap_or_default()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let length = self.transfer_length;
        self.buffer.get_mut(..length).unwrap_or_default()
    }

    /// Replace the transfer contents, truncated to the buffer size.
    pub fn fill_from(&mut self, data: &[u8]) -> usize {
        let length = data.len().min(self.buffer.len());
        if let (Some(dst), Some(src)) = (self.buffer.get_mut(..length), data.get(..length)) {
            dst.copy_from_slice(src);
        }
        self.transfer_length = length;
        length
    }
}

/// Result delivered to whoever issued an upper request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: NtStatus,
    /// Bytes transferred.
    pub information: usize,
    pub urb: Urb,
}

/// Completion callback of an upper request.
pub type CompletionFn = Box<dyn FnOnce(Completion) + Send>;

/// A request issued by the driver above the filter.
///
/// Completing consumes the request, so it completes at most once; handing it
/// to the lower target transfers that obligation.
pub struct UrbRequest {
    ioctl: u32,
    urb: Urb,
    on_complete: CompletionFn,
}

impl fmt::Debug for UrbRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrbRequest")
            .field("ioctl", &format_args!("0x{:08X}", self.ioctl))
            .field("urb", &self.urb)
            .finish_non_exhaustive()
    }
}

impl UrbRequest {
    pub fn new(ioctl: u32, urb: Urb, on_complete: CompletionFn) -> Self {
        Self {
            ioctl,
            urb,
            on_complete,
        }
    }

    /// A request carrying `urb` through [`IOCTL_INTERNAL_USB_SUBMIT_URB`].
    pub fn submit_urb(urb: Urb, on_complete: CompletionFn) -> Self {
        Self::new(IOCTL_INTERNAL_USB_SUBMIT_URB, urb, on_complete)
    }

    pub fn ioctl(&self) -> u32 {
        self.ioctl
    }

    pub fn urb(&self) -> &Urb {
        &self.urb
    }

    pub fn urb_mut(&mut self) -> &mut Urb {
        &mut self.urb
    }

    /// Complete with `status`, reporting the URB's transfer length.
    pub fn complete(self, status: NtStatus) {
        let information = if status.is_success() {
            self.urb.transfer_length
        } else {
            0
        };
        (self.on_complete)(Completion {
            status,
            information,
            urb: self.urb,
        });
    }
}

//! Sony vendor ID, DualShock product IDs and device classification.

/// Sony Interactive Entertainment USB vendor ID.
pub const SONY_VENDOR_ID: u16 = 0x054C;

/// Known DualShock product IDs.
pub mod product_ids {
    /// DualShock 3 / SIXAXIS (CECHZC2).
    pub const DUALSHOCK3: u16 = 0x0268;
    /// DualShock 4, first revision (CUH-ZCT1).
    pub const DUALSHOCK4_V1: u16 = 0x05C4;
    /// DualShock 4, second revision (CUH-ZCT2).
    pub const DUALSHOCK4_V2: u16 = 0x09CC;
    /// DualShock 4 USB wireless adapter.
    pub const DUALSHOCK4_WIRELESS_ADAPTER: u16 = 0x0BA0;
}

/// Device family a filter instance is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum DeviceType {
    /// Not a supported controller; every request is passed through.
    #[default]
    Unknown,
    DualShock3,
    DualShock4,
}

impl DeviceType {
    /// Whether requests for this family are rewritten at all.
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Value carried in the device-type sideband structure.
    pub const fn wire_value(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::DualShock3 => 1,
            Self::DualShock4 => 2,
        }
    }

    /// Inverse of [`Self::wire_value`]; unrecognized values read as `Unknown`.
    pub const fn from_wire_value(value: u8) -> Self {
        match value {
            1 => Self::DualShock3,
            2 => Self::DualShock4,
            _ => Self::Unknown,
        }
    }
}

/// Classify a USB device from its vendor and product IDs.
pub const fn classify(vendor_id: u16, product_id: u16) -> DeviceType {
    if vendor_id != SONY_VENDOR_ID {
        return DeviceType::Unknown;
    }
    match product_id {
        product_ids::DUALSHOCK3 => DeviceType::DualShock3,
        product_ids::DUALSHOCK4_V1
        | product_ids::DUALSHOCK4_V2
        | product_ids::DUALSHOCK4_WIRELESS_ADAPTER => DeviceType::DualShock4,
        _ => DeviceType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_products() {
        assert_eq!(classify(0x054C, 0x0268), DeviceType::DualShock3);
        assert_eq!(classify(0x054C, 0x05C4), DeviceType::DualShock4);
        assert_eq!(classify(0x054C, 0x09CC), DeviceType::DualShock4);
        assert_eq!(classify(0x054C, 0x0BA0), DeviceType::DualShock4);
    }

    #[test]
    fn test_classify_foreign_vendor_is_unknown() {
        assert_eq!(classify(0x045E, 0x0268), DeviceType::Unknown);
        assert_eq!(classify(0x054C, 0x0CE6), DeviceType::Unknown);
        assert!(!DeviceType::Unknown.is_known());
    }
}

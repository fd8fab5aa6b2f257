//! Message header word
//!
//! The 16 bit header travels little-endian on the wire:
//!
//! | Bits    | Field                    |
//! |---------|--------------------------|
//! | 15      | extended                 |
//! | 12..=14 | number of data objects   |
//! | 9..=11  | message id               |
//! | 8       | port power role          |
//! | 6..=7   | specification revision   |
//! | 5       | port data role           |
//! | 0..=4   | command code             |

use {
    crate::{DataRole, PowerRole},
    byteorder::{ByteOrder, LittleEndian},
    proc_bitfield::bitfield,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpecificationRevision {
    R1_0,
    R2_0,
    R3_0,
    Reserved,
}

impl From<u8> for SpecificationRevision {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::R1_0,
            0b01 => Self::R2_0,
            0b10 => Self::R3_0,
            _ => Self::Reserved,
        }
    }
}

impl From<SpecificationRevision> for u8 {
    fn from(value: SpecificationRevision) -> Self {
        match value {
            SpecificationRevision::R1_0 => 0b00,
            SpecificationRevision::R2_0 => 0b01,
            SpecificationRevision::R3_0 => 0b10,
            SpecificationRevision::Reserved => 0b11,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Header(pub u16): Debug, FromRaw, IntoRaw {
        /// Extended message flag, bit 15
        pub extended: bool @ 15,
        /// Number of 32 bit data objects following the header, bits 12..=14
        pub num_objects: u8 @ 12..=14,
        /// Rolling message counter of the originator, bits 9..=11
        pub message_id: u8 @ 9..=11,
        /// Port power role, bit 8
        pub port_power_role: bool [get PowerRole, set PowerRole] @ 8,
        /// Specification revision, bits 6..=7
        pub spec_revision: u8 [get SpecificationRevision, set SpecificationRevision] @ 6..=7,
        /// Port data role, bit 5
        pub port_data_role: bool [get DataRole, set DataRole] @ 5,
        /// Command code, bits 0..=4. Control or data depending on `num_objects`
        pub message_type_raw: u8 @ 0..=4,
    }
}

impl Header {
    /// Header carrying the fixed role and revision fields of a port
    pub fn new_template(
        power_role: PowerRole,
        data_role: DataRole,
        spec_revision: SpecificationRevision,
    ) -> Self {
        Self(0)
            .with_port_power_role(power_role)
            .with_port_data_role(data_role)
            .with_spec_revision(spec_revision)
    }

    /// Fills in the per-message fields of a template
    pub fn new(template: Self, message_id: u8, message_type: MessageType, num_objects: u8) -> Self {
        let raw = match message_type {
            MessageType::Control(control) => control as u8,
            MessageType::Data(data) => data as u8,
        };

        template
            .with_message_id(message_id & 0b111)
            .with_message_type_raw(raw & 0b1_1111)
            .with_num_objects(num_objects & 0b111)
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Header(LittleEndian::read_u16(buf))
    }

    pub fn to_bytes(&self, buf: &mut [u8]) {
        LittleEndian::write_u16(buf, self.0);
    }

    /// A header without data objects is a control message
    pub fn message_type(&self) -> MessageType {
        if self.num_objects() == 0 {
            MessageType::Control(self.message_type_raw().into())
        } else {
            MessageType::Data(self.message_type_raw().into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    Control(ControlMessageType),
    Data(DataMessageType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMessageType {
    GoodCRC = 0b0_0001,
    GotoMin = 0b0_0010,
    Accept = 0b0_0011,
    Reject = 0b0_0100,
    Ping = 0b0_0101,
    PsRdy = 0b0_0110,
    GetSourceCap = 0b0_0111,
    GetSinkCap = 0b0_1000,
    DrSwap = 0b0_1001,
    PrSwap = 0b0_1010,
    VconnSwap = 0b0_1011,
    Wait = 0b0_1100,
    SoftReset = 0b0_1101,
    NotSupported = 0b1_0000,
    Reserved = 0b1_1111,
}

impl From<u8> for ControlMessageType {
    fn from(value: u8) -> Self {
        match value {
            0b0_0001 => Self::GoodCRC,
            0b0_0010 => Self::GotoMin,
            0b0_0011 => Self::Accept,
            0b0_0100 => Self::Reject,
            0b0_0101 => Self::Ping,
            0b0_0110 => Self::PsRdy,
            0b0_0111 => Self::GetSourceCap,
            0b0_1000 => Self::GetSinkCap,
            0b0_1001 => Self::DrSwap,
            0b0_1010 => Self::PrSwap,
            0b0_1011 => Self::VconnSwap,
            0b0_1100 => Self::Wait,
            0b0_1101 => Self::SoftReset,
            0b1_0000 => Self::NotSupported,
            _ => Self::Reserved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataMessageType {
    SourceCapabilities = 0b0_0001,
    Request = 0b0_0010,
    Bist = 0b0_0011,
    SinkCapabilities = 0b0_0100,
    BatteryStatus = 0b0_0101,
    Alert = 0b0_0110,
    GetCountryInfo = 0b0_0111,
    VendorDefined = 0b0_1111,
    Reserved = 0b1_1111,
}

impl From<u8> for DataMessageType {
    fn from(value: u8) -> Self {
        match value {
            0b0_0001 => Self::SourceCapabilities,
            0b0_0010 => Self::Request,
            0b0_0011 => Self::Bist,
            0b0_0100 => Self::SinkCapabilities,
            0b0_0101 => Self::BatteryStatus,
            0b0_0110 => Self::Alert,
            0b0_0111 => Self::GetCountryInfo,
            0b0_1111 => Self::VendorDefined,
            _ => Self::Reserved,
        }
    }
}

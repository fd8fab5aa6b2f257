use {
    crate::{
        header::{ControlMessageType, DataMessageType, Header, MessageType},
        pdo::PowerDataObject,
    },
    heapless::Vec,
};

/// Protocol maximum of data objects following a header
pub const MAX_DATA_OBJECTS: usize = 7;

/// A PD message as it crosses the PHY FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub header: Header,
    /// PDOs or RDOs, depending on the message type
    pub data_objects: Vec<u32, MAX_DATA_OBJECTS>,
    /// Trailer as received. Validated by the PHY, never computed here
    pub crc32: u32,
}

impl Message {
    /// Builds a message whose header object count matches `data_objects`.
    ///
    /// Objects past [`MAX_DATA_OBJECTS`] are dropped.
    pub fn new(header: Header, data_objects: &[u32]) -> Self {
        let data_objects: Vec<u32, MAX_DATA_OBJECTS> =
            data_objects.iter().take(MAX_DATA_OBJECTS).copied().collect();

        Self {
            header: header.with_num_objects(data_objects.len() as u8),
            data_objects,
            crc32: 0,
        }
    }

    pub fn new_control(template: Header, message_id: u8, control: ControlMessageType) -> Self {
        Self::new(
            Header::new(template, message_id, MessageType::Control(control), 0),
            &[],
        )
    }

    pub fn new_data(
        template: Header,
        message_id: u8,
        data: DataMessageType,
        data_objects: &[u32],
    ) -> Self {
        Self::new(
            Header::new(template, message_id, MessageType::Data(data), 0),
            data_objects,
        )
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type()
    }

    pub fn message_id(&self) -> u8 {
        self.header.message_id()
    }

    pub fn num_objects(&self) -> usize {
        self.data_objects.len()
    }

    /// Data objects read as power data objects
    pub fn power_data_objects(&self) -> impl Iterator<Item = PowerDataObject> + '_ {
        self.data_objects.iter().map(|raw| PowerDataObject::from_raw(*raw))
    }
}

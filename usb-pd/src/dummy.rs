//! A scripted PHY for exercising the sink engine
use std::{collections::VecDeque, vec::Vec};

use crate::{
    header::{ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision},
    message::Message,
    sink::{Driver, PhyStatus},
    CcPin, DataRole, PowerRole,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyError;

/// Driver calls that can be made to fail one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DetectCc,
    EnableSink,
    DisableSink,
    CcAttached,
    Status,
    SendHardReset,
    ResetPdLogic,
    FlushRx,
    FlushTx,
    Receive,
    Transmit,
}

/// Capabilities of a typical 45 W charger.
///
/// - Fixed 5 V at 3 A
/// - Fixed 9 V at 3 A
/// - Fixed 15 V at 3 A
/// - Fixed 20 V at 2.25 A
/// - PPS 3.3-11 V at 5 A
pub const DUMMY_CAPABILITIES: [u32; 5] = [
    0x0801_912c,
    0x0002_d12c,
    0x0004_b12c,
    0x0006_40e1,
    0xc8dc_2164,
];

#[derive(Default)]
pub struct DummyDriver {
    /// Pin a source is connected to
    pub cc: Option<CcPin>,
    /// Pin the transceiver is routed to
    pub sink_enabled: Option<CcPin>,
    /// Interrupt flags returned by successive status reads. `rx_empty` is derived from the RX queue
    pub interrupts: VecDeque<PhyStatus>,
    /// Makes the next receive find no SOP
    pub garbage: bool,
    /// Every bus access fails while set
    pub fail: bool,
    /// Only this call fails while set
    pub fail_on: Option<Operation>,
    pub hard_resets: usize,
    pub pd_resets: usize,
    pub rx_flushes: usize,
    pub tx_flushes: usize,
    pub delays: Vec<u32>,
    rx: VecDeque<Message>,
    tx: Vec<Message>,
}

impl DummyDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message as if sent by the source
    pub fn inject(&mut self, message: Message) {
        self.rx.push_back(message);
    }

    /// Queues a status read with the given flags set on top of the defaults
    pub fn interrupt(&mut self, update: impl FnOnce(&mut PhyStatus)) {
        let mut status = PhyStatus::default();
        update(&mut status);
        self.interrupts.push_back(status);
    }

    pub fn transmitted(&self) -> &[Message] {
        &self.tx
    }

    /// Takes the oldest transmitted message
    pub fn take_transmitted(&mut self) -> Message {
        self.tx.remove(0)
    }

    fn access(&self, operation: Operation) -> Result<(), DummyError> {
        if self.fail || self.fail_on == Some(operation) {
            Err(DummyError)
        } else {
            Ok(())
        }
    }
}

impl Driver for DummyDriver {
    type Error = DummyError;

    fn detect_cc(&mut self) -> Result<Option<CcPin>, Self::Error> {
        self.access(Operation::DetectCc)?;
        Ok(self.cc)
    }

    fn enable_sink(&mut self, cc_pin: Option<CcPin>) -> Result<(), Self::Error> {
        self.access(Operation::EnableSink)?;
        self.sink_enabled = cc_pin;
        Ok(())
    }

    fn disable_sink(&mut self) -> Result<(), Self::Error> {
        self.access(Operation::DisableSink)?;
        self.sink_enabled = None;
        Ok(())
    }

    fn cc_attached(&mut self, cc_pin: CcPin) -> Result<bool, Self::Error> {
        self.access(Operation::CcAttached)?;
        Ok(self.cc == Some(cc_pin))
    }

    fn status(&mut self) -> Result<PhyStatus, Self::Error> {
        self.access(Operation::Status)?;
        let mut status = self.interrupts.pop_front().unwrap_or_default();
        status.rx_empty = self.rx.is_empty() && !self.garbage;
        Ok(status)
    }

    fn send_hard_reset(&mut self) -> Result<(), Self::Error> {
        self.access(Operation::SendHardReset)?;
        self.hard_resets += 1;
        Ok(())
    }

    fn reset_pd_logic(&mut self) -> Result<(), Self::Error> {
        self.access(Operation::ResetPdLogic)?;
        self.pd_resets += 1;
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<(), Self::Error> {
        self.access(Operation::FlushRx)?;
        self.rx_flushes += 1;
        Ok(())
    }

    fn flush_tx(&mut self) -> Result<(), Self::Error> {
        self.access(Operation::FlushTx)?;
        self.tx_flushes += 1;
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Message>, Self::Error> {
        self.access(Operation::Receive)?;
        if self.garbage {
            self.garbage = false;
            return Ok(None);
        }
        Ok(self.rx.pop_front())
    }

    fn transmit(&mut self, message: &Message) -> Result<(), Self::Error> {
        self.access(Operation::Transmit)?;
        self.tx.push(message.clone());
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

fn source_template() -> Header {
    Header::new_template(PowerRole::Source, DataRole::Dfp, SpecificationRevision::R2_0)
}

/// Control message from the source
pub fn source_control(message_id: u8, control: ControlMessageType) -> Message {
    Message::new_control(source_template(), message_id, control)
}

/// Source Capabilities message carrying `pdos`
pub fn source_capabilities(message_id: u8, pdos: &[u32]) -> Message {
    Message::new(
        Header::new(
            source_template(),
            message_id,
            MessageType::Data(DataMessageType::SourceCapabilities),
            0,
        ),
        pdos,
    )
}

#![cfg_attr(not(test), no_std)]

//! FUSB302B Programmable USB Type‐C Controller w/PD
//!
//! Implements [`usb_pd::sink::Driver`] on top of a register [`Transport`], either a hardware I2C
//! peripheral ([`I2cTransport`]) or two GPIO pins ([`BitBangTransport`]).

#[macro_use]
pub(crate) mod fmt;

pub mod attach;
pub mod bitbang;
pub mod fifo;
pub mod registers;
pub mod transport;

#[cfg(test)]
mod dummy;

pub use {
    bitbang::BitBangTransport,
    transport::{I2cTransport, Transport},
};

use {
    crate::registers::{Control3, Mask1, MaskA, MaskB, Power, Registers, Slice, StatusBlock},
    embedded_hal::blocking::delay::DelayMs,
    usb_pd::{
        header::SpecificationRevision,
        message::Message,
        sink::{Driver, PhyStatus},
        CcPin, DataRole, PowerRole,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("bus error")]
    Bus,
    #[error("no CC pin to route the sink to")]
    NoCcPin,
    #[error("unknown device id {0:#04x}")]
    UnknownDevice(u8),
    #[error("burst larger than the transport buffer")]
    BufferOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Wait after switching the comparator to a CC pin, before reading its level
    pub cc_settle_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { cc_settle_ms: 250 }
    }
}

/// FUSB302B Programmable USB Type‐C Controller w/PD
pub struct Fusb302b<T, D> {
    registers: Registers<T>,
    delay: D,
    config: Config,
    /// Pin the transmitter is routed to
    cc_pin: Option<CcPin>,
}

impl<T: Transport, D: DelayMs<u32>> Fusb302b<T, D> {
    pub fn new(transport: T, delay: D, config: Config) -> Self {
        Self {
            registers: Registers::new(transport),
            delay,
            config,
            cc_pin: None,
        }
    }

    /// Resets the chip and configures it as a polled sink
    pub fn init(&mut self) -> Result<(), Error> {
        self.registers
            .pulse_reset(|reset| reset.with_sw_reset(true))?;

        let device_id = self.registers.device_id()?;
        if !device_id.is_fusb302() {
            error!("unknown device id {}", device_id.0);
            return Err(Error::UnknownDevice(device_id.0));
        }
        info!(
            "FUSB302 version {} product {} revision {}",
            device_id.version_id(),
            device_id.product_id(),
            device_id.revision_id()
        );

        self.registers.refresh()?;
        self.cc_pin = None;

        // power up everything
        self.registers.set_power(
            Power::default()
                .with_bandgap_wake(true)
                .with_receiver(true)
                .with_measure_block(true)
                .with_internal_oscillator(true),
        )?;

        // roles used in automatic GoodCRC replies
        self.registers.modify_switches1(|switches1| {
            switches1
                .with_powerrole(PowerRole::Sink)
                .with_datarole(DataRole::Ufp)
                .with_specrev(SpecificationRevision::R2_0)
                .with_auto_crc(true)
        })?;

        self.registers.modify_control3(|control3: Control3| {
            control3
                .with_auto_hardreset(true)
                .with_auto_softreset(true)
                .with_auto_retry(true)
                .with_n_retries(3)
        })?;

        // polled, mask all interrupts
        self.registers.set_mask1(Mask1(0xFF))?;
        self.registers.set_mask_a(MaskA(0xFF))?;
        self.registers
            .set_mask_b(MaskB::default().with_m_gcrcsent(true))?;

        // BMC threshold: 1.35V with a hysteresis of 85mV
        self.registers
            .set_slice(Slice::default().with_sda_hys(0b01).with_sdac(0x20))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&mut self) -> &mut Registers<T> {
        &mut self.registers
    }

    pub fn release(self) -> (T, D) {
        (self.registers.release(), self.delay)
    }
}

impl From<StatusBlock> for PhyStatus {
    fn from(block: StatusBlock) -> Self {
        Self {
            hard_reset_received: block.interrupta.i_hardrst(),
            soft_reset_received: block.interrupta.i_softrst(),
            good_crc_sent: block.interruptb.i_gcrcsent(),
            tx_sent: block.interrupta.i_txsent(),
            hard_reset_sent: block.interrupta.i_hardsent(),
            retry_failed: block.interrupta.i_retryfail(),
            soft_reset_failed: block.interrupta.i_softfail(),
            collision: block.interrupt.i_collision(),
            alert: block.interrupt.i_alert(),
            cc_level_changed: block.interrupt.i_bc_lvl(),
            rx_empty: block.status1.rx_empty(),
            rx_full: block.status1.rx_full(),
            tx_empty: block.status1.tx_empty(),
            tx_full: block.status1.tx_full(),
        }
    }
}

impl<T: Transport, D: DelayMs<u32>> Driver for Fusb302b<T, D> {
    type Error = Error;

    fn detect_cc(&mut self) -> Result<Option<CcPin>, Error> {
        Fusb302b::detect_cc(self)
    }

    fn enable_sink(&mut self, cc_pin: Option<CcPin>) -> Result<(), Error> {
        Fusb302b::enable_sink(self, cc_pin)
    }

    fn disable_sink(&mut self) -> Result<(), Error> {
        Fusb302b::disable_sink(self)
    }

    fn cc_attached(&mut self, cc_pin: CcPin) -> Result<bool, Error> {
        Fusb302b::cc_attached(self, cc_pin)
    }

    fn status(&mut self) -> Result<PhyStatus, Error> {
        self.registers.status_block().map(PhyStatus::from)
    }

    fn send_hard_reset(&mut self) -> Result<(), Error> {
        self.registers
            .pulse_control3(|control3| control3.with_send_hard_reset(true))
    }

    fn reset_pd_logic(&mut self) -> Result<(), Error> {
        self.registers
            .pulse_reset(|reset| reset.with_pd_reset(true))
    }

    fn flush_rx(&mut self) -> Result<(), Error> {
        self.registers
            .pulse_control1(|control1| control1.with_rx_flush(true))
    }

    fn flush_tx(&mut self) -> Result<(), Error> {
        self.registers
            .pulse_control0(|control0| control0.with_tx_flush(true))
    }

    fn receive(&mut self) -> Result<Option<Message>, Error> {
        self.registers.receive()
    }

    fn transmit(&mut self, message: &Message) -> Result<(), Error> {
        self.registers.transmit(message)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            dummy::{DummyDelay, DummyTransport},
            registers::Register,
        },
        usb_pd::{
            sink::{Event, Sink, State},
            Instant,
        },
    };

    fn phy(transport: DummyTransport) -> Fusb302b<DummyTransport, DummyDelay> {
        Fusb302b::new(transport, DummyDelay::default(), Config::default())
    }

    #[test]
    fn init_configures_polled_sink() {
        let mut phy = phy(DummyTransport::new());

        phy.init().unwrap();

        let transport = phy.registers.transport();
        assert_eq!(transport.writes[0], (Register::Reset as u8, 0x01));
        assert_eq!(transport.register(Register::Power as u8), 0x0f);
        assert_eq!(transport.register(Register::Switches1 as u8), 0b0010_0100);
        assert_eq!(transport.register(Register::Control3 as u8), 0b0001_1111);
        assert_eq!(transport.register(Register::Mask1 as u8), 0xff);
        assert_eq!(transport.register(Register::MaskA as u8), 0xff);
        assert_eq!(transport.register(Register::MaskB as u8), 0x01);
        assert_eq!(transport.register(Register::Slice as u8), 0b0110_0000);
    }

    #[test]
    fn init_rejects_unknown_device() {
        let mut transport = DummyTransport::new();
        transport.set_register(Register::DeviceId as u8, 0x12);
        let mut phy = phy(transport);

        assert_eq!(phy.init(), Err(Error::UnknownDevice(0x12)));
        assert_eq!(phy.registers.transport().writes.len(), 1);
    }

    #[test]
    fn init_reads_back_shadow() {
        let mut transport = DummyTransport::new();
        transport.set_register(Register::Switches0 as u8, 0b0000_0111);
        let mut phy = phy(transport);

        phy.init().unwrap();

        assert_eq!(phy.registers.switches0_shadow().0, 0b0000_0111);
    }

    #[test]
    fn status_maps_interrupts() {
        let mut transport = DummyTransport::new();
        transport.set_register(Register::InterruptA as u8, 0b0001_0011);
        transport.set_register(Register::InterruptB as u8, 0b0000_0001);
        transport.set_register(Register::Interrupt as u8, 0b0000_0011);
        transport.rx_fifo.push_back(0xe0);
        let mut phy = phy(transport);

        let status = Driver::status(&mut phy).unwrap();

        assert!(status.hard_reset_received);
        assert!(status.soft_reset_received);
        assert!(status.retry_failed);
        assert!(status.good_crc_sent);
        assert!(status.collision);
        assert!(status.cc_level_changed);
        assert!(!status.rx_empty);
        assert!(status.tx_empty);

        // cleared by the read
        let status = Driver::status(&mut phy).unwrap();
        assert!(!status.hard_reset_received);
        assert!(!status.good_crc_sent);
    }

    #[test]
    fn pulses_do_not_stick() {
        let mut phy = phy(DummyTransport::new());

        phy.send_hard_reset().unwrap();
        phy.reset_pd_logic().unwrap();
        phy.flush_rx().unwrap();
        phy.flush_tx().unwrap();

        assert_eq!(
            phy.registers.transport().writes,
            [
                (Register::Control3 as u8, 0b0100_0110),
                (Register::Reset as u8, 0b0000_0010),
                (Register::Control1 as u8, 0b0000_0100),
                (Register::Control0 as u8, 0b0110_0100),
            ]
        );
        assert_eq!(phy.registers.control3_shadow().0, 0b0000_0110);
    }

    #[test]
    fn sink_attaches_through_driver() {
        let mut transport = DummyTransport::new();
        transport.cc_levels = [0b10, 0b00];
        let mut phy = phy(transport);
        phy.init().unwrap();

        let mut sink = Sink::new(phy, Default::default());
        let event = sink.tick(Instant::from_ticks(0)).unwrap();

        assert_eq!(event, Some(Event::Attached(CcPin::CC1)));
        assert_eq!(sink.state(), State::Idle);

        let phy = sink.driver();
        assert_eq!(phy.active_cc(), Some(CcPin::CC1));
        let transport = phy.registers.transport();
        assert_eq!(transport.fifo_bursts.len(), 1);
        // GetSourceCap with message id 2
        assert_eq!(transport.fifo_bursts[0][5..7], [0x47, 0x04]);
    }
}

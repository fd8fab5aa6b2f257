//! FUSB302B registers
//!
//! Setters/getters generated using macros, `Default` for each register is its reset value.
//!
//! Written values are mirrored in a shadow so single bits can be changed without reading the
//! register back first. Pulses write shadow | bit while leaving the shadow untouched, matching
//! the self clearing bits of the chip.

use {
    crate::{transport::Transport, Error},
    proc_bitfield::bitfield,
    usb_pd::{header::SpecificationRevision, DataRole, PowerRole},
};

macro_rules! generate_register_read {
    ($reg:ident, $fn:ident) => {
        pub fn $fn(&mut self) -> Result<$reg, Error> {
            self.read_register_raw(Register::$reg).map($reg)
        }
    };
}

macro_rules! generate_register_write {
    ($reg:ident, $fn:ident) => {
        paste::item! {
            pub fn [<set_ $fn>](&mut self, value: $reg) -> Result<(), Error> {
                self.write_register_raw(Register::$reg, value.0)
            }

            /// Last value written
            pub fn [<$fn _shadow>](&self) -> $reg {
                $reg(self.shadow[Register::$reg as usize])
            }

            /// Writes `f(shadow)` and keeps it
            pub fn [<modify_ $fn>](&mut self, f: impl FnOnce($reg) -> $reg) -> Result<(), Error> {
                let value = f(self.[<$fn _shadow>]());
                self.[<set_ $fn>](value)
            }
        }
    };
}

macro_rules! generate_register_pulse {
    ($reg:ident, $fn:ident) => {
        paste::item! {
            /// Writes `f(shadow)` for self clearing bits, the shadow stays as it was
            pub fn [<pulse_ $fn>](&mut self, f: impl FnOnce($reg) -> $reg) -> Result<(), Error> {
                let value = f($reg(self.shadow[Register::$reg as usize]));
                self.transport.write_register(Register::$reg as u8, value.0)
            }
        }
    };
}

macro_rules! generate_register_accessors {
    () => {};

    (($reg:ident, $fn:ident, r), $($tail:tt)*) => {
        generate_register_read!($reg, $fn);

        generate_register_accessors!($($tail)*);
    };

    (($reg:ident, $fn:ident, rw), $($tail:tt)*) => {
        generate_register_read!($reg, $fn);
        generate_register_write!($reg, $fn);

        generate_register_accessors!($($tail)*);
    };

    (($reg:ident, $fn:ident, rwp), $($tail:tt)*) => {
        generate_register_read!($reg, $fn);
        generate_register_write!($reg, $fn);
        generate_register_pulse!($reg, $fn);

        generate_register_accessors!($($tail)*);
    };

    (($reg:ident, $fn:ident, p), $($tail:tt)*) => {
        generate_register_pulse!($reg, $fn);

        generate_register_accessors!($($tail)*);
    };
}

/// Number of shadowed registers, covering `DeviceId..=Control4`
const SHADOW_LEN: usize = Register::Control4 as usize + 1;

/// Register file of one FUSB302B behind a [`Transport`]
pub struct Registers<T> {
    transport: T,
    shadow: [u8; SHADOW_LEN],
}

impl<T: Transport> Registers<T> {
    pub fn new(transport: T) -> Self {
        let mut shadow = [0; SHADOW_LEN];
        shadow[Register::DeviceId as usize] = DeviceId::default().0;
        shadow[Register::Switches0 as usize] = Switches0::default().0;
        shadow[Register::Switches1 as usize] = Switches1::default().0;
        shadow[Register::Slice as usize] = Slice::default().0;
        shadow[Register::Control0 as usize] = Control0::default().0;
        shadow[Register::Control3 as usize] = Control3::default().0;
        shadow[Register::Power as usize] = Power::default().0;

        Self { transport, shadow }
    }

    generate_register_accessors!(
        (DeviceId, device_id, r),
        (Switches0, switches0, rw),
        (Switches1, switches1, rw),
        (Slice, slice, rw),
        (Control0, control0, rwp),
        (Control1, control1, rwp),
        (Control3, control3, rwp),
        (Mask1, mask1, rw),
        (Power, power, rw),
        (Reset, reset, p),
        (MaskA, mask_a, rw),
        (MaskB, mask_b, rw),
        (InterruptA, interrupta, r),
        (InterruptB, interruptb, r),
        (Status0, status0, r),
        (Status1, status1, r),
        (Interrupt, interrupt, r),
    );

    /// Re-reads every shadowed register from the chip
    pub fn refresh(&mut self) -> Result<(), Error> {
        let start = Register::DeviceId as usize;
        self.transport
            .read_burst(Register::DeviceId as u8, &mut self.shadow[start..])
    }

    /// Interrupt and status registers in one burst, reading clears the interrupts
    pub fn status_block(&mut self) -> Result<StatusBlock, Error> {
        let mut buf = [0u8; 5];
        self.transport
            .read_burst(Register::InterruptA as u8, &mut buf)?;

        Ok(StatusBlock {
            interrupta: InterruptA(buf[0]),
            interruptb: InterruptB(buf[1]),
            status0: Status0(buf[2]),
            status1: Status1(buf[3]),
            interrupt: Interrupt(buf[4]),
        })
    }

    pub fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.transport.read_burst(Register::Fifo as u8, buf)
    }

    pub fn read_fifo_byte(&mut self) -> Result<u8, Error> {
        self.transport.read_register(Register::Fifo as u8)
    }

    pub fn write_fifo(&mut self, data: &[u8]) -> Result<(), Error> {
        self.transport.write_burst(Register::Fifo as u8, data)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn release(self) -> T {
        self.transport
    }

    fn read_register_raw(&mut self, register: Register) -> Result<u8, Error> {
        self.transport.read_register(register as u8)
    }

    fn write_register_raw(&mut self, register: Register, value: u8) -> Result<(), Error> {
        self.transport.write_register(register as u8, value)?;
        if let Some(shadow) = self.shadow.get_mut(register as usize) {
            *shadow = value;
        }
        Ok(())
    }
}

/// Registers read by one status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBlock {
    pub interrupta: InterruptA,
    pub interruptb: InterruptB,
    pub status0: Status0,
    pub status1: Status1,
    pub interrupt: Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    DeviceId = 0x01,
    Switches0 = 0x02,
    Switches1 = 0x03,
    Measure = 0x04,
    Slice = 0x05,
    Control0 = 0x06,
    Control1 = 0x07,
    Control2 = 0x08,
    Control3 = 0x09,
    Mask1 = 0x0A,
    Power = 0x0B,
    Reset = 0x0C,
    OcPreg = 0x0D,
    MaskA = 0x0E,
    MaskB = 0x0F,
    Control4 = 0x10,
    Status0A = 0x3C,
    Status1A = 0x3D,
    InterruptA = 0x3E,
    InterruptB = 0x3F,
    Status0 = 0x40,
    Status1 = 0x41,
    Interrupt = 0x42,
    Fifo = 0x43,
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct DeviceId(pub u8): Debug, FromRaw, IntoRaw {
        /// Device version ID by Trim or etc. `0b1xxx` for the FUSB302 family
        pub version_id: u8 [read_only] @ 4..=7,
        pub product_id: u8 [read_only] @ 2..=3,
        /// Revision History of each version
        pub revision_id: u8 [read_only] @ 0..=1,
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self(0b1001_0000)
    }
}

impl DeviceId {
    pub fn is_fusb302(&self) -> bool {
        self.version_id() & 0b1000 != 0
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Switches0(pub u8): Debug, FromRaw, IntoRaw {
        /// Apply host pull up current to CC2 pin
        pub pu_en2: bool @ 7,
        /// Apply host pull up current to CC1 pin
        pub pu_en1: bool @ 6,
        /// Turn on the VCONN current to CC2 pin
        pub vconn_cc2: bool @ 5,
        /// Turn on the VCONN current to CC1 pin
        pub vconn_cc1: bool @ 4,
        /// Use the measure block to monitor or measure the voltage on CC2
        pub meas_cc2: bool @ 3,
        /// Use the measure block to monitor or measure the voltage on CC1
        pub meas_cc1: bool @ 2,
        /// Device pull down on CC2
        pub pdwn2: bool @ 1,
        /// Device pull down on CC1
        pub pdwn1: bool @ 0,
    }
}

impl Default for Switches0 {
    fn default() -> Self {
        Self(0b0000_0011)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Switches1(pub u8): Debug, FromRaw, IntoRaw {
        /// Bit used for constructing the GoodCRC acknowledge packet. This bit corresponds to the
        /// Port Power Role bit in the message header if an SOP packet is received.
        pub powerrole: bool [get PowerRole, set PowerRole] @ 7,
        /// Bit used for constructing the GoodCRC acknowledge packet. These bits correspond to the
        /// Specification Revision bits in the message header.
        pub specrev: u8 [get SpecificationRevision, set SpecificationRevision] @ 5..=6,
        /// Bit used for constructing the GoodCRC acknowledge packet. This bit corresponds to the
        /// Port Data Role bit in the message header.
        pub datarole: bool [get DataRole, set DataRole] @ 4,
        /// Starts the transmitter automatically when a message with a good CRC is received and
        /// automatically sends a GoodCRC acknowledge packet back to the relevant SOP*
        pub auto_crc: bool @ 2,
        /// Enable BMC transmit driver on CC2 pin
        pub txcc2: bool @ 1,
        /// Enable BMC transmit driver on CC1 pin
        pub txcc1: bool @ 0,
    }
}

impl Default for Switches1 {
    fn default() -> Self {
        Self(0b0010_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Slice(pub u8): Debug, FromRaw, IntoRaw {
        /// Adds hysteresis where there are now two thresholds, the lower threshold which is always
        /// the value programmed by SDAC[5:0] and the higher threshold that is:
        /// * `11`: 255 mV hysteresis: higher threshold = (SDAC value + 20hex)
        /// * `10`: 170 mV hysteresis: higher threshold = (SDAC value + Ahex)
        /// * `01`: 85 mV hysteresis: higher threshold = (SDAC value + 5)
        /// * `00`: No hysteresis: higher threshold = SDAC value
        pub sda_hys: u8 @ 6..=7,
        /// BMC Slicer DAC data input. Allows for a programmable threshold so as to meet the BMC
        /// receive mask under all noise conditions.
        pub sdac: u8 @ 0..=5,
    }
}

impl Default for Slice {
    fn default() -> Self {
        Self(0b0110_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control0(pub u8): Debug, FromRaw, IntoRaw {
        /// Self clearing bit to flush the content of the transmit FIFO
        pub tx_flush: bool @ 6,
        /// Masks all interrupts, when false interrupts to host are enabled
        pub int_mask: bool @ 5,
        /// Controls the host pull up current enabled by PU_EN
        ///
        /// * `00`: No current
        /// * `01`: 80 mA – Default USB power
        /// * `10`: 180 mA – Medium Current Mode: 1.5 A
        /// * `11`: 330 mA – High Current Mode: 3 A
        pub host_cur: u8 @ 2..=3,
        /// Starts the transmitter automatically when a message with a good CRC is received
        pub auto_pre: bool @ 1,
        /// Start transmitter using the data in the transmit FIFO. Preamble is started first.
        /// Self clearing.
        pub tx_start: bool @ 0,
    }
}

impl Default for Control0 {
    fn default() -> Self {
        Self(0b0010_0100)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control1(pub u8): Debug, FromRaw, IntoRaw {
        /// Enable SOP''_DEBUG (SOP double prime debug) packets, false for ignore
        pub ensop2db: bool @ 6,
        /// Enable SOP'_DEBUG (SOP prime debug) packets, false for ignore
        pub ensop1db: bool @ 5,
        /// Sent BIST Mode 01s pattern for testing
        pub bist_mode2: bool @ 4,
        /// Self clearing bit to flush the content of the receive FIFO
        pub rx_flush: bool @ 2,
        /// Enable SOP'' (SOP double prime) packets, false for ignore
        pub ensop2: bool @ 1,
        /// Enable SOP' (SOP prime) packets, false for ignore
        pub ensop1: bool @ 0,
    }
}

impl Default for Control1 {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Control3(pub u8): Debug, FromRaw, IntoRaw {
        /// Send a hard reset ordered set. Self clearing
        pub send_hard_reset: bool @ 6,
        /// BIST mode: route the receiver to the FIFO instead of discarding
        pub bist_tmode: bool @ 5,
        /// Respond to a received hard reset automatically
        pub auto_hardreset: bool @ 4,
        /// Respond to a received soft reset automatically
        pub auto_softreset: bool @ 3,
        /// Number of hardware retries when no GoodCRC is received
        pub n_retries: u8 @ 1..=2,
        /// Retry automatically when no GoodCRC is received
        pub auto_retry: bool @ 0,
    }
}

impl Default for Control3 {
    fn default() -> Self {
        Self(0b0000_0110)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Mask1(pub u8): Debug, FromRaw, IntoRaw {
        pub m_vbusok: bool @ 7,
        pub m_activity: bool @ 6,
        pub m_comp_chng: bool @ 5,
        pub m_crc_chk: bool @ 4,
        pub m_alert: bool @ 3,
        pub m_wake: bool @ 2,
        pub m_collision: bool @ 1,
        pub m_bc_lvl: bool @ 0,
    }
}

impl Default for Mask1 {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Power(pub u8): Debug, FromRaw, IntoRaw {
        pub internal_oscillator: bool @ 3,
        pub measure_block: bool @ 2,
        pub receiver: bool @ 1,
        pub bandgap_wake: bool @ 0,
    }
}

impl Default for Power {
    fn default() -> Self {
        Self(0b0000_0001)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Reset(pub u8): Debug, FromRaw, IntoRaw {
        /// Reset just the PD logic, self clearing
        pub pd_reset: bool @ 1,
        /// Reset the whole chip including the I2C registers, self clearing
        pub sw_reset: bool @ 0,
    }
}

impl Default for Reset {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MaskA(pub u8): Debug, FromRaw, IntoRaw {
        pub m_ocp_temp: bool @ 7,
        pub m_togdone: bool @ 6,
        pub m_softfail: bool @ 5,
        pub m_retryfail: bool @ 4,
        pub m_hardsent: bool @ 3,
        pub m_txsent: bool @ 2,
        pub m_softrst: bool @ 1,
        pub m_hardrst: bool @ 0,
    }
}

impl Default for MaskA {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct MaskB(pub u8): Debug, FromRaw, IntoRaw {
        pub m_gcrcsent: bool @ 0,
    }
}

impl Default for MaskB {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InterruptA(pub u8): Debug, FromRaw, IntoRaw {
        pub i_ocp_temp: bool @ 7,
        pub i_togdone: bool @ 6,
        /// Soft reset was sent but no GoodCRC came back
        pub i_softfail: bool @ 5,
        /// Retries exhausted without GoodCRC
        pub i_retryfail: bool @ 4,
        pub i_hardsent: bool @ 3,
        pub i_txsent: bool @ 2,
        pub i_softrst: bool @ 1,
        pub i_hardrst: bool @ 0,
    }
}

impl Default for InterruptA {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct InterruptB(pub u8): Debug, FromRaw, IntoRaw {
        /// GoodCRC was sent for a received message
        pub i_gcrcsent: bool @ 0,
    }
}

impl Default for InterruptB {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status0(pub u8): Debug, FromRaw, IntoRaw {
        pub vbusok: bool @ 7,
        pub activity: bool @ 6,
        pub comp: bool @ 5,
        pub crc_chk: bool @ 4,
        pub alert: bool @ 3,
        pub wake: bool @ 2,
        /// Voltage on the measured CC pin
        ///
        /// * `00`: < 200 mV
        /// * `01`: > 200 mV, < 660 mV
        /// * `10`: > 660 mV, < 1.23 V
        /// * `11`: > 1.23 V
        pub bc_lvl: u8 @ 0..=1,
    }
}

impl Default for Status0 {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status1(pub u8): Debug, FromRaw, IntoRaw {
        pub rxsop2db: bool @ 7,
        pub rxsop1db: bool @ 6,
        pub rx_empty: bool @ 5,
        pub rx_full: bool @ 4,
        pub tx_empty: bool @ 3,
        pub tx_full: bool @ 2,
        pub ovrtemp: bool @ 1,
        pub ocp: bool @ 0,
    }
}

impl Default for Status1 {
    fn default() -> Self {
        Self(0b0010_1000)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Interrupt(pub u8): Debug, FromRaw, IntoRaw {
        pub i_vbusok: bool @ 7,
        pub i_activity: bool @ 6,
        pub i_comp_chng: bool @ 5,
        pub i_crc_chk: bool @ 4,
        pub i_alert: bool @ 3,
        pub i_wake: bool @ 2,
        pub i_collision: bool @ 1,
        pub i_bc_lvl: bool @ 0,
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self(0b0000_0000)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::dummy::DummyTransport,
    };

    #[test]
    fn switches1_sink_configuration() {
        let switches1 = Switches1(0)
            .with_powerrole(PowerRole::Sink)
            .with_datarole(DataRole::Ufp)
            .with_specrev(SpecificationRevision::R2_0)
            .with_auto_crc(true);

        assert_eq!(switches1.0, 0b0010_0100);
        assert_eq!(switches1.specrev(), SpecificationRevision::R2_0);
    }

    #[test]
    fn control3_auto_retries() {
        let control3 = Control3(0)
            .with_auto_hardreset(true)
            .with_auto_softreset(true)
            .with_auto_retry(true)
            .with_n_retries(3);

        assert_eq!(control3.0, 0b0001_1111);
    }

    #[test]
    fn device_id_family() {
        assert!(DeviceId(0x91).is_fusb302());
        assert!(DeviceId(0x80).is_fusb302());
        assert!(!DeviceId(0x00).is_fusb302());
        assert!(!DeviceId(0x7f).is_fusb302());
    }

    #[test]
    fn pulse_leaves_shadow() {
        let mut registers = Registers::new(DummyTransport::new());

        registers
            .pulse_control0(|control0| control0.with_tx_flush(true))
            .unwrap();
        assert_eq!(
            registers.transport().register(Register::Control0 as u8),
            0b0110_0100
        );
        assert_eq!(registers.control0_shadow(), Control0::default());

        registers
            .modify_switches0(|switches0| switches0.with_meas_cc1(true))
            .unwrap();
        assert_eq!(registers.switches0_shadow().0, 0b0000_0111);
    }

    #[test]
    fn failed_write_keeps_shadow() {
        let mut registers = Registers::new(DummyTransport::new());
        registers.transport_mut().fail = true;

        assert_eq!(registers.set_power(Power(0x0f)), Err(Error::Bus));
        assert_eq!(registers.power_shadow(), Power::default());
    }

    #[test]
    fn status_block_order() {
        let mut transport = DummyTransport::new();
        transport.set_register(Register::InterruptA as u8, 0x01);
        transport.set_register(Register::InterruptB as u8, 0x01);
        transport.set_register(Register::Interrupt as u8, 0x02);
        let mut registers = Registers::new(transport);

        let status = registers.status_block().unwrap();
        assert!(status.interrupta.i_hardrst());
        assert!(status.interruptb.i_gcrcsent());
        assert!(status.interrupt.i_collision());
        assert!(status.status1.rx_empty());
    }
}

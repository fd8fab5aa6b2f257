//! CC pin measurement and routing of the BMC transceiver

use {
    crate::{
        registers::{Switches0, Switches1},
        transport::Transport,
        Error, Fusb302b,
    },
    embedded_hal::blocking::delay::DelayMs,
    usb_pd::CcPin,
};

/// `Status0::bc_lvl` band below 200 mV, nothing attached
const BC_LVL_OPEN: u8 = 0b00;

impl<T: Transport, D: DelayMs<u32>> Fusb302b<T, D> {
    /// Measures CC1 then CC2, returning the first pin above the open band
    pub fn detect_cc(&mut self) -> Result<Option<CcPin>, Error> {
        for cc_pin in [CcPin::CC1, CcPin::CC2] {
            self.measure(cc_pin)?;
            self.delay.delay_ms(self.config.cc_settle_ms);

            let level = self.cc_level()?;
            trace!("{:?} level {}", cc_pin, level);

            if level > BC_LVL_OPEN {
                debug!("source on {:?}", cc_pin);
                return Ok(Some(cc_pin));
            }
        }

        Ok(None)
    }

    /// Routes measurement and the BMC transmitter to `cc_pin`
    pub fn enable_sink(&mut self, cc_pin: Option<CcPin>) -> Result<(), Error> {
        let cc_pin = cc_pin.ok_or(Error::NoCcPin)?;

        self.measure(cc_pin)?;
        self.registers.modify_switches1(|switches1| {
            let switches1 = without_transmitter(switches1);
            match cc_pin {
                CcPin::CC1 => switches1.with_txcc1(true),
                CcPin::CC2 => switches1.with_txcc2(true),
            }
        })?;

        self.cc_pin = Some(cc_pin);
        Ok(())
    }

    pub fn disable_sink(&mut self) -> Result<(), Error> {
        self.registers.modify_switches1(without_transmitter)?;
        self.registers.modify_switches0(without_measurement)?;

        self.cc_pin = None;
        Ok(())
    }

    /// Whether the comparator on `cc_pin` still sees a source
    pub fn cc_attached(&mut self, cc_pin: CcPin) -> Result<bool, Error> {
        if self.cc_pin != Some(cc_pin) {
            self.measure(cc_pin)?;
        }

        Ok(self.cc_level()? > BC_LVL_OPEN)
    }

    /// Pin routed by the last [`Self::enable_sink`]
    pub fn active_cc(&self) -> Option<CcPin> {
        self.cc_pin
    }

    /// Comparator level of the currently measured pin
    pub fn cc_level(&mut self) -> Result<u8, Error> {
        Ok(self.registers.status0()?.bc_lvl())
    }

    fn measure(&mut self, cc_pin: CcPin) -> Result<(), Error> {
        self.registers.modify_switches0(|switches0| {
            let switches0 = without_measurement(switches0);
            match cc_pin {
                CcPin::CC1 => switches0.with_meas_cc1(true),
                CcPin::CC2 => switches0.with_meas_cc2(true),
            }
        })
    }
}

fn without_measurement(switches0: Switches0) -> Switches0 {
    switches0.with_meas_cc1(false).with_meas_cc2(false)
}

fn without_transmitter(switches1: Switches1) -> Switches1 {
    switches1.with_txcc1(false).with_txcc2(false)
}

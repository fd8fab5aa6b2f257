//! I2C bit-banged over two GPIO pins
//!
//! For boards that wire the PHY to pins without an I2C peripheral. SDA is driven open drain style,
//! set high to release it.

use {
    crate::{
        transport::{Transport, DEVICE_ADDRESS},
        Error,
    },
    embedded_hal::{
        blocking::delay::DelayUs,
        digital::v2::{InputPin, OutputPin},
    },
};

/// Half clock periods to wait for the device to pull SDA low
const ACK_POLLS: u32 = 8;

pub struct BitBangTransport<SCL, SDA, D> {
    scl: SCL,
    sda: SDA,
    delay: D,
    half_period_us: u32,
    address: u8,
}

impl<SCL, SDA, D> BitBangTransport<SCL, SDA, D>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    D: DelayUs<u32>,
{
    pub fn new(scl: SCL, sda: SDA, delay: D, frequency_hz: u32) -> Self {
        Self {
            scl,
            sda,
            delay,
            half_period_us: (500_000 / frequency_hz.max(1)).max(1),
            address: DEVICE_ADDRESS,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    fn set_scl_high(&mut self) -> Result<(), Error> {
        self.scl.set_high().map_err(|_| Error::Bus)
    }

    fn set_scl_low(&mut self) -> Result<(), Error> {
        self.scl.set_low().map_err(|_| Error::Bus)
    }

    fn set_sda_high(&mut self) -> Result<(), Error> {
        self.sda.set_high().map_err(|_| Error::Bus)
    }

    fn set_sda_low(&mut self) -> Result<(), Error> {
        self.sda.set_low().map_err(|_| Error::Bus)
    }

    fn wait_for_clk(&mut self) {
        self.delay.delay_us(self.half_period_us);
    }

    fn start(&mut self) -> Result<(), Error> {
        self.set_sda_high()?;
        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_sda_low()?;
        self.wait_for_clk();

        self.set_scl_low()?;
        self.wait_for_clk();

        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.set_sda_low()?;
        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_sda_high()?;
        self.wait_for_clk();

        Ok(())
    }

    /// Clocks the ACK slot, polling a bounded number of times for the device to pull SDA low
    fn wait_ack(&mut self) -> Result<(), Error> {
        self.set_sda_high()?;
        self.set_scl_high()?;

        let mut acked = false;
        for _ in 0..ACK_POLLS {
            self.wait_for_clk();
            if self.sda.is_low().map_err(|_| Error::Bus)? {
                acked = true;
                break;
            }
        }

        self.set_scl_low()?;
        self.wait_for_clk();

        if acked {
            Ok(())
        } else {
            warn!("no ACK from {}", self.address);
            Err(Error::Bus)
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        for bit_offset in 0..8 {
            if (byte >> (7 - bit_offset)) & 0b1 == 1 {
                self.set_sda_high()?;
            } else {
                self.set_sda_low()?;
            }

            self.set_scl_high()?;
            self.wait_for_clk();

            self.set_scl_low()?;
            self.wait_for_clk();
        }

        self.wait_ack()
    }

    fn read_byte(&mut self, send_ack: bool) -> Result<u8, Error> {
        let mut byte: u8 = 0;

        self.set_sda_high()?;

        for bit_offset in 0..8 {
            self.set_scl_high()?;
            self.wait_for_clk();

            if self.sda.is_high().map_err(|_| Error::Bus)? {
                byte |= 1 << (7 - bit_offset);
            }

            self.set_scl_low()?;
            self.wait_for_clk();
        }

        if send_ack {
            self.set_sda_low()?;
        } else {
            self.set_sda_high()?;
        }

        self.set_scl_high()?;
        self.wait_for_clk();

        self.set_scl_low()?;
        self.set_sda_high()?;
        self.wait_for_clk();

        Ok(byte)
    }

    /// Runs `f` between a start and a stop condition, the stop is sent even if `f` fails
    fn transaction(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.start()?;
        let result = f(self);
        let stop = self.stop();
        result.and(stop)
    }
}

impl<SCL, SDA, D> Transport for BitBangTransport<SCL, SDA, D>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    D: DelayUs<u32>,
{
    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut buf = [0u8];
        self.read_burst(register, &mut buf)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.write_burst(register, &[value])
    }

    fn read_burst(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error> {
        let address = self.address;
        self.transaction(|bus| {
            bus.write_byte(address << 1)?;
            bus.write_byte(register)?;

            // repeated start
            bus.start()?;
            bus.write_byte((address << 1) | 0x1)?;

            let last = buf.len().saturating_sub(1);
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = bus.read_byte(i != last)?;
            }
            Ok(())
        })
    }

    fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), Error> {
        let address = self.address;
        self.transaction(|bus| {
            bus.write_byte(address << 1)?;
            bus.write_byte(register)?;
            data.iter().try_for_each(|byte| bus.write_byte(*byte))
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        core::convert::Infallible,
        std::{cell::RefCell, rc::Rc, vec::Vec},
    };

    /// Both lines plus a device that either always ACKs or is absent
    struct Line {
        scl: bool,
        sda: bool,
        device_present: bool,
        /// SDA level at every rising SCL edge
        samples: Vec<bool>,
    }

    type Shared = Rc<RefCell<Line>>;

    struct Scl(Shared);
    struct Sda(Shared);

    #[derive(Default)]
    struct CountingDelay(usize);

    impl OutputPin for Scl {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.borrow_mut().scl = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            let mut line = self.0.borrow_mut();
            if !line.scl {
                let sda = line.sda;
                line.samples.push(sda);
            }
            line.scl = true;
            Ok(())
        }
    }

    impl OutputPin for Sda {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.borrow_mut().sda = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.borrow_mut().sda = true;
            Ok(())
        }
    }

    impl InputPin for Sda {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Self::Error> {
            self.is_low().map(|low| !low)
        }

        fn is_low(&self) -> Result<bool, Self::Error> {
            let line = self.0.borrow();
            Ok(!line.sda || line.device_present)
        }
    }

    impl DelayUs<u32> for CountingDelay {
        fn delay_us(&mut self, _us: u32) {
            self.0 += 1;
        }
    }

    fn bus(device_present: bool) -> (Shared, BitBangTransport<Scl, Sda, CountingDelay>) {
        let line = Rc::new(RefCell::new(Line {
            scl: true,
            sda: true,
            device_present,
            samples: Vec::new(),
        }));
        let transport = BitBangTransport::new(
            Scl(line.clone()),
            Sda(line.clone()),
            CountingDelay::default(),
            100_000,
        );
        (line, transport)
    }

    /// Clocked bits of one byte followed by the released ACK slot
    fn clocked(byte: u8) -> Vec<bool> {
        let mut bits: Vec<bool> = (0..8).map(|i| (byte >> (7 - i)) & 1 == 1).collect();
        bits.push(true);
        bits
    }

    #[test]
    fn register_write_clocks_address_register_value() {
        let (line, mut transport) = bus(true);

        transport.write_register(0x0b, 0x0f).unwrap();

        let mut expected = clocked(0x22 << 1);
        expected.extend(clocked(0x0b));
        expected.extend(clocked(0x0f));
        // stop
        expected.push(false);

        assert_eq!(line.borrow().samples, expected);
        assert!(line.borrow().scl);
        assert!(line.borrow().sda);
    }

    #[test]
    fn missing_device_is_bus_error() {
        let (line, mut transport) = bus(false);

        assert_eq!(transport.write_register(0x0b, 0x0f), Err(Error::Bus));

        // the transaction ends after the address byte and the bus is released
        assert_eq!(line.borrow().samples.len(), 9 + 1);
        assert!(line.borrow().sda);

        let (_, _, delay) = transport.release();
        assert!(delay.0 < 64);
    }

    #[test]
    fn read_returns_sampled_byte() {
        let (_, mut transport) = bus(true);

        // the simulated device holds SDA low
        assert_eq!(transport.read_register(0x01), Ok(0x00));
    }

    #[test]
    fn half_period_from_frequency() {
        let (_, transport) = bus(true);
        assert_eq!(transport.half_period_us, 5);

        let (line, _) = bus(true);
        let slow = BitBangTransport::new(
            Scl(line.clone()),
            Sda(line),
            CountingDelay::default(),
            0,
        );
        assert_eq!(slow.half_period_us, 500_000);
    }
}

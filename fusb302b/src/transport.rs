//! Register access to the PHY

use {
    crate::Error,
    embedded_hal::blocking::i2c::{Write, WriteRead},
    heapless::Vec,
};

/// Default 7-bit I2C address of the FUSB302B
pub const DEVICE_ADDRESS: u8 = 0x22;

/// Largest burst written in one transaction, register address included
const MAX_WRITE: usize = 64;

/// Byte level access to the register file
///
/// Bursts auto-increment the register address, except on the FIFO register where every byte goes
/// to the same address.
pub trait Transport {
    fn read_register(&mut self, register: u8) -> Result<u8, Error>;

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error>;

    fn read_burst(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error>;

    fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), Error>;
}

/// Transport over a hardware I2C peripheral
pub struct I2cTransport<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> I2cTransport<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEVICE_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> Transport for I2cTransport<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut buf = [0u8];
        self.read_burst(register, &mut buf)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|_| Error::Bus)
    }

    fn read_burst(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .map_err(|_| Error::Bus)
    }

    fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), Error> {
        let mut staging = Vec::<u8, MAX_WRITE>::new();
        staging.push(register).map_err(|_| Error::BufferOverflow)?;
        staging
            .extend_from_slice(data)
            .map_err(|_| Error::BufferOverflow)?;

        self.i2c
            .write(self.address, &staging)
            .map_err(|_| Error::Bus)
    }
}

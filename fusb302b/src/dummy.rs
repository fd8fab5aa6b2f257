//! Simulated register file for testing the driver without hardware
use std::{collections::VecDeque, vec::Vec};

use {
    crate::{registers::Register, transport::Transport, Error},
    embedded_hal::blocking::delay::DelayMs,
};

const REGISTER_COUNT: usize = Register::Fifo as usize + 1;

/// Register file behind a fake bus
///
/// `Status0::bc_lvl` follows `cc_levels` for whichever pin `Switches0` measures,
/// `Status1::rx_empty` follows `rx_fifo`. Interrupt registers clear on read.
pub struct DummyTransport {
    registers: [u8; REGISTER_COUNT],
    /// BC_LVL seen on CC1 and CC2
    pub cc_levels: [u8; 2],
    pub rx_fifo: VecDeque<u8>,
    /// Every write to the FIFO register
    pub fifo_bursts: Vec<Vec<u8>>,
    /// Every write to a register other than the FIFO
    pub writes: Vec<(u8, u8)>,
    /// Every access fails while set
    pub fail: bool,
    /// Accesses after this many fail
    pub fail_after: Option<usize>,
    accesses: usize,
}

impl Default for DummyTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyTransport {
    pub fn new() -> Self {
        let mut registers = [0; REGISTER_COUNT];
        for (register, value) in [
            (Register::DeviceId, 0x91),
            (Register::Switches0, 0x03),
            (Register::Switches1, 0x20),
            (Register::Slice, 0x60),
            (Register::Control0, 0x24),
            (Register::Control3, 0x06),
            (Register::Power, 0x01),
            (Register::Status1, 0x28),
        ] {
            registers[register as usize] = value;
        }

        Self {
            registers,
            cc_levels: [0; 2],
            rx_fifo: VecDeque::new(),
            fifo_bursts: Vec::new(),
            writes: Vec::new(),
            fail: false,
            fail_after: None,
            accesses: 0,
        }
    }

    /// Raw stored value, without side effects
    pub fn register(&self, register: u8) -> u8 {
        self.registers[usize::from(register)]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[usize::from(register)] = value;
    }

    fn access(&mut self) -> Result<(), Error> {
        self.accesses += 1;
        let exhausted = self
            .fail_after
            .map_or(false, |limit| self.accesses > limit);

        if self.fail || exhausted {
            Err(Error::Bus)
        } else {
            Ok(())
        }
    }

    fn peek(&mut self, register: u8) -> u8 {
        const STATUS0: u8 = Register::Status0 as u8;
        const STATUS1: u8 = Register::Status1 as u8;
        const FIFO: u8 = Register::Fifo as u8;
        const INTERRUPTA: u8 = Register::InterruptA as u8;
        const INTERRUPTB: u8 = Register::InterruptB as u8;
        const INTERRUPT: u8 = Register::Interrupt as u8;

        match register {
            FIFO => self.rx_fifo.pop_front().unwrap_or(0),
            STATUS0 => {
                let switches0 = self.register(Register::Switches0 as u8);
                let level = if switches0 & 0x04 != 0 {
                    self.cc_levels[0]
                } else if switches0 & 0x08 != 0 {
                    self.cc_levels[1]
                } else {
                    0
                };
                (self.register(register) & !0b11) | (level & 0b11)
            }
            STATUS1 => {
                let rx_empty = if self.rx_fifo.is_empty() { 0x20 } else { 0 };
                (self.register(register) & !0x20) | rx_empty
            }
            INTERRUPTA | INTERRUPTB | INTERRUPT => {
                let value = self.register(register);
                self.set_register(register, 0);
                value
            }
            _ => self.register(register),
        }
    }
}

impl Transport for DummyTransport {
    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        self.access()?;
        Ok(self.peek(register))
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.write_burst(register, &[value])
    }

    fn read_burst(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.access()?;
        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = if register == Register::Fifo as u8 {
                self.peek(register)
            } else {
                self.peek(register + offset as u8)
            };
        }
        Ok(())
    }

    fn write_burst(&mut self, register: u8, data: &[u8]) -> Result<(), Error> {
        self.access()?;
        if register == Register::Fifo as u8 {
            self.fifo_bursts.push(data.to_vec());
            return Ok(());
        }

        for (offset, value) in data.iter().enumerate() {
            let register = register + offset as u8;
            self.writes.push((register, *value));
            self.set_register(register, *value);
        }
        Ok(())
    }
}

/// Records requested delays instead of waiting
#[derive(Default)]
pub struct DummyDelay {
    pub calls: Vec<u32>,
}

impl DelayMs<u32> for DummyDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls.push(ms);
    }
}

//! PD messages to and from the FIFO token stream

use {
    crate::{
        registers::{Control0, Registers},
        transport::Transport,
        Error,
    },
    byteorder::{ByteOrder, LittleEndian},
    heapless::Vec,
    usb_pd::{
        header::Header,
        message::{Message, MAX_DATA_OBJECTS},
        token::{RxToken, Token},
    },
};

/// Depth of the receive FIFO, the most bytes skipped while looking for a SOP token
pub const RX_FIFO_SIZE: usize = 80;

/// SOP preamble, packsym, header, data objects and the four trailing tokens
pub const MAX_ENCODED: usize = 4 + 1 + 2 + 4 * MAX_DATA_OBJECTS + 4;

/// Token stream that transmits `message`
pub fn encode(message: &Message) -> Vec<u8, MAX_ENCODED> {
    let num_objects = message.data_objects.len();
    let mut buf = [0u8; MAX_ENCODED];

    buf[..5].copy_from_slice(&[
        Token::Sop1 as u8,
        Token::Sop1 as u8,
        Token::Sop1 as u8,
        Token::Sop2 as u8,
        Token::pack_sym((2 + 4 * num_objects) as u8),
    ]);
    message.header.to_bytes(&mut buf[5..7]);

    let mut len = 7;
    for object in &message.data_objects {
        LittleEndian::write_u32(&mut buf[len..len + 4], *object);
        len += 4;
    }

    buf[len..len + 4].copy_from_slice(&[
        Token::JamCrc as u8,
        Token::Eop as u8,
        Token::TxOff as u8,
        Token::TxOn as u8,
    ]);
    len += 4;

    buf[..len].iter().copied().collect()
}

impl<T: Transport> Registers<T> {
    /// Writes `message` to the TX FIFO in one burst and starts the transmitter
    pub fn transmit(&mut self, message: &Message) -> Result<(), Error> {
        let tokens = encode(message);
        trace!("tx {:?}", message.header);

        self.write_fifo(&tokens)?;
        self.pulse_control0(|control0: Control0| control0.with_tx_start(true))
    }

    /// Reads one message from the RX FIFO
    ///
    /// Returns `None` if the FIFO runs empty before a SOP token turns up.
    pub fn receive(&mut self) -> Result<Option<Message>, Error> {
        if !self.find_sop()? {
            return Ok(None);
        }

        let mut buf = [0u8; 2];
        self.read_fifo(&mut buf)?;
        let header = Header::from_bytes(&buf);

        let mut objects = [0u32; MAX_DATA_OBJECTS];
        let num_objects = usize::from(header.num_objects()).min(MAX_DATA_OBJECTS);
        for object in objects.iter_mut().take(num_objects) {
            let mut buf = [0u8; 4];
            self.read_fifo(&mut buf)?;
            *object = LittleEndian::read_u32(&buf);
        }

        let mut buf = [0u8; 4];
        self.read_fifo(&mut buf)?;

        let mut message = Message::new(header, &objects[..num_objects]);
        message.crc32 = LittleEndian::read_u32(&buf);
        Ok(Some(message))
    }

    fn find_sop(&mut self) -> Result<bool, Error> {
        for _ in 0..RX_FIFO_SIZE {
            let token = self.read_fifo_byte()?;
            if RxToken::from(token) == RxToken::Sop {
                return Ok(true);
            }

            trace!("skipped token {}", token);
            if self.status1()?.rx_empty() {
                break;
            }
        }

        debug!("no SOP in RX FIFO");
        Ok(false)
    }
}

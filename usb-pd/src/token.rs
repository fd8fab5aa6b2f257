//! FIFO tokens of the FUSB302 family

/// Tokens written to the TX FIFO around a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Token {
    TxOn = 0xa1,
    Sop1 = 0x12,
    Sop2 = 0x13,
    Reset1 = 0x15,
    Reset2 = 0x16,
    /// Low bits carry the number of bytes that follow
    PackSym = 0x80,
    JamCrc = 0xff,
    Eop = 0x14,
    TxOff = 0xfe,
}

impl Token {
    /// SOP3 shares its encoding with `Eop`
    pub const SOP3: u8 = 0x14;

    /// `PackSym` token announcing `len` payload bytes
    pub const fn pack_sym(len: u8) -> u8 {
        Token::PackSym as u8 | (len & 0x1f)
    }
}

impl From<Token> for u8 {
    fn from(token: Token) -> u8 {
        token as u8
    }
}

/// Class of a token read back from the RX FIFO, held in the upper three bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxToken {
    Sop,
    SopPrime,
    SopDoublePrime,
    SopPrimeDebug,
    SopDoublePrimeDebug,
    Other,
}

impl RxToken {
    const MASK: u8 = 0xe0;
}

impl From<u8> for RxToken {
    fn from(value: u8) -> Self {
        match value & Self::MASK {
            0xe0 => Self::Sop,
            0xc0 => Self::SopPrime,
            0xa0 => Self::SopDoublePrime,
            0x80 => Self::SopPrimeDebug,
            0x60 => Self::SopDoublePrimeDebug,
            _ => Self::Other,
        }
    }
}

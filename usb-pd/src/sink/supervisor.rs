//! Retry and timeout supervision of the message in flight

use {
    super::State,
    crate::{message::Message, Duration, Instant},
};

/// Message id used after a reset, 0 and 1 are left out
pub const RESET_MESSAGE_ID: u8 = 2;

/// Message ids wrap after 3 bits
const MESSAGE_ID_MODULUS: u8 = 8;

/// Called on GoodCRC for the message in flight, returns the next state
pub type OnAcknowledged = fn(&Message) -> State;

/// Outcome of a supervision check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    /// Nothing in flight or still within the timeout
    Wait,
    /// Timed out with retries left, resend the pending message
    Retry,
    /// Timed out and the retry budget is spent
    Exhausted,
}

/// Transmit side of the protocol layer
#[derive(Clone)]
pub struct TxContext {
    next_message_id: u8,
    pending: Option<Message>,
    on_acknowledged: Option<OnAcknowledged>,
    sent_at: Instant,
    send_attempts: u8,
    retry_count: u8,
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TxContext {
    pub const fn new() -> Self {
        Self {
            next_message_id: 0,
            pending: None,
            on_acknowledged: None,
            sent_at: Instant::from_ticks(0),
            send_attempts: 0,
            retry_count: 0,
        }
    }

    /// Drops the message in flight and restarts ids at [`RESET_MESSAGE_ID`]
    pub fn reset(&mut self) {
        *self = Self {
            next_message_id: RESET_MESSAGE_ID,
            ..Self::new()
        };
    }

    /// Id the next transmission will carry
    pub fn message_id(&self) -> u8 {
        self.next_message_id
    }

    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    pub fn send_attempts(&self) -> u8 {
        self.send_attempts
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }

    /// Records a successful first transmission of `message`, which gets the full retry budget
    pub fn sent(
        &mut self,
        now: Instant,
        message: Message,
        on_acknowledged: Option<OnAcknowledged>,
    ) {
        self.next_message_id = (self.next_message_id + 1) % MESSAGE_ID_MODULUS;
        self.pending = Some(message);
        self.on_acknowledged = on_acknowledged;
        self.sent_at = now;
        self.send_attempts = 1;
        self.retry_count = 0;
    }

    /// Records a successful resend of the pending message
    pub fn retried(&mut self, now: Instant) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.send_attempts = 1;
        self.sent_at = now;
    }

    /// Stops supervising without forgetting the message id
    pub fn disarm(&mut self) {
        self.send_attempts = 0;
        self.retry_count = 0;
    }

    /// GoodCRC arrived, returns the acknowledgement callback if one was registered
    pub fn acknowledge(&mut self) -> Option<OnAcknowledged> {
        self.disarm();
        self.pending = None;
        self.on_acknowledged.take()
    }

    pub fn check(&self, now: Instant, timeout: Duration, max_retries: u8) -> Verdict {
        if self.send_attempts == 0 || self.pending.is_none() {
            return Verdict::Wait;
        }

        let Some(elapsed) = now.checked_duration_since(self.sent_at) else {
            return Verdict::Wait;
        };

        if elapsed <= timeout {
            Verdict::Wait
        } else if self.retry_count < max_retries {
            Verdict::Retry
        } else {
            Verdict::Exhausted
        }
    }
}

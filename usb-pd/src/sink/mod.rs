//! Sink side negotiation engine
//!
//! [`Sink::tick`] is polled from the main loop. Each tick reads the PHY status once,
//! follows attach/detach of the CC line, supervises the message in flight and runs
//! one step of the negotiation state machine:
//!
//! ```text
//! Disabled -> Reset -> Idle <-> Rx
//!             ^
//! HardReset --+
//! ```

use {
    crate::{
        capabilities::{Contract, PowerCapabilities, SelectionPolicy},
        header::{ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision},
        message::Message,
        CcPin, DataRole, Duration, Instant, PowerRole,
    },
    core::fmt::Debug,
};

mod supervisor;


pub use supervisor::{OnAcknowledged, TxContext, Verdict, RESET_MESSAGE_ID};

/// PHY operations the engine relies on
///
/// Every fallible call is a register bus access. An error aborts the current tick.
pub trait Driver {
    type Error: Debug;

    /// Measures CC1 then CC2, returns the first pin seeing a source
    fn detect_cc(&mut self) -> Result<Option<CcPin>, Self::Error>;

    /// Routes the BMC transceiver to `cc_pin`
    fn enable_sink(&mut self, cc_pin: Option<CcPin>) -> Result<(), Self::Error>;

    fn disable_sink(&mut self) -> Result<(), Self::Error>;

    /// Whether the comparator on `cc_pin` still sees a source
    fn cc_attached(&mut self, cc_pin: CcPin) -> Result<bool, Self::Error>;

    /// Reads (and thereby clears) interrupt and status registers
    fn status(&mut self) -> Result<PhyStatus, Self::Error>;

    /// Signals Hard Reset on the wire
    fn send_hard_reset(&mut self) -> Result<(), Self::Error>;

    /// Resets the PD logic of the PHY (soft reset)
    fn reset_pd_logic(&mut self) -> Result<(), Self::Error>;

    fn flush_rx(&mut self) -> Result<(), Self::Error>;

    fn flush_tx(&mut self) -> Result<(), Self::Error>;

    /// Next message from the RX FIFO, `None` if no SOP was found before it ran empty
    fn receive(&mut self) -> Result<Option<Message>, Self::Error>;

    fn transmit(&mut self, message: &Message) -> Result<(), Self::Error>;

    fn delay_ms(&mut self, ms: u32);
}

/// Interrupt and status flags captured by [`Driver::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhyStatus {
    pub hard_reset_received: bool,
    pub soft_reset_received: bool,
    /// GoodCRC was sent in response to a received message
    pub good_crc_sent: bool,
    pub tx_sent: bool,
    pub hard_reset_sent: bool,
    pub retry_failed: bool,
    pub soft_reset_failed: bool,
    pub collision: bool,
    pub alert: bool,
    /// BC_LVL comparator output changed
    pub cc_level_changed: bool,
    pub rx_empty: bool,
    pub rx_full: bool,
    pub tx_empty: bool,
    pub tx_full: bool,
}

impl Default for PhyStatus {
    fn default() -> Self {
        Self {
            hard_reset_received: false,
            soft_reset_received: false,
            good_crc_sent: false,
            tx_sent: false,
            hard_reset_sent: false,
            retry_failed: false,
            soft_reset_failed: false,
            collision: false,
            alert: false,
            cc_level_changed: false,
            rx_empty: true,
            rx_full: false,
            tx_empty: true,
            tx_full: false,
        }
    }
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No traffic until enabled
    Disabled,
    /// Signal Hard Reset, then continue with `Reset`
    HardReset,
    /// Reset PD logic and FIFOs, ask for source capabilities
    Reset,
    /// Waiting for traffic
    Idle,
    /// A message is waiting in the RX FIFO
    Rx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionState {
    pub cc_pin: Option<CcPin>,
    pub attached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxContext {
    pub last_message_id: u8,
    pub has_unread_data: bool,
}

/// Negotiation progress as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    #[default]
    Waiting,
    Attached,
    CapabilitiesReceived,
    /// Request sent, capabilities can be read
    CapabilitiesParsed,
    Accepted,
    PowerReady,
    Rejected,
}

impl Progress {
    pub fn step(&self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Attached => 1,
            Self::CapabilitiesReceived => 2,
            Self::CapabilitiesParsed => 3,
            Self::Accepted => 4,
            Self::PowerReady => 5,
            Self::Rejected => 99,
        }
    }
}

/// Sink events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A source was detected on a CC pin
    Attached(CcPin),
    /// The source went away
    Detached,
    /// Source capabilities with the given number of PDOs were stored
    SourceCapabilities(u8),
    /// Requested power has been accepted (but not ready yet)
    PowerAccepted,
    /// Requested power has been rejected
    PowerRejected,
    /// Requested power is now ready
    PowerReady,
    /// PD logic was reset and source capabilities requested
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Time to wait for GoodCRC before resending
    pub request_timeout: Duration,
    /// Resends before falling back to `Reset`
    pub max_retries: u8,
    /// Upper limit of the requested operating current
    pub request_max_current_ma: u32,
    /// Which PDO to request, [`SelectionPolicy::FirstFixed`] unless set
    pub selection_policy: SelectionPolicy,
    /// Pause before a Request is transmitted
    pub request_delay_ms: u32,
    /// Revision placed in outgoing headers
    pub spec_revision: SpecificationRevision,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::millis(1000),
            max_retries: 3,
            request_max_current_ma: 1500,
            selection_policy: SelectionPolicy::FirstFixed,
            request_delay_ms: 1,
            spec_revision: SpecificationRevision::R2_0,
        }
    }
}

pub struct Sink<DRIVER> {
    driver: DRIVER,
    config: Config,
    state: State,
    connection: ConnectionState,
    tx: TxContext,
    rx: RxContext,
    capabilities: PowerCapabilities,
    progress: Progress,
    /// Built with the last Request
    requested_contract: Option<Contract>,
    /// Confirmed by PS_RDY
    active_contract: Option<Contract>,
}

impl<DRIVER: Driver> Sink<DRIVER> {
    pub fn new(driver: DRIVER, config: Config) -> Self {
        let mut tx = TxContext::new();
        tx.reset();

        Self {
            driver,
            config,
            state: State::Disabled,
            connection: ConnectionState::default(),
            tx,
            rx: RxContext::default(),
            capabilities: PowerCapabilities::new(),
            progress: Progress::Waiting,
            requested_contract: None,
            active_contract: None,
        }
    }

    /// Runs one step of the engine. Never blocks apart from the CC settle time
    /// and the pause before a Request.
    ///
    /// On error nothing has been committed; call again on the next tick.
    pub fn tick(&mut self, now: Instant) -> Result<Option<Event>, DRIVER::Error> {
        let status = self.driver.status()?;

        if let Some(event) = self.update_connection(now, &status)? {
            return Ok(Some(event));
        }

        if self.state == State::Disabled {
            return Ok(None);
        }

        if status.hard_reset_received {
            warn!("hard reset received");
            self.tx.reset();
            self.rx = RxContext::default();
            self.set_state(State::Reset);
        }

        if self.state == State::Idle {
            match self.tx.check(now, self.config.request_timeout, self.config.max_retries) {
                Verdict::Wait => {}
                Verdict::Retry => {
                    self.retry(now)?;
                    return Ok(None);
                }
                Verdict::Exhausted => {
                    warn!(
                        "no GoodCRC after {} retries, resetting",
                        self.config.max_retries
                    );
                    self.set_state(State::Reset);
                    return Ok(None);
                }
            }
        }

        log_diagnostics(&status);

        // a pending reset outranks the received message
        if status.good_crc_sent && !matches!(self.state, State::Reset | State::HardReset) {
            self.set_state(State::Rx);
        }

        self.rx.has_unread_data = !status.rx_empty;
        if self.rx.has_unread_data && self.state == State::Idle {
            self.set_state(State::Rx);
        }

        match self.state {
            State::Disabled => Ok(None),
            State::HardReset => {
                self.driver.send_hard_reset()?;
                self.tx.reset();
                self.driver.delay_ms(1);
                self.set_state(State::Reset);
                Ok(None)
            }
            State::Reset => self.reset(now),
            State::Idle => {
                if !status.tx_empty && !status.tx_full {
                    trace!("TX FIFO holds data");
                }
                Ok(None)
            }
            State::Rx => self.receive(now),
        }
    }

    /// Starts negotiating: clears all protocol state and asks for source capabilities
    pub fn enable(&mut self, now: Instant) -> Result<(), DRIVER::Error> {
        self.rx = RxContext::default();
        self.tx.reset();
        self.clear_negotiation();
        self.progress = Progress::Attached;

        self.send_new(
            now,
            MessageType::Control(ControlMessageType::GetSourceCap),
            &[],
            None,
        )
    }

    /// Stops all traffic and resets the PD logic of the PHY
    pub fn disable(&mut self) -> Result<(), DRIVER::Error> {
        self.deinit();
        self.quiesce_phy()
    }

    /// Signals Hard Reset on the next tick
    pub fn request_hard_reset(&mut self) {
        if self.state == State::Disabled {
            warn!("hard reset requested while disabled");
            return;
        }

        self.set_state(State::HardReset);
    }

    /// Transmits a message with the next message id and supervises it.
    /// Returns the id used.
    pub fn send(
        &mut self,
        now: Instant,
        message_type: MessageType,
        data_objects: &[u32],
        on_acknowledged: Option<OnAcknowledged>,
    ) -> Result<u8, DRIVER::Error> {
        let id = self.tx.message_id();
        self.send_new(now, message_type, data_objects, on_acknowledged)?;
        Ok(id)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn capabilities(&self) -> &PowerCapabilities {
        &self.capabilities
    }

    pub fn requested_contract(&self) -> Option<Contract> {
        self.requested_contract
    }

    pub fn active_contract(&self) -> Option<Contract> {
        self.active_contract
    }

    pub fn tx(&self) -> &TxContext {
        &self.tx
    }

    pub fn rx(&self) -> RxContext {
        self.rx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &DRIVER {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut DRIVER {
        &mut self.driver
    }

    pub fn release(self) -> DRIVER {
        self.driver
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn deinit(&mut self) {
        self.set_state(State::Disabled);
        self.rx = RxContext::default();
        self.tx.reset();
        self.clear_negotiation();
        self.progress = Progress::Waiting;
    }

    fn quiesce_phy(&mut self) -> Result<(), DRIVER::Error> {
        self.driver.reset_pd_logic()?;
        self.driver.flush_rx()?;
        self.driver.flush_tx()
    }

    fn clear_negotiation(&mut self) {
        self.capabilities.clear();
        self.requested_contract = None;
        self.active_contract = None;
    }

    fn header_template(&self) -> Header {
        Header::new_template(PowerRole::Sink, DataRole::Ufp, self.config.spec_revision)
    }

    fn update_connection(
        &mut self,
        now: Instant,
        status: &PhyStatus,
    ) -> Result<Option<Event>, DRIVER::Error> {
        match self.connection.cc_pin {
            None => {
                let Some(cc_pin) = self.driver.detect_cc()? else {
                    return Ok(None);
                };

                self.driver.enable_sink(Some(cc_pin))?;
                self.enable(now)?;
                self.connection = ConnectionState {
                    cc_pin: Some(cc_pin),
                    attached: true,
                };

                info!("attached on {:?}", cc_pin);
                Ok(Some(Event::Attached(cc_pin)))
            }
            Some(cc_pin) if status.cc_level_changed => {
                if self.driver.cc_attached(cc_pin)? {
                    return Ok(None);
                }

                // the level change is consumed, forget the pin before touching the bus
                self.connection = ConnectionState::default();
                self.deinit();
                info!("detached from {:?}", cc_pin);

                self.driver.disable_sink()?;
                self.quiesce_phy()?;

                Ok(Some(Event::Detached))
            }
            Some(_) => Ok(None),
        }
    }

    /// Hands a fresh message to the PHY. Nothing changes if the transmit fails.
    fn send_new(
        &mut self,
        now: Instant,
        message_type: MessageType,
        data_objects: &[u32],
        on_acknowledged: Option<OnAcknowledged>,
    ) -> Result<(), DRIVER::Error> {
        let header = Header::new(self.header_template(), self.tx.message_id(), message_type, 0);
        let message = Message::new(header, data_objects);

        self.driver.transmit(&message)?;

        debug!(
            "TX id {} {:?} objects {}",
            message.message_id(),
            message.message_type(),
            message.num_objects()
        );

        self.tx.sent(now, message, on_acknowledged);
        self.set_state(State::Idle);
        Ok(())
    }

    fn retry(&mut self, now: Instant) -> Result<(), DRIVER::Error> {
        if let Some(message) = self.tx.pending() {
            self.driver.transmit(message)?;
            warn!(
                "no GoodCRC for id {}, retry {}",
                message.message_id(),
                self.tx.retry_count() + 1
            );
        }

        self.tx.retried(now);
        Ok(())
    }

    fn reset(&mut self, now: Instant) -> Result<Option<Event>, DRIVER::Error> {
        self.driver.reset_pd_logic()?;
        self.driver.flush_rx()?;
        self.driver.flush_tx()?;

        self.clear_negotiation();
        self.progress = if self.connection.attached {
            Progress::Attached
        } else {
            Progress::Waiting
        };

        self.send_new(
            now,
            MessageType::Control(ControlMessageType::GetSourceCap),
            &[],
            None,
        )?;
        self.tx.disarm();

        Ok(Some(Event::Reset))
    }

    fn receive(&mut self, now: Instant) -> Result<Option<Event>, DRIVER::Error> {
        if !self.rx.has_unread_data {
            self.set_state(State::Idle);
            return Ok(None);
        }

        let Some(message) = self.driver.receive()? else {
            warn!("RX FIFO empty before SOP");
            self.set_state(State::Reset);
            return Ok(None);
        };

        self.rx.last_message_id = message.message_id();

        debug!(
            "RX id {} {:?} objects {}",
            message.message_id(),
            message.message_type(),
            message.num_objects()
        );

        let (state, event) = self.process(now, &message)?;
        self.set_state(state);
        Ok(event)
    }

    fn process(
        &mut self,
        now: Instant,
        message: &Message,
    ) -> Result<(State, Option<Event>), DRIVER::Error> {
        match message.message_type() {
            MessageType::Control(ControlMessageType::GoodCRC) => {
                let state = match self.tx.acknowledge() {
                    Some(on_acknowledged) => on_acknowledged(message),
                    None => State::Idle,
                };
                Ok((state, None))
            }
            MessageType::Control(ControlMessageType::Accept) => {
                info!("request accepted");
                self.tx.disarm();
                self.progress = Progress::Accepted;
                Ok((State::Idle, Some(Event::PowerAccepted)))
            }
            MessageType::Control(ControlMessageType::Reject) => {
                warn!("request rejected");
                self.tx.disarm();
                self.requested_contract = None;
                self.progress = Progress::Rejected;
                Ok((State::Idle, Some(Event::PowerRejected)))
            }
            MessageType::Control(ControlMessageType::PsRdy) => {
                self.active_contract = self.requested_contract;
                self.progress = Progress::PowerReady;
                if let Some(contract) = self.active_contract {
                    info!(
                        "power ready: {} mV {} mA",
                        contract.voltage_mv,
                        contract.current_ma
                    );
                }
                Ok((State::Idle, Some(Event::PowerReady)))
            }
            MessageType::Control(ControlMessageType::SoftReset) => {
                warn!("soft reset received");
                Ok((State::Reset, None))
            }
            MessageType::Control(other) => {
                debug!("ignoring control {:?}", other);
                Ok((State::Idle, None))
            }
            MessageType::Data(DataMessageType::SourceCapabilities) => {
                self.on_source_capabilities(now, message)
            }
            MessageType::Data(other) => {
                debug!("ignoring data {:?}", other);
                Ok((State::Idle, None))
            }
        }
    }

    fn on_source_capabilities(
        &mut self,
        now: Instant,
        message: &Message,
    ) -> Result<(State, Option<Event>), DRIVER::Error> {
        if message.num_objects() == 0 {
            warn!("source capabilities without PDOs");
            return Ok((State::Reset, None));
        }

        let count = self.capabilities.store(&message.data_objects) as u8;
        self.progress = Progress::CapabilitiesReceived;
        let event = Some(Event::SourceCapabilities(count));

        if self.capabilities.select(self.config.selection_policy).is_none() {
            warn!("no fixed supply offered");
            return Ok((State::Idle, event));
        }

        let Some((rdo, contract)) = self
            .capabilities
            .build_request(self.config.request_max_current_ma)
        else {
            return Ok((State::Idle, event));
        };

        self.driver.delay_ms(self.config.request_delay_ms);

        // the capabilities are already out of the FIFO, start over if the Request cannot go out
        if let Err(error) = self.send_new(
            now,
            MessageType::Data(DataMessageType::Request),
            &[rdo.0],
            None,
        ) {
            warn!("request not sent, resetting");
            self.set_state(State::Reset);
            return Err(error);
        }

        info!(
            "requesting PDO {}: {} mV {} mA",
            contract.object_position,
            contract.voltage_mv,
            contract.current_ma
        );

        self.requested_contract = Some(contract);
        self.progress = Progress::CapabilitiesParsed;

        Ok((State::Idle, event))
    }
}

fn log_diagnostics(status: &PhyStatus) {
    if status.soft_reset_failed {
        warn!("soft reset failed");
    }
    if status.retry_failed {
        warn!("retries failed");
    }
    if status.hard_reset_sent {
        debug!("hard reset sent");
    }
    if status.tx_sent {
        trace!("tx sent");
    }
    if status.soft_reset_received {
        debug!("soft reset received by PHY");
    }
    if status.collision {
        warn!("collision");
    }
    if status.alert {
        warn!("alert");
    }
    if status.rx_full {
        trace!("RX FIFO full");
    }
}

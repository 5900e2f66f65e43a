//! Advertising state machine and the payload fuzz cycle

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AdvertiseFailureCode;
use crate::payload::{mutate, BaseTemplate, FuzzCounter, Hex};
use crate::{Advertisement, Radio, Result, Uuid};

/// Snapshot of the controller for status display
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerState {
    /// A scan session is running
    pub scanning: bool,
    /// The payload is being broadcast
    pub advertising: bool,
    /// The fuzz cycle is enabled
    pub fuzzing: bool,
    /// Current fuzz counter
    pub counter: FuzzCounter,
    /// The payload most recently handed to the radio
    pub payload: Vec<u8>,
}

impl ControllerState {
    /// `SCAN: ON | TX: OFF | FUZZ: OFF`
    pub fn status_line(&self) -> String {
        let on_off = |b: bool| if b { "ON" } else { "OFF" };
        format!(
            "SCAN: {} | TX: {} | FUZZ: {}",
            on_off(self.scanning),
            on_off(self.advertising),
            on_off(self.fuzzing)
        )
    }

    /// `FUZZ_VAL: 0x0001 DATA: 015838373030324650340001...`, or `FUZZ_VAL: DISABLED`
    pub fn fuzz_status(&self) -> String {
        if self.fuzzing {
            fuzz_status(self.counter, &self.payload)
        } else {
            "FUZZ_VAL: DISABLED".to_string()
        }
    }
}

fn fuzz_status(counter: FuzzCounter, payload: &[u8]) -> String {
    let head = &payload[..payload.len().min(12)];
    format!("FUZZ_VAL: {} DATA: {}...", counter, Hex(head))
}

/// Result of [`AdvertisementController::stop_advertising`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopOutcome {
    /// The broadcast was stopped
    Stopped,
    /// Nothing was being broadcast
    AlreadyIdle,
}

/// A pending mutation tick. Dropping the handle cancels the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledTick {
    deadline: Instant,
    // The first tick after fuzzing is switched on re-seeds at the reset counter instead of advancing it.
    advance: bool,
}

/// The advertising state machine.
///
/// States are idle and advertising, with an independent fuzz flag. While both advertising and fuzzing, a tick
/// fires every fuzz interval that restarts the broadcast with the next mutated payload. The controller does no
/// timing itself: the owner waits for [`next_tick`][Self::next_tick] and then calls [`tick`][Self::tick].
#[derive(Debug)]
pub struct AdvertisementController {
    template: BaseTemplate,
    service_uuid: Uuid,
    connectable: bool,
    include_tx_power: bool,
    interval: Duration,

    advertising: bool,
    fuzzing: bool,
    counter: FuzzCounter,
    payload: Vec<u8>,
    tick: Option<ScheduledTick>,
}

impl AdvertisementController {
    /// Creates an idle controller.
    ///
    /// Fails with a configuration error if `config` does not validate.
    pub fn new(config: &Config) -> Result<Self> {
        let template = config.validate()?;
        Ok(AdvertisementController {
            payload: template.to_payload(),
            template,
            service_uuid: config.service_uuid,
            connectable: config.connectable,
            include_tx_power: config.include_tx_power,
            interval: config.fuzz_interval,
            advertising: false,
            fuzzing: false,
            counter: FuzzCounter::default(),
            tick: None,
        })
    }

    /// Returns `true` while the payload is being broadcast
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Returns `true` while the fuzz cycle is enabled
    pub fn is_fuzzing(&self) -> bool {
        self.fuzzing
    }

    /// Current fuzz counter
    pub fn counter(&self) -> FuzzCounter {
        self.counter
    }

    /// The payload most recently handed to the radio
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The unmutated template
    pub fn template(&self) -> &BaseTemplate {
        &self.template
    }

    /// When the next mutation tick is due, if one is pending
    pub fn next_tick(&self) -> Option<Instant> {
        self.tick.map(|t| t.deadline)
    }

    /// Builds a status snapshot
    pub fn snapshot(&self, scanning: bool) -> ControllerState {
        ControllerState {
            scanning,
            advertising: self.advertising,
            fuzzing: self.fuzzing,
            counter: self.counter,
            payload: self.payload.clone(),
        }
    }

    /// Starts broadcasting.
    ///
    /// Without fuzzing the broadcast restarts from the unmutated template and counter zero. With fuzzing, the last
    /// payload is broadcast and the fuzz cycle resumes one interval later. If the radio rejects the request the
    /// controller stays idle.
    pub async fn start_advertising<R: Radio + ?Sized>(&mut self, radio: &mut R) -> Result<()> {
        if self.advertising {
            return Err(AdvertiseFailureCode::AlreadyStarted.into());
        }

        if !self.fuzzing {
            self.payload = self.template.to_payload();
            self.counter = FuzzCounter::default();
        }

        self.transmit(radio).await?;
        self.advertising = true;

        if self.fuzzing {
            self.schedule(Instant::now() + self.interval, true);
        }
        Ok(())
    }

    /// Stops broadcasting and cancels any pending tick.
    ///
    /// If the radio fails to stop, the controller keeps advertising and the pending tick is restored.
    pub async fn stop_advertising<R: Radio + ?Sized>(&mut self, radio: &mut R) -> Result<StopOutcome> {
        if !self.advertising {
            debug!("stop requested while idle");
            return Ok(StopOutcome::AlreadyIdle);
        }

        let pending = self.tick.take();
        if let Err(err) = radio.stop_transmit().await {
            error!("TX stop failed: {}", err);
            self.tick = pending;
            return Err(err);
        }

        self.advertising = false;
        info!("TX terminated");
        Ok(StopOutcome::Stopped)
    }

    /// Flips the fuzz flag and returns its new value.
    ///
    /// Enabling resets the counter. If advertising, a tick is due immediately and re-broadcasts the payload for
    /// counter zero; if idle, the payload for counter zero becomes the one the next start broadcasts. Disabling cancels the pending tick and leaves the current payload on air.
    pub fn toggle_fuzzing(&mut self) -> bool {
        self.fuzzing = !self.fuzzing;
        if self.fuzzing {
            self.counter = FuzzCounter::default();
            if self.advertising {
                self.schedule(Instant::now(), false);
            } else {
                // keep the idle payload in step with the reset counter
                self.payload = mutate(&self.template, self.counter);
            }
        } else {
            self.tick = None;
        }
        debug!(fuzzing = self.fuzzing, "fuzz toggled");
        self.fuzzing
    }

    /// Runs the pending tick if it is due.
    ///
    /// A tick stops the broadcast, advances the counter, mutates the template and restarts the broadcast, then
    /// schedules the next tick one interval from now. It is a no-op if nothing is pending, the deadline has not
    /// passed, or the controller is no longer both advertising and fuzzing.
    ///
    /// If the broadcast cannot be stopped the old payload stays on air and fuzzing is switched off. If it cannot be
    /// restarted the controller becomes idle.
    pub async fn tick<R: Radio + ?Sized>(&mut self, radio: &mut R) -> Result<()> {
        let tick = match self.tick.take() {
            Some(tick) if tick.deadline <= Instant::now() => tick,
            pending => {
                self.tick = pending;
                return Ok(());
            }
        };
        if !(self.advertising && self.fuzzing) {
            return Ok(());
        }

        if let Err(err) = radio.stop_transmit().await {
            error!("TX stop failed during fuzz tick, fuzzing disabled: {}", err);
            self.fuzzing = false;
            return Err(err);
        }

        if tick.advance {
            self.counter = self.counter.next();
        }
        self.payload = mutate(&self.template, self.counter);
        debug!("{}", fuzz_status(self.counter, &self.payload));

        if let Err(err) = self.transmit(radio).await {
            self.advertising = false;
            return Err(err);
        }

        self.schedule(Instant::now() + self.interval, true);
        Ok(())
    }

    /// Cancels the fuzz cycle, stops any broadcast and resets to the initial state.
    ///
    /// Radio failures are logged and otherwise ignored.
    pub async fn shutdown<R: Radio + ?Sized>(&mut self, radio: &mut R) {
        self.tick = None;
        if self.advertising {
            if let Err(err) = radio.stop_transmit().await {
                warn!("ignoring TX stop failure during teardown: {}", err);
            }
        }

        self.advertising = false;
        self.fuzzing = false;
        self.counter = FuzzCounter::default();
        self.payload = self.template.to_payload();
    }

    fn schedule(&mut self, deadline: Instant, advance: bool) {
        self.tick = Some(ScheduledTick { deadline, advance });
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            service_uuid: self.service_uuid,
            service_data: self.payload.clone(),
            connectable: self.connectable,
            include_tx_power: self.include_tx_power,
        }
    }

    async fn transmit<R: Radio + ?Sized>(&mut self, radio: &mut R) -> Result<()> {
        let advertisement = self.advertisement();
        info!("TX initiated - data: {}", Hex(&advertisement.service_data));
        match radio.start_transmit(&advertisement).await {
            Ok(()) => {
                debug!("TX active");
                Ok(())
            }
            Err(err) => {
                error!("TX failed: {}", err);
                Err(err)
            }
        }
    }
}

use std::fmt;
use std::str::FromStr;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::controller::{AdvertisementController, ControllerState, StopOutcome};
use crate::error::ErrorKind;
use crate::radio::{RadioEvent, RadioEventSender, ScanEvent};
use crate::tracker::{DeviceRecord, ObservationDelta, ScanTracker};
use crate::{Config, Error, Radio, Result};

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    StartScan(Reply<()>),
    StopScan(Reply<StopOutcome>),
    StartAdvertising(Reply<()>),
    StopAdvertising(Reply<StopOutcome>),
    ToggleFuzzing(Reply<bool>),
    State(Reply<ControllerState>),
    Devices(Reply<Vec<DeviceRecord>>),
    Shutdown,
}

/// Output of a [`Session`] for the user interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Controller state after a transition
    State(ControllerState),
    /// A new scan session started and the device list was cleared
    DevicesCleared,
    /// A tracked device was added or updated
    Device {
        /// Where the record landed in the device list
        delta: ObservationDelta,
        /// The record after the observation
        record: DeviceRecord,
    },
    /// An operation failed; the state is unchanged unless a `State` event follows
    Failed {
        /// Error category
        kind: ErrorKind,
        /// User-visible description
        message: String,
    },
}

/// Receiving end of a session's event stream
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// A user intent: `scan on|off`, `tx on|off` or `fuzz on|off|toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// `scan on`
    ScanOn,
    /// `scan off`
    ScanOff,
    /// `tx on`
    TxOn,
    /// `tx off`
    TxOff,
    /// `fuzz on`
    FuzzOn,
    /// `fuzz off`
    FuzzOff,
    /// `fuzz` or `fuzz toggle`
    FuzzToggle,
}

impl FromStr for Intent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let words: Vec<String> = s.split_whitespace().map(str::to_ascii_lowercase).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words[..] {
            ["scan", "on"] => Ok(Intent::ScanOn),
            ["scan", "off"] => Ok(Intent::ScanOff),
            ["tx", "on"] => Ok(Intent::TxOn),
            ["tx", "off"] => Ok(Intent::TxOff),
            ["fuzz", "on"] => Ok(Intent::FuzzOn),
            ["fuzz", "off"] => Ok(Intent::FuzzOff),
            ["fuzz"] | ["fuzz", "toggle"] => Ok(Intent::FuzzToggle),
            _ => Err(Error::new(ErrorKind::Other, None, format!("unknown command {s:?}"))),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intent::ScanOn => "scan on",
            Intent::ScanOff => "scan off",
            Intent::TxOn => "tx on",
            Intent::TxOff => "tx off",
            Intent::FuzzOn => "fuzz on",
            Intent::FuzzOff => "fuzz off",
            Intent::FuzzToggle => "fuzz toggle",
        })
    }
}

/// Cloneable handle for sending commands to a running [`Session`].
///
/// The session shuts down once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| Error::from(ErrorKind::SessionClosed))?;
        rx.await.map_err(|_| Error::from(ErrorKind::SessionClosed))?
    }

    /// Clears the device list and starts scanning. A no-op if already scanning.
    pub async fn start_scan(&self) -> Result<()> {
        self.request(Command::StartScan).await
    }

    /// Stops scanning
    pub async fn stop_scan(&self) -> Result<StopOutcome> {
        self.request(Command::StopScan).await
    }

    /// See [`AdvertisementController::start_advertising`]
    pub async fn start_advertising(&self) -> Result<()> {
        self.request(Command::StartAdvertising).await
    }

    /// See [`AdvertisementController::stop_advertising`]
    pub async fn stop_advertising(&self) -> Result<StopOutcome> {
        self.request(Command::StopAdvertising).await
    }

    /// See [`AdvertisementController::toggle_fuzzing`]
    pub async fn toggle_fuzzing(&self) -> Result<bool> {
        self.request(Command::ToggleFuzzing).await
    }

    /// The current controller state
    pub async fn state(&self) -> Result<ControllerState> {
        self.request(Command::State).await
    }

    /// The devices tracked in the current scan session, in first-seen order
    pub async fn devices(&self) -> Result<Vec<DeviceRecord>> {
        self.request(Command::Devices).await
    }

    /// Applies a user intent. `on`/`off` intents that match the current state are no-ops.
    pub async fn apply(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::ScanOn => self.start_scan().await,
            Intent::ScanOff => self.stop_scan().await.map(drop),
            Intent::TxOn => self.start_advertising().await,
            Intent::TxOff => self.stop_advertising().await.map(drop),
            Intent::FuzzToggle => self.toggle_fuzzing().await.map(drop),
            Intent::FuzzOn | Intent::FuzzOff => {
                if self.state().await?.fuzzing != (intent == Intent::FuzzOn) {
                    self.toggle_fuzzing().await?;
                }
                Ok(())
            }
        }
    }

    /// Asks the session to tear down. Returns once the request is queued.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// The single owner of controller and tracker state.
///
/// All commands, radio callbacks and fuzz ticks are serialized through [`run`][Self::run]. Radio backends deliver
/// observations through a [`RadioEventSender`] rather than touching the tracker directly.
pub struct Session<R> {
    radio: R,
    controller: AdvertisementController,
    tracker: ScanTracker,
    scanning: bool,
    // bumped on every scan start; events from older scan sessions are stale
    scan_generation: u64,
    commands: mpsc::Receiver<Command>,
    radio_tx: mpsc::UnboundedSender<ScanEvent>,
    radio_rx: mpsc::UnboundedReceiver<ScanEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<R> fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("controller", &self.controller)
            .field("tracker", &self.tracker)
            .field("scanning", &self.scanning)
            .finish_non_exhaustive()
    }
}

impl<R: Radio> Session<R> {
    /// Validates `config` and creates an idle session driving `radio`.
    ///
    /// Fails with [`ErrorKind::Configuration`] if the configuration is invalid.
    pub fn new(config: Config, radio: R) -> Result<(Self, SessionHandle, SessionEvents)> {
        let controller = AdvertisementController::new(&config)?;
        let (command_tx, command_rx) = mpsc::channel(32);
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = Session {
            radio,
            controller,
            tracker: ScanTracker::new(config.target_prefix),
            scanning: false,
            scan_generation: 0,
            commands: command_rx,
            radio_tx,
            radio_rx,
            events: event_tx,
        };
        Ok((session, SessionHandle { commands: command_tx }, event_rx))
    }

    /// Runs the event loop until [`SessionHandle::shutdown`] is called or every handle is dropped, then tears down.
    pub async fn run(mut self) {
        loop {
            let tick = self.controller.next_tick();
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.execute(command).await,
                },
                Some(event) = self.radio_rx.recv() => self.on_radio_event(event),
                _ = wait_until(tick) => self.on_tick().await,
            }
        }

        self.shutdown().await;
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::StartScan(reply) => {
                let res = self.start_scan().await;
                let _ = reply.send(res);
            }
            Command::StopScan(reply) => {
                let res = self.stop_scan().await;
                let _ = reply.send(res);
            }
            Command::StartAdvertising(reply) => {
                let res = self.controller.start_advertising(&mut self.radio).await;
                let res = self.report(res);
                let _ = reply.send(res);
            }
            Command::StopAdvertising(reply) => {
                let res = self.controller.stop_advertising(&mut self.radio).await;
                let res = self.report(res);
                let _ = reply.send(res);
            }
            Command::ToggleFuzzing(reply) => {
                let fuzzing = self.controller.toggle_fuzzing();
                self.publish_state();
                let _ = reply.send(Ok(fuzzing));
            }
            Command::State(reply) => {
                let _ = reply.send(Ok(self.state()));
            }
            Command::Devices(reply) => {
                let _ = reply.send(Ok(self.tracker.records().to_vec()));
            }
            // the event loop breaks on shutdown before dispatching
            Command::Shutdown => debug!("shutdown reached command dispatch"),
        }
    }

    async fn start_scan(&mut self) -> Result<()> {
        if self.scanning {
            debug!("scan already running");
            return Ok(());
        }

        self.tracker.reset();
        self.emit(SessionEvent::DevicesCleared);

        self.scan_generation += 1;
        let events = RadioEventSender::new(self.radio_tx.clone(), self.scan_generation);
        let res = self.radio.start_scan(events).await;
        if res.is_ok() {
            self.scanning = true;
            info!("scan initiated for OUI: {}", self.tracker.prefix());
        }
        self.report(res)
    }

    async fn stop_scan(&mut self) -> Result<StopOutcome> {
        if !self.scanning {
            return Ok(StopOutcome::AlreadyIdle);
        }

        let res = self.radio.stop_scan().await.map(|()| {
            self.scanning = false;
            info!("scan terminated");
            StopOutcome::Stopped
        });
        self.report(res)
    }

    fn on_radio_event(&mut self, ScanEvent { generation, event }: ScanEvent) {
        if !self.scanning || generation != self.scan_generation {
            debug!(generation, current = self.scan_generation, "dropping stale radio event");
            return;
        }

        match event {
            RadioEvent::Observation { address, name, rssi } => {
                let delta = self.tracker.observe(address, name, rssi);
                if let ObservationDelta::Inserted(i) | ObservationDelta::Updated(i) = delta {
                    let record = self.tracker.records()[i].clone();
                    self.emit(SessionEvent::Device { delta, record });
                }
            }
            RadioEvent::ScanFailed(code) => {
                error!("scan failed: ERR_{}", code);
                self.scanning = false;
                self.report::<()>(Err(ErrorKind::ScanFailed(code).into())).ok();
            }
        }
    }

    async fn on_tick(&mut self) {
        let res = self.controller.tick(&mut self.radio).await;
        let _ = self.report(res);
    }

    async fn shutdown(&mut self) {
        debug!("session shutting down");
        self.controller.shutdown(&mut self.radio).await;
        if self.scanning {
            if let Err(err) = self.radio.stop_scan().await {
                warn!("ignoring scan stop failure during teardown: {}", err);
            }
            self.scanning = false;
        }
        self.publish_state();
    }

    fn state(&self) -> ControllerState {
        self.controller.snapshot(self.scanning)
    }

    /// Publishes the failure, if any, followed by the current state.
    fn report<T>(&self, res: Result<T>) -> Result<T> {
        if let Err(err) = &res {
            self.emit(SessionEvent::Failed {
                kind: err.kind(),
                message: err.to_string(),
            });
        }
        self.publish_state();
        res
    }

    fn publish_state(&self) {
        self.emit(SessionEvent::State(self.state()));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("session event dropped, no receiver");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

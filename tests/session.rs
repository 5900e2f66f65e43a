use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluefuzz::error::{AdvertiseFailure, AdvertiseFailureCode, ErrorKind};
use bluefuzz::payload::{mutate, BaseTemplate, FuzzCounter, REFERENCE_TEMPLATE};
use bluefuzz::*;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    StartScan,
    StopScan,
    Start(Vec<u8>),
    Stop,
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    scan_events: Option<RadioEventSender>,
    fail_start: Option<i32>,
    deny_scan: bool,
}

#[derive(Clone, Default)]
struct MockRadio(Arc<Mutex<Shared>>);

impl MockRadio {
    fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    fn transmitted(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    fn scanner(&self) -> RadioEventSender {
        self.0.lock().unwrap().scan_events.clone().expect("scan not started")
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn start_scan(&mut self, events: RadioEventSender) -> Result<()> {
        let mut shared = self.0.lock().unwrap();
        shared.calls.push(Call::StartScan);
        if shared.deny_scan {
            return Err(ErrorKind::PermissionDenied.into());
        }
        shared.scan_events = Some(events);
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        let mut shared = self.0.lock().unwrap();
        shared.calls.push(Call::StopScan);
        shared.scan_events = None;
        Ok(())
    }

    async fn start_transmit(&mut self, advertisement: &Advertisement) -> Result<()> {
        let mut shared = self.0.lock().unwrap();
        shared.calls.push(Call::Start(advertisement.service_data.clone()));
        match shared.fail_start {
            Some(code) => Err(ErrorKind::TransmitStartFailed(code.into()).into()),
            None => Ok(()),
        }
    }

    async fn stop_transmit(&mut self) -> Result<()> {
        self.0.lock().unwrap().calls.push(Call::Stop);
        Ok(())
    }
}

const INTERVAL: Duration = Duration::from_millis(500);

fn spawn(radio: &MockRadio) -> (SessionHandle, SessionEvents, JoinHandle<()>) {
    let (session, handle, events) = Session::new(Config::default(), radio.clone()).unwrap();
    (handle, events, tokio::spawn(session.run()))
}

/// Lets the session task drain its queues without moving the clock.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn drain(events: &mut SessionEvents) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn fuzz_cycle_advances_every_interval() {
    let radio = MockRadio::default();
    let (handle, _events, _task) = spawn(&radio);
    let base = BaseTemplate::default();

    handle.start_advertising().await.unwrap();
    assert!(handle.toggle_fuzzing().await.unwrap());
    settle().await;
    assert_eq!(radio.transmitted().last().unwrap(), &mutate(&base, FuzzCounter(0)));

    for n in 1..=3u16 {
        tokio::time::sleep(INTERVAL).await;
        settle().await;
        assert_eq!(handle.state().await.unwrap().counter, FuzzCounter(n));
        assert_eq!(radio.transmitted().last().unwrap(), &mutate(&base, FuzzCounter(n)));
    }

    // every restart is preceded by a stop
    let calls = radio.calls();
    assert_eq!(calls[0], Call::Start(REFERENCE_TEMPLATE.to_vec()));
    for pair in calls[1..].chunks(2) {
        assert_eq!(pair[0], Call::Stop);
        assert!(matches!(pair[1], Call::Start(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn stop_before_tick_prevents_further_transmits() {
    let radio = MockRadio::default();
    let (handle, _events, _task) = spawn(&radio);

    handle.toggle_fuzzing().await.unwrap();
    handle.start_advertising().await.unwrap();
    assert_eq!(handle.stop_advertising().await.unwrap(), StopOutcome::Stopped);
    let before = radio.transmitted().len();

    tokio::time::sleep(INTERVAL * 10).await;
    settle().await;
    assert_eq!(radio.transmitted().len(), before);

    assert_eq!(handle.stop_advertising().await.unwrap(), StopOutcome::AlreadyIdle);
    assert_eq!(radio.calls().last(), Some(&Call::Stop));
}

#[tokio::test(start_paused = true)]
async fn refuzz_restarts_from_zero() {
    let radio = MockRadio::default();
    let (handle, _events, _task) = spawn(&radio);
    let base = BaseTemplate::default();

    handle.start_advertising().await.unwrap();
    handle.apply(Intent::FuzzOn).await.unwrap();
    tokio::time::sleep(INTERVAL * 3).await;
    settle().await;
    assert!(handle.state().await.unwrap().counter > FuzzCounter(0));

    handle.apply(Intent::FuzzOff).await.unwrap();
    handle.apply(Intent::FuzzOn).await.unwrap();
    settle().await;

    let state = handle.state().await.unwrap();
    assert_eq!(state.counter, FuzzCounter(0));
    assert_eq!(radio.transmitted().last().unwrap(), &mutate(&base, FuzzCounter(0)));
}

#[tokio::test(start_paused = true)]
async fn transmit_failure_is_reported() {
    let radio = MockRadio::default();
    radio.0.lock().unwrap().fail_start = Some(2);
    let (handle, mut events, _task) = spawn(&radio);

    let err = handle.start_advertising().await.unwrap_err();
    let kind = ErrorKind::TransmitStartFailed(AdvertiseFailure::Known(AdvertiseFailureCode::TooManyAdvertisers));
    assert_eq!(err.kind(), kind);
    assert!(!handle.state().await.unwrap().advertising);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Failed { kind: k, .. } if *k == kind)));
}

#[tokio::test(start_paused = true)]
async fn scan_tracks_target_devices() {
    let radio = MockRadio::default();
    let (handle, mut events, _task) = spawn(&radio);

    handle.apply(Intent::ScanOn).await.unwrap();
    assert!(handle.state().await.unwrap().scanning);
    let scanner = radio.scanner();

    let target: Address = "00:25:DF:11:22:33".parse().unwrap();
    scanner.observation("AA:BB:CC:11:22:33".parse().unwrap(), None, -40);
    scanner.observation(target, None, -80);
    scanner.observation(target, Some("cam".into()), -45);
    settle().await;

    let devices = handle.devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].rssi, -45);
    assert_eq!(devices[0].display_name(), "cam");

    let deltas: Vec<ObservationDelta> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Device { delta, .. } => Some(delta),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, [ObservationDelta::Inserted(0), ObservationDelta::Updated(0)]);

    // a new scan session starts from an empty list
    handle.stop_scan().await.unwrap();
    handle.start_scan().await.unwrap();
    assert!(handle.devices().await.unwrap().is_empty());
    assert!(drain(&mut events).contains(&SessionEvent::DevicesCleared));
}

#[tokio::test(start_paused = true)]
async fn restarting_scan_discards_events_from_previous_session() {
    let radio = MockRadio::default();
    let (handle, _events, _task) = spawn(&radio);

    handle.start_scan().await.unwrap();
    let previous = radio.scanner();
    previous.observation("00:25:DF:00:00:99".parse().unwrap(), None, -60);
    previous.send(RadioEvent::ScanFailed(3));

    // both commands are queued ahead of the stale events
    let (stopped, started) = tokio::join!(handle.stop_scan(), handle.start_scan());
    assert_eq!(stopped.unwrap(), StopOutcome::Stopped);
    started.unwrap();
    settle().await;

    assert!(handle.state().await.unwrap().scanning);
    assert!(handle.devices().await.unwrap().is_empty());
    assert_eq!(radio.calls(), [Call::StartScan, Call::StopScan, Call::StartScan]);

    let target: Address = "00:25:DF:00:00:01".parse().unwrap();
    radio.scanner().observation(target, None, -50);
    settle().await;
    let devices = handle.devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].address, target);
}

#[tokio::test(start_paused = true)]
async fn start_scan_while_scanning_keeps_devices() {
    let radio = MockRadio::default();
    let (handle, mut events, _task) = spawn(&radio);

    handle.start_scan().await.unwrap();
    radio.scanner().observation("00:25:DF:11:22:33".parse().unwrap(), None, -70);
    settle().await;
    assert_eq!(handle.devices().await.unwrap().len(), 1);
    drain(&mut events);

    handle.start_scan().await.unwrap();
    assert_eq!(handle.devices().await.unwrap().len(), 1);
    assert!(!drain(&mut events).contains(&SessionEvent::DevicesCleared));
    assert_eq!(radio.calls(), [Call::StartScan]);
}

#[tokio::test(start_paused = true)]
async fn scan_failure_stops_scanning() {
    let radio = MockRadio::default();
    let (handle, mut events, _task) = spawn(&radio);

    handle.start_scan().await.unwrap();
    radio.scanner().send(RadioEvent::ScanFailed(2));
    settle().await;

    assert!(!handle.state().await.unwrap().scanning);
    assert!(drain(&mut events).contains(&SessionEvent::Failed {
        kind: ErrorKind::ScanFailed(2),
        message: "scan failed: ERR_2".to_string(),
    }));

    // late observations from the failed session are dropped
    radio.scanner().observation("00:25:DF:00:00:01".parse().unwrap(), None, -50);
    settle().await;
    assert!(handle.devices().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn denied_scan_leaves_scanning_off() {
    let radio = MockRadio::default();
    radio.0.lock().unwrap().deny_scan = true;
    let (handle, _events, _task) = spawn(&radio);

    let err = handle.start_scan().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(!handle.state().await.unwrap().scanning);
    assert_eq!(handle.stop_scan().await.unwrap(), StopOutcome::AlreadyIdle);
}

#[tokio::test(start_paused = true)]
async fn shutdown_tears_down_radio() {
    let radio = MockRadio::default();
    let (handle, _events, task) = spawn(&radio);

    handle.start_scan().await.unwrap();
    handle.start_advertising().await.unwrap();
    handle.toggle_fuzzing().await.unwrap();
    handle.shutdown().await;
    task.await.unwrap();

    let calls = radio.calls();
    assert!(calls.ends_with(&[Call::Stop, Call::StopScan]));
    assert_eq!(handle.state().await.unwrap_err().kind(), ErrorKind::SessionClosed);
}

#[test]
fn short_template_aborts_startup() {
    let config = Config {
        base_template: vec![0; 21],
        ..Config::default()
    };
    let err = Session::new(config, MockRadio::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

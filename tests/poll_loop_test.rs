//! Integration tests for the poll loop running against the device worker.

use std::time::Duration;

use ion_gauge_monitor::hardware::simulated::SimulatorControls;
use ion_gauge_monitor::hardware::u6::Direction;
use ion_gauge_monitor::hardware::{
    AbsentDevice, ConnectOptions, DeviceWorker, DigitalLine, GaugeDevice, LabJackGauge,
    SimulatedU6,
};
use ion_gauge_monitor::monitor::{
    BackoffPolicy, GaugeStatus, MonitorEvent, PollLoop, PollSettings, PollState,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    task: JoinHandle<PollState>,
    events: mpsc::Receiver<MonitorEvent>,
    shutdown: watch::Sender<bool>,
    _worker: DeviceWorker,
}

impl Harness {
    fn start(device: Box<dyn GaugeDevice>, max_retries: u32) -> Self {
        Self::with_queue(device, max_retries, 8)
    }

    fn with_queue(device: Box<dyn GaugeDevice>, max_retries: u32, capacity: usize) -> Self {
        let settings = PollSettings {
            relay: DigitalLine::parse("FIO0").unwrap(),
            channel: 0,
            resolution_index: 8,
            threshold: 9.8,
            interval: Duration::from_millis(10),
            backoff: BackoffPolicy {
                max_retries,
                initial: Duration::from_millis(5),
                max: Duration::from_millis(20),
            },
        };
        let (handle, worker) = DeviceWorker::spawn(device, 4).unwrap();
        let (events_tx, events) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(PollLoop::new(handle, settings, events_tx, shutdown_rx).run());
        Self {
            task,
            events,
            shutdown,
            _worker: worker,
        }
    }

    async fn next_status(&mut self) -> GaugeStatus {
        loop {
            let event = timeout(WAIT, self.events.recv())
                .await
                .expect("no event in time")
                .expect("event channel closed");
            if let MonitorEvent::Status(status) = event {
                return status;
            }
        }
    }

    async fn stop(self) -> PollState {
        self.shutdown.send(true).unwrap();
        timeout(WAIT, self.task).await.unwrap().unwrap()
    }
}

fn simulated_gauge(volts: f64) -> (Box<dyn GaugeDevice>, SimulatorControls) {
    let sim = SimulatedU6::ion_gauge(0, 0, volts);
    let controls = sim.controls();
    let gauge = LabJackGauge::connect(sim, &ConnectOptions::default()).unwrap();
    (Box::new(gauge), controls)
}

#[tokio::test]
async fn test_absent_device_shows_no_device_every_tick() {
    let mut harness = Harness::start(Box::new(AbsentDevice::new("not found")), 3);

    for _ in 0..3 {
        assert_eq!(harness.next_status().await, GaugeStatus::NoDevice);
    }
    assert!(!harness.task.is_finished());
    assert_eq!(harness.stop().await, PollState::Stopped);
}

#[tokio::test]
async fn test_relay_off_shows_gauge_off() {
    let (device, _controls) = simulated_gauge(3.0);
    let mut harness = Harness::start(device, 3);

    assert_eq!(harness.next_status().await, GaugeStatus::GaugeOff);
    assert_eq!(harness.stop().await, PollState::Stopped);
}

#[tokio::test]
async fn test_powered_gauge_shows_pressure() {
    let (device, controls) = simulated_gauge(3.0);
    controls.set_direction(0, Direction::Output);
    let mut harness = Harness::start(device, 3);

    let status = harness.next_status().await;
    assert_eq!(status.to_string(), "1.00e-07");
    assert_eq!(harness.stop().await, PollState::Stopped);
}

#[tokio::test]
async fn test_pegged_with_relay_on_is_error() {
    let (device, controls) = simulated_gauge(10.5);
    controls.set_direction(0, Direction::Output);
    let mut harness = Harness::start(device, 3);

    assert_eq!(harness.next_status().await, GaugeStatus::Error);
    assert_eq!(harness.stop().await, PollState::Stopped);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let (device, controls) = simulated_gauge(3.0);
    controls.set_direction(0, Direction::Output);
    controls.inject_timeouts(2);
    let mut harness = Harness::start(device, 3);

    // The two timeouts are absorbed; the first status is a good reading
    let status = harness.next_status().await;
    assert!(matches!(status, GaugeStatus::Pressure(_)), "{:?}", status);
    assert_eq!(harness.stop().await, PollState::Stopped);
}

#[tokio::test]
async fn test_retry_budget_exhausted_faults() {
    let (device, controls) = simulated_gauge(3.0);
    controls.inject_timeouts(100);
    let mut harness = Harness::start(device, 2);

    let status = harness.next_status().await;
    assert!(matches!(status, GaugeStatus::Fault(_)), "{:?}", status);
    assert_eq!(status.to_string(), "Hardware Fault");

    let state = timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert_eq!(state, PollState::Faulted);
}

#[tokio::test]
async fn test_unplugged_device_faults_immediately() {
    let (device, controls) = simulated_gauge(3.0);
    let mut harness = Harness::start(device, 5);
    assert_eq!(harness.next_status().await, GaugeStatus::GaugeOff);

    controls.unplug();
    let status = loop {
        let status = harness.next_status().await;
        if status != GaugeStatus::GaugeOff {
            break status;
        }
    };
    assert!(status.detail().unwrap_or_default().contains("disconnected"));

    let state = timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert_eq!(state, PollState::Faulted);
}

#[tokio::test]
async fn test_fault_is_delivered_through_full_queue() {
    let (device, controls) = simulated_gauge(3.0);
    let mut harness = Harness::with_queue(device, 5, 1);

    // Nobody drains the queue: it fills with one GaugeOff and later ones are dropped
    tokio::time::sleep(Duration::from_millis(50)).await;
    controls.unplug();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!harness.task.is_finished(), "fault must wait for queue space");

    assert_eq!(harness.next_status().await, GaugeStatus::GaugeOff);
    let status = harness.next_status().await;
    assert!(matches!(status, GaugeStatus::Fault(_)), "{:?}", status);

    let state = timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert_eq!(state, PollState::Faulted);
}

#[tokio::test]
async fn test_closed_receiver_stops_loop() {
    let harness = Harness::start(Box::new(AbsentDevice::new("not found")), 3);
    drop(harness.events);

    let state = timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert_eq!(state, PollState::Stopped);
}

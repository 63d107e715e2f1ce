//! # Bridge Runtime
//!
//! Owns the protocols, the control loop and the optional telemetry recorder,
//! and drives them from one task.
//!
//! The host talks to a running bridge through [`BridgeCommand`]s: pairing
//! requests carry an already-connected peripheral, disconnect notices come from
//! the transport, and the vehicle handle is attached once the simulator has one.
//! Each control tick publishes a [`GamepadState`] on a `watch` channel.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::ble::Peripheral;
use crate::config::Config;
use crate::coordinator::{ControlLoopCoordinator, Vehicle};
use crate::error::Result;
use crate::gamepad::GamepadState;
use crate::steering::SteeringProtocol;
use crate::telemetry::{lock_telemetry, SharedTelemetry, TelemetryRecorder, TelemetrySnapshot, TelemetryState};
use crate::trainer::TrainerProtocol;

/// Depth of the command queue
pub const COMMAND_CAPACITY: usize = 32;

/// Requests from the host to a running bridge
pub enum BridgeCommand {
    /// Connect a trainer found by the host's scanner
    PairTrainer(Arc<dyn Peripheral>),
    /// Connect a steering plate found by the host's scanner
    PairSteering(Arc<dyn Peripheral>),
    TrainerDisconnected,
    SteeringDisconnected,
    /// Nudge manual power; ignored while a trainer is connected
    AdjustWatts(f64),
    AttachVehicle(Box<dyn Vehicle>),
    DetachVehicle,
    Shutdown,
}

impl fmt::Debug for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PairTrainer(peripheral) => f.debug_tuple("PairTrainer").field(&peripheral.name()).finish(),
            Self::PairSteering(peripheral) => f.debug_tuple("PairSteering").field(&peripheral.name()).finish(),
            Self::TrainerDisconnected => f.write_str("TrainerDisconnected"),
            Self::SteeringDisconnected => f.write_str("SteeringDisconnected"),
            Self::AdjustWatts(delta) => f.debug_tuple("AdjustWatts").field(delta).finish(),
            Self::AttachVehicle(vehicle) => f.debug_tuple("AttachVehicle").field(&vehicle.kind()).finish(),
            Self::DetachVehicle => f.write_str("DetachVehicle"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub struct Bridge {
    config: Config,
    telemetry: SharedTelemetry,
    trainer: TrainerProtocol,
    steering: SteeringProtocol,
    coordinator: ControlLoopCoordinator,
    vehicle: Option<Box<dyn Vehicle>>,
    gamepad: watch::Sender<GamepadState>,
}

impl Bridge {
    pub fn new(config: Config) -> Self {
        let telemetry = TelemetryState::from_config(&config.physics).into_shared();
        let trainer = TrainerProtocol::new(Arc::clone(&telemetry));
        let steering = SteeringProtocol::from_config(Arc::clone(&telemetry), &config.steering);
        let coordinator = ControlLoopCoordinator::new(&config, Arc::clone(&telemetry), trainer.clone());
        let (gamepad, _) = watch::channel(GamepadState::default());

        Self {
            config,
            telemetry,
            trainer,
            steering,
            coordinator,
            vehicle: None,
            gamepad,
        }
    }

    /// Follow the pad state published every tick
    pub fn gamepad(&self) -> watch::Receiver<GamepadState> {
        self.gamepad.subscribe()
    }

    /// Follow telemetry changes
    pub fn telemetry_changes(&self) -> watch::Receiver<TelemetrySnapshot> {
        lock_telemetry(&self.telemetry).subscribe()
    }

    pub fn telemetry(&self) -> SharedTelemetry {
        Arc::clone(&self.telemetry)
    }

    /// Run until `Shutdown`, Ctrl+C, or every command sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if telemetry recording is enabled and its directory
    /// cannot be created
    pub async fn run(mut self, mut commands: mpsc::Receiver<BridgeCommand>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let recorder = if self.config.telemetry.enabled {
            let recorder = TelemetryRecorder::from_config(&self.config.telemetry)?;
            let interval = std::time::Duration::from_millis(self.config.telemetry.log_interval_ms);
            Some(tokio::spawn(recorder.run(self.telemetry_changes(), interval, shutdown_rx)))
        } else {
            None
        };

        let period = self.config.control.tick_period();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Control loop running at {}Hz", self.config.control.tick_rate_hz);

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let vehicle = self.vehicle.as_mut().map(|v| v.as_mut() as &mut dyn Vehicle);
                    let pad = self.coordinator.tick(Instant::now(), vehicle);
                    self.gamepad.send_replace(pad);
                    ticks += 1;
                }

                command = commands.recv() => match command {
                    None | Some(BridgeCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle(command),
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    break;
                }
            }
        }

        info!("Control loop stopped after {} ticks", ticks);

        let _ = shutdown_tx.send(true);
        if let Some(recorder) = recorder {
            if let Err(e) = recorder.await {
                warn!("Telemetry recorder task failed: {}", e);
            }
        }

        Ok(())
    }

    fn handle(&mut self, command: BridgeCommand) {
        debug!("Command: {:?}", command);

        match command {
            BridgeCommand::PairTrainer(peripheral) => {
                let trainer = self.trainer.clone();
                tokio::spawn(async move {
                    if let Ok(link) = trainer.connect(peripheral).await {
                        info!("Trainer paired via {:?}", link);
                    }
                });
            }
            BridgeCommand::PairSteering(peripheral) => {
                let steering = self.steering.clone();
                tokio::spawn(async move {
                    if steering.connect(peripheral).await.is_ok() {
                        info!("Steering plate paired");
                    }
                });
            }
            BridgeCommand::TrainerDisconnected => self.trainer.on_disconnected(),
            BridgeCommand::SteeringDisconnected => self.steering.on_disconnected(),
            BridgeCommand::AdjustWatts(delta) => {
                let mut telemetry = lock_telemetry(&self.telemetry);
                if telemetry.adjust_manual_watts(delta) {
                    info!("Manual power: {:.0} W", telemetry.watts());
                } else {
                    debug!("Manual power ignored while a trainer is connected");
                }
            }
            BridgeCommand::AttachVehicle(vehicle) => {
                info!("Vehicle attached: {}", vehicle.kind());
                self.vehicle = Some(vehicle);
            }
            BridgeCommand::DetachVehicle => {
                info!("Vehicle detached");
                self.vehicle = None;
            }
            BridgeCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::characteristic::mocks::MockPeripheral;
    use crate::ble::uuids::{FTMS_CONTROL_POINT, FTMS_INDOOR_BIKE_DATA, FTMS_SERVICE};
    use crate::coordinator::VehicleTuning;
    use crate::telemetry::{GameLinkStatus, TrainerStatus};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Hill;

    impl Vehicle for Hill {
        fn kind(&self) -> String {
            "bike".to_string()
        }

        fn pitch(&self) -> f64 {
            0.05f64.atan()
        }

        fn speed(&self) -> f64 {
            8.0
        }

        fn apply_tuning(&mut self, _tuning: &VehicleTuning) {}
    }

    fn spawn_bridge(config: Config) -> (
        mpsc::Sender<BridgeCommand>,
        watch::Receiver<GamepadState>,
        SharedTelemetry,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let bridge = Bridge::new(config);
        let gamepad = bridge.gamepad();
        let telemetry = bridge.telemetry();
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = tokio::spawn(bridge.run(rx));
        (tx, gamepad, telemetry, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_publish_gamepad() {
        let (tx, mut gamepad, _telemetry, handle) = spawn_bridge(Config::default());

        gamepad.changed().await.unwrap();
        assert!(gamepad.borrow().connected);

        tx.send(BridgeCommand::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_watts_drive_throttle() {
        let (tx, gamepad, telemetry, handle) = spawn_bridge(Config::default());

        for _ in 0..10 {
            tx.send(BridgeCommand::AdjustWatts(20.0)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(lock_telemetry(&telemetry).watts(), 200.0);
        assert!(gamepad.borrow().throttle().pressed);

        tx.send(BridgeCommand::AdjustWatts(-500.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(lock_telemetry(&telemetry).watts(), 0.0);

        drop(tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_vehicle_attach_and_detach() {
        let (tx, _gamepad, telemetry, handle) = spawn_bridge(Config::default());

        tx.send(BridgeCommand::AttachVehicle(Box::new(Hill))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        {
            let telemetry = lock_telemetry(&telemetry);
            assert!((telemetry.real_grade() - 5.0).abs() < 1e-9);
            assert_eq!(
                telemetry.game_link_status(),
                &GameLinkStatus::Linked {
                    vehicle: "bike".to_string()
                }
            );
        }

        tx.send(BridgeCommand::DetachVehicle).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(lock_telemetry(&telemetry).game_link_status(), &GameLinkStatus::Searching);

        tx.send(BridgeCommand::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_trainer_and_incline_updates() {
        let mut peripheral = MockPeripheral::new();
        let control_point = peripheral.with_characteristic(FTMS_SERVICE, FTMS_CONTROL_POINT);
        peripheral.with_characteristic(FTMS_SERVICE, FTMS_INDOOR_BIKE_DATA);

        let (tx, _gamepad, telemetry, handle) = spawn_bridge(Config::default());
        tx.send(BridgeCommand::PairTrainer(Arc::new(peripheral))).await.unwrap();
        tx.send(BridgeCommand::AttachVehicle(Box::new(Hill))).await.unwrap();

        // Control request, then incline writes at 0 ms, 500 ms and 1000 ms
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let writes = control_point.get_written_data();
        assert_eq!(writes[0], vec![0x00]);
        assert!(writes.len() >= 3 && writes.len() <= 4);
        assert!(writes[1..].iter().all(|w| w == &vec![0x11, 0x32, 0x00]));

        // Manual power is ignored while connected
        tx.send(BridgeCommand::AdjustWatts(20.0)).await.unwrap();
        tx.send(BridgeCommand::TrainerDisconnected).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let telemetry = lock_telemetry(&telemetry);
            assert_eq!(telemetry.watts(), 0.0);
            assert_eq!(telemetry.trainer_status(), TrainerStatus::Disconnected);
        }

        let count = control_point.get_written_data().len();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(control_point.get_written_data().len(), count);

        tx.send(BridgeCommand::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_runs_when_enabled() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = temp.path().to_string_lossy().into_owned();

        let (tx, _gamepad, _telemetry, handle) = spawn_bridge(config);
        tx.send(BridgeCommand::AdjustWatts(40.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(BridgeCommand::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();

        let files: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.lines().count() >= 1);
        assert!(contents.contains("\"watts\":40.0"));
    }
}

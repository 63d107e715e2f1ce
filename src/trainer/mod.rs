//! # Trainer Module
//!
//! Smart trainer connection over FTMS, with Cycling Power as a read-only fallback.
//!
//! This module handles:
//! - Requesting control on the FTMS control point
//! - Falling back to CPS when FTMS is unavailable
//! - Pumping measurement notifications into telemetry
//! - Fire-and-forget target incline writes
//! - Resetting everything on disconnect

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ble::uuids::{CPS_MEASUREMENT, CPS_SERVICE, FTMS_CONTROL_POINT, FTMS_INDOOR_BIKE_DATA, FTMS_SERVICE};
use crate::ble::{Characteristic, Peripheral, Subscription};
use crate::codec::decoder::{decode_cps_power, decode_ftms_measurement};
use crate::codec::encoder::{encode_request_control, encode_set_incline};
use crate::error::{BridgeError, Result};
use crate::telemetry::{lock_telemetry, ControlMode, SharedTelemetry, TrainerLink, TrainerStatus};

#[derive(Default)]
struct TrainerSession {
    /// Present only while incline commands are accepted
    control_point: Option<Arc<dyn Characteristic>>,
    link: Option<TrainerLink>,
    measurement_pump: Option<JoinHandle<()>>,
}

impl TrainerSession {
    fn clear(&mut self) {
        self.control_point = None;
        self.link = None;
        if let Some(pump) = self.measurement_pump.take() {
            pump.abort();
        }
    }
}

struct Shared {
    session: Mutex<TrainerSession>,
    epoch: watch::Sender<u64>,
}

/// Handle to the trainer protocol. Clones share one session.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use trainer_bridge::ble::Peripheral;
/// use trainer_bridge::telemetry::TelemetryState;
/// use trainer_bridge::trainer::TrainerProtocol;
///
/// async fn pair(peripheral: Arc<dyn Peripheral>) -> trainer_bridge::error::Result<()> {
///     let telemetry = TelemetryState::new(0.15, 0.1).into_shared();
///     let trainer = TrainerProtocol::new(telemetry);
///     trainer.connect(peripheral).await?;
///     trainer.send_incline(4.5);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TrainerProtocol {
    telemetry: SharedTelemetry,
    shared: Arc<Shared>,
}

impl TrainerProtocol {
    pub fn new(telemetry: SharedTelemetry) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            telemetry,
            shared: Arc::new(Shared {
                session: Mutex::new(TrainerSession::default()),
                epoch,
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, TrainerSession> {
        self.shared.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: TrainerStatus) {
        lock_telemetry(&self.telemetry).set_trainer_status(status);
    }

    /// Service currently supplying measurements
    pub fn link(&self) -> Option<TrainerLink> {
        self.session().link
    }

    pub fn is_controllable(&self) -> bool {
        self.session().control_point.is_some()
    }

    /// Connect to a trainer and start streaming its measurements.
    ///
    /// FTMS is tried first. If either FTMS characteristic is missing or its
    /// measurement subscription fails, the Cycling Power Service is used
    /// instead and incline control stays disabled. A rejected request-control
    /// write leaves FTMS connected in monitor-only mode.
    ///
    /// # Errors
    ///
    /// Returns error if neither service can be subscribed, or
    /// `Disconnected` if [`on_disconnected`](Self::on_disconnected) is called
    /// while pending
    pub async fn connect(&self, peripheral: Arc<dyn Peripheral>) -> Result<TrainerLink> {
        let mut cancelled = self.shared.epoch.subscribe();
        info!(
            "Connecting to trainer {}",
            peripheral.name().unwrap_or_else(|| "<unnamed>".to_string())
        );
        self.session().clear();
        self.set_status(TrainerStatus::Connecting);

        let result = tokio::select! {
            result = self.establish(peripheral.as_ref()) => result,
            _ = cancelled.changed() => Err(BridgeError::Disconnected),
        };

        if let Err(e) = &result {
            warn!("Trainer connection failed: {}", e);
            self.session().clear();
            self.set_status(TrainerStatus::Disconnected);
        }

        result
    }

    async fn establish(&self, peripheral: &dyn Peripheral) -> Result<TrainerLink> {
        match self.connect_ftms(peripheral).await {
            Ok(()) => Ok(TrainerLink::Ftms),
            Err(e) => {
                warn!("FTMS unavailable ({}), falling back to Cycling Power", e);
                self.connect_cps(peripheral).await?;
                Ok(TrainerLink::CyclingPower)
            }
        }
    }

    async fn connect_ftms(&self, peripheral: &dyn Peripheral) -> Result<()> {
        let control_point = peripheral.characteristic(FTMS_SERVICE, FTMS_CONTROL_POINT).await?;
        let bike_data = peripheral.characteristic(FTMS_SERVICE, FTMS_INDOOR_BIKE_DATA).await?;

        self.set_status(TrainerStatus::ControlRequested);
        let mode = match control_point.write(&encode_request_control()).await {
            Ok(()) => ControlMode::Controllable,
            Err(e) => {
                warn!("Trainer refused control request: {}", e);
                ControlMode::MonitorOnly
            }
        };

        let measurements = bike_data.subscribe().await?;
        self.install(
            TrainerLink::Ftms,
            measurements,
            (mode == ControlMode::Controllable).then_some(control_point),
        );

        info!("Trainer connected over FTMS ({:?})", mode);
        self.set_status(TrainerStatus::Connected {
            link: TrainerLink::Ftms,
            mode,
        });
        Ok(())
    }

    async fn connect_cps(&self, peripheral: &dyn Peripheral) -> Result<()> {
        let measurement = peripheral.characteristic(CPS_SERVICE, CPS_MEASUREMENT).await?;
        let measurements = measurement.subscribe().await?;
        self.install(TrainerLink::CyclingPower, measurements, None);

        info!("Trainer connected over Cycling Power (monitor only)");
        self.set_status(TrainerStatus::Connected {
            link: TrainerLink::CyclingPower,
            mode: ControlMode::MonitorOnly,
        });
        Ok(())
    }

    fn install(&self, link: TrainerLink, measurements: Subscription, control_point: Option<Arc<dyn Characteristic>>) {
        let pump = tokio::spawn(pump_measurements(measurements, link, Arc::clone(&self.telemetry)));

        let mut session = self.session();
        session.clear();
        session.link = Some(link);
        session.control_point = control_point;
        session.measurement_pump = Some(pump);
    }

    /// Write a target incline without waiting for the result.
    ///
    /// Returns `None` (and writes nothing) unless the trainer is controllable.
    /// A failed write is logged and leaves the connection state untouched.
    pub fn send_incline(&self, grade_percent: f64) -> Option<JoinHandle<()>> {
        let control_point = self.session().control_point.clone()?;
        let frame = encode_set_incline(grade_percent);

        Some(tokio::spawn(async move {
            match control_point.write(&frame).await {
                Ok(()) => debug!("Target incline set: {:.1}%", grade_percent),
                Err(e) => warn!("Incline write failed: {}", e),
            }
        }))
    }

    /// Transport dropped: cancel any pending connect and stop incline control.
    pub fn on_disconnected(&self) {
        self.shared.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        self.session().clear();

        info!("Trainer disconnected");
        lock_telemetry(&self.telemetry).reset_trainer();
    }
}

async fn pump_measurements(mut measurements: Subscription, link: TrainerLink, telemetry: SharedTelemetry) {
    while let Some(data) = measurements.next().await {
        match link {
            TrainerLink::Ftms => {
                let measurement = decode_ftms_measurement(&data);
                let mut telemetry = lock_telemetry(&telemetry);
                if let Some(level) = measurement.resistance_level {
                    telemetry.report_resistance(f64::from(level));
                }
                if let Some(watts) = measurement.power_watts {
                    telemetry.set_watts(f64::from(watts));
                }
            }
            TrainerLink::CyclingPower => {
                if let Some(watts) = decode_cps_power(&data) {
                    lock_telemetry(&telemetry).set_watts(f64::from(watts));
                }
            }
        }
    }
    debug!("Trainer measurement stream ended");
}

//! Sterzo connection driver: runs the handshake over real characteristics and
//! then streams the steering angle into telemetry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handshake::{Handshake, HandshakeAction, HandshakeState};
use crate::ble::uuids::{STERZO_CHALLENGE, STERZO_CONTROL_POINT, STERZO_SERVICE, STERZO_STEERING};
use crate::ble::{Characteristic, Peripheral, Subscription};
use crate::codec::decoder::decode_steering_angle;
use crate::config::SteeringConfig;
use crate::error::{BridgeError, Result};
use crate::telemetry::{lock_telemetry, SharedTelemetry, SteeringStatus};

struct SteeringSession {
    handshake: Handshake,
    angle_pump: Option<JoinHandle<()>>,
}

struct Shared {
    session: Mutex<SteeringSession>,
    /// Bumped on every disconnect to cancel in-flight connects
    epoch: watch::Sender<u64>,
}

/// Handle to the steering plate protocol. Clones share one session.
#[derive(Clone)]
pub struct SteeringProtocol {
    telemetry: SharedTelemetry,
    settle_delay: Duration,
    handshake_timeout: Duration,
    shared: Arc<Shared>,
}

impl SteeringProtocol {
    /// Create a disconnected protocol handle.
    ///
    /// # Arguments
    ///
    /// * `telemetry` - Receives steering status and angle
    /// * `settle_delay` - Wait before the trigger and response writes
    /// * `handshake_timeout` - Limit on waiting for the challenge and final status
    pub fn new(telemetry: SharedTelemetry, settle_delay: Duration, handshake_timeout: Duration) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            telemetry,
            settle_delay,
            handshake_timeout,
            shared: Arc::new(Shared {
                session: Mutex::new(SteeringSession {
                    handshake: Handshake::new(),
                    angle_pump: None,
                }),
                epoch,
            }),
        }
    }

    pub fn from_config(telemetry: SharedTelemetry, config: &SteeringConfig) -> Self {
        Self::new(telemetry, config.settle_delay(), config.handshake_timeout())
    }

    fn session(&self) -> MutexGuard<'_, SteeringSession> {
        self.shared.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.session().handshake.state()
    }

    fn set_status(&self, status: SteeringStatus) {
        lock_telemetry(&self.telemetry).set_steering_status(status);
    }

    fn set_stage(&self, stage: HandshakeState) {
        self.set_status(SteeringStatus::Handshake { stage });
    }

    /// Authenticate with the plate and start streaming its angle.
    ///
    /// On failure steering status returns to `Disconnected` and the handshake
    /// to `Idle`, except after a rejection, which leaves it `Rejected`. A call
    /// to [`on_disconnected`](Self::on_disconnected) while this is pending
    /// makes it return [`BridgeError::Disconnected`].
    ///
    /// # Errors
    ///
    /// - `ServiceNotFound` if a Sterzo characteristic is missing
    /// - `HandshakeRejected` if the plate answers 0xFE
    /// - `HandshakeTimeout` if no final status arrives in time
    /// - `Transport` for failed writes or subscriptions
    pub async fn connect(&self, peripheral: Arc<dyn Peripheral>) -> Result<()> {
        let mut cancelled = self.shared.epoch.subscribe();
        info!(
            "Connecting to steering plate {}",
            peripheral.name().unwrap_or_else(|| "<unnamed>".to_string())
        );
        self.set_status(SteeringStatus::Connecting);

        let result = tokio::select! {
            result = self.establish(peripheral.as_ref()) => result,
            _ = cancelled.changed() => Err(BridgeError::Disconnected),
        };

        if let Err(e) = &result {
            warn!("Steering connection failed: {}", e);
            if !matches!(e, BridgeError::HandshakeRejected) {
                self.session().handshake.reset();
            }
            self.set_status(SteeringStatus::Disconnected);
        }

        result
    }

    async fn establish(&self, peripheral: &dyn Peripheral) -> Result<()> {
        let control_point = peripheral.characteristic(STERZO_SERVICE, STERZO_CONTROL_POINT).await?;
        let challenge = peripheral.characteristic(STERZO_SERVICE, STERZO_CHALLENGE).await?;
        let steering = peripheral.characteristic(STERZO_SERVICE, STERZO_STEERING).await?;
        debug!("Sterzo characteristics resolved, starting handshake");

        let mut frames = challenge.subscribe().await?;

        let trigger = self.session().handshake.start();
        self.set_stage(HandshakeState::AwaitingChallenge);
        tokio::time::sleep(self.settle_delay).await;
        control_point.write(&trigger).await?;

        let outcome = tokio::time::timeout(
            self.handshake_timeout,
            self.drive_handshake(control_point.as_ref(), &mut frames),
        )
        .await;

        frames.cancel();
        if let Err(e) = challenge.unsubscribe().await {
            warn!("Failed to stop challenge notifications: {}", e);
        }

        match outcome {
            Err(_) => return Err(BridgeError::HandshakeTimeout),
            Ok(result) => result?,
        }

        let angles = steering.subscribe().await?;
        let pump = tokio::spawn(pump_angles(angles, Arc::clone(&self.telemetry)));
        if let Some(previous) = self.session().angle_pump.replace(pump) {
            previous.abort();
        }

        info!("Steering plate connected");
        self.set_status(SteeringStatus::Connected);
        Ok(())
    }

    async fn drive_handshake(&self, control_point: &dyn Characteristic, frames: &mut Subscription) -> Result<()> {
        loop {
            let data = frames.next().await.ok_or(BridgeError::Disconnected)?;

            let (action, stage) = {
                let mut session = self.session();
                let action = session.handshake.on_notification(&data);
                (action, session.handshake.state())
            };

            match action {
                HandshakeAction::None => {}
                HandshakeAction::SendResponse(response) => {
                    self.set_stage(stage);
                    tokio::time::sleep(self.settle_delay).await;
                    control_point.write(&response).await?;
                }
                HandshakeAction::Accepted => {
                    self.set_stage(stage);
                    return Ok(());
                }
                HandshakeAction::Rejected => {
                    self.set_stage(stage);
                    return Err(BridgeError::HandshakeRejected);
                }
            }
        }
    }

    /// Transport dropped: cancel any pending connect and stop the angle stream.
    pub fn on_disconnected(&self) {
        self.shared.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));

        {
            let mut session = self.session();
            session.handshake.reset();
            if let Some(pump) = session.angle_pump.take() {
                pump.abort();
            }
        }

        info!("Steering plate disconnected");
        lock_telemetry(&self.telemetry).reset_steering();
    }
}

async fn pump_angles(mut angles: Subscription, telemetry: SharedTelemetry) {
    while let Some(data) = angles.next().await {
        match decode_steering_angle(&data) {
            Some(angle) => lock_telemetry(&telemetry).set_angle(f64::from(angle)),
            None => debug!("Ignoring short steering frame ({} bytes)", data.len()),
        }
    }
    debug!("Steering angle stream ended");
}

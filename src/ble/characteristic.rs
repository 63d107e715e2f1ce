//! Trait abstraction for GATT characteristics to decouple protocols from the BLE stack

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Default buffer depth for a notification subscription
pub const SUBSCRIPTION_CAPACITY: usize = 64;

/// A stream of notification payloads from one characteristic.
///
/// Ends (`next` yields `None`) when the transport drops its sending side.
/// Dropping the subscription cancels it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    /// Create a subscription and the sender a transport pushes notifications into.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Wait for the next notification payload.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Stop accepting notifications; already-buffered payloads are still returned.
    pub fn cancel(&mut self) {
        self.rx.close();
    }
}

/// Trait for GATT characteristic operations
#[async_trait]
pub trait Characteristic: Send + Sync {
    /// Characteristic UUID
    fn uuid(&self) -> Uuid;

    /// Read the current value
    async fn read(&self) -> Result<Vec<u8>>;

    /// Write a value (with response)
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Enable notifications and return the payload stream
    async fn subscribe(&self) -> Result<Subscription>;

    /// Disable notifications
    async fn unsubscribe(&self) -> Result<()>;
}

/// A connected BLE device whose GATT table has already been discovered.
#[async_trait]
pub trait Peripheral: Send + Sync {
    /// Advertised device name, if any
    fn name(&self) -> Option<String>;

    /// Resolve a characteristic within a primary service
    async fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<Arc<dyn Characteristic>>;
}

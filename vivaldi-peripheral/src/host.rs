//! Boundary to the host Bluetooth stack
//!
//! The bus transport is not part of this crate. Whatever carries calls to
//! and from the host stack implements [`HostStack`] for the outbound side
//! and feeds inbound calls to the peripheral as [`HostEvent`]s.

use async_trait::async_trait;
use tokio::sync::oneshot;
use vivaldi_gatt::{MethodCall, PropertiesChanged, Reply};
use vivaldi_proto::{GattError, ObjectPath};

/// Inbound traffic from the host stack
#[derive(Debug)]
pub enum HostEvent {
    /// A method call on one of our objects; the outcome goes back on `reply`
    Call {
        call: MethodCall,
        reply: oneshot::Sender<Result<Reply, GattError>>,
    },
}

impl HostEvent {
    pub fn call(call: MethodCall) -> (Self, oneshot::Receiver<Result<Reply, GattError>>) {
        let (reply, rx) = oneshot::channel();
        (HostEvent::Call { call, reply }, rx)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("{method} rejected by host stack: {reason}")]
    Rejected { method: String, reason: String },
    #[error("host stack connection lost")]
    Disconnected,
}

impl HostError {
    pub fn rejected(method: &str, reason: impl Into<String>) -> Self {
        HostError::Rejected { method: method.to_string(), reason: reason.into() }
    }
}

/// Calls this process makes into the host stack
#[async_trait]
pub trait HostStack: Send + Sync {
    /// First adapter offering `GattManager1`, if any
    async fn find_adapter(&self) -> Result<Option<ObjectPath>, HostError>;

    async fn power_on(&self, adapter: &ObjectPath) -> Result<(), HostError>;

    async fn register_application(
        &self,
        adapter: &ObjectPath,
        root: &ObjectPath,
    ) -> Result<(), HostError>;

    async fn unregister_application(
        &self,
        adapter: &ObjectPath,
        root: &ObjectPath,
    ) -> Result<(), HostError>;

    async fn register_advertisement(
        &self,
        adapter: &ObjectPath,
        advertisement: &ObjectPath,
    ) -> Result<(), HostError>;

    async fn unregister_advertisement(
        &self,
        adapter: &ObjectPath,
        advertisement: &ObjectPath,
    ) -> Result<(), HostError>;

    async fn register_agent(&self, agent: &ObjectPath, capability: &str) -> Result<(), HostError>;

    async fn unregister_agent(&self, agent: &ObjectPath) -> Result<(), HostError>;

    async fn request_default_agent(&self, agent: &ObjectPath) -> Result<(), HostError>;

    /// Set `Trusted` on a remote device
    async fn set_trusted(&self, device: &ObjectPath) -> Result<(), HostError>;

    async fn emit_signal(&self, signal: PropertiesChanged) -> Result<(), HostError>;
}

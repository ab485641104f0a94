//! GATT server core
//!
//! An [`Application`] owns the service / characteristic / descriptor tree,
//! answers the aggregated `GetManagedObjects` snapshot and dispatches
//! per-object calls through [`Application::dispatch`]. Value logic lives in
//! [`ValueHandler`] implementations plugged into each characteristic and
//! descriptor.
//!
//! The [`advertisement`] and [`agent`] modules are independent of the tree:
//! the host stack reads an advertisement once at registration and drives the
//! pairing agent on its own schedule.

pub mod advertisement;
pub mod agent;
mod dispatch;
pub mod shutdown;
mod tree;
pub mod value;

pub use dispatch::{MethodCall, PropertiesChanged, Reply};
pub use shutdown::Shutdown;
pub use tree::{
    Application, Characteristic, CharacteristicId, Descriptor, DescriptorId, EntityId, Service,
    ServiceId,
};
pub use value::{
    Capabilities, StaticValue, StoredValue, Unimplemented, UserDescription, ValueHandler,
    ValueOptions,
};

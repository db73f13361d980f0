//! The native bridge: a single, lazily established connection to an
//! external host process, speaking length-prefixed JSON.

pub mod bridge;
pub mod wire;

pub use bridge::{
    ConnectionState, HostHandle, HostLauncher, NativeBridge, ProcessLauncher, HOST_NAME,
    SEND_GRACE,
};

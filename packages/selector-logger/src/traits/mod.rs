//! Trait seams for external collaborators.

pub mod badge;
pub mod kv;

pub use badge::Badge;
pub use kv::KvStore;

//! Shared trait bounds for bridge implementations.
//!
//! Bridge objects are shared across async tasks (the controller, the transport
//! event pump and host callbacks), so every capability requires `Send + Sync`.
//! The marker trait below keeps those bounds in one place.

/// Marker trait for bridge objects shared across tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync + ?Sized {}

//! Core types, ports, and the snapshot service of the kliko waste schedule client.

/// Domain models shared by providers and consumers.
pub mod model;
/// Traits describing the provider interfaces, plus the error taxonomy.
pub mod ports;
/// Snapshot-holding service facade used by clients.
pub mod service;

pub use model::*;
pub use ports::*;
pub use service::*;

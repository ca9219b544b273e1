//! Sensor-side SDK embedded in client workloads: fetches compiled rules
//! from the control plane, evaluates inbound records against them, and
//! reports matches. `observe`/`flush` are synchronous from the host's
//! perspective; only `sync` and explicit `flush` perform network I/O.

pub mod buffer;
pub mod cache;
pub mod client;
pub mod error;
pub mod failmode;
pub mod sensor;

pub use buffer::{BufferCaps, BufferedEvent};
pub use cache::RuleCache;
pub use client::SensorClient;
pub use error::{SdkError, TransportError};
pub use failmode::FailureMode;
pub use sensor::{FlushResult, LocalDiagnostics, Sensor, SensorConfig};

//! Machine-readable output for the event journal and status snapshots.
//!
//! Two row shapes share one stream:
//! - [`Event`](parkgate_core::Event) rows, tagged by their `event` field
//! - [`StatusRow`] rows, tagged by a `status` object

pub mod json_stream;

use parkgate_core::Millis;
use serde::Serialize;

use crate::reporter::SystemStatus;

/// A status snapshot stamped with the tick it was taken on.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRow<'a> {
    pub at_ms: Millis,
    pub status: &'a SystemStatus,
}

pub use json_stream::JsonStreamSink;

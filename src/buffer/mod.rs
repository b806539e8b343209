//! Buffer nodes that decouple two timing domains.
//!
//! - [`CrossDomainBuffer`]: a passive ring, written from one graph and read
//!   from another
//! - [`ReadAheadBuffer`]: a ring plus a background task that pulls upstream
//! - [`WriteBehindBuffer`]: a ring plus a background task that pushes downstream
//!
//! All three share [`SampleRing`]'s overflow policy: a write that does not fit
//! discards the oldest whole frames, and nothing ever blocks on absent data.

mod cross_domain;
mod read_ahead;
mod ring;
mod stats;
mod write_behind;

pub use cross_domain::CrossDomainBuffer;
pub use read_ahead::ReadAheadBuffer;
pub use ring::SampleRing;
pub use stats::{BufferStats, BufferStatsSnapshot};
pub use write_behind::WriteBehindBuffer;

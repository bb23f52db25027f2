//! Single-producer/single-consumer byte queue over a mirrored shared mapping.
//!
//! The data region is mapped twice, back to back, so any window that starts
//! inside the buffer can be handed out as one linear slice even when it runs
//! past the wrap point. The pieces, leaf first:
//! * [`mirror`] – page-size rounding plus the double mapping of the backing object.
//! * [`cursor`] – read/write counters and the masked space arithmetic.
//! * [`ReadGrant`] / [`WriteGrant`] – zero-copy views committed in a second step.
//! * [`MirrorQueue`], [`Producer`], [`Consumer`] – generic callback and copy APIs.
//! * [`QueueError`] – construction failures; the data path only ever reports counts.

pub mod cursor;
mod config;
mod error;
mod grant;
mod io;
pub mod mirror;
mod queue;

pub use config::{QueueConfig, DEFAULT_MIN_CAPACITY, DEFAULT_PERMISSIONS, MAX_NAME_LEN};
pub use error::{QueueError, QueueResult};
pub use grant::{ReadGrant, WriteGrant};
pub use queue::{Consumer, MirrorQueue, Producer};

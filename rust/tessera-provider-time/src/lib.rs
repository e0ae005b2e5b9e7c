//! Time, astronomy and humanization modules for tessera applets.
//!
//! - `time.star`: `time.Time` and `time.Duration` values
//! - `sunrise.star`: sunrise and sunset for a location and date
//! - `humanize.star`: relative times, byte sizes, numbers and plurals
//!
//! Locations are `"UTC"` or a fixed offset such as `"+02:00"`; named time
//! zones are not available.

pub mod humanize;
pub mod sunrise;
pub mod time;

pub use time::{DurationValue, TimeValue};

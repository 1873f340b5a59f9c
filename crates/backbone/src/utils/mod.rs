//! Small helpers shared across modules.

mod panic;

pub(crate) use panic::catch_panic;

//! Panic isolation for user-supplied callbacks.
//!
//! Subscriber callbacks, command handlers and pool tasks are all foreign code
//! running on a thread we own. A panic inside one of them is converted into an
//! error for that unit of work instead of unwinding through the caller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, turning a panic into `Err(message)`.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_panic_passes_values_through() {
        assert_eq!(catch_panic(|| 5), Ok(5));
    }

    #[test]
    fn test_catch_panic_reports_message() {
        let result: Result<(), String> = catch_panic(|| panic!("boom {}", 7));
        assert_eq!(result, Err("boom 7".to_string()));

        let result: Result<(), String> = catch_panic(|| panic!("static boom"));
        assert_eq!(result, Err("static boom".to_string()));
    }
}

//! Typed publish/subscribe event bus.
//!
//! Producers post [`Event`] values; subscribers register typed callbacks
//! through [`Handlers`] under an [`OwnerId`]. Delivery is synchronous and
//! isolated per subscriber. Work that should not run on the posting thread is
//! handed to the [`TaskPool`](crate::pool::TaskPool) by the subscriber itself.

mod bus;
mod handlers;
mod types;

pub use bus::{EventBus, PostReport};
pub use handlers::{HandlerError, HandlerResult, Handlers, OwnerId, Subscriber};
pub use types::{
    CursorMovedEvent, Event, EventKind, EventPayload, FailureKind, InputAction, KeyPressEvent,
    Modifiers, MouseButton, MouseButtonEvent, NetworkFailure, PacketReceived,
    UntrustedClientDetected, WindowClosedEvent, WindowResizedEvent,
};

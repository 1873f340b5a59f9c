//! Event payloads carried by the bus.
//!
//! [`Event`] is a closed set of variants; [`EventKind`] is its discriminant and
//! the key subscribers are registered under. Each variant wraps its own
//! payload struct so handlers receive a typed reference.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;

/// Something that happened in the engine, the network layer, or the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(
    name(EventKind),
    derive(Hash, PartialOrd, Ord, strum::EnumIter, strum::Display, Serialize, Deserialize)
)]
pub enum Event {
    // Network
    PacketReceived(PacketReceived),
    UntrustedClientDetected(UntrustedClientDetected),
    NetworkFailure(NetworkFailure),

    // Input and window
    MouseButton(MouseButtonEvent),
    KeyPress(KeyPressEvent),
    CursorMoved(CursorMovedEvent),
    WindowResized(WindowResizedEvent),
    WindowClosed(WindowClosedEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

/// A command packet arrived from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketReceived {
    pub packet: Vec<u8>,
    pub source: SocketAddr,
}

/// A peer sent something the transport refuses to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntrustedClientDetected {
    pub source: SocketAddr,
    pub packet: Vec<u8>,
    pub reason: String,
}

/// The transport hit an I/O error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFailure {
    /// Peer involved, if the failure happened on an established connection.
    pub source: Option<SocketAddr>,
    pub kind: FailureKind,
    pub message: String,
}

impl NetworkFailure {
    pub fn from_io(source: Option<SocketAddr>, error: &std::io::Error) -> Self {
        Self {
            source,
            kind: error.kind().into(),
            message: error.to_string(),
        }
    }
}

/// Coarse classification of a [`NetworkFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum FailureKind {
    ConnectionReset,
    ConnectionAborted,
    BrokenPipe,
    TimedOut,
    UnexpectedEof,
    Other,
}

impl From<std::io::ErrorKind> for FailureKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::ConnectionReset => Self::ConnectionReset,
            ErrorKind::ConnectionAborted => Self::ConnectionAborted,
            ErrorKind::BrokenPipe => Self::BrokenPipe,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::TimedOut,
            ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputAction {
    Press,
    Release,
    Repeat,
}

/// Keyboard modifier state at the time of an input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: u8 = 0b0000_0000;
    pub const SHIFT: u8 = 0b0000_0001;
    pub const CONTROL: u8 = 0b0000_0010;
    pub const ALT: u8 = 0b0000_0100;
    pub const SUPER: u8 = 0b0000_1000;

    pub const fn empty() -> Self {
        Self(Self::NONE)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub button: MouseButton,
    pub action: InputAction,
    pub modifiers: Modifiers,
    /// Cursor position in window coordinates.
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPressEvent {
    pub key: u32,
    pub scancode: i32,
    pub action: InputAction,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorMovedEvent {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowResizedEvent {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClosedEvent;

/// Payload types that correspond to exactly one [`Event`] variant.
///
/// Lets handlers be registered against a payload type; the bus derives the
/// kind from [`EventPayload::KIND`] and only ever hands the handler a payload
/// of that type.
pub trait EventPayload: Sized + Send + Sync + 'static {
    const KIND: EventKind;

    /// Borrows the payload if `event` is of this kind.
    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! event_payloads {
    ($($variant:ident => $payload:ty),* $(,)?) => {
        $(
            impl EventPayload for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$payload> for Event {
                fn from(payload: $payload) -> Self {
                    Event::$variant(payload)
                }
            }
        )*
    };
}

event_payloads! {
    PacketReceived => PacketReceived,
    UntrustedClientDetected => UntrustedClientDetected,
    NetworkFailure => NetworkFailure,
    MouseButton => MouseButtonEvent,
    KeyPress => KeyPressEvent,
    CursorMoved => CursorMovedEvent,
    WindowResized => WindowResizedEvent,
    WindowClosed => WindowClosedEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_matches_variant() {
        let event: Event = WindowResizedEvent {
            width: 800,
            height: 600,
        }
        .into();
        assert_eq!(event.kind(), EventKind::WindowResized);
        assert_eq!(event.kind(), WindowResizedEvent::KIND);
        assert_eq!(event.kind().to_string(), "WindowResized");
    }

    #[test]
    fn test_from_event_rejects_other_kinds() {
        let event = Event::WindowClosed(WindowClosedEvent);
        assert!(WindowClosedEvent::from_event(&event).is_some());
        assert!(KeyPressEvent::from_event(&event).is_none());
    }

    #[test]
    fn test_every_kind_is_enumerable() {
        assert_eq!(EventKind::iter().count(), 8);
    }

    #[test]
    fn test_network_failure_from_io() {
        let peer: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away");

        let failure = NetworkFailure::from_io(Some(peer), &error);
        assert_eq!(failure.source, Some(peer));
        assert_eq!(failure.kind, FailureKind::ConnectionReset);
        assert_eq!(failure.message, "peer went away");

        let other = std::io::Error::other("disk on fire");
        assert_eq!(NetworkFailure::from_io(None, &other).kind, FailureKind::Other);
    }

    #[test]
    fn test_modifiers() {
        let mut modifiers = Modifiers::empty();
        modifiers.insert(Modifiers::SHIFT);
        assert!(modifiers.contains(Modifiers::SHIFT));
        assert!(!modifiers.contains(Modifiers::ALT));
        assert_eq!(Modifiers::from_bits(modifiers.bits()), modifiers);
    }
}

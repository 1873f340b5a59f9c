//! Event and command backbone shared by the game client and server.
//!
//! This crate wires a typed publish/subscribe bus, a bounded task pool and a
//! line-based command protocol around a chunked block world. Hosts embed the
//! pieces they need: the server feeds network packets through the
//! [`EventBus`] and answers requests with the [`Dispatcher`], while client
//! code posts input events and offloads slow reactions to the [`TaskPool`].
//!
//! Modules are organized by responsibility:
//! - [`events`] hosts the event types and the bus
//! - [`pool`] runs submitted work on a fixed set of worker threads
//! - [`commands`] exposes the command trait, registry and dispatcher
//! - [`world`] stores chunks and provides the binary chunk codec
//! - [`config`] loads tunables from the environment
pub mod commands;
pub mod config;
pub mod events;
pub mod pool;
pub mod world;

mod utils;

pub use commands::{
    ChunkCommand, Command, CommandContext, CommandError, CommandRegistry, DispatchError,
    Dispatcher, PingCommand,
};
pub use config::{BackboneConfig, ConfigError, PoolConfig, WorldConfig};
pub use events::{
    Event, EventBus, EventKind, EventPayload, HandlerError, HandlerResult, Handlers, OwnerId,
    PostReport, Subscriber,
};
pub use pool::{
    MetricsSnapshot, PoolError, PoolMetrics, ShutdownReport, TaskContext, TaskError, TaskHandle,
    TaskId, TaskPool, TaskStatus,
};
pub use world::{ChunkCoord, ChunkData, ChunkGenerator, CodecError, LayeredGenerator, World};

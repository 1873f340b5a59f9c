//! Default event subscribers installed by the server.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use backbone::events::{NetworkFailure, PacketReceived, UntrustedClientDetected};
use backbone::{HandlerError, Handlers, OwnerId, Subscriber, TaskPool};
use tracing::{debug, warn};

/// Counts traffic and hands per-packet logging to the task pool so the
/// connection that posted the event is not held up.
pub struct PacketStats {
    owner: OwnerId,
    pool: TaskPool,
    packets: AtomicU64,
    bytes: AtomicU64,
    failures: AtomicU64,
}

impl PacketStats {
    pub fn new(pool: TaskPool) -> Arc<Self> {
        Arc::new(Self {
            owner: OwnerId::next(),
            pool,
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn on_packet(&self, event: &PacketReceived) -> Result<(), HandlerError> {
        let packets = self.packets.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes = self.bytes.fetch_add(event.packet.len() as u64, Ordering::Relaxed)
            + event.packet.len() as u64;

        let source = event.source;
        let len = event.packet.len();
        self.pool
            .submit(move |_| {
                debug!(%source, len, packets, bytes, "Packet received");
                Ok(())
            })
            .map_err(|err| HandlerError::with_source("packet log task rejected", err))?;
        Ok(())
    }
}

impl Subscriber for PacketStats {
    fn owner_id(&self) -> OwnerId {
        self.owner
    }

    fn handlers(self: Arc<Self>) -> Handlers {
        let on_packet = Arc::clone(&self);
        let on_failure = self;
        Handlers::new()
            .on::<PacketReceived>("packet_stats", move |event| on_packet.on_packet(event))
            .on::<NetworkFailure>("failure_stats", move |event| {
                on_failure.failures.fetch_add(1, Ordering::Relaxed);
                warn!(source = ?event.source, kind = %event.kind, message = %event.message, "Network failure");
                Ok(())
            })
    }
}

/// Logs peers the transport refused to serve.
pub struct UntrustedClientLog {
    owner: OwnerId,
}

impl UntrustedClientLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            owner: OwnerId::next(),
        })
    }
}

impl Subscriber for UntrustedClientLog {
    fn owner_id(&self) -> OwnerId {
        self.owner
    }

    fn handlers(self: Arc<Self>) -> Handlers {
        Handlers::new().on::<UntrustedClientDetected>("log_untrusted", |event| {
            warn!(
                source = %event.source,
                reason = %event.reason,
                len = event.packet.len(),
                "Untrusted client detected"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use backbone::events::FailureKind;
    use backbone::{EventBus, PoolConfig};

    fn packet(bytes: &[u8]) -> PacketReceived {
        PacketReceived {
            packet: bytes.to_vec(),
            source: "127.0.0.1:5000".parse().unwrap(),
        }
    }

    #[test]
    fn test_packet_stats_counts_and_offloads() {
        let pool = TaskPool::with_config(PoolConfig {
            workers: 1,
            queue_capacity: 16,
            shutdown_grace: Duration::from_secs(1),
        });
        pool.start().unwrap();

        let bus = EventBus::new();
        let stats = PacketStats::new(pool.clone());
        let owner = bus.register_subscriber(Arc::clone(&stats));

        assert_eq!(bus.post(packet(b"ping")).delivered, 1);
        assert_eq!(bus.post(packet(b"chunk 1 2")).delivered, 1);
        bus.post(NetworkFailure {
            source: None,
            kind: FailureKind::ConnectionReset,
            message: "reset".to_string(),
        });

        assert_eq!(stats.packets(), 2);
        assert_eq!(stats.bytes(), 13);
        assert_eq!(stats.failures(), 1);

        assert!(pool.shutdown(Duration::from_secs(5)).graceful);
        assert_eq!(pool.metrics().completed(), 2);

        assert_eq!(bus.unregister(owner), 2);
    }

    #[test]
    fn test_packet_stats_reports_stopped_pool() {
        let bus = EventBus::new();
        let stats = PacketStats::new(TaskPool::new());
        bus.register_subscriber(Arc::clone(&stats));

        let report = bus.post(packet(b"ping"));
        assert_eq!(report.failed, 1);
        assert_eq!(stats.packets(), 1);
    }
}

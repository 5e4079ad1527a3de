//! Event Logger - records every bus notification in the tracing log
//!
//! The logger listens on the bus tap, so it also sees kinds nobody is
//! subscribed to. It exits once the bus is dropped.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::bus::EventBus;

/// Spawn a background task logging every notification emitted on `bus`
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<u64> {
    debug!("spawn_event_logger: starting event logger");
    let mut rx = bus.tap();

    tokio::spawn(async move {
        let mut logged = 0u64;
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    info!(
                        kind = %notification.kind,
                        id = %notification.id,
                        emitted_at = %notification.emitted_at,
                        "Notification"
                    );
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed notifications");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(logged, "EventLogger: bus closed, shutting down");
                    break;
                }
            }
        }
        logged
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_logger_counts_and_exits_when_bus_dropped() {
        let bus = EventBus::new(16);
        let logger = spawn_event_logger(&bus);

        bus.emit(EventKind::SyncFinished);
        bus.emit(EventKind::Other("tab-opened".to_string()));
        drop(bus);

        assert_eq!(logger.await.unwrap(), 2);
    }
}

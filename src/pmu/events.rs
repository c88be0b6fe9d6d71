//! Structured lifecycle events, pushed to subscribers over a broadcast
//! channel as they happen.

use std::fmt;
use std::net::SocketAddr;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something the device did or observed.
#[derive(Debug, Clone)]
pub enum PmuEvent {
    Listening { addr: SocketAddr },
    ClientConnected { peer: SocketAddr },
    ClientDisconnected { peer: SocketAddr },
    CommandReceived { peer: SocketAddr, description: String },
    ConfigurationChanged,
    IdChanged { idcode: u16 },
    DataRateChanged { data_rate: i16 },
    Stopped,
}

impl fmt::Display for PmuEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmuEvent::Listening { addr } => write!(f, "Listening on {}", addr),
            PmuEvent::ClientConnected { peer } => write!(f, "Client connected: {}", peer),
            PmuEvent::ClientDisconnected { peer } => write!(f, "Client disconnected: {}", peer),
            PmuEvent::CommandReceived { peer, description } => {
                write!(f, "Command from {}: {}", peer, description)
            }
            PmuEvent::ConfigurationChanged => write!(f, "Configuration changed"),
            PmuEvent::IdChanged { idcode } => write!(f, "ID code changed to {}", idcode),
            PmuEvent::DataRateChanged { data_rate } => {
                write!(f, "Data rate changed to {}", data_rate)
            }
            PmuEvent::Stopped => write!(f, "Server stopped"),
        }
    }
}

/// Broadcast fan-out for [`PmuEvent`]s. Emitting never blocks; subscribers
/// that fall behind lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PmuEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventBus { sender }
    }

    /// Publishes an event. A send with no live subscribers is not an error.
    pub fn emit(&self, event: PmuEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PmuEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(PmuEvent::ConfigurationChanged);
        bus.emit(PmuEvent::IdChanged { idcode: 780 });

        assert!(matches!(
            rx.recv().await.unwrap(),
            PmuEvent::ConfigurationChanged
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            PmuEvent::IdChanged { idcode: 780 }
        ));
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(PmuEvent::Stopped);
    }
}

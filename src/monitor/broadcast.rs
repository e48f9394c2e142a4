//! 广播 (Broadcast fan-out)
//!
//! 每个订阅者一个有界通道, 发送用 try_send: 满了就跳过这一次,
//! 断开的订阅者在下一次发送时移除。慢订阅者不会拖住监控节拍。

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::debug;

use crate::state::{HealthView, Snapshot};

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    pub name: &'static str,
    pub snapshot: Snapshot,
    pub health: HealthView,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitReport {
    pub delivered: usize,
    pub skipped: usize, // 通道已满
    pub pruned: usize,  // 订阅者已断开
}

#[derive(Default)]
pub struct Broadcaster {
    subscribers: Mutex<Vec<Sender<BroadcastEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, capacity: usize) -> Receiver<BroadcastEvent> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn emit(&self, event: BroadcastEvent) -> EmitReport {
        let mut report = EmitReport::default();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                report.skipped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                report.pruned += 1;
                false
            }
        });
        if report.skipped > 0 || report.pruned > 0 {
            debug!(
                "📡 广播 {}: 送达{} 跳过{} 移除{}",
                event.name, report.delivered, report.skipped, report.pruned
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SharedState;
    use std::time::Duration;

    fn event() -> BroadcastEvent {
        let state = SharedState::new();
        BroadcastEvent {
            name: "status_update",
            snapshot: state.read_snapshot(),
            health: state.health().view(Duration::from_secs(1)),
        }
    }

    #[test]
    fn test_fan_out_to_all() {
        let b = Broadcaster::new();
        let r1 = b.subscribe(4);
        let r2 = b.subscribe(4);
        assert_eq!(b.emit(event()).delivered, 2);
        assert_eq!(r1.try_recv().unwrap().name, "status_update");
        assert!(r2.try_recv().is_ok());
    }

    #[test]
    fn test_slow_subscriber_is_skipped() {
        let b = Broadcaster::new();
        let slow = b.subscribe(1);
        let fast = b.subscribe(8);
        b.emit(event());
        let report = b.emit(event());
        assert_eq!(report, EmitReport { delivered: 1, skipped: 1, pruned: 0 });
        assert_eq!(slow.len(), 1);
        assert_eq!(fast.len(), 2);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let b = Broadcaster::new();
        let keep = b.subscribe(4);
        drop(b.subscribe(4));
        let report = b.emit(event());
        assert_eq!(report.pruned, 1);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(keep.len(), 1);
    }
}

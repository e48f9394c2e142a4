//! 最新帧队列 (Latest-wins queue)
//!
//! 容量固定为1: 生产者永不阻塞,新数据到达时丢弃尚未消费的旧数据。
//! 推理跟不上采集时,只有最新一帧有价值。

use crate::error::{Result, SentinelError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::Frame;

/// 向有界通道发送, 满时丢弃最旧的数据再重试 (生产者永不阻塞)
///
/// 返回被丢弃的旧数据个数; 所有接收端都已释放时把数据原样交回。
pub fn send_latest<T>(tx: &Sender<T>, stale: &Receiver<T>, item: T) -> std::result::Result<usize, T> {
    let mut item = item;
    let mut dropped = 0;
    loop {
        match tx.try_send(item) {
            Ok(()) => return Ok(dropped),
            Err(TrySendError::Full(back)) => {
                // 消费者可能恰好先取走
                if stale.try_recv().is_ok() {
                    dropped += 1;
                }
                item = back;
            }
            Err(TrySendError::Disconnected(back)) => return Err(back),
        }
    }
}

pub struct LatestQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    dropped: AtomicU64, // 被覆盖丢弃的数量
}

/// 采集线程 → 推理线程
pub type FrameQueue = LatestQueue<Frame>;

impl<T> LatestQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// 放入数据 (不阻塞)。返回 true 表示覆盖了一个未消费的旧数据
    pub fn push(&self, item: T) -> bool {
        // 两端都由自身持有,不会断开
        let replaced = send_latest(&self.tx, &self.rx, item).unwrap_or(0);
        self.dropped.fetch_add(replaced as u64, Ordering::Relaxed);
        replaced > 0
    }

    /// 取出数据,最多等待 `timeout`
    pub fn pop(&self, timeout: Duration) -> Result<T> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| SentinelError::Timeout)
    }

    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Default for LatestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_second_push_replaces_first() {
        let queue = LatestQueue::new();
        assert!(!queue.push(1));
        assert!(queue.push(2));

        assert_eq!(queue.pop(Duration::from_millis(10)).unwrap(), 2);
        assert!(matches!(
            queue.pop(Duration::from_millis(10)),
            Err(SentinelError::Timeout)
        ));
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_pop_times_out_when_empty() {
        let queue: LatestQueue<u32> = LatestQueue::new();
        let start = Instant::now();
        assert!(matches!(
            queue.pop(Duration::from_millis(30)),
            Err(SentinelError::Timeout)
        ));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_pop_wakes_on_push() {
        let queue = Arc::new(LatestQueue::new());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(7u32);
            })
        };
        assert_eq!(queue.pop(Duration::from_secs(2)).unwrap(), 7);
        producer.join().unwrap();
    }

    #[test]
    fn test_push_never_blocks_producer() {
        let queue = LatestQueue::new();
        let start = Instant::now();
        for i in 0..10_000u32 {
            queue.push(i);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.try_pop(), Some(9_999));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_send_latest_drops_oldest_when_full() {
        let (tx, rx) = bounded(2);
        let stale = rx.clone();
        assert_eq!(send_latest(&tx, &stale, 1), Ok(0));
        assert_eq!(send_latest(&tx, &stale, 2), Ok(0));
        assert_eq!(send_latest(&tx, &stale, 3), Ok(1));
        assert_eq!(send_latest(&tx, &stale, 4), Ok(1));

        // 保留的是最新的两帧
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_send_latest_returns_item_without_receiver() {
        let (tx, rx) = bounded::<u32>(1);
        let stale = rx.clone();
        drop(rx);
        drop(stale);
        let (_, other) = bounded::<u32>(1);
        assert_eq!(send_latest(&tx, &other, 5), Err(5));
    }
}

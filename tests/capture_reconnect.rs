mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{BreakingOpener, FlakyOpener};
use crowd_sentinel::input::{CaptureLoop, CaptureState, FrameQueue, SourceId};

#[test]
fn open_failure_then_success_streams_once() {
    let opener = FlakyOpener::new(2);
    let attempts = opener.attempts.clone();
    let successes = opener.successes.clone();

    let queue = Arc::new(FrameQueue::new());
    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = crossbeam_channel::unbounded();

    let mut capture = CaptureLoop::new(
        SourceId::parse("rtsp://camera/stream"),
        Box::new(opener),
        queue.clone(),
        running.clone(),
    )
    .with_backoff(Duration::from_millis(20), Duration::from_millis(20))
    .with_state_observer(tx);

    let handle = thread::spawn(move || capture.run());

    // 退避后重连成功, 帧开始进入队列
    let first = queue.pop(Duration::from_secs(5)).expect("no frame after reconnect");
    assert_eq!((first.width, first.height), (160, 120));
    let second = queue.pop(Duration::from_secs(1)).unwrap();
    assert!(second.seq > first.seq);

    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();

    let states: Vec<CaptureState> = rx.try_iter().collect();
    assert_eq!(
        states.iter().filter(|s| **s == CaptureState::Streaming).count(),
        1,
        "{:?}",
        states
    );
    assert_eq!(states.iter().filter(|s| **s == CaptureState::Opening).count(), 3);
    assert_eq!(states.last(), Some(&CaptureState::Stopped));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(successes.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_during_backoff_is_prompt() {
    let opener = FlakyOpener::new(usize::MAX);
    let running = Arc::new(AtomicBool::new(true));
    let mut capture = CaptureLoop::new(
        SourceId::Device(0),
        Box::new(opener),
        Arc::new(FrameQueue::new()),
        running.clone(),
    )
    .with_backoff(Duration::from_secs(30), Duration::from_secs(30));

    let handle = thread::spawn(move || capture.run());
    thread::sleep(Duration::from_millis(50));
    running.store(false, Ordering::SeqCst);

    let started = Instant::now();
    handle.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn read_error_reopens_after_read_backoff() {
    let opener = BreakingOpener::new(3);
    let opened_at = opener.opened_at.clone();
    let read_backoff = Duration::from_millis(60);

    let queue = Arc::new(FrameQueue::new());
    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = crossbeam_channel::unbounded();

    let mut capture = CaptureLoop::new(
        SourceId::parse("rtsp://camera/stream"),
        Box::new(opener),
        queue.clone(),
        running.clone(),
    )
    .with_backoff(Duration::from_secs(30), read_backoff)
    .with_state_observer(tx);

    let handle = thread::spawn(move || capture.run());

    let deadline = Instant::now() + Duration::from_secs(5);
    while opened_at.lock().unwrap().len() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();

    let opens = opened_at.lock().unwrap().clone();
    assert!(opens.len() >= 3, "only {} opens", opens.len());
    // 读错误走短退避, 而不是打开失败的长退避
    for pair in opens.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= read_backoff, "{:?}", gap);
        assert!(gap < Duration::from_secs(5), "{:?}", gap);
    }

    let states: Vec<CaptureState> = rx.try_iter().collect();
    let cycles = states
        .windows(2)
        .filter(|w| w[0] == CaptureState::Opening && w[1] == CaptureState::Streaming)
        .count();
    assert!(cycles >= 3, "{:?}", states);
    assert_eq!(states.last(), Some(&CaptureState::Stopped));

    // 每次断开前的帧都进了队列, 最新一帧序号随重连递增
    let last = queue.try_pop().expect("no frame captured");
    assert!(last.seq >= 6, "seq {}", last.seq);
}

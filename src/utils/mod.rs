/// 工具模块
/// Utility modules
pub mod homography;

pub use homography::HomographyMatrix;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 分段睡眠,期间收到停止请求立即返回
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) {
    const STEP: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(STEP.min(deadline - now));
    }
}

//! 硬件桥 (Hardware bridge)
//!
//! 监控节拍只把命令放进容量为1的队列, 由 `hardware-bridge` 线程负责发送。
//! 尚未发出的旧命令会被新命令覆盖。

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::HardwareConfig;
use crate::error::{Result, SentinelError};
use crate::input::LatestQueue;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 单条命令的写超时
const WRITE_TIMEOUT: Duration = Duration::from_millis(100);
/// 打开串口会让 Arduino 复位, 复位期间写入会丢失
const BOARD_RESET: Duration = Duration::from_secs(2);
/// 停止时等待发送线程的上限
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub trait HardwareBridge: Send + Sync {
    fn send(&self, command: &str) -> Result<()>;
    fn is_connected(&self) -> bool;
}

type PortWriter = Box<dyn Write + Send>;

/// 串口桥: 每条命令一行
pub struct SerialBridge {
    port: Option<String>,
    conn: Mutex<Option<PortWriter>>,
    connected: AtomicBool,
    ready_at: Instant,
}

impl SerialBridge {
    /// 尝试连接, 失败时进入断开状态 (不返回错误)
    ///
    /// 串口以非阻塞方式打开, 不会卡住调用方; 复位等待放在第一次发送时。
    pub fn connect(port: Option<&str>, baud: u32) -> Self {
        let Some(p) = port else {
            info!("🔌 未配置硬件串口, 硬件联动关闭");
            return Self::disconnected();
        };
        match serialport::new(p, baud).timeout(WRITE_TIMEOUT).open() {
            Ok(serial) => {
                info!("✅ 硬件串口已连接: {} @ {}baud", p, baud);
                Self::with_writer(p, serial, Instant::now() + BOARD_RESET)
            }
            Err(e) => {
                warn!("⚠️ 硬件串口 {} 连接失败: {}", p, e);
                Self {
                    port: Some(p.to_string()),
                    conn: Mutex::new(None),
                    connected: AtomicBool::new(false),
                    ready_at: Instant::now(),
                }
            }
        }
    }

    pub fn from_config(config: &HardwareConfig) -> Self {
        Self::connect(config.port.as_deref(), config.baud)
    }

    /// 使用任意写入端 (例如已打开的设备或测试缓冲)
    pub fn with_writer(label: &str, writer: impl Write + Send + 'static, ready_at: Instant) -> Self {
        Self {
            port: Some(label.to_string()),
            conn: Mutex::new(Some(Box::new(writer))),
            connected: AtomicBool::new(true),
            ready_at,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            port: None,
            conn: Mutex::new(None),
            connected: AtomicBool::new(false),
            ready_at: Instant::now(),
        }
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }
}

impl HardwareBridge for SerialBridge {
    fn send(&self, command: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(SentinelError::HardwareDisconnected);
        }
        // 只在发送线程上等待板子复位
        let wait = self.ready_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let writer = conn.as_mut().ok_or(SentinelError::HardwareDisconnected)?;
        let written = writer
            .write_all(format!("{}\n", command).as_bytes())
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            warn!("❌ 硬件命令发送失败, 标记为断开: {}", e);
            *conn = None;
            self.connected.store(false, Ordering::SeqCst);
            return Err(SentinelError::HardwareDisconnected);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub struct HardwareDispatcher {
    queue: Arc<LatestQueue<String>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HardwareDispatcher {
    pub fn spawn(bridge: Arc<dyn HardwareBridge>) -> Result<Self> {
        let queue = Arc::new(LatestQueue::<String>::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let queue = queue.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("hardware-bridge".into())
                .spawn(move || {
                    let mut sent = 0u64;
                    while running.load(Ordering::Relaxed) {
                        let Ok(command) = queue.pop(POLL_INTERVAL) else {
                            continue;
                        };
                        // 断开时静默丢弃
                        if !bridge.is_connected() {
                            continue;
                        }
                        match bridge.send(&command) {
                            Ok(()) => sent += 1,
                            Err(e) => debug!("硬件命令 {} 未送达: {}", command, e),
                        }
                    }
                    debug!("硬件桥线程退出 (已发送{}条)", sent);
                })?
        };

        Ok(Self {
            queue,
            running,
            handle: Some(handle),
        })
    }

    /// 非阻塞投递
    pub fn dispatch(&self, command: String) {
        self.queue.push(command);
    }

    pub fn shutdown(&mut self) -> bool {
        self.shutdown_within(SHUTDOWN_GRACE)
    }

    /// 停止发送线程; 超时仍卡在写入时放弃等待, 返回 false
    pub fn shutdown_within(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            true
        } else {
            warn!("⚠️ 硬件桥线程仍在发送, 不再等待");
            false
        }
    }
}

impl Drop for HardwareDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

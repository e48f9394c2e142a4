/// 人群风险监控 (Crowd Sentinel)
///
/// 视频人群密度 + 音频恐慌检测 → 风险等级
///
/// 系统架构:
/// 1. 采集线程: 视频源打开/重连 (独立工作线程)
/// 2. 推理线程: 人数统计与密度分级 (独立工作线程)
/// 3. 音频线程: 恐慌声检测 (独立工作线程)
/// 4. 监控线程: 风险融合, 广播/记录/硬件联动
/// 5. 主线程:   等待 Ctrl+C 或运行时长到期
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crowd_sentinel::audio::{AudioBackend, HeuristicClassifier};
use crowd_sentinel::config::{Args, SentinelConfig};
use crowd_sentinel::detection::BlobDetector;
use crowd_sentinel::input::{SourceId, SourceOpener, SyntheticOpener};
use crowd_sentinel::monitor::{JsonLinesSink, SerialBridge};
use crowd_sentinel::sentinel::{Collaborators, Sentinel};
use crowd_sentinel::state::SharedState;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 360;
const PREVIEW_INTERVAL: Duration = Duration::from_millis(200);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_opener(source: &SourceId, args: &Args) -> Box<dyn SourceOpener> {
    match source {
        SourceId::Synthetic => Box::new(SyntheticOpener::new(
            SYNTHETIC_WIDTH,
            SYNTHETIC_HEIGHT,
            args.synthetic_people,
        )),
        #[cfg(feature = "ffmpeg")]
        _ => Box::new(crowd_sentinel::input::FfmpegOpener::new()),
        #[cfg(not(feature = "ffmpeg"))]
        _ => {
            warn!("⚠️ 未启用 ffmpeg 特性, 视频源 {} 将无法打开", source);
            Box::new(SyntheticOpener::new(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, args.synthetic_people))
        }
    }
}

fn build_audio_backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "audio-device")]
    {
        Box::new(crowd_sentinel::audio::CpalBackend::new())
    }
    #[cfg(not(feature = "audio-device"))]
    {
        Box::new(crowd_sentinel::audio::NullAudioBackend)
    }
}

fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("crowd-sentinel"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crowd_log.jsonl")
}

/// 按自己的节奏把最新预览帧写到文件
fn spawn_preview_writer(
    state: Arc<SharedState>,
    path: PathBuf,
    running: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new().name("preview".into()).spawn(move || {
        let tmp = path.with_extension("jpg.tmp");
        let mut announced = false;
        while running.load(Ordering::Relaxed) {
            if let Some(jpeg) = state.read_frame() {
                // 先写临时文件再改名, 读者不会看到半张图
                let written = std::fs::write(&tmp, &jpeg).and_then(|_| std::fs::rename(&tmp, &path));
                match written {
                    Ok(()) if !announced => {
                        info!("🖼️ 预览帧输出: {}", path.display());
                        announced = true;
                    }
                    Ok(()) => {}
                    Err(e) => warn!("⚠️ 预览帧写入失败: {}", e),
                }
            }
            thread::sleep(PREVIEW_INTERVAL);
        }
    })?;
    Ok(handle)
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    info!("🚀 人群风险监控系统启动");

    // ========== 配置 ==========
    let mut config = SentinelConfig::load(&args.config);
    config.apply_args(&args);
    config.validate().context("配置无效")?;
    config.log_summary();

    let source = SourceId::parse(&args.source);
    info!("📹 视频源: {}", source);

    // ========== 协作者 ==========
    let log_path = args.log_path.clone().unwrap_or_else(default_log_path);
    let sink = JsonLinesSink::open(&log_path)
        .with_context(|| format!("无法打开记录文件 {}", log_path.display()))?;
    let bridge = Arc::new(SerialBridge::from_config(&config.hardware));

    let collaborators = Collaborators {
        opener: build_opener(&source, &args),
        detector: Box::new(BlobDetector::new(
            config.vision.blob_luma_threshold,
            config.vision.min_blob_area,
        )),
        audio_backend: build_audio_backend(),
        classifier: Box::new(HeuristicClassifier::from_config(&config.audio)),
        bridge,
        sink: Box::new(sink),
    };

    // ========== 启动工作线程 ==========
    let mut sentinel = Sentinel::start(&config, source, collaborators).context("工作线程启动失败")?;

    // 标定 (失败时不输出平面图坐标)
    if let Some(calibration) = &config.calibration {
        match sentinel
            .mapper()
            .calibrate(&calibration.camera_points, &calibration.map_points)
        {
            Ok(_) => info!("🗺️ 四点标定完成"),
            Err(e) => warn!("⚠️ 标定失败, 不输出平面图坐标: {}", e),
        }
    }

    // ========== Ctrl+C ==========
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
            warn!("⚠️ 无法注册 Ctrl+C 处理: {}", err);
        }
    }

    // ========== 订阅者: 状态日志 ==========
    let events = sentinel.subscribe();
    let logger = thread::Builder::new().name("status-log".into()).spawn(move || {
        let mut audio_online = None;
        // 广播停止后通道断开, 循环结束
        for event in events.iter() {
            let s = &event.snapshot;
            debug!(
                "📡 {} | {}人 {} | 音频{} | 风险{}",
                event.name, s.person_count, s.density_tier, s.audio_status, s.risk_level
            );
            if audio_online != Some(event.health.audio_online) {
                if event.health.audio_online {
                    info!("🎤 音频传感器在线");
                } else {
                    warn!("🔇 音频传感器离线 (音频状态按 NORMAL 处理)");
                }
                audio_online = Some(event.health.audio_online);
            }
        }
    })?;

    let preview_running = Arc::new(AtomicBool::new(true));
    let preview = match &args.preview_path {
        Some(path) => Some(spawn_preview_writer(sentinel.state(), path.clone(), preview_running.clone())?),
        None => None,
    };

    info!("✅ 系统就绪,开始监控... (Ctrl+C 退出)");

    // ========== 主线程: 等待退出 ==========
    let started = Instant::now();
    let deadline = args.run_seconds.map(|s| started + Duration::from_secs(s));
    while !shutdown.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        thread::sleep(Duration::from_millis(100));
    }

    info!("🛑 正在停止... (运行{:.1}s, 丢弃{}帧)", started.elapsed().as_secs_f32(), sentinel.dropped_frames());
    preview_running.store(false, Ordering::SeqCst);
    let clean = sentinel.stop(STOP_TIMEOUT);
    drop(sentinel);
    if let Some(handle) = preview {
        let _ = handle.join();
    }
    if clean {
        let _ = logger.join();
    }
    info!("👋 已退出");
    Ok(())
}

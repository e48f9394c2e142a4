mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{boxes, fixed_detector, RecordingBridge, ToneBackend};
use crowd_sentinel::audio::{AudioClassification, AudioStatus};
use crowd_sentinel::config::{MonitorConfig, SentinelConfig, VisionConfig};
use crowd_sentinel::detection::{CoordinateMapper, CycleOutcome, DensityTier, InferenceLoop};
use crowd_sentinel::input::{Frame, FrameQueue, SourceId};
use crowd_sentinel::monitor::{
    Broadcaster, HardwareDispatcher, MemorySink, PersistOutcome, RiskFusionMonitor, RiskLevel,
};
use crowd_sentinel::sentinel::{Collaborators, Sentinel};
use crowd_sentinel::state::SharedState;
use crowd_sentinel::HomographyMatrix;

struct Rig {
    state: Arc<SharedState>,
    inference: InferenceLoop,
    monitor: RiskFusionMonitor,
    sink: MemorySink,
    bridge: Arc<RecordingBridge>,
    origin: Instant,
}

fn rig(detected: usize, mapper: Arc<CoordinateMapper>) -> Rig {
    let state = Arc::new(SharedState::new());
    let config = SentinelConfig::default();
    let inference = InferenceLoop::new(
        Arc::new(FrameQueue::new()),
        Box::new(fixed_detector(detected)),
        mapper,
        state.clone(),
        Arc::new(AtomicBool::new(true)),
        &VisionConfig {
            frame_skip: 1,
            ..config.vision.clone()
        },
    );
    let sink = MemorySink::new();
    let bridge = Arc::new(RecordingBridge::default());
    let origin = Instant::now();
    let monitor = RiskFusionMonitor::new(
        state.clone(),
        Arc::new(Broadcaster::new()),
        Box::new(sink.clone()),
        HardwareDispatcher::spawn(bridge.clone()).unwrap(),
        &config.monitor,
        &config.hardware,
    )
    .with_persist_origin(origin);
    Rig {
        state,
        inference,
        monitor,
        sink,
        bridge,
        origin,
    }
}

fn wait_for_command(bridge: &RecordingBridge, expected: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if bridge.sent().last().map(String::as_str) == Some(expected) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn six_people_and_panic_is_danger() {
    let mut rig = rig(6, Arc::new(CoordinateMapper::new()));
    assert_eq!(rig.inference.handle_frame(Frame::blank(1, 320, 240)), CycleOutcome::Published);
    rig.state.update_audio(AudioClassification {
        status: AudioStatus::Panic,
        persistence_counter: 3,
    });

    let snapshot = rig.state.read_snapshot();
    assert_eq!(snapshot.person_count, 6);
    assert_eq!(snapshot.density_tier, DensityTier::High);

    let report = rig.monitor.tick(rig.origin + Duration::from_millis(500));
    assert_eq!(report.risk_level, RiskLevel::Danger);
    assert!(wait_for_command(&rig.bridge, "RISK:DANGER"));
}

#[test]
fn four_people_and_normal_audio_is_warn() {
    let mut rig = rig(4, Arc::new(CoordinateMapper::new()));
    rig.inference.handle_frame(Frame::blank(1, 320, 240));

    let snapshot = rig.state.read_snapshot();
    assert_eq!(snapshot.density_tier, DensityTier::Medium);
    assert_eq!(snapshot.audio_status, AudioStatus::Normal);

    let report = rig.monitor.tick(rig.origin + Duration::from_millis(500));
    assert_eq!(report.risk_level, RiskLevel::Warn);
    assert!(wait_for_command(&rig.bridge, "RISK:WARN"));
}

#[test]
fn empty_scene_is_safe_and_persisted_once() {
    let mut rig = rig(0, Arc::new(CoordinateMapper::new()));
    rig.inference.handle_frame(Frame::blank(1, 320, 240));

    let ms = Duration::from_millis;
    assert_eq!(rig.monitor.tick(rig.origin + ms(500)).persisted, PersistOutcome::NotDue);
    let report = rig.monitor.tick(rig.origin + ms(5000));
    assert_eq!(report.risk_level, RiskLevel::Safe);
    assert_eq!(report.persisted, PersistOutcome::Written);
    assert_eq!(rig.monitor.tick(rig.origin + ms(5500)).persisted, PersistOutcome::NotDue);

    let records = rig.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].person_count, 0);
    assert_eq!(records[0].risk_level, RiskLevel::Safe);
    assert!(records[0].coordinates.is_empty());
}

#[test]
fn calibrated_mapper_adds_map_coordinates() {
    let mapper = Arc::new(CoordinateMapper::new());
    let mut rig = rig(2, mapper.clone());

    rig.inference.handle_frame(Frame::blank(1, 320, 240));
    assert!(rig.state.read_snapshot().coordinates.iter().all(|p| p.map_x.is_none()));

    mapper.set_homography(HomographyMatrix::scale(0.1, 0.1));
    rig.inference.handle_frame(Frame::blank(2, 320, 240));
    let snapshot = rig.state.read_snapshot();
    let expected = boxes(2);
    for (point, bbox) in snapshot.coordinates.iter().zip(&expected) {
        let (cx, cy) = bbox.centroid();
        assert!((point.map_x.unwrap() - f64::from(cx) * 0.1).abs() < 1e-9);
        assert!((point.map_y.unwrap() - f64::from(cy) * 0.1).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&point.normalized_x));
    }
}

#[test]
fn full_pipeline_reaches_danger() {
    let mut config = SentinelConfig::default();
    config.monitor = MonitorConfig {
        tick_ms: 20,
        persist_interval_ms: 100,
        ..MonitorConfig::default()
    };
    config.vision.pop_timeout_ms = 50;
    config.vision.open_backoff_ms = 20;

    let sink = MemorySink::new();
    let bridge = Arc::new(RecordingBridge::default());
    let collaborators = Collaborators {
        opener: Box::new(common::FlakyOpener::new(1)),
        detector: Box::new(fixed_detector(6)),
        audio_backend: Box::new(ToneBackend),
        classifier: Box::new(|_: &[f32], _: u32| -> anyhow::Result<bool> { Ok(true) }),
        bridge: bridge.clone(),
        sink: Box::new(sink.clone()),
    };

    let mut sentinel = Sentinel::start(&config, SourceId::parse("0"), collaborators).unwrap();
    let events = sentinel.subscribe();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut reached = false;
    while Instant::now() < deadline {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
            if event.snapshot.risk_level == RiskLevel::Danger {
                assert!(event.health.vision_online);
                assert!(event.health.audio_online);
                reached = true;
                break;
            }
        }
    }
    assert!(reached, "pipeline never reported DANGER");
    // 至少跨过一个持久化周期
    std::thread::sleep(Duration::from_millis(300));

    assert!(sentinel.stop(Duration::from_secs(5)));
    assert!(!sink.is_empty());
    assert!(bridge.sent().iter().any(|c| c == "RISK:DANGER"));
}

/// 融合监控 (Fusion Monitor)
///
/// 独立工作线程, 固定节拍运行
/// - Risk:        音频 × 密度 → 风险等级
/// - Broadcast:   订阅者扇出
/// - Persistence: 定期追加记录
/// - Hardware:    异步硬件命令
pub mod broadcast;
pub mod fusion;
pub mod hardware;
pub mod persistence;
pub mod risk;

pub use broadcast::{BroadcastEvent, Broadcaster, EmitReport};
pub use fusion::{PersistOutcome, RiskFusionMonitor, TickReport, STATE_UPDATE_EVENT};
pub use hardware::{HardwareBridge, HardwareDispatcher, SerialBridge};
pub use persistence::{JsonLinesSink, MemorySink, PersistedRecord, RecordSink};
pub use risk::{fuse_risk, RiskLevel};

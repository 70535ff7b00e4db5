//! 追踪、请求 ID 与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub patches_accepted: u64,
    pub patches_rejected: u64,
    pub reported_updates: u64,
    pub reported_changes: u64,
    pub dropped_invalid_index: u64,
    pub dropped_unknown_key: u64,
    pub reports_emitted: u64,
    pub desired_events: u64,
    pub actuations: u64,
    pub pending_discarded: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    patches_accepted: AtomicU64,
    patches_rejected: AtomicU64,
    reported_updates: AtomicU64,
    reported_changes: AtomicU64,
    dropped_invalid_index: AtomicU64,
    dropped_unknown_key: AtomicU64,
    reports_emitted: AtomicU64,
    desired_events: AtomicU64,
    actuations: AtomicU64,
    pending_discarded: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            patches_accepted: AtomicU64::new(0),
            patches_rejected: AtomicU64::new(0),
            reported_updates: AtomicU64::new(0),
            reported_changes: AtomicU64::new(0),
            dropped_invalid_index: AtomicU64::new(0),
            dropped_unknown_key: AtomicU64::new(0),
            reports_emitted: AtomicU64::new(0),
            desired_events: AtomicU64::new(0),
            actuations: AtomicU64::new(0),
            pending_discarded: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            patches_accepted: self.patches_accepted.load(Ordering::Relaxed),
            patches_rejected: self.patches_rejected.load(Ordering::Relaxed),
            reported_updates: self.reported_updates.load(Ordering::Relaxed),
            reported_changes: self.reported_changes.load(Ordering::Relaxed),
            dropped_invalid_index: self.dropped_invalid_index.load(Ordering::Relaxed),
            dropped_unknown_key: self.dropped_unknown_key.load(Ordering::Relaxed),
            reports_emitted: self.reports_emitted.load(Ordering::Relaxed),
            desired_events: self.desired_events.load(Ordering::Relaxed),
            actuations: self.actuations.load(Ordering::Relaxed),
            pending_discarded: self.pending_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录被接受的期望状态补丁。
pub fn record_patch_accepted() {
    metrics().patches_accepted.fetch_add(1, Ordering::Relaxed);
}

/// 记录被拒绝的期望状态补丁（解析失败或应用失败）。
pub fn record_patch_rejected() {
    metrics().patches_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录收到的本地上报条数。
pub fn record_reported_update() {
    metrics().reported_updates.fetch_add(1, Ordering::Relaxed);
}

/// 记录上报侧真正发生变化的字段数。
pub fn record_reported_change() {
    metrics().reported_changes.fetch_add(1, Ordering::Relaxed);
}

/// 记录因槽位越界被丢弃的写入。
pub fn record_dropped_invalid_index() {
    metrics()
        .dropped_invalid_index
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录因设备 key 未配置（或属性未映射）被丢弃的写入。
pub fn record_dropped_unknown_key() {
    metrics().dropped_unknown_key.fetch_add(1, Ordering::Relaxed);
}

/// 记录发出的上报事件。
pub fn record_report_emitted() {
    metrics().reports_emitted.fetch_add(1, Ordering::Relaxed);
}

/// 记录发出的期望状态事件。
pub fn record_desired_event() {
    metrics().desired_events.fetch_add(1, Ordering::Relaxed);
}

/// 记录发出的执行信号。
pub fn record_actuation() {
    metrics().actuations.fetch_add(1, Ordering::Relaxed);
}

/// 记录关闭时丢弃的待发字段数。
pub fn record_pending_discarded(count: u64) {
    metrics()
        .pending_discarded
        .fetch_add(count, Ordering::Relaxed);
}

//! 上报反馈调度：决定上报侧变更何时推送到上游。
//!
//! - Immediate：每个被接受的变更都立即上报。
//! - Deferred：变更累积到脏集合，静默期结束、达到阈值或显式 flush 时合并上报。

use domain::FieldPath;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;
use udm_config::{FeedbackMode, UdmCwsConfiguration};

/// 调度参数。
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub mode: FeedbackMode,
    pub quiescence: Duration,
    pub flush_threshold: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            mode: FeedbackMode::Deferred,
            quiescence: Duration::from_millis(250),
            flush_threshold: 64,
        }
    }
}

impl FeedbackConfig {
    pub fn from_configuration(configuration: &UdmCwsConfiguration) -> Self {
        Self {
            mode: configuration.feedback_mode,
            quiescence: Duration::from_millis(configuration.feedback.quiescence_ms),
            flush_threshold: configuration.feedback.flush_threshold,
        }
    }

    fn sanitized(mut self) -> Self {
        if self.flush_threshold == 0 {
            self.flush_threshold = 1;
        }
        self
    }
}

/// 调度阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackPhase {
    Idle,
    Dirty,
}

/// 单次变更后的调度决定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackDecision {
    /// 立即上报，携带本次上报覆盖的字段。
    Emit(BTreeSet<FieldPath>),
    Hold,
}

/// 反馈调度器；由路由工作任务独占，不做内部同步。
#[derive(Debug)]
pub struct FeedbackDispatcher {
    config: FeedbackConfig,
    pending: BTreeSet<FieldPath>,
    last_change: Option<Instant>,
}

impl FeedbackDispatcher {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config: config.sanitized(),
            pending: BTreeSet::new(),
            last_change: None,
        }
    }

    pub fn mode(&self) -> FeedbackMode {
        self.config.mode
    }

    pub fn phase(&self) -> FeedbackPhase {
        if self.pending.is_empty() {
            FeedbackPhase::Idle
        } else {
            FeedbackPhase::Dirty
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 记录一个已被接受的上报侧变更。
    pub fn record_change(&mut self, path: FieldPath, now: Instant) -> FeedbackDecision {
        match self.config.mode {
            FeedbackMode::Immediate => FeedbackDecision::Emit(BTreeSet::from([path])),
            FeedbackMode::Deferred => {
                if self.pending.is_empty() {
                    debug!(target: "udm.feedback", path = %path, "feedback_dirty");
                }
                self.pending.insert(path);
                self.last_change = Some(now);
                if self.pending.len() >= self.config.flush_threshold {
                    debug!(
                        target: "udm.feedback",
                        pending = self.pending.len(),
                        "feedback_threshold_reached"
                    );
                    return FeedbackDecision::Emit(self.drain());
                }
                FeedbackDecision::Hold
            }
        }
    }

    /// 显式 flush：取出全部待发字段（Dirty -> Idle）；Idle 时返回 `None`。
    pub fn flush(&mut self) -> Option<BTreeSet<FieldPath>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.drain())
    }

    /// 静默期截止时间（最后一次变更 + 静默间隔）；Idle 时为 `None`。
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_change.map(|last| last + self.config.quiescence)
    }

    /// 截止时间已过则 flush。
    pub fn poll_quiescence(&mut self, now: Instant) -> Option<BTreeSet<FieldPath>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// 关闭时丢弃待发字段，返回丢弃数量。
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.last_change = None;
        dropped
    }

    fn drain(&mut self) -> BTreeSet<FieldPath> {
        self.last_change = None;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DeviceProperty, StandardField};

    fn deferred(threshold: usize) -> FeedbackDispatcher {
        FeedbackDispatcher::new(FeedbackConfig {
            mode: FeedbackMode::Deferred,
            quiescence: Duration::from_millis(100),
            flush_threshold: threshold,
        })
    }

    fn status(index: usize) -> FieldPath {
        FieldPath::device(index, DeviceProperty::Status)
    }

    #[test]
    fn immediate_mode_emits_every_change() {
        let mut dispatcher = FeedbackDispatcher::new(FeedbackConfig {
            mode: FeedbackMode::Immediate,
            ..FeedbackConfig::default()
        });
        let now = Instant::now();
        for index in 1..=5 {
            assert_eq!(
                dispatcher.record_change(status(index), now),
                FeedbackDecision::Emit(BTreeSet::from([status(index)]))
            );
        }
        assert_eq!(dispatcher.phase(), FeedbackPhase::Idle);
        assert!(dispatcher.flush().is_none());
    }

    #[test]
    fn deferred_mode_coalesces_until_flush() {
        let mut dispatcher = deferred(64);
        let now = Instant::now();
        assert_eq!(dispatcher.phase(), FeedbackPhase::Idle);
        for index in 1..=5 {
            assert_eq!(dispatcher.record_change(status(index), now), FeedbackDecision::Hold);
        }
        assert_eq!(dispatcher.phase(), FeedbackPhase::Dirty);

        let flushed = dispatcher.flush().expect("pending changes");
        assert_eq!(flushed.len(), 5);
        assert_eq!(dispatcher.phase(), FeedbackPhase::Idle);
        assert!(dispatcher.flush().is_none());

        dispatcher.record_change(status(1), now);
        assert_eq!(dispatcher.flush().expect("new cycle").len(), 1);
    }

    #[test]
    fn deferred_mode_emits_at_threshold() {
        let mut dispatcher = deferred(3);
        let now = Instant::now();
        assert_eq!(dispatcher.record_change(status(1), now), FeedbackDecision::Hold);
        assert_eq!(dispatcher.record_change(status(1), now), FeedbackDecision::Hold);
        assert_eq!(dispatcher.record_change(status(2), now), FeedbackDecision::Hold);
        match dispatcher.record_change(FieldPath::Standard(StandardField::State), now) {
            FeedbackDecision::Emit(paths) => assert_eq!(paths.len(), 3),
            FeedbackDecision::Hold => panic!("threshold should emit"),
        }
        assert_eq!(dispatcher.phase(), FeedbackPhase::Idle);
    }

    #[test]
    fn quiescence_deadline_tracks_last_change() {
        let mut dispatcher = deferred(64);
        let start = Instant::now();
        assert!(dispatcher.deadline().is_none());

        dispatcher.record_change(status(1), start);
        let later = start + Duration::from_millis(60);
        dispatcher.record_change(status(2), later);
        assert_eq!(dispatcher.deadline(), Some(later + Duration::from_millis(100)));

        assert!(dispatcher.poll_quiescence(start + Duration::from_millis(120)).is_none());
        let flushed = dispatcher
            .poll_quiescence(start + Duration::from_millis(160))
            .expect("deadline passed");
        assert_eq!(flushed.len(), 2);
        assert!(dispatcher.deadline().is_none());
    }

    #[test]
    fn discard_drops_pending_set() {
        let mut dispatcher = deferred(64);
        let now = Instant::now();
        dispatcher.record_change(status(1), now);
        dispatcher.record_change(status(2), now);
        assert_eq!(dispatcher.discard(), 2);
        assert_eq!(dispatcher.phase(), FeedbackPhase::Idle);
        assert!(dispatcher.flush().is_none());
    }
}

//! 路由事件与广播事件总线。

use domain::{FieldPath, State};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;
use udm_mapping::ActuationSignal;

/// 默认事件通道容量。
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// 上报事件：携带完整的上报侧快照。
#[derive(Debug, Clone)]
pub struct ReportStateEvent {
    pub id: String,
    pub snapshot: Arc<State>,
    /// 本次上报覆盖的变更字段。
    pub changed: BTreeSet<FieldPath>,
    /// 快照指纹，上游可据此判断重发。
    pub fingerprint: u64,
}

/// 期望状态事件：每个写入了非 null 值的补丁一次，值未变化也会发布。
#[derive(Debug, Clone)]
pub struct DesiredStateEvent {
    pub id: String,
    pub desired: Arc<State>,
    pub written: BTreeSet<FieldPath>,
    /// `written` 中值真正发生变化的子集。
    pub diff: BTreeSet<FieldPath>,
}

/// 路由对外发布的事件。
#[derive(Debug, Clone)]
pub enum RouterEvent {
    ReportState(ReportStateEvent),
    DesiredState(DesiredStateEvent),
    Actuation(ActuationSignal),
}

impl RouterEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RouterEvent::ReportState(_) => "report_state",
            RouterEvent::DesiredState(_) => "desired_state",
            RouterEvent::Actuation(_) => "actuation",
        }
    }
}

/// 基于 broadcast 的事件总线；发布从不阻塞，慢订阅者会丢失旧事件。
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件；没有订阅者时返回 `false`，事件被丢弃。
    pub fn publish(&self, event: RouterEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 事件订阅端。
pub struct EventReceiver {
    rx: broadcast::Receiver<RouterEvent>,
}

impl EventReceiver {
    /// 接收下一条事件；总线关闭时返回 `None`。落后时跳过丢失的事件继续接收。
    pub async fn recv(&mut self) -> Option<RouterEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "udm.router", skipped, "event_subscriber_lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 非阻塞接收；通道为空或已关闭时返回 `None`。
    pub fn try_recv(&mut self) -> Option<RouterEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

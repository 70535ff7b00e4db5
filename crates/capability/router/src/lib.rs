//! 动作路由：期望补丁与本地上报的唯一入口。
//!
//! 所有状态变更由一个工作任务串行处理，订阅者经事件总线接收
//! 上报、期望状态与执行信号。

pub mod actuation;
pub mod events;
pub mod request;
mod router;

pub use actuation::{ActuationError, ActuationSink, LoggingActuationSink, spawn_actuation_listener};
pub use events::{
    DEFAULT_EVENT_CAPACITY, DesiredStateEvent, EventBus, EventReceiver, ReportStateEvent,
    RouterEvent,
};
pub use request::{PatchRequestError, parse_patch_request};
pub use router::{ActionRouter, DesiredOutcome, ReportOutcome, RouterHandle, RouterOptions};

use udm_state::PatchError;

/// 路由错误。
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("patch rejected: {0}")]
    Rejected(#[from] PatchError),
    #[error("router closed")]
    Closed,
}

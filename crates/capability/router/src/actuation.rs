//! 执行信号消费：把期望状态驱动的信号交给本地执行端。

use crate::events::{EventReceiver, RouterEvent};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use udm_mapping::ActuationSignal;

/// 执行端错误。
#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    #[error("actuation rejected: {0}")]
    Rejected(String),
    #[error("actuation target unavailable: {0}")]
    Unavailable(String),
}

/// 本地执行端抽象（房间控制器、设备驱动等）。
#[async_trait]
pub trait ActuationSink: Send + Sync {
    async fn actuate(&self, signal: &ActuationSignal) -> Result<(), ActuationError>;
}

/// 只记录日志的执行端，未接入控制器时使用。
#[derive(Debug, Default)]
pub struct LoggingActuationSink;

#[async_trait]
impl ActuationSink for LoggingActuationSink {
    async fn actuate(&self, signal: &ActuationSignal) -> Result<(), ActuationError> {
        info!(
            target: "udm.actuation",
            kind = ?signal.kind,
            value = %signal.value,
            target_device_key = ?signal.target_device_key,
            function = ?signal.function,
            affected_devices = signal.affected_devices.len(),
            "actuation_logged"
        );
        Ok(())
    }
}

/// 订阅执行信号并逐个交给执行端；总线关闭时退出。
pub fn spawn_actuation_listener(
    mut receiver: EventReceiver,
    sink: Arc<dyn ActuationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            let RouterEvent::Actuation(signal) = event else {
                continue;
            };
            if let Err(err) = sink.actuate(&signal).await {
                warn!(
                    target: "udm.actuation",
                    kind = ?signal.kind,
                    value = %signal.value,
                    error = %err,
                    "actuation_failed"
                );
            }
        }
        info!(target: "udm.actuation", "actuation_listener_stopped");
    })
}

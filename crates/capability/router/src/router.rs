//! 动作路由：单写者工作任务串行处理期望补丁与本地上报。

use crate::events::{DesiredStateEvent, EventBus, EventReceiver, ReportStateEvent, RouterEvent};
use crate::RouterError;
use domain::{FieldPath, State};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use udm_config::{FeedbackMode, UdmCwsConfiguration};
use udm_feedback::{FeedbackConfig, FeedbackDecision, FeedbackDispatcher};
use udm_mapping::{ActuationSignal, MappingResolver, ReportedUpdate, ResolveError};
use udm_state::{PatchDocument, PatchError, StateStore};
use udm_telemetry::{
    record_actuation, record_desired_event, record_dropped_invalid_index,
    record_dropped_unknown_key, record_patch_accepted, record_patch_rejected,
    record_pending_discarded, record_report_emitted, record_reported_change,
    record_reported_update,
};

/// 路由参数。
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub input_capacity: usize,
    pub event_capacity: usize,
    pub feedback: FeedbackConfig,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            input_capacity: 1024,
            event_capacity: crate::events::DEFAULT_EVENT_CAPACITY,
            feedback: FeedbackConfig::default(),
        }
    }
}

impl RouterOptions {
    pub fn from_configuration(configuration: &UdmCwsConfiguration) -> Self {
        Self {
            feedback: FeedbackConfig::from_configuration(configuration),
            ..Self::default()
        }
    }

    fn sanitized(mut self) -> Self {
        if self.input_capacity == 0 {
            self.input_capacity = 1;
        }
        if self.event_capacity == 0 {
            self.event_capacity = 1;
        }
        self
    }
}

/// 被接受的期望补丁。
#[derive(Debug, Clone)]
pub struct DesiredOutcome {
    pub desired: Arc<State>,
    pub written: BTreeSet<FieldPath>,
    pub diff: BTreeSet<FieldPath>,
    pub actuations: Vec<ActuationSignal>,
}

/// 本地上报的处理结果；解析失败的写入只记录，不视为错误。
#[derive(Debug, Clone, Default)]
pub struct ReportOutcome {
    pub changed: BTreeSet<FieldPath>,
    pub dropped: Vec<ResolveError>,
    pub reports_emitted: usize,
}

impl ReportOutcome {
    fn merge(&mut self, other: ReportOutcome) {
        self.changed.extend(other.changed);
        self.dropped.extend(other.dropped);
        self.reports_emitted += other.reports_emitted;
    }
}

enum RouterInput {
    Patch {
        patch: PatchDocument,
        reply: oneshot::Sender<Result<DesiredOutcome, PatchError>>,
    },
    Report {
        updates: Vec<ReportedUpdate>,
        flush: bool,
        reply: oneshot::Sender<ReportOutcome>,
    },
    Flush {
        reply: oneshot::Sender<bool>,
    },
}

/// 路由句柄：可克隆，可在任意任务中使用。
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::Sender<RouterInput>,
    store: Arc<StateStore>,
    bus: EventBus,
    mode: FeedbackMode,
}

impl RouterHandle {
    /// 应用期望补丁；差异非空时先发布期望事件，再逐个发布执行信号。
    pub async fn apply_desired_patch(
        &self,
        patch: PatchDocument,
    ) -> Result<DesiredOutcome, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterInput::Patch { patch, reply }).await?;
        rx.await
            .map_err(|_| RouterError::Closed)?
            .map_err(RouterError::Rejected)
    }

    /// 处理一条本地上报。
    pub async fn report(&self, update: ReportedUpdate) -> Result<ReportOutcome, RouterError> {
        self.submit(vec![update], false).await
    }

    /// 处理一批上报后 flush；延迟模式下只产生一次上报。
    pub async fn report_burst(
        &self,
        updates: Vec<ReportedUpdate>,
    ) -> Result<ReportOutcome, RouterError> {
        self.submit(updates, true).await
    }

    /// 显式 flush；有待发字段并已上报时返回 `true`。
    pub async fn flush(&self) -> Result<bool, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterInput::Flush { reply }).await?;
        rx.await.map_err(|_| RouterError::Closed)
    }

    pub fn reported(&self) -> Arc<State> {
        self.store.reported()
    }

    pub fn desired(&self) -> Arc<State> {
        self.store.desired()
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn feedback_mode(&self) -> FeedbackMode {
        self.mode
    }

    async fn submit(
        &self,
        updates: Vec<ReportedUpdate>,
        flush: bool,
    ) -> Result<ReportOutcome, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterInput::Report {
            updates,
            flush,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RouterError::Closed)
    }

    async fn send(&self, input: RouterInput) -> Result<(), RouterError> {
        self.tx.send(input).await.map_err(|_| RouterError::Closed)
    }
}

/// 动作路由：持有工作任务，显式启动与关闭。
pub struct ActionRouter {
    handle: RouterHandle,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ActionRouter {
    /// 启动工作任务；需在 tokio 运行时内调用。
    pub fn start(resolver: MappingResolver, options: RouterOptions) -> Self {
        let options = options.sanitized();
        let configuration = resolver.config();
        let desired = State::new(
            configuration.api_version.clone(),
            configuration.device_slots,
            configuration.custom_slots,
        );
        let store = Arc::new(StateStore::new(desired, resolver.seed_reported()));
        let bus = EventBus::with_capacity(options.event_capacity);
        let (tx, rx) = mpsc::channel(options.input_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatcher = FeedbackDispatcher::new(options.feedback.clone());
        let mode = dispatcher.mode();

        info!(
            target: "udm.router",
            feedback_mode = %mode,
            input_capacity = options.input_capacity,
            event_capacity = options.event_capacity,
            "router_started"
        );

        let worker = Worker {
            resolver,
            store: Arc::clone(&store),
            bus: bus.clone(),
            dispatcher,
        };
        let join = tokio::spawn(worker.run(rx, shutdown_rx));

        Self {
            handle: RouterHandle {
                tx,
                store,
                bus,
                mode,
            },
            shutdown: Some(shutdown_tx),
            worker: Some(join),
        }
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    /// 停止工作任务；待发的脏集合被丢弃。
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                warn!(target: "udm.router", error = %err, "router_worker_join_failed");
            }
        }
    }
}

impl Drop for ActionRouter {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

struct Worker {
    resolver: MappingResolver,
    store: Arc<StateStore>,
    bus: EventBus,
    dispatcher: FeedbackDispatcher,
}

impl Worker {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<RouterInput>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            let deadline = self
                .dispatcher
                .deadline()
                .map(tokio::time::Instant::from_std);
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                input = rx.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    if let Some(changed) = self.dispatcher.poll_quiescence(Instant::now()) {
                        debug!(target: "udm.feedback", pending = changed.len(), "quiescence_elapsed");
                        self.emit_report(changed);
                    }
                }
            }
        }

        let dropped = self.dispatcher.discard();
        if dropped > 0 {
            record_pending_discarded(dropped as u64);
        }
        info!(target: "udm.router", pending_discarded = dropped, "router_stopped");
    }

    fn handle(&mut self, input: RouterInput) {
        match input {
            RouterInput::Patch { patch, reply } => {
                let result = self.apply_patch(&patch);
                let _ = reply.send(result);
            }
            RouterInput::Report {
                updates,
                flush,
                reply,
            } => {
                let mut outcome = ReportOutcome::default();
                for update in updates {
                    outcome.merge(self.apply_report(update));
                }
                if flush {
                    if let Some(changed) = self.dispatcher.flush() {
                        self.emit_report(changed);
                        outcome.reports_emitted += 1;
                    }
                }
                let _ = reply.send(outcome);
            }
            RouterInput::Flush { reply } => {
                let flushed = match self.dispatcher.flush() {
                    Some(changed) => {
                        self.emit_report(changed);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(flushed);
            }
        }
    }

    fn apply_patch(&mut self, patch: &PatchDocument) -> Result<DesiredOutcome, PatchError> {
        let outcome = match self.store.apply_desired_patch(patch) {
            Ok(outcome) => outcome,
            Err(err) => {
                record_patch_rejected();
                warn!(target: "udm.router", error = %err, "desired_patch_rejected");
                return Err(err);
            }
        };
        record_patch_accepted();

        // 重复的期望值仍需重新驱动设备，只有空补丁或全 null 补丁不产生动作。
        let mut actuations = Vec::new();
        if !outcome.written.is_empty() {
            info!(
                target: "udm.router",
                written = outcome.written.len(),
                changed = outcome.diff.len(),
                fingerprint = outcome.state.fingerprint(),
                "desired_patch_applied"
            );
            self.bus.publish(RouterEvent::DesiredState(DesiredStateEvent {
                id: uuid::Uuid::new_v4().to_string(),
                desired: Arc::clone(&outcome.state),
                written: outcome.written.clone(),
                diff: outcome.diff.clone(),
            }));
            record_desired_event();

            for path in &outcome.written {
                let Some(value) = outcome.state.get(path) else {
                    continue;
                };
                let Some(signal) = self.resolver.actuation_for(path, &value) else {
                    continue;
                };
                info!(
                    target: "udm.router",
                    kind = ?signal.kind,
                    value = %signal.value,
                    target_device_key = ?signal.target_device_key,
                    function = ?signal.function,
                    "actuation_raised"
                );
                self.bus.publish(RouterEvent::Actuation(signal.clone()));
                record_actuation();
                actuations.push(signal);
            }
        } else {
            debug!(target: "udm.router", "desired_patch_empty");
        }

        Ok(DesiredOutcome {
            desired: outcome.state,
            written: outcome.written,
            diff: outcome.diff,
            actuations,
        })
    }

    fn apply_report(&mut self, update: ReportedUpdate) -> ReportOutcome {
        record_reported_update();
        let mut outcome = ReportOutcome::default();
        let writes = match self.resolver.resolve(&update) {
            Ok(writes) => writes,
            Err(err) => {
                match &err {
                    ResolveError::InvalidIndex { .. } => record_dropped_invalid_index(),
                    ResolveError::UnknownDeviceKey(_)
                    | ResolveError::UnmappedIndex(_)
                    | ResolveError::UnmappedProperty { .. } => record_dropped_unknown_key(),
                    ResolveError::KindMismatch { .. } => {}
                }
                warn!(target: "udm.router", error = %err, "reported_write_dropped");
                outcome.dropped.push(err);
                return outcome;
            }
        };

        let now = Instant::now();
        for write in writes {
            let path = write.path;
            match self.store.apply_reported_update(&path, write.value) {
                Ok(true) => {
                    record_reported_change();
                    outcome.changed.insert(path);
                    if let FeedbackDecision::Emit(changed) = self.dispatcher.record_change(path, now)
                    {
                        self.emit_report(changed);
                        outcome.reports_emitted += 1;
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(target: "udm.router", path = %path, error = %err, "reported_write_failed");
                }
            }
        }
        outcome
    }

    fn emit_report(&self, changed: BTreeSet<FieldPath>) {
        let snapshot = self.store.reported();
        let fingerprint = snapshot.fingerprint();
        info!(
            target: "udm.router",
            changed = changed.len(),
            fingerprint,
            "report_state_emitted"
        );
        self.bus.publish(RouterEvent::ReportState(ReportStateEvent {
            id: uuid::Uuid::new_v4().to_string(),
            snapshot,
            changed,
            fingerprint,
        }));
        record_report_emitted();
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

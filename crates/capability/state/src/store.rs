//! 期望/上报双侧状态的内存存储。
//!
//! 写入在锁内基于副本完成后整体替换 `Arc`，读者只会看到完整快照。

use crate::patch::{PatchDocument, PatchError, PatchOutcome, apply_patch};
use domain::{FieldPath, FieldValue, State, WriteError};
use std::sync::{Arc, PoisonError, RwLock};

/// 状态侧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Desired,
    Reported,
}

/// 上报写入错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// 规范状态存储。
pub struct StateStore {
    desired: RwLock<Arc<State>>,
    reported: RwLock<Arc<State>>,
}

impl StateStore {
    pub fn new(desired: State, reported: State) -> Self {
        Self {
            desired: RwLock::new(Arc::new(desired)),
            reported: RwLock::new(Arc::new(reported)),
        }
    }

    /// 写入上报侧的单个字段，返回值是否真正变化。
    pub fn apply_reported_update(
        &self,
        field: &FieldPath,
        value: FieldValue,
    ) -> Result<bool, StoreError> {
        // 副本上的写入不会在 panic 时留下半成品，毒化的锁可以直接恢复。
        let mut guard = self.reported.write().unwrap_or_else(PoisonError::into_inner);
        if guard.get(field).as_ref() == Some(&value) {
            return Ok(false);
        }
        let mut next = State::clone(&guard);
        let changed = next.set(field, value)?;
        if changed {
            *guard = Arc::new(next);
        }
        Ok(changed)
    }

    /// 在期望侧应用合并补丁；失败时期望状态保持不变。
    pub fn apply_desired_patch(&self, patch: &PatchDocument) -> Result<PatchOutcome, PatchError> {
        let mut guard = self.desired.write().unwrap_or_else(PoisonError::into_inner);
        let applied = apply_patch(&guard, patch)?;
        if !applied.diff.is_empty() {
            *guard = Arc::new(applied.next);
        }
        Ok(PatchOutcome {
            state: Arc::clone(&guard),
            written: applied.written,
            diff: applied.diff,
        })
    }

    pub fn snapshot(&self, side: Side) -> Arc<State> {
        let lock = match side {
            Side::Desired => &self.desired,
            Side::Reported => &self.reported,
        };
        let guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn reported(&self) -> Arc<State> {
        self.snapshot(Side::Reported)
    }

    pub fn desired(&self) -> Arc<State> {
        self.snapshot(Side::Desired)
    }
}

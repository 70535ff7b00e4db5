//! 规范状态存储与合并补丁。

pub mod patch;
mod store;

pub use patch::{AppliedPatch, PatchDocument, PatchError, PatchOutcome, apply_patch};
pub use store::{Side, StateStore, StoreError};

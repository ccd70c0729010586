//! User-info cache slot.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;

pub(crate) type SharedUserInfo = Shared<BoxFuture<'static, Option<Value>>>;

/// Holds the in-flight or resolved `/userinfo` fetch.
#[derive(Default)]
pub(crate) struct UserInfoSlot {
    slot: Mutex<Option<SharedUserInfo>>,
}

impl UserInfoSlot {
    pub(crate) fn current(&self) -> Option<SharedUserInfo> {
        self.slot.lock().clone()
    }

    pub(crate) fn install(&self, fetch: BoxFuture<'static, Option<Value>>) -> SharedUserInfo {
        let shared = fetch.shared();
        *self.slot.lock() = Some(shared.clone());
        shared
    }

    pub(crate) fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// Whether an identity payload carries anything.
///
/// `null`, `{}`, `[]`, `""` and scalars count as empty.
pub(crate) fn has_content(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

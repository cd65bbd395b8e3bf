// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Shared helpers.

pub mod events;
pub mod text;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Globally unique, monotonically increasing object id.
pub fn obj_id() -> u64 {
    OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Timestamp in the form `SECONDS.MILLISZ`.
pub fn now_iso8601() -> String {
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}Z", duration.as_secs(), duration.subsec_millis())
}

/// Decode standard base64, returning `None` for invalid input.
pub fn decode_base64(data: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(data).ok()
}

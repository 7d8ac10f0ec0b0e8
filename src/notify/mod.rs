//! Notification sinks.
//!
//! The engine emits human-readable alerts and summaries through the
//! [`NotifySink`] trait. The production sink is Telegram; tests use an
//! in-memory recorder.

pub mod telegram;

use async_trait::async_trait;

/// Hard byte cap the sink imposes on a single message.
pub const MAX_MESSAGE_BYTES: usize = 4096;

/// A destination for operator-facing messages. Implementations fan out to
/// every configured recipient and must tolerate delivery failures —
/// notification loss never aborts a scan.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn send(&self, text: &str);
}

/// A sink that drops everything, used when no notifier is configured.
pub struct NullSink;

#[async_trait]
impl NotifySink for NullSink {
    async fn send(&self, _text: &str) {}
}

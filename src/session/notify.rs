use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A user-facing message raised at the boundary nearest the user action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// The file this notification is about, if any.
    pub file_id: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
            file_id: None,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
            file_id: None,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
            file_id: None,
        }
    }

    pub fn for_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }
}

/// Receives notifications and progress from a `FileSetManager`.
///
/// Callbacks run inline on the uploading task and must not block.
pub trait UploadObserver: Send + Sync {
    fn on_notification(&self, notification: Notification);

    fn on_file_progress(&self, _file_id: &str, _percent: f64) {}

    fn on_batch_progress(&self, _percent: f64) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Notification(Notification),
    FileProgress { file_id: String, percent: f64 },
    BatchProgress { percent: f64 },
}

/// Forwards everything into an unbounded channel.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UploadObserver for ChannelObserver {
    fn on_notification(&self, notification: Notification) {
        let _ = self.tx.send(SessionEvent::Notification(notification));
    }

    fn on_file_progress(&self, file_id: &str, percent: f64) {
        let _ = self.tx.send(SessionEvent::FileProgress {
            file_id: file_id.to_string(),
            percent,
        });
    }

    fn on_batch_progress(&self, percent: f64) {
        let _ = self.tx.send(SessionEvent::BatchProgress { percent });
    }
}

/// Logs notifications; progress at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl UploadObserver for TracingObserver {
    fn on_notification(&self, n: Notification) {
        match n.level {
            NotificationLevel::Error => tracing::error!(title = %n.title, "{}", n.message),
            NotificationLevel::Info => tracing::warn!(title = %n.title, "{}", n.message),
            NotificationLevel::Success => tracing::info!(title = %n.title, "{}", n.message),
        }
    }

    fn on_file_progress(&self, file_id: &str, percent: f64) {
        tracing::debug!(file_id, percent = percent.ceil(), "file progress");
    }

    fn on_batch_progress(&self, percent: f64) {
        tracing::info!(percent = %format!("{percent:.1}"), "batch progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_file_progress("f1", 50.0);
        observer.on_batch_progress(25.0);
        observer.on_notification(Notification::error("Upload Error", "boom").for_file("f1"));

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::FileProgress {
                file_id: "f1".into(),
                percent: 50.0
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::BatchProgress { percent: 25.0 }
        );
        match rx.try_recv().unwrap() {
            SessionEvent::Notification(n) => {
                assert_eq!(n.level, NotificationLevel::Error);
                assert_eq!(n.file_id.as_deref(), Some("f1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        observer.on_batch_progress(10.0);
    }
}

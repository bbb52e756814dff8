pub mod error;
pub mod manager;
pub mod notify;
pub mod types;

pub use error::{FileSetError, FileSetResult};
pub use manager::FileSetManager;
pub use notify::{
    ChannelObserver, Notification, NotificationLevel, SessionEvent, TracingObserver,
    UploadObserver,
};
pub use types::{BatchOutcome, FileItem, FileSet, UploadSummary};

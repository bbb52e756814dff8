use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::types::{FileUploadState, UploadEvent};
use parking_lot::RwLock;

/// Per-file transfer state. Terminal states are final.
pub struct FileUploadStateMachine {
    state: RwLock<FileUploadState>,
}

impl Default for FileUploadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FileUploadStateMachine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FileUploadState::Pending),
        }
    }

    pub fn current_state(&self) -> FileUploadState {
        self.state.read().clone()
    }

    /// Apply an event. The new state is visible to the very next reader.
    pub fn transition(&self, event: UploadEvent) -> CoordinatorResult<FileUploadState> {
        let mut state = self.state.write();

        let new_state = match (&*state, &event) {
            (FileUploadState::Pending, UploadEvent::Start { total_chunks }) => {
                FileUploadState::Chunking {
                    window: 0,
                    completed_chunks: 0,
                    total_chunks: *total_chunks,
                }
            }

            (
                FileUploadState::Chunking {
                    completed_chunks,
                    total_chunks,
                    ..
                },
                UploadEvent::WindowStarted { window },
            ) => FileUploadState::Chunking {
                window: *window,
                completed_chunks: *completed_chunks,
                total_chunks: *total_chunks,
            },

            (
                FileUploadState::Chunking {
                    window,
                    completed_chunks,
                    total_chunks,
                },
                UploadEvent::ChunkCompleted { .. },
            ) if completed_chunks < total_chunks => FileUploadState::Chunking {
                window: *window,
                completed_chunks: completed_chunks + 1,
                total_chunks: *total_chunks,
            },

            (
                FileUploadState::Chunking {
                    completed_chunks,
                    total_chunks,
                    ..
                },
                UploadEvent::TransferComplete,
            ) if completed_chunks == total_chunks => FileUploadState::Completed,

            (FileUploadState::Pending | FileUploadState::Chunking { .. }, UploadEvent::Fail { error }) => {
                FileUploadState::Failed {
                    error: error.clone(),
                }
            }

            _ => {
                return Err(CoordinatorError::InvalidStateTransition(format!(
                    "Cannot handle {:?} in state {:?}",
                    event, *state
                )));
            }
        };

        *state = new_state.clone();
        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunking(sm: &FileUploadStateMachine, total: u32) {
        sm.transition(UploadEvent::Start { total_chunks: total })
            .unwrap();
    }

    #[test]
    fn test_state_machine_creation() {
        let sm = FileUploadStateMachine::new();
        assert_eq!(sm.current_state(), FileUploadState::Pending);
    }

    #[test]
    fn test_start_transition() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 3);

        assert!(sm.current_state().is_active());
        assert_eq!(sm.current_state().progress_percent(), 0.0);
    }

    #[test]
    fn test_chunks_then_complete() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 2);

        sm.transition(UploadEvent::ChunkCompleted { chunk_index: 1 })
            .unwrap();
        assert_eq!(sm.current_state().progress_percent(), 50.0);

        sm.transition(UploadEvent::ChunkCompleted { chunk_index: 0 })
            .unwrap();
        assert_eq!(sm.current_state().progress_percent(), 100.0);

        sm.transition(UploadEvent::TransferComplete).unwrap();
        assert_eq!(sm.current_state(), FileUploadState::Completed);
        assert!(sm.current_state().is_terminal());
    }

    #[test]
    fn test_complete_requires_all_chunks() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 2);
        sm.transition(UploadEvent::ChunkCompleted { chunk_index: 0 })
            .unwrap();

        assert!(sm.transition(UploadEvent::TransferComplete).is_err());
        assert!(sm.current_state().is_active());
    }

    #[test]
    fn test_window_keeps_counts() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 8);
        sm.transition(UploadEvent::ChunkCompleted { chunk_index: 0 })
            .unwrap();
        sm.transition(UploadEvent::WindowStarted { window: 1 })
            .unwrap();

        assert_eq!(
            sm.current_state(),
            FileUploadState::Chunking {
                window: 1,
                completed_chunks: 1,
                total_chunks: 8
            }
        );
    }

    #[test]
    fn test_failed_is_final() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 2);
        sm.transition(UploadEvent::Fail {
            error: "chunk 1 failed".into(),
        })
        .unwrap();

        match sm.current_state() {
            FileUploadState::Failed { error } => assert!(error.contains("chunk 1")),
            other => panic!("Expected Failed state, got {other:?}"),
        }

        assert!(sm
            .transition(UploadEvent::ChunkCompleted { chunk_index: 0 })
            .is_err());
        assert!(sm.transition(UploadEvent::Start { total_chunks: 2 }).is_err());
    }

    #[test]
    fn test_invalid_transition() {
        let sm = FileUploadStateMachine::new();

        // Cannot complete a chunk before starting
        let result = sm.transition(UploadEvent::ChunkCompleted { chunk_index: 0 });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_file_completes_immediately() {
        let sm = FileUploadStateMachine::new();
        chunking(&sm, 0);
        assert_eq!(sm.current_state().progress_percent(), 100.0);
        sm.transition(UploadEvent::TransferComplete).unwrap();
        assert_eq!(sm.current_state(), FileUploadState::Completed);
    }
}

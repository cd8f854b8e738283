use crate::job::TrainingJobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { job_id: TrainingJobId },
    Message { job_id: TrainingJobId, message: String },
    Finished { job_id: TrainingJobId },
    Failed { job_id: TrainingJobId, error: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Prints one line per event. Failure details are left to the caller, which
/// reports the returned error itself.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl StdoutProgressSink {
    #[must_use]
    pub fn render(event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::Started { job_id } => format!("[train:{job_id}] started"),
            ProgressEvent::Message { job_id, message } => format!("[train:{job_id}] {message}"),
            ProgressEvent::Finished { job_id } => format!("[train:{job_id}] finished"),
            ProgressEvent::Failed { job_id, .. } => format!("[train:{job_id}] stopped"),
        }
    }
}

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        println!("{}", Self::render(&event));
    }
}

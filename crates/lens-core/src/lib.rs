pub mod agents;
pub mod buffer;
pub mod events;
pub mod state;

pub use agents::{AgentId, AgentRecord, AgentRoster, AgentStatus};
pub use buffer::{EventBuffer, EVENT_BUFFER_CAPACITY};
pub use events::{AgentEvent, EventKind, EventParseError, EventTimestamp};
pub use state::{
    DerivedState, OrchestratorStatus, PreviewTarget, StreamingBuffer, SubmissionOutcome,
    SubmittedFile, WorkspaceFiles, STREAMING_PLACEHOLDER_PATH,
};

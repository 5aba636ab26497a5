use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::{AgentRoster, AgentStatus};
use crate::events::{AgentEvent, EventKind};

/// Streamed tokens without an attributed file land here until the backend
/// names one.
pub const STREAMING_PLACEHOLDER_PATH: &str = "/main.py";

/// Generated workspace files, keyed by canonical path. The producers are
/// inconsistent about leading separators, so paths are normalized to a
/// leading `/` once at ingestion and lookups normalize the query the same
/// way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WorkspaceFiles {
    files: BTreeMap<String, String>,
}

impl WorkspaceFiles {
    pub fn canonical(path: &str) -> String {
        let trimmed = path.trim();
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Upserts full content under the canonical key and returns that key.
    pub fn insert(&mut self, path: &str, content: String) -> String {
        let key = Self::canonical(path);
        self.files.insert(key.clone(), content);
        key
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(&Self::canonical(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&Self::canonical(path))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Append-only accumulator for in-flight token output. Superseded (and
/// cleared) as soon as a finalized file for the same work arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreamingBuffer {
    pub file_path: Option<String>,
    pub content: String,
}

impl StreamingBuffer {
    pub fn append(&mut self, path: &str, text: &str) {
        self.file_path = Some(path.to_string());
        self.content.push_str(text);
    }

    pub fn clear(&mut self) {
        self.file_path = None;
        self.content.clear();
    }
}

/// HTML artifact that can be opened in a live preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewTarget {
    pub path: String,
    pub url: String,
}

impl PreviewTarget {
    fn for_path(canonical_path: &str) -> Self {
        Self {
            url: format!("/preview{canonical_path}"),
            path: canonical_path.to_string(),
        }
    }
}

fn is_html_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Coarse pipeline status derived from the event flow, independent of the
/// per-agent roster (the backend also emits events for ids outside it,
/// e.g. `orchestrator`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OrchestratorStatus {
    pub active_agent: Option<String>,
    pub task_in_progress: bool,
}

/// One file of an `/orchestrate` REST response, already unified across the
/// multi-file and legacy single-file shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFile {
    pub path: String,
    pub content: String,
}

/// What a task-submission response contributes to derived state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionOutcome {
    pub files: Vec<SubmittedFile>,
    pub execution_output: Option<String>,
    pub preview_url: Option<String>,
}

/// Everything the dashboard renders, folded out of the event stream one
/// event at a time, in arrival order. Owned by a single writer; readers
/// only ever see it between whole `apply` calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DerivedState {
    pub roster: AgentRoster,
    pub workspace: WorkspaceFiles,
    pub selected_file: Option<String>,
    pub streaming: StreamingBuffer,
    pub execution_log: String,
    pub plan: Option<String>,
    pub preview: Option<PreviewTarget>,
    pub total_tokens: u64,
    pub status: OrchestratorStatus,
}

impl DerivedState {
    /// Folds one incoming event into the derived entities. Events with an
    /// unrecognized kind, or recognized kinds with no rule, change nothing;
    /// they still live in the raw event buffer for display.
    pub fn apply(&mut self, event: &AgentEvent) {
        match &event.kind {
            EventKind::WorkspaceReset => self.apply_workspace_reset(),
            EventKind::FileCreated => self.apply_file_created(event),
            EventKind::CodeWritten => self.apply_code_written(event),
            EventKind::AgentStart => self.apply_agent_start(event),
            EventKind::Token => self.apply_token(event),
            EventKind::AgentEnd => self.apply_agent_end(event),
            EventKind::Error => self.apply_error(event),
            EventKind::PlanCreated => self.apply_plan_created(event),
            EventKind::Execution => self.apply_execution(event),
            EventKind::ExecutionStep => self.apply_execution_step(event),
            EventKind::Complete => self.apply_complete(),
            EventKind::Retry | EventKind::CodeReviewed | EventKind::Other(_) => {}
        }
    }

    /// Clears every derived entity ahead of a new task submission so state
    /// from a prior run never bleeds into the next one. The raw event
    /// buffer is owned elsewhere and must be cleared by the same caller.
    pub fn reset_for_submission(&mut self) {
        self.roster.reset();
        self.workspace.clear();
        self.selected_file = None;
        self.streaming.clear();
        self.execution_log.clear();
        self.plan = None;
        self.preview = None;
        self.total_tokens = 0;
        self.status = OrchestratorStatus {
            active_agent: None,
            task_in_progress: true,
        };
    }

    /// Ingests an `/orchestrate` REST response into the same entities the
    /// event reducer populates.
    pub fn ingest_submission(&mut self, outcome: &SubmissionOutcome) {
        for file in &outcome.files {
            if file.path.trim().is_empty() {
                continue;
            }
            let key = self.workspace.insert(&file.path, file.content.clone());
            if self.selected_file.is_none() {
                self.selected_file = Some(key.clone());
            }
            if is_html_path(&key) && self.preview.is_none() {
                self.preview = Some(PreviewTarget::for_path(&key));
            }
        }
        if let Some(output) = &outcome.execution_output {
            if !output.is_empty() {
                self.append_execution_output(output);
            }
        }
        if let Some(url) = &outcome.preview_url {
            if !url.is_empty() {
                let path = self
                    .selected_file
                    .clone()
                    .unwrap_or_else(|| STREAMING_PLACEHOLDER_PATH.to_string());
                self.preview = Some(PreviewTarget {
                    path,
                    url: url.clone(),
                });
            }
        }
        self.streaming.clear();
        self.status.task_in_progress = false;
        self.status.active_agent = None;
    }

    fn apply_workspace_reset(&mut self) {
        self.workspace.clear();
        self.selected_file = None;
        self.streaming.clear();
        self.preview = None;
    }

    fn apply_file_created(&mut self, event: &AgentEvent) {
        // The streamed draft is superseded even if the payload is unusable.
        self.streaming.clear();
        let path = event.data_str("file_path").unwrap_or("");
        let content = event.data_str("content").unwrap_or("");
        if path.trim().is_empty() || content.is_empty() {
            return;
        }
        let key = self.workspace.insert(path, content.to_string());
        if self.selected_file.is_none() {
            self.selected_file = Some(key.clone());
        }
        if is_html_path(&key) {
            self.preview = Some(PreviewTarget::for_path(&key));
        }
    }

    // Legacy single-file path kept for older orchestrator builds.
    fn apply_code_written(&mut self, event: &AgentEvent) {
        self.streaming.clear();
        let path = event.data_str("file_path").unwrap_or("");
        let code = event.data_str("code").unwrap_or("");
        if path.trim().is_empty() || code.is_empty() {
            return;
        }
        let key = self.workspace.insert(path, code.to_string());
        self.selected_file = Some(key);
    }

    fn apply_agent_start(&mut self, event: &AgentEvent) {
        if let Some(id) = event.agent_id() {
            let record = self.roster.get_mut(id);
            record.status = AgentStatus::Working;
            record.token_count = Some(0);
        }
        self.status.active_agent = Some(event.agent.clone());
        self.status.task_in_progress = true;
    }

    fn apply_token(&mut self, event: &AgentEvent) {
        let text = event
            .data_str("token")
            .or_else(|| event.data_str("text"))
            .unwrap_or("");
        let path = match event.data_str("file_path") {
            Some(p) if !p.trim().is_empty() => WorkspaceFiles::canonical(p),
            _ => STREAMING_PLACEHOLDER_PATH.to_string(),
        };
        self.streaming.append(&path, text);
        self.selected_file = Some(path);
        // Attribution can be ambiguous while several agents run, so every
        // working record accrues the token.
        for record in self.roster.working_mut() {
            record.token_count = Some(record.token_count.unwrap_or(0) + 1);
        }
        self.total_tokens += 1;
    }

    fn apply_agent_end(&mut self, event: &AgentEvent) {
        if let Some(id) = event.agent_id() {
            let record = self.roster.get_mut(id);
            record.status = AgentStatus::Complete;
            // Missing latency stays absent rather than being synthesized.
            record.latency_seconds = event
                .data_f64("duration")
                .or_else(|| event.data_f64("latency"));
        }
        if self.status.active_agent.as_deref() == Some(event.agent.as_str()) {
            self.status.active_agent = None;
        }
    }

    fn apply_error(&mut self, event: &AgentEvent) {
        if let Some(id) = event.agent_id() {
            self.roster.get_mut(id).status = AgentStatus::Error;
        }
        if event.agent == "orchestrator" {
            self.status.task_in_progress = false;
            self.status.active_agent = None;
        }
    }

    fn apply_plan_created(&mut self, event: &AgentEvent) {
        if let Some(summary) = event.data_str("summary") {
            self.plan = Some(summary.to_string());
        }
    }

    fn apply_execution(&mut self, event: &AgentEvent) {
        if let Some(output) = event.data_str("output") {
            self.append_execution_output(output);
        }
    }

    fn apply_execution_step(&mut self, event: &AgentEvent) {
        let label = event.data_str("label").unwrap_or("");
        let output = event.data_str("output").unwrap_or("");
        self.append_execution_output(&format!("=== {label} ===\n{output}"));
    }

    fn apply_complete(&mut self) {
        self.status.task_in_progress = false;
        self.status.active_agent = None;
    }

    fn append_execution_output(&mut self, output: &str) {
        if !self.execution_log.is_empty() {
            self.execution_log.push('\n');
        }
        self.execution_log.push_str(output);
    }
}

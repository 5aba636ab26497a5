use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The pipeline roster is closed: events naming any other agent id never
/// grow it, they are simply ignored for roster updates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Architect,
    Coder,
    Reviewer,
    Executor,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::Architect,
        AgentId::Coder,
        AgentId::Reviewer,
        AgentId::Executor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Architect => "architect",
            AgentId::Coder => "coder",
            AgentId::Reviewer => "reviewer",
            AgentId::Executor => "executor",
        }
    }

    fn index(self) -> usize {
        match self {
            AgentId::Architect => 0,
            AgentId::Coder => 1,
            AgentId::Reviewer => 2,
            AgentId::Executor => 3,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "architect" => Ok(AgentId::Architect),
            "coder" => Ok(AgentId::Coder),
            "reviewer" => Ok(AgentId::Reviewer),
            "executor" => Ok(AgentId::Executor),
            other => Err(format!("unknown agent id: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Complete,
    Error,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Complete => "complete",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent dashboard record. One per roster slot, mutated in place and
/// never created or destroyed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentRecord {
    pub status: AgentStatus,
    pub token_count: Option<u64>,
    pub latency_seconds: Option<f64>,
}

impl AgentRecord {
    pub fn reset(&mut self) {
        *self = AgentRecord::default();
    }
}

/// Fixed four-slot map keyed by [`AgentId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentRoster {
    records: [AgentRecord; 4],
}

impl AgentRoster {
    pub fn get(&self, id: AgentId) -> &AgentRecord {
        &self.records[id.index()]
    }

    pub fn get_mut(&mut self, id: AgentId) -> &mut AgentRecord {
        &mut self.records[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentRecord)> {
        AgentId::ALL.iter().map(|id| (*id, self.get(*id)))
    }

    /// Mutable view of every record currently in `Working` status.
    pub fn working_mut(&mut self) -> impl Iterator<Item = &mut AgentRecord> {
        self.records
            .iter_mut()
            .filter(|record| record.status == AgentStatus::Working)
    }

    /// Returns every slot to idle with null counters, as at task start.
    pub fn reset(&mut self) {
        for record in &mut self.records {
            record.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_round_trips_every_id() {
        let mut roster = AgentRoster::default();
        for id in AgentId::ALL {
            roster.get_mut(id).status = AgentStatus::Working;
        }
        assert!(roster.iter().all(|(_, r)| r.status == AgentStatus::Working));
        assert_eq!(roster.working_mut().count(), 4);
    }

    #[test]
    fn unknown_ids_do_not_parse() {
        assert!("orchestrator".parse::<AgentId>().is_err());
        assert_eq!("Coder".parse::<AgentId>(), Ok(AgentId::Coder));
    }

    #[test]
    fn reset_returns_slots_to_idle() {
        let mut roster = AgentRoster::default();
        let record = roster.get_mut(AgentId::Executor);
        record.status = AgentStatus::Error;
        record.token_count = Some(12);
        record.latency_seconds = Some(0.5);
        roster.reset();
        assert_eq!(*roster.get(AgentId::Executor), AgentRecord::default());
    }
}

use crate::{
    Error, Result,
    acl::DEFAULT_ONTOLOGY,
    agent::AgentKind,
    event::{Location, SensorReport},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub coordinator: Option<CoordinatorConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    #[serde(default = "default_conversation_timeout")]
    pub conversation_timeout_ticks: u64,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u32,
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_ontology")]
    pub ontology: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub id: String,
    #[serde(default = "default_coordinator_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub position: Location,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub reports: Vec<SensorReport>,
    #[serde(default)]
    pub missions: Vec<MissionOrder>,
}

/// A coordinator dispatch scheduled for a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionOrder {
    #[serde(default)]
    pub at_tick: u64,
    pub location: Location,
    #[serde(default = "default_mission_type")]
    pub mission_type: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_required_agents")]
    pub required_agents: usize,
}

impl MissionOrder {
    pub fn new(location: Location, mission_type: impl Into<String>) -> Self {
        Self {
            at_tick: 0,
            location,
            mission_type: mission_type.into(),
            priority: default_priority(),
            required_agents: default_required_agents(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            conversation_timeout_ticks: default_conversation_timeout(),
            tick_seconds: default_tick_seconds(),
            start_time: default_start_time(),
            ontology: default_ontology(),
        }
    }
}

impl Config {
    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if sim.conversation_timeout_ticks == 0 {
            return Err(Error::config("simulation.conversation_timeout_ticks must be positive"));
        }
        if sim.tick_seconds == 0 {
            return Err(Error::config("simulation.tick_seconds must be positive"));
        }
        if sim.ontology.trim().is_empty() {
            return Err(Error::config("simulation.ontology must not be empty"));
        }

        let mut seen = HashSet::new();
        let coordinator = self.coordinator.as_ref().map(|c| c.id.as_str());
        for id in coordinator.into_iter().chain(self.agents.iter().map(|a| a.id.as_str())) {
            if id.trim().is_empty() {
                return Err(Error::config("agent and coordinator ids must not be empty"));
            }
            if !seen.insert(id) {
                return Err(Error::config(format!("duplicate agent id '{}'", id)));
            }
        }
        if let Some(agent) = self.agents.iter().find(|a| !a.position.is_finite()) {
            return Err(Error::config(format!(
                "agent '{}' has a non-finite position",
                agent.id
            )));
        }

        if !self.scenario.missions.is_empty() && coordinator.is_none() {
            return Err(Error::config("scenario missions need a coordinator"));
        }
        for (index, mission) in self.scenario.missions.iter().enumerate() {
            if mission.required_agents == 0 {
                return Err(Error::config(format!(
                    "mission {} must require at least one agent",
                    index
                )));
            }
            if !mission.location.is_finite() {
                return Err(Error::config(format!(
                    "mission {} has a non-finite location",
                    index
                )));
            }
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> String {
    "journal.db".to_string()
}

fn default_max_ticks() -> u64 {
    100
}

fn default_conversation_timeout() -> u64 {
    30
}

fn default_tick_seconds() -> u32 {
    60
}

fn default_start_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_ontology() -> String {
    DEFAULT_ONTOLOGY.to_string()
}

fn default_coordinator_name() -> String {
    "Coordinator".to_string()
}

fn default_mission_type() -> String {
    "search".to_string()
}

fn default_priority() -> String {
    "high".to_string()
}

fn default_required_agents() -> usize {
    1
}

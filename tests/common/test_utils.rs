use chrono::{DateTime, Utc};
use disaster_response::{
    Result,
    acl::{AclMessage, Content, DEFAULT_ONTOLOGY, Performative},
    agent::{AgentKind, Behaviors},
    config::{MissionOrder, SimulationConfig},
    event::{Location, SensorReport},
    journal::{JournalStorage, MemoryJournal, Record},
    simulation::{Coordinator, Simulation},
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

pub const COORD: &str = "COORD-001";
pub const FIELD: &str = "FIELD-001";
pub const RESCUE: &str = "RESCUE-001";
pub const MEDIC: &str = "MEDIC-001";

pub fn start_time() -> DateTime<Utc> {
    "2024-01-01T08:00:00Z".parse().unwrap()
}

/// Simulation settings with a fixed start time and the given timeout.
pub fn test_settings(conversation_timeout_ticks: u64) -> SimulationConfig {
    SimulationConfig {
        conversation_timeout_ticks,
        start_time: start_time(),
        ..Default::default()
    }
}

/// Empty simulation writing to a fresh in-memory journal.
pub fn create_simulation(conversation_timeout_ticks: u64) -> (Simulation, MemoryJournal) {
    let journal = MemoryJournal::new();
    let simulation = Simulation::new(
        Behaviors::load().unwrap(),
        &test_settings(conversation_timeout_ticks),
        Arc::new(journal.clone()),
    );
    (simulation, journal)
}

/// Coordinator plus one field agent at the origin.
pub fn create_field_team(conversation_timeout_ticks: u64) -> (Simulation, MemoryJournal) {
    let (mut simulation, journal) = create_simulation(conversation_timeout_ticks);
    simulation
        .set_coordinator(Coordinator::new(COORD, "Command", DEFAULT_ONTOLOGY))
        .unwrap();
    simulation
        .add_agent(FIELD, "Scout", AgentKind::Field, Location(0.0, 0.0))
        .unwrap();
    (simulation, journal)
}

/// Rescue agent at (10, 10) and medical agent at (12, 14).
pub fn create_response_team() -> (Simulation, MemoryJournal) {
    let (mut simulation, journal) = create_simulation(30);
    simulation
        .add_agent(RESCUE, "Rescue Team Alpha", AgentKind::Rescue, Location(10.0, 10.0))
        .unwrap();
    simulation
        .add_agent(MEDIC, "Paramedic Unit 1", AgentKind::Medical, Location(12.0, 14.0))
        .unwrap();
    (simulation, journal)
}

pub fn collapse_report() -> SensorReport {
    SensorReport::new("STRUCT-07", "structural", (15.0, 20.0))
        .with("damage_level", 0.9)
        .with("trapped_people", 5.0)
}

pub fn investigate(x: f64, y: f64) -> MissionOrder {
    MissionOrder::new(Location(x, y), "search_and_rescue")
}

pub fn message(
    performative: Performative,
    sender: &str,
    receiver: &str,
    conversation: &str,
) -> AclMessage {
    AclMessage::new(
        performative,
        sender,
        receiver,
        Content::new(),
        conversation,
        DEFAULT_ONTOLOGY,
    )
    .unwrap()
}

pub fn records_of_kind(records: &[Record], kind: &str) -> Vec<Record> {
    records.iter().filter(|r| r.kind() == kind).cloned().collect()
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test config YAML file
pub async fn create_test_config_file(dir: &TempDir, content: &str) -> Result<String> {
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, content).await?;
    Ok(config_path.to_string_lossy().to_string())
}

/// Create a temporary journal database for testing
pub async fn create_test_journal() -> Result<(TempDir, JournalStorage)> {
    let temp_dir = create_temp_dir();
    let db_path = temp_dir.path().join("journal.db");
    let storage = JournalStorage::new(&db_path.to_string_lossy()).await?;
    Ok((temp_dir, storage))
}

/// Scenario configuration used by the config-driven tests.
pub const SAMPLE_SCENARIO_YAML: &str = r#"
logs:
  level: debug
journal:
  database_path: ":memory:"
simulation:
  max_ticks: 60
  conversation_timeout_ticks: 30
  start_time: "2024-01-01T08:00:00Z"
coordinator:
  id: COORD-001
  name: Emergency Command
agents:
  - id: RESCUE-001
    name: Rescue Team Alpha
    kind: rescue
    position: [10.0, 10.0]
  - id: MEDIC-001
    kind: medical
    position: [12.0, 14.0]
  - id: FIELD-001
    kind: field
    position: [0.0, 0.0]
scenario:
  reports:
    - sensor_id: STRUCT-07
      reading_kind: structural
      location: [15.0, 20.0]
      attributes:
        damage_level: 0.9
        trapped_people: 5
  missions:
    - at_tick: 2
      location: [2.0, 1.0]
      priority: critical
"#;

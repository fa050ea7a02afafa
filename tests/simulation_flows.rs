use disaster_response::{
    Error,
    acl::{DEFAULT_ONTOLOGY, Performative},
    agent::{
        AgentKind, AgentState, Behaviors, FieldState, MedicalState, RescueState,
        field::{ASSIST_ACTION, RETURN_ACTION},
    },
    conversation::ConversationState,
    event::{EventKind, Location, SensorReport},
    journal::{Record, RecordSink},
    simulation::{AssignmentStatus, Coordinator, Simulation},
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

mod common;
use common::*;

#[tokio::test]
async fn test_collapse_report_sends_rescue_responding() {
    let (mut simulation, journal) = create_response_team();

    let events = simulation.ingest(&collapse_report()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::StructuralCollapse);
    assert_eq!(events[0].severity(), 0.9);

    simulation.tick().await.unwrap();
    let rescue = simulation.agent(RESCUE).unwrap();
    assert_eq!(rescue.state(), AgentState::Rescue(RescueState::Responding));
    assert_eq!(rescue.context().mission.as_ref().unwrap().victims, 5);
    assert_eq!(
        simulation.agent(MEDIC).unwrap().state(),
        AgentState::Medical(MedicalState::Idle)
    );

    let records = journal.records().unwrap();
    assert!(matches!(records[0], Record::Event { .. }));
    let transitions = records_of_kind(&records, "transition");
    assert_eq!(transitions.len(), 1);
    assert_eq!(
        transitions[0].to_string(),
        "[08:01:00] TRANSITION RESCUE-001: IDLE -> RESPONDING (event structural-collapse [STRUCT-07:structural-collapse])"
    );
}

#[tokio::test]
async fn test_rescue_hand_off_dispatches_medical() {
    let (mut simulation, journal) = create_response_team();
    simulation.ingest(&collapse_report()).await.unwrap();

    let ticks = simulation.run(100).await.unwrap();
    assert!(simulation.is_settled());
    assert!(ticks.len() < 100);

    let rescue = simulation.agent(RESCUE).unwrap();
    assert_eq!(rescue.state(), AgentState::Rescue(RescueState::Completed));
    assert_eq!(rescue.context().rescued_total, 5);
    assert_eq!(rescue.completed_goals().len(), 3);

    let medic = simulation.agent(MEDIC).unwrap();
    assert_eq!(medic.state(), AgentState::Medical(MedicalState::Completed));
    assert_eq!(medic.context().patients_treated, 5);
    // Severity 0.9 costs a high-severity treatment.
    assert_eq!(medic.context().supplies, 75);
    assert_eq!(medic.context().position, medic.context().base);

    let records = journal.records().unwrap();
    let events: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            Record::Event { event, .. } => Some(event.kind()),
            _ => None,
        })
        .collect();
    assert_eq!(events, vec![EventKind::StructuralCollapse, EventKind::MedicalEmergency]);
}

#[tokio::test]
async fn test_coordinator_dispatch_completes_conversation() {
    let (mut simulation, journal) = create_field_team(30);

    assert_eq!(simulation.dispatch(&investigate(2.0, 1.0)).await.unwrap(), 1);
    let ticks = simulation.run(20).await.unwrap();
    assert_eq!(ticks.len(), 6);

    let field = simulation.agent(FIELD).unwrap();
    assert_eq!(field.state(), AgentState::Field(FieldState::Completed));
    let goals: Vec<_> = field.completed_goals().iter().map(|g| g.id.as_str()).collect();
    assert_eq!(goals, vec!["reach_site", "investigate_site", "report_findings"]);

    let conversation = simulation.conversations().get(&"COORD-001-0001".into()).unwrap();
    assert_eq!(
        conversation.trail(),
        &[
            ConversationState::Initiated,
            ConversationState::Agreed,
            ConversationState::Informed,
            ConversationState::Confirmed,
            ConversationState::Closed,
        ]
    );

    let coordinator = simulation.coordinator().unwrap();
    assert!(coordinator.assignment(FIELD).is_none());
    assert_eq!(coordinator.completed_missions()[0].status, AssignmentStatus::Reported);
    assert_eq!(coordinator.discoveries().len(), 1);

    let performatives: Vec<_> = journal
        .records()
        .unwrap()
        .iter()
        .filter_map(|r| match r {
            Record::Message(m) => Some(m.performative),
            _ => None,
        })
        .collect();
    assert_eq!(
        performatives,
        vec![
            Performative::Request,
            Performative::Agree,
            Performative::Inform,
            Performative::Confirm
        ]
    );
}

#[tokio::test]
async fn test_transition_is_journaled_before_its_message() {
    let (mut simulation, journal) = create_field_team(30);
    simulation.dispatch(&investigate(2.0, 1.0)).await.unwrap();
    simulation.tick().await.unwrap();

    let kinds: Vec<_> = journal
        .records()
        .unwrap()
        .iter()
        .map(|r| r.kind())
        .collect();
    assert_eq!(kinds, vec!["message", "transition", "message"]);
}

#[tokio::test]
async fn test_status_query_does_not_advance() {
    let (mut simulation, _journal) = create_field_team(30);
    simulation.dispatch(&investigate(5.0, 0.0)).await.unwrap();
    simulation.tick().await.unwrap();

    assert!(simulation.query_status(FIELD).await.unwrap());
    simulation.tick().await.unwrap();

    let id = "COORD-001-0001".into();
    assert_eq!(simulation.conversations().state(&id), Some(ConversationState::Agreed));
    let assignment = simulation.coordinator().unwrap().assignment(FIELD).unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Agreed);
    assert_eq!(assignment.last_status.as_deref(), Some("TRAVELING"));

    simulation.run(20).await.unwrap();
    assert_eq!(simulation.conversations().state(&id), Some(ConversationState::Closed));
    assert_eq!(
        simulation.agent(FIELD).unwrap().state(),
        AgentState::Field(FieldState::Completed)
    );
}

#[tokio::test]
async fn test_busy_agent_refuses_second_request() {
    let (mut simulation, journal) = create_field_team(30);
    simulation.dispatch(&investigate(5.0, 5.0)).await.unwrap();
    simulation.tick().await.unwrap();

    // Bypass the coordinator's own bookkeeping and ask again directly.
    let second = message(Performative::Request, COORD, FIELD, "MANUAL-1")
        .at(simulation.clock().now());
    assert!(simulation.post(second).await.unwrap());
    simulation.tick().await.unwrap();

    assert_eq!(
        simulation.conversations().state(&"MANUAL-1".into()),
        Some(ConversationState::Closed)
    );
    assert_eq!(
        simulation.agent(FIELD).unwrap().state(),
        AgentState::Field(FieldState::Traveling)
    );
    let closed = records_of_kind(&journal.records().unwrap(), "conversation_closed");
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].subject(), "MANUAL-1");
}

#[tokio::test]
async fn test_confirm_while_initiated_is_journaled_rejection() {
    let (mut simulation, journal) = create_field_team(30);
    simulation.dispatch(&investigate(5.0, 5.0)).await.unwrap();

    let confirm = message(Performative::Confirm, COORD, FIELD, "COORD-001-0001");
    assert!(!simulation.post(confirm).await.unwrap());

    let id = "COORD-001-0001".into();
    assert_eq!(simulation.conversations().state(&id), Some(ConversationState::Initiated));
    let rejections = records_of_kind(&journal.records().unwrap(), "rejection");
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].subject(), "COORD-001-0001");
    assert!(rejections[0].to_string().contains("CONFIRM"));
}

#[tokio::test]
async fn test_message_to_unknown_agent_is_rejected() {
    let (mut simulation, journal) = create_field_team(30);
    let request = message(Performative::Request, COORD, "GHOST-9", "C-GHOST");

    assert!(!simulation.post(request).await.unwrap());
    assert!(simulation.conversations().is_empty());
    let rejections = records_of_kind(&journal.records().unwrap(), "rejection");
    assert!(rejections[0].to_string().contains("GHOST-9"));
}

#[tokio::test]
async fn test_stale_conversation_times_out() {
    let (mut simulation, journal) = create_field_team(2);
    simulation.dispatch(&investigate(5.0, 0.0)).await.unwrap();

    let ticks = simulation.run(12).await.unwrap();
    assert_eq!(ticks.iter().map(|t| t.timeouts).sum::<usize>(), 1);
    assert_eq!(ticks[2].timeouts, 1);
    // The close notice is handled on the tick after the timeout.
    assert_eq!(ticks.len(), 4);
    assert!(simulation.is_settled());

    let id = "COORD-001-0001".into();
    assert_eq!(simulation.conversations().state(&id), Some(ConversationState::Closed));
    assert!(simulation.coordinator().unwrap().assignment(FIELD).is_none());

    let records = journal.records().unwrap();
    let closed = records_of_kind(&records, "conversation_closed");
    assert_eq!(closed.len(), 1);
    assert!(closed[0].to_string().ends_with("timeout"));
    assert!(records_of_kind(&records, "rejection").is_empty());

    let field = simulation.agent(FIELD).unwrap();
    assert_eq!(field.state(), AgentState::Field(FieldState::Idle));
    assert!(field.context().mission.is_none());
    let transitions = records_of_kind(&records, "transition");
    assert!(
        transitions
            .last()
            .unwrap()
            .to_string()
            .ends_with("TRAVELING -> IDLE (conversation COORD-001-0001 closed)")
    );
}

#[tokio::test]
async fn test_agent_takes_new_mission_after_timeout() {
    let (mut simulation, _journal) = create_field_team(2);
    simulation.dispatch(&investigate(5.0, 0.0)).await.unwrap();
    simulation.run(12).await.unwrap();

    assert_eq!(simulation.dispatch(&investigate(1.0, 0.0)).await.unwrap(), 1);
    simulation.tick().await.unwrap();

    let id = "COORD-001-0002".into();
    assert_eq!(simulation.conversations().state(&id), Some(ConversationState::Agreed));
    assert_eq!(
        simulation.agent(FIELD).unwrap().state(),
        AgentState::Field(FieldState::Traveling)
    );
    let assignment = simulation.coordinator().unwrap().assignment(FIELD).unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Agreed);
}

#[tokio::test]
async fn test_cancel_returns_agent_to_idle() {
    let (mut simulation, journal) = create_field_team(30);
    simulation.dispatch(&investigate(5.0, 5.0)).await.unwrap();
    simulation.tick().await.unwrap();

    let id = "COORD-001-0001".into();
    assert!(simulation.cancel(&id).await.unwrap());
    assert!(!simulation.cancel(&id).await.unwrap());
    simulation.tick().await.unwrap();

    assert_eq!(
        simulation.agent(FIELD).unwrap().state(),
        AgentState::Field(FieldState::Idle)
    );
    assert!(simulation.is_settled());
    let closed = records_of_kind(&journal.records().unwrap(), "conversation_closed");
    assert_eq!(closed.len(), 1);
    assert!(closed[0].to_string().ends_with("cancelled"));
}

#[tokio::test]
async fn test_completed_agent_is_not_dispatched_again() {
    let (mut simulation, journal) = create_field_team(30);
    assert_eq!(simulation.dispatch(&investigate(2.0, 1.0)).await.unwrap(), 1);
    simulation.run(20).await.unwrap();
    assert_eq!(
        simulation.agent(FIELD).unwrap().state(),
        AgentState::Field(FieldState::Completed)
    );

    assert_eq!(simulation.dispatch(&investigate(1.0, 1.0)).await.unwrap(), 0);
    assert!(simulation.conversations().get(&"COORD-001-0002".into()).is_none());
    assert!(simulation.coordinator().unwrap().is_retired(FIELD));
    assert!(!simulation.recall(FIELD).await.unwrap());
    assert!(simulation.is_settled());

    let records = journal.records().unwrap();
    assert_eq!(records_of_kind(&records, "conversation_closed").len(), 1);
    assert!(records_of_kind(&records, "rejection").is_empty());
}

#[tokio::test]
async fn test_assist_then_recall_frees_agent() {
    let (mut simulation, _journal) = create_field_team(30);
    simulation
        .add_agent("FIELD-002", "Second Scout", AgentKind::Field, Location(3.0, 0.0))
        .unwrap();

    assert!(simulation.assist(FIELD, "FIELD-002").await.unwrap());
    simulation.run(20).await.unwrap();
    let field = simulation.agent(FIELD).unwrap();
    assert_eq!(field.state(), AgentState::Field(FieldState::Idle));
    assert_eq!(field.context().position, Location(3.0, 0.0));
    assert!(simulation.coordinator().unwrap().is_available(FIELD));

    assert!(simulation.recall(FIELD).await.unwrap());
    simulation.run(20).await.unwrap();
    assert!(simulation.is_settled());
    let field = simulation.agent(FIELD).unwrap();
    assert_eq!(field.state(), AgentState::Field(FieldState::Idle));
    assert_eq!(field.context().position, field.context().base);

    for id in ["COORD-001-0001", "COORD-001-0002"] {
        let conversation = simulation.conversations().get(&id.into()).unwrap();
        assert_eq!(
            conversation.trail(),
            &[
                ConversationState::Initiated,
                ConversationState::Agreed,
                ConversationState::Informed,
                ConversationState::Confirmed,
                ConversationState::Closed,
            ]
        );
    }
    let missions: Vec<_> = simulation
        .coordinator()
        .unwrap()
        .completed_missions()
        .iter()
        .map(|a| a.mission_type.as_str())
        .collect();
    assert_eq!(missions, vec![ASSIST_ACTION, RETURN_ACTION]);
}

#[tokio::test]
async fn test_recall_unknown_agent_fails() {
    let (mut simulation, _journal) = create_field_team(30);
    let err = simulation.recall("GHOST-9").await.unwrap_err();
    assert!(matches!(err, Error::AgentNotFound { ref agent_id } if agent_id == "GHOST-9"));
}

#[tokio::test]
async fn test_invalid_report_is_rejected_and_skipped() {
    let (mut simulation, journal) = create_response_team();
    let report = SensorReport::new("SEIS-01", "seismic", (1.0, 1.0));

    let err = simulation.ingest(&report).await.unwrap_err();
    assert!(matches!(err, Error::InvalidReport { ref sensor_id, .. } if sensor_id == "SEIS-01"));

    let records = journal.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject(), "SEIS-01");
    assert_eq!(simulation.agent(RESCUE).unwrap().pending_len(), 0);
}

#[tokio::test]
async fn test_same_inputs_same_journal() {
    async fn run_once() -> Vec<String> {
        let (mut simulation, journal) = create_response_team();
        simulation
            .set_coordinator(Coordinator::new(COORD, "Command", DEFAULT_ONTOLOGY))
            .unwrap();
        simulation
            .add_agent(FIELD, "Scout", AgentKind::Field, Location(0.0, 0.0))
            .unwrap();
        simulation.ingest(&collapse_report()).await.unwrap();
        simulation.schedule(investigate(3.0, 2.0));
        simulation.run(60).await.unwrap();

        journal
            .records()
            .unwrap()
            .iter()
            .map(|r| r.to_json().unwrap())
            .collect()
    }

    let first = run_once().await;
    assert!(first.len() > 10);
    assert_eq!(first, run_once().await);
}

#[tokio::test]
async fn test_sink_failure_stops_the_tick() {
    let sink = FailingSink::after(1);
    let mut simulation = Simulation::new(
        Behaviors::load().unwrap(),
        &test_settings(30),
        Arc::new(sink.clone()) as Arc<dyn RecordSink>,
    );
    simulation
        .add_agent(RESCUE, "Rescue", AgentKind::Rescue, Location(10.0, 10.0))
        .unwrap();

    simulation.ingest(&collapse_report()).await.unwrap();
    let err = simulation.tick().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(sink.accepted().len(), 1);
}

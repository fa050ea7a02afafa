use super::{
    AgentContext, AgentState, Effect, Goal, Mission, Trigger, TriggerPattern,
    context::{at_base, at_target, move_to_base, move_to_target, perform_work, work_done},
};
use crate::{
    Result,
    event::{AttributeValue, Attributes, Event, EventKind},
    fsm::{TransitionRule, TransitionTable},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RescueState {
    Idle,
    Responding,
    Rescuing,
    Transporting,
    Completed,
}

impl RescueState {
    pub const ALL: [RescueState; 5] = [
        Self::Idle,
        Self::Responding,
        Self::Rescuing,
        Self::Transporting,
        Self::Completed,
    ];
}

impl fmt::Display for RescueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Responding => "RESPONDING",
            Self::Rescuing => "RESCUING",
            Self::Transporting => "TRANSPORTING",
            Self::Completed => "COMPLETED",
        })
    }
}

pub type RescueTable = TransitionTable<RescueState, AgentContext, Trigger, Effect>;
type Rule = TransitionRule<RescueState, AgentContext, Trigger, Effect>;

const RESPONSE_EVENTS: &[EventKind] = &[
    EventKind::StructuralCollapse,
    EventKind::MajorEarthquake,
    EventKind::Fire,
];

pub fn table() -> Result<RescueTable> {
    use RescueState::*;
    let rules = vec![
        Rule::new(Idle, TriggerPattern::Events(RESPONSE_EVENTS), Responding).then(start_response),
        Rule::new(Responding, TriggerPattern::Tick, Rescuing).when(at_target),
        Rule::new(Responding, TriggerPattern::Tick, Responding).then(move_to_target),
        Rule::new(Rescuing, TriggerPattern::Tick, Transporting)
            .when(work_done)
            .then(hand_off),
        Rule::new(Rescuing, TriggerPattern::Tick, Rescuing).then(perform_work),
        Rule::new(Transporting, TriggerPattern::Tick, Completed)
            .when(at_base)
            .then(deliver),
        Rule::new(Transporting, TriggerPattern::Tick, Transporting).then(move_to_base),
    ];
    TransitionTable::new("rescue", RescueState::ALL.to_vec(), Idle, vec![Completed], rules)
}

pub fn goals() -> Vec<Goal> {
    vec![
        Goal::new(
            "quick_response",
            "Reach the emergency site",
            [AgentState::Rescue(RescueState::Rescuing)],
        ),
        Goal::new(
            "rescue_trapped",
            "Free trapped victims",
            [AgentState::Rescue(RescueState::Transporting)],
        ),
        Goal::new(
            "transport_victims",
            "Bring victims back to base",
            [AgentState::Rescue(RescueState::Completed)],
        ),
    ]
}

fn start_response(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    if let Trigger::Event(event) = trigger {
        let victims = event
            .number("trapped_people")
            .or_else(|| event.number("injured_count"))
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(1);
        info!(
            "🚒 {} responding to {} with {} victims",
            ctx.agent_id, event, victims
        );
        ctx.mission = Some(Mission::from_event(event, victims));
    }
    Vec::new()
}

/// Casualties leave the site; medical agents pick them up from there.
fn hand_off(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    let Some((location, victims, severity)) = ctx
        .mission
        .as_ref()
        .map(|m| (m.location, m.victims, m.severity))
    else {
        return Vec::new();
    };
    if victims == 0 {
        return Vec::new();
    }

    let seq = ctx.next_sequence();
    let attributes = Attributes::from([
        (
            "injured_count".to_string(),
            AttributeValue::Number(f64::from(victims)),
        ),
        ("needs_evacuation".to_string(), AttributeValue::Flag(true)),
        (
            "reported_by".to_string(),
            AttributeValue::Text(ctx.agent_id.clone()),
        ),
    ]);
    let event = Event::new(
        format!("{}:handoff-{}", ctx.agent_id, seq),
        EventKind::MedicalEmergency,
        location,
        severity,
        attributes,
    );
    vec![Effect::Raise(event)]
}

fn deliver(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(mission) = ctx.mission.take() {
        ctx.rescued_total += mission.victims;
        info!(
            "🏁 {} delivered {} victims ({} total)",
            ctx.agent_id, mission.victims, ctx.rescued_total
        );
    }
    Vec::new()
}

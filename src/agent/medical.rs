use super::{
    AgentContext, AgentState, Effect, Goal, Mission, Trigger, TriggerPattern,
    context::{at_base, at_target, move_to_base, move_to_target, work_done},
};
use crate::{
    Result,
    event::EventKind,
    fsm::{TransitionRule, TransitionTable},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicalState {
    Idle,
    Dispatched,
    Treating,
    Transporting,
    Completed,
}

impl MedicalState {
    pub const ALL: [MedicalState; 5] = [
        Self::Idle,
        Self::Dispatched,
        Self::Treating,
        Self::Transporting,
        Self::Completed,
    ];
}

impl fmt::Display for MedicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Dispatched => "DISPATCHED",
            Self::Treating => "TREATING",
            Self::Transporting => "TRANSPORTING",
            Self::Completed => "COMPLETED",
        })
    }
}

pub type MedicalTable = TransitionTable<MedicalState, AgentContext, Trigger, Effect>;
type Rule = TransitionRule<MedicalState, AgentContext, Trigger, Effect>;

const EMERGENCY_EVENTS: &[EventKind] = &[EventKind::MedicalEmergency];

pub fn table() -> Result<MedicalTable> {
    use MedicalState::*;
    let rules = vec![
        Rule::new(Idle, TriggerPattern::Events(EMERGENCY_EVENTS), Dispatched)
            .when(has_supplies)
            .then(dispatch),
        Rule::new(Dispatched, TriggerPattern::Tick, Treating).when(at_target),
        Rule::new(Dispatched, TriggerPattern::Tick, Dispatched).then(move_to_target),
        Rule::new(Treating, TriggerPattern::Tick, Transporting).when(treated_for_evacuation),
        Rule::new(Treating, TriggerPattern::Tick, Completed)
            .when(work_done)
            .then(discharge),
        Rule::new(Treating, TriggerPattern::Tick, Treating).then(treat),
        Rule::new(Transporting, TriggerPattern::Tick, Completed)
            .when(at_base)
            .then(discharge),
        Rule::new(Transporting, TriggerPattern::Tick, Transporting).then(move_to_base),
    ];
    TransitionTable::new("medical", MedicalState::ALL.to_vec(), Idle, vec![Completed], rules)
}

pub fn goals() -> Vec<Goal> {
    vec![
        Goal::new(
            "rapid_response",
            "Reach patients quickly",
            [AgentState::Medical(MedicalState::Treating)],
        ),
        Goal::new(
            "provide_treatment",
            "Stabilize patients on site",
            [
                AgentState::Medical(MedicalState::Transporting),
                AgentState::Medical(MedicalState::Completed),
            ],
        ),
        Goal::new(
            "evacuate_patients",
            "Get patients to care",
            [AgentState::Medical(MedicalState::Completed)],
        ),
    ]
}

/// Supplies consumed by one treatment at the given severity.
pub fn treatment_cost(severity: f64) -> u32 {
    if severity >= 1.0 {
        40
    } else if severity >= 0.75 {
        25
    } else if severity >= 0.5 {
        15
    } else {
        5
    }
}

fn has_supplies(ctx: &AgentContext, _: &Trigger) -> bool {
    ctx.supplies > 0
}

fn treated_for_evacuation(ctx: &AgentContext, _: &Trigger) -> bool {
    ctx.mission
        .as_ref()
        .is_some_and(|m| m.work_done && m.needs_evacuation)
}

fn dispatch(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    if let Trigger::Event(event) = trigger {
        let patients = event
            .number("injured_count")
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(1);
        info!(
            "🚑 {} dispatched to {} for {} patients",
            ctx.agent_id, event, patients
        );
        ctx.mission = Some(Mission::from_event(event, patients));
    }
    Vec::new()
}

fn treat(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    let Some(mission) = ctx.mission.as_mut() else {
        return Vec::new();
    };
    let cost = treatment_cost(mission.severity);
    if cost > ctx.supplies {
        warn!(
            "{} is short on supplies: needs {}, has {}",
            ctx.agent_id, cost, ctx.supplies
        );
    }
    ctx.supplies = ctx.supplies.saturating_sub(cost);
    mission.work_done = true;
    Vec::new()
}

fn discharge(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(mission) = ctx.mission.take() {
        ctx.patients_treated += mission.victims;
        info!(
            "🏁 {} finished with {} patients ({} total)",
            ctx.agent_id, mission.victims, ctx.patients_treated
        );
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AttributeValue, Attributes, Event, Location};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn emergency(severity: f64, evacuate: bool) -> Trigger {
        let attributes = Attributes::from([
            ("injured_count".to_string(), AttributeValue::Number(2.0)),
            ("needs_evacuation".to_string(), AttributeValue::Flag(evacuate)),
        ]);
        Trigger::Event(Event::new(
            "M-1:medical-emergency",
            EventKind::MedicalEmergency,
            Location(1.0, 0.0),
            severity,
            attributes,
        ))
    }

    fn run(severity: f64, evacuate: bool) -> (Vec<MedicalState>, AgentContext) {
        let table = table().unwrap();
        let mut state = table.initial();
        let mut ctx = AgentContext::new("MEDIC-001", Location(0.0, 0.0));
        table.step(&mut state, &mut ctx, &emergency(severity, evacuate));

        let mut visited = vec![state];
        for _ in 0..10 {
            if table.step(&mut state, &mut ctx, &Trigger::Tick).changed_state() {
                visited.push(state);
            }
        }
        (visited, ctx)
    }

    #[rstest]
    #[case(0.25, 5)]
    #[case(0.5, 15)]
    #[case(0.75, 25)]
    #[case(1.0, 40)]
    fn test_treatment_cost_by_severity(#[case] severity: f64, #[case] cost: u32) {
        assert_eq!(treatment_cost(severity), cost);
        let (_, ctx) = run(severity, false);
        assert_eq!(ctx.supplies, 100 - cost);
    }

    #[test]
    fn test_on_site_treatment_completes_without_transport() {
        use MedicalState::*;
        let (visited, ctx) = run(0.5, false);
        assert_eq!(visited, vec![Dispatched, Treating, Completed]);
        assert_eq!(ctx.patients_treated, 2);
        assert_eq!(ctx.position, Location(1.0, 0.0));
    }

    #[test]
    fn test_evacuation_goes_through_transport() {
        use MedicalState::*;
        let (visited, ctx) = run(0.75, true);
        assert_eq!(visited, vec![Dispatched, Treating, Transporting, Completed]);
        assert_eq!(ctx.position, ctx.base);
        assert!(ctx.mission.is_none());
    }

    #[test]
    fn test_no_dispatch_without_supplies() {
        let table = table().unwrap();
        let mut state = table.initial();
        let mut ctx = AgentContext::new("MEDIC-001", Location(0.0, 0.0));
        ctx.supplies = 0;

        let outcome = table.step(&mut state, &mut ctx, &emergency(0.5, false));
        assert!(!outcome.is_match());
        assert_eq!(state, MedicalState::Idle);
    }
}

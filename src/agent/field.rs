use super::{
    AgentContext, AgentState, Effect, Goal, Mission, Trigger, TriggerPattern,
    context::{at_target, move_to_target, perform_work, work_done},
};
use crate::{
    Result,
    acl::{AclMessage, ConversationId, Performative, content},
    event::Location,
    fsm::{TransitionRule, TransitionTable},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use tracing::{info, warn};

pub const INVESTIGATE_ACTION: &str = "investigate_location";
pub const RETURN_ACTION: &str = "return_to_base";
pub const ASSIST_ACTION: &str = "assist_agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldState {
    Idle,
    Traveling,
    Investigating,
    Reporting,
    Completed,
}

impl FieldState {
    pub const ALL: [FieldState; 5] = [
        Self::Idle,
        Self::Traveling,
        Self::Investigating,
        Self::Reporting,
        Self::Completed,
    ];
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Traveling => "TRAVELING",
            Self::Investigating => "INVESTIGATING",
            Self::Reporting => "REPORTING",
            Self::Completed => "COMPLETED",
        })
    }
}

pub type FieldTable = TransitionTable<FieldState, AgentContext, Trigger, Effect>;
type Rule = TransitionRule<FieldState, AgentContext, Trigger, Effect>;

pub fn table() -> Result<FieldTable> {
    use FieldState::*;
    let request = TriggerPattern::Performative(Performative::Request);
    let query = TriggerPattern::Performative(Performative::QueryIf);
    let closed = TriggerPattern::ConversationClosed;

    let mut rules = vec![
        Rule::new(Idle, request, Traveling)
            .when(is_investigation)
            .then(accept_mission),
        Rule::new(Idle, request, Traveling)
            .when(is_return)
            .then(accept_return),
        Rule::new(Idle, request, Traveling)
            .when(is_assist)
            .then(accept_assist),
        Rule::new(Idle, request, Idle).then(refuse_request),
    ];
    for busy in [Traveling, Investigating, Reporting] {
        rules.push(Rule::new(busy, request, busy).then(refuse_busy));
        rules.push(
            Rule::new(busy, closed, Idle)
                .when(closes_mission)
                .then(abandon_mission),
        );
    }
    for open in [Idle, Traveling, Investigating, Reporting] {
        rules.push(Rule::new(open, query, open).then(answer_status));
    }
    rules.extend([
        Rule::new(Traveling, TriggerPattern::Tick, Idle)
            .when(errand_done)
            .then(finish_errand),
        Rule::new(Traveling, TriggerPattern::Tick, Investigating).when(at_target),
        Rule::new(Traveling, TriggerPattern::Tick, Traveling).then(move_to_target),
        Rule::new(Investigating, TriggerPattern::Tick, Reporting)
            .when(work_done)
            .then(send_report),
        Rule::new(Investigating, TriggerPattern::Tick, Investigating).then(perform_work),
        Rule::new(
            Reporting,
            TriggerPattern::Performative(Performative::Confirm),
            Completed,
        )
        .when(confirms_mission)
        .then(close_mission),
    ]);
    TransitionTable::new("field", FieldState::ALL.to_vec(), Idle, vec![Completed], rules)
}

pub fn goals() -> Vec<Goal> {
    vec![
        Goal::new(
            "reach_site",
            "Travel to the assigned location",
            [AgentState::Field(FieldState::Investigating)],
        ),
        Goal::new(
            "investigate_site",
            "Survey the assigned location",
            [AgentState::Field(FieldState::Reporting)],
        ),
        Goal::new(
            "report_findings",
            "Have the findings acknowledged",
            [AgentState::Field(FieldState::Completed)],
        ),
    ]
}

fn message(trigger: &Trigger) -> Option<&AclMessage> {
    match trigger {
        Trigger::Message(message) => Some(message),
        _ => None,
    }
}

fn parameter<'a>(message: &'a AclMessage, key: &str) -> Option<&'a Value> {
    message.content.get("parameters").and_then(|p| p.get(key))
}

fn requested_location(message: &AclMessage) -> Option<Location> {
    let value = parameter(message, "location")?;
    serde_json::from_value::<Location>(value.clone())
        .ok()
        .filter(Location::is_finite)
}

fn is_investigation(_: &AgentContext, trigger: &Trigger) -> bool {
    message(trigger).is_some_and(|m| {
        m.content_str("action") == Some(INVESTIGATE_ACTION) && requested_location(m).is_some()
    })
}

fn is_return(_: &AgentContext, trigger: &Trigger) -> bool {
    message(trigger).is_some_and(|m| m.content_str("action") == Some(RETURN_ACTION))
}

fn is_assist(_: &AgentContext, trigger: &Trigger) -> bool {
    message(trigger).is_some_and(|m| {
        m.content_str("action") == Some(ASSIST_ACTION) && requested_location(m).is_some()
    })
}

fn mission_conversation(ctx: &AgentContext) -> Option<&ConversationId> {
    ctx.mission
        .as_ref()
        .and_then(|m| m.conversation.as_ref())
        .map(|(id, _)| id)
}

fn confirms_mission(ctx: &AgentContext, trigger: &Trigger) -> bool {
    message(trigger).is_some_and(|m| Some(&m.conversation_id) == mission_conversation(ctx))
}

fn closes_mission(ctx: &AgentContext, trigger: &Trigger) -> bool {
    matches!(trigger, Trigger::ConversationClosed(id) if Some(id) == mission_conversation(ctx))
}

/// Arrived on a return or assist errand, which needs no survey.
fn errand_done(ctx: &AgentContext, trigger: &Trigger) -> bool {
    let errand = ctx.mission.as_ref().is_some_and(|m| {
        matches!(m.action.as_deref(), Some(RETURN_ACTION | ASSIST_ACTION))
    });
    errand && at_target(ctx, trigger)
}

fn requested_mission(request: &AclMessage, action: &str, location: Location) -> Mission {
    let text = |key: &str| parameter(request, key).and_then(Value::as_str).map(str::to_string);
    Mission {
        origin: request.message_id.clone(),
        location,
        victims: 0,
        severity: 0.0,
        needs_evacuation: false,
        work_done: false,
        action: Some(action.to_string()),
        mission_type: text("mission_type"),
        priority: text("priority"),
        conversation: Some((request.conversation_id.clone(), request.sender.clone())),
    }
}

fn accept_mission(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(request) = message(trigger) else {
        return Vec::new();
    };
    let Some(location) = requested_location(request) else {
        return Vec::new();
    };

    info!(
        "🔍 {} accepted investigation of {} for {}",
        ctx.agent_id, location, request.sender
    );
    ctx.mission = Some(requested_mission(request, INVESTIGATE_ACTION, location));

    ctx.reply(
        request,
        Performative::Agree,
        content(json!({ "action": INVESTIGATE_ACTION, "location": location })),
    )
}

fn accept_return(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(request) = message(trigger) else {
        return Vec::new();
    };
    info!("🏠 {} returning to base {}", ctx.agent_id, ctx.base);
    ctx.mission = Some(requested_mission(request, RETURN_ACTION, ctx.base));
    ctx.reply(
        request,
        Performative::Agree,
        content(json!({ "action": RETURN_ACTION })),
    )
}

fn accept_assist(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(request) = message(trigger) else {
        return Vec::new();
    };
    let Some(location) = requested_location(request) else {
        return Vec::new();
    };
    let target_agent = parameter(request, "agent_id").cloned().unwrap_or(Value::Null);

    info!(
        "🤝 {} moving to assist {} at {}",
        ctx.agent_id, target_agent, location
    );
    ctx.mission = Some(requested_mission(request, ASSIST_ACTION, location));
    ctx.reply(
        request,
        Performative::Agree,
        content(json!({ "action": ASSIST_ACTION, "target_agent": target_agent })),
    )
}

fn refuse_request(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(request) = message(trigger) else {
        return Vec::new();
    };
    let reason = match request.content_str("action") {
        Some(INVESTIGATE_ACTION | ASSIST_ACTION) => "Invalid request format".to_string(),
        Some(action) => format!("Unknown action: {}", action),
        None => "Missing action".to_string(),
    };
    warn!("{} refusing {}: {}", ctx.agent_id, request.conversation_id, reason);
    ctx.reply(request, Performative::Refuse, content(json!({ "reason": reason })))
}

fn refuse_busy(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(request) = message(trigger) else {
        return Vec::new();
    };
    ctx.reply(
        request,
        Performative::Refuse,
        content(json!({ "reason": "Already on active mission" })),
    )
}

fn answer_status(ctx: &mut AgentContext, trigger: &Trigger) -> Vec<Effect> {
    let Some(query) = message(trigger) else {
        return Vec::new();
    };
    let body = json!({
        "type": "status_update",
        "status": ctx.state_label,
        "location": ctx.position,
        "target": ctx.target(),
    });
    ctx.reply(query, Performative::Inform, content(body))
}

fn send_report(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    let Some(mission) = ctx.mission.as_ref() else {
        return Vec::new();
    };
    let Some((conversation, requester)) = mission.conversation.clone() else {
        return Vec::new();
    };
    let discovery = format!(
        "{} survey completed at {}",
        mission.mission_type.as_deref().unwrap_or("site"),
        mission.location
    );
    let severity = match mission.priority.as_deref() {
        Some("critical") => "critical",
        _ => "normal",
    };
    let body = json!({
        "type": "discovery",
        "discovery": discovery,
        "location": mission.location,
        "severity": severity,
    });

    info!("📋 {} reporting: {}", ctx.agent_id, discovery);
    ctx.discoveries.push(discovery);
    ctx.send(Performative::Inform, &requester, content(body), &conversation)
}

fn close_mission(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(mission) = ctx.mission.take() {
        info!("🏁 {} mission {} confirmed", ctx.agent_id, mission.origin);
    }
    Vec::new()
}

fn finish_errand(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    let Some(mission) = ctx.mission.take() else {
        return Vec::new();
    };
    let Some((conversation, requester)) = mission.conversation else {
        return Vec::new();
    };
    let action = mission.action.unwrap_or_default();
    let result = match action.as_str() {
        RETURN_ACTION => "Returned to base".to_string(),
        _ => format!("Arrived at {}", mission.location),
    };

    info!("🏁 {} finished {}: {}", ctx.agent_id, action, result);
    let body = json!({
        "type": "mission_complete",
        "action": action,
        "result": result,
        "location": ctx.position,
    });
    ctx.send(Performative::Inform, &requester, content(body), &conversation)
}

fn abandon_mission(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(mission) = ctx.mission.take() {
        warn!(
            "{} abandoned mission {}: its conversation was closed",
            ctx.agent_id, mission.origin
        );
    }
    Vec::new()
}

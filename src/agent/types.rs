use super::{AgentContext, FieldState, MedicalState, RescueState};
use crate::{
    acl::{AclMessage, ConversationId, Performative},
    event::{Event, EventKind},
    fsm,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};
use tracing::info;

/// Anything an agent can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Event(Event),
    Message(AclMessage),
    /// A conversation the agent takes part in was closed by timeout or cancel.
    ConversationClosed(ConversationId),
    /// Scheduler heartbeat, delivered once per agent per tick.
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerPattern {
    Events(&'static [EventKind]),
    Performative(Performative),
    ConversationClosed,
    Tick,
}

impl fsm::Trigger for Trigger {
    type Pattern = TriggerPattern;

    fn matches(&self, pattern: &TriggerPattern) -> bool {
        match (self, pattern) {
            (Trigger::Event(event), TriggerPattern::Events(kinds)) => kinds.contains(&event.kind()),
            (Trigger::Message(message), TriggerPattern::Performative(p)) => {
                message.performative == *p
            }
            (Trigger::ConversationClosed(_), TriggerPattern::ConversationClosed) => true,
            (Trigger::Tick, TriggerPattern::Tick) => true,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Trigger::Event(event) => format!("event {} [{}]", event.kind(), event.id()),
            Trigger::Message(message) => format!(
                "{} from {} (conversation {})",
                message.performative, message.sender, message.conversation_id
            ),
            Trigger::ConversationClosed(id) => format!("conversation {} closed", id),
            Trigger::Tick => "tick".to_string(),
        }
    }
}

/// Output of a side effect, routed by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(AclMessage),
    Raise(Event),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Rescue,
    Medical,
    Field,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rescue => "rescue",
            Self::Medical => "medical",
            Self::Field => "field",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific state, one variant per agent kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum AgentState {
    Rescue(RescueState),
    Medical(MedicalState),
    Field(FieldState),
}

impl AgentState {
    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Rescue(_) => AgentKind::Rescue,
            Self::Medical(_) => AgentKind::Medical,
            Self::Field(_) => AgentKind::Field,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::Rescue(RescueState::Idle)
                | Self::Medical(MedicalState::Idle)
                | Self::Field(FieldState::Idle)
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            Self::Rescue(RescueState::Completed)
                | Self::Medical(MedicalState::Completed)
                | Self::Field(FieldState::Completed)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rescue(s) => s.fmt(f),
            Self::Medical(s) => s.fmt(f),
            Self::Field(s) => s.fmt(f),
        }
    }
}

/// An objective that is reached once the agent enters one of its states.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: String,
    pub description: String,
    completes_in: Vec<AgentState>,
}

impl Goal {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        completes_in: impl IntoIterator<Item = AgentState>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            completes_in: completes_in.into_iter().collect(),
        }
    }

    pub fn is_reached(&self, state: AgentState) -> bool {
        self.completes_in.contains(&state)
    }
}

/// One autonomous responder. State only changes through [`super::Behaviors::step`].
#[derive(Debug, Clone)]
pub struct Agent {
    id: String,
    name: String,
    pub(super) state: AgentState,
    pub(super) context: AgentContext,
    goals: VecDeque<Goal>,
    completed_goals: Vec<Goal>,
    pending: VecDeque<Trigger>,
}

impl Agent {
    pub(super) fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        state: AgentState,
        context: AgentContext,
        goals: Vec<Goal>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state,
            context,
            goals: goals.into(),
            completed_goals: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AgentKind {
        self.state.kind()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn set_clock(&mut self, now: DateTime<Utc>) {
        self.context.clock = now;
    }

    pub fn set_ontology(&mut self, ontology: impl Into<String>) {
        self.context.ontology = ontology.into();
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter()
    }

    pub fn completed_goals(&self) -> &[Goal] {
        &self.completed_goals
    }

    pub fn enqueue(&mut self, trigger: Trigger) {
        self.pending.push_back(trigger);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Hand over everything queued so far, leaving the queue empty.
    pub fn take_pending(&mut self) -> VecDeque<Trigger> {
        std::mem::take(&mut self.pending)
    }

    /// Pop leading goals satisfied by the current state.
    pub(super) fn settle_goals(&mut self) {
        while let Some(goal) = self.goals.front() {
            if !goal.is_reached(self.state) {
                break;
            }
            if let Some(goal) = self.goals.pop_front() {
                info!("✅ Agent {} completed goal '{}'", self.id, goal.id);
                self.completed_goals.push(goal);
            }
        }
    }
}

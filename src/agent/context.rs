use super::{Effect, Trigger};
use crate::{
    acl::{AclMessage, Content, ConversationId, DEFAULT_ONTOLOGY, Performative},
    event::{Event, Location},
};
use chrono::{DateTime, Utc};
use tracing::warn;

/// The job an agent is currently working on.
#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    /// Event id or request message id that started the mission.
    pub origin: String,
    pub location: Location,
    pub victims: u32,
    pub severity: f64,
    pub needs_evacuation: bool,
    pub work_done: bool,
    /// Requested action for message-driven missions.
    pub action: Option<String>,
    pub mission_type: Option<String>,
    pub priority: Option<String>,
    /// Conversation and requester for message-driven missions.
    pub conversation: Option<(ConversationId, String)>,
}

impl Mission {
    pub fn from_event(event: &Event, victims: u32) -> Self {
        Self {
            origin: event.id().to_string(),
            location: event.location(),
            victims,
            severity: event.severity(),
            needs_evacuation: event.flag("needs_evacuation").unwrap_or(false),
            work_done: false,
            action: None,
            mission_type: Some(event.kind().to_string()),
            priority: None,
            conversation: None,
        }
    }
}

/// Agent-owned working data that guards read and side effects update.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    pub agent_id: String,
    pub position: Location,
    pub base: Location,
    pub mission: Option<Mission>,
    pub rescued_total: u32,
    pub patients_treated: u32,
    pub supplies: u32,
    pub discoveries: Vec<String>,
    pub ontology: String,
    /// Simulation time of the trigger being handled.
    pub clock: DateTime<Utc>,
    /// State label at the moment the current trigger arrived.
    pub state_label: String,
    sequence: u64,
}

impl AgentContext {
    pub fn new(agent_id: impl Into<String>, base: Location) -> Self {
        Self {
            agent_id: agent_id.into(),
            position: base,
            base,
            mission: None,
            rescued_total: 0,
            patients_treated: 0,
            supplies: 100,
            discoveries: Vec::new(),
            ontology: DEFAULT_ONTOLOGY.to_string(),
            clock: DateTime::<Utc>::UNIX_EPOCH,
            state_label: String::new(),
            sequence: 0,
        }
    }

    pub fn target(&self) -> Option<Location> {
        self.mission.as_ref().map(|m| m.location)
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn next_message_id(&mut self) -> String {
        let seq = self.next_sequence();
        format!("{}-M{:04}", self.agent_id, seq)
    }

    /// Stamp a freshly built message with this agent's id sequence and clock.
    fn stamp(&mut self, built: crate::Result<AclMessage>) -> Vec<Effect> {
        match built {
            Ok(message) => {
                let id = self.next_message_id();
                vec![Effect::Send(message.with_id(id).at(self.clock))]
            }
            Err(e) => {
                warn!("Agent {} dropped outgoing message: {}", self.agent_id, e);
                Vec::new()
            }
        }
    }

    pub fn send(
        &mut self,
        performative: Performative,
        receiver: &str,
        content: Content,
        conversation: &ConversationId,
    ) -> Vec<Effect> {
        let built = AclMessage::new(
            performative,
            self.agent_id.clone(),
            receiver,
            content,
            conversation.clone(),
            self.ontology.clone(),
        );
        self.stamp(built)
    }

    pub fn reply(
        &mut self,
        to: &AclMessage,
        performative: Performative,
        content: Content,
    ) -> Vec<Effect> {
        let built = to.reply(performative, content);
        self.stamp(built)
    }
}

// Guards and effects shared by every agent kind.

pub(super) fn at_target(ctx: &AgentContext, _: &Trigger) -> bool {
    ctx.target() == Some(ctx.position)
}

pub(super) fn at_base(ctx: &AgentContext, _: &Trigger) -> bool {
    ctx.position == ctx.base
}

pub(super) fn work_done(ctx: &AgentContext, _: &Trigger) -> bool {
    ctx.mission.as_ref().is_some_and(|m| m.work_done)
}

pub(super) fn move_to_target(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(target) = ctx.target() {
        ctx.position = ctx.position.step_toward(target);
    }
    Vec::new()
}

pub(super) fn move_to_base(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    ctx.position = ctx.position.step_toward(ctx.base);
    Vec::new()
}

pub(super) fn perform_work(ctx: &mut AgentContext, _: &Trigger) -> Vec<Effect> {
    if let Some(mission) = ctx.mission.as_mut() {
        mission.work_done = true;
    }
    Vec::new()
}

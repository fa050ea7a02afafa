use crate::{
    acl::{AclMessage, Content, ConversationId, Performative, content},
    agent::field::{ASSIST_ACTION, INVESTIGATE_ACTION, RETURN_ACTION},
    config::MissionOrder,
    event::Location,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Requested,
    Agreed,
    Reported,
}

/// A field agent's current mission as the coordinator sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub conversation_id: ConversationId,
    pub location: Location,
    pub mission_type: String,
    pub status: AssignmentStatus,
    /// Last status the agent reported in answer to a query.
    pub last_status: Option<String>,
}

/// Dispatches field agents and acknowledges their reports.
#[derive(Debug, Clone)]
pub struct Coordinator {
    id: String,
    name: String,
    ontology: String,
    field_agents: Vec<String>,
    active: BTreeMap<String, Assignment>,
    /// Agents whose investigation was confirmed; they never take new work.
    retired: BTreeSet<String>,
    completed: Vec<Assignment>,
    discoveries: Vec<Content>,
    inbox: VecDeque<AclMessage>,
    conversations: u64,
    messages: u64,
}

impl Coordinator {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        ontology: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ontology: ontology.into(),
            field_agents: Vec::new(),
            active: BTreeMap::new(),
            retired: BTreeSet::new(),
            completed: Vec::new(),
            discoveries: Vec::new(),
            inbox: VecDeque::new(),
            conversations: 0,
            messages: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_field_agent(&mut self, agent_id: impl Into<String>) {
        let agent_id = agent_id.into();
        if !self.field_agents.contains(&agent_id) {
            debug!("Coordinator {} registered field agent {}", self.id, agent_id);
            self.field_agents.push(agent_id);
        }
    }

    pub fn field_agents(&self) -> &[String] {
        &self.field_agents
    }

    pub fn assignment(&self, agent_id: &str) -> Option<&Assignment> {
        self.active.get(agent_id)
    }

    pub fn active_missions(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.active.iter().map(|(agent, a)| (agent.as_str(), a))
    }

    /// Registered, not on a mission and not retired.
    pub fn is_available(&self, agent_id: &str) -> bool {
        self.field_agents.iter().any(|a| a == agent_id)
            && !self.active.contains_key(agent_id)
            && !self.retired.contains(agent_id)
    }

    pub fn is_retired(&self, agent_id: &str) -> bool {
        self.retired.contains(agent_id)
    }

    pub fn completed_missions(&self) -> &[Assignment] {
        &self.completed
    }

    pub fn discoveries(&self) -> &[Content] {
        &self.discoveries
    }

    pub fn deliver(&mut self, message: AclMessage) {
        self.inbox.push_back(message);
    }

    pub fn take_inbox(&mut self) -> VecDeque<AclMessage> {
        std::mem::take(&mut self.inbox)
    }

    pub fn has_mail(&self) -> bool {
        !self.inbox.is_empty()
    }

    fn next_conversation(&mut self) -> ConversationId {
        self.conversations += 1;
        ConversationId::new(format!("{}-{:04}", self.id, self.conversations))
    }

    fn next_message_id(&mut self) -> String {
        self.messages += 1;
        format!("{}-M{:04}", self.id, self.messages)
    }

    fn stamp(
        &mut self,
        built: crate::Result<AclMessage>,
        now: DateTime<Utc>,
    ) -> Option<AclMessage> {
        match built {
            Ok(message) => {
                let id = self.next_message_id();
                Some(message.with_id(id).at(now))
            }
            Err(e) => {
                warn!("Coordinator {} dropped outgoing message: {}", self.id, e);
                None
            }
        }
    }

    /// Open a REQUEST conversation with one agent and track it as active.
    fn assign(
        &mut self,
        agent_id: &str,
        action: &str,
        parameters: Value,
        location: Location,
        mission_type: &str,
        now: DateTime<Utc>,
    ) -> Option<AclMessage> {
        let conversation = self.next_conversation();
        let built = AclMessage::new(
            Performative::Request,
            self.id.clone(),
            agent_id,
            content(json!({ "action": action, "parameters": parameters })),
            conversation.clone(),
            self.ontology.clone(),
        );
        let request = self.stamp(built, now)?;
        self.active.insert(
            agent_id.to_string(),
            Assignment {
                conversation_id: conversation,
                location,
                mission_type: mission_type.to_string(),
                status: AssignmentStatus::Requested,
                last_status: None,
            },
        );
        Some(request)
    }

    /// REQUEST up to `required_agents` available field agents, in registration order.
    pub fn dispatch(&mut self, order: &MissionOrder, now: DateTime<Utc>) -> Vec<AclMessage> {
        let available: Vec<String> = self
            .field_agents
            .iter()
            .filter(|agent| self.is_available(agent))
            .take(order.required_agents)
            .cloned()
            .collect();
        if available.is_empty() {
            warn!(
                "No available field agents for {} at {} ({} busy, {} retired)",
                order.mission_type,
                order.location,
                self.active.len(),
                self.retired.len()
            );
            return Vec::new();
        }

        let mut requests = Vec::new();
        for agent_id in available {
            let parameters = json!({
                "location": order.location,
                "mission_type": order.mission_type,
                "priority": order.priority,
            });
            let assigned = self.assign(
                &agent_id,
                INVESTIGATE_ACTION,
                parameters,
                order.location,
                &order.mission_type,
                now,
            );
            if let Some(request) = assigned {
                info!(
                    "📡 Coordinator {} dispatched {} to investigate {}",
                    self.id, agent_id, order.location
                );
                requests.push(request);
            }
        }
        requests
    }

    /// REQUEST an available agent to go back to `base`.
    pub fn recall(
        &mut self,
        agent_id: &str,
        base: Location,
        now: DateTime<Utc>,
    ) -> Option<AclMessage> {
        if !self.is_available(agent_id) {
            warn!("Coordinator {} cannot recall {}: not available", self.id, agent_id);
            return None;
        }
        info!("📡 Coordinator {} recalled {} to base", self.id, agent_id);
        let parameters = json!({ "location": base });
        self.assign(agent_id, RETURN_ACTION, parameters, base, RETURN_ACTION, now)
    }

    /// REQUEST an available agent to join `assisted` at `location`.
    pub fn request_assist(
        &mut self,
        agent_id: &str,
        assisted: &str,
        location: Location,
        now: DateTime<Utc>,
    ) -> Option<AclMessage> {
        if !self.is_available(agent_id) {
            warn!("Coordinator {} cannot send {} to assist: not available", self.id, agent_id);
            return None;
        }
        info!(
            "📡 Coordinator {} sent {} to assist {} at {}",
            self.id, agent_id, assisted, location
        );
        let parameters = json!({ "agent_id": assisted, "location": location });
        self.assign(agent_id, ASSIST_ACTION, parameters, location, ASSIST_ACTION, now)
    }

    /// QUERY-IF inside the agent's mission conversation.
    pub fn request_status(&mut self, agent_id: &str, now: DateTime<Utc>) -> Option<AclMessage> {
        let Some(conversation) = self.active.get(agent_id).map(|a| a.conversation_id.clone()) else {
            debug!("No active mission for {}, status query skipped", agent_id);
            return None;
        };
        let built = AclMessage::new(
            Performative::QueryIf,
            self.id.clone(),
            agent_id,
            content(json!({ "query": "mission_status", "agent": agent_id })),
            conversation,
            self.ontology.clone(),
        );
        self.stamp(built, now)
    }

    /// React to one received message; returns replies to send.
    pub fn handle(&mut self, message: &AclMessage, now: DateTime<Utc>) -> Vec<AclMessage> {
        let sender = message.sender.as_str();
        match message.performative {
            Performative::Agree => {
                if let Some(assignment) = self.active.get_mut(sender) {
                    assignment.status = AssignmentStatus::Agreed;
                }
                Vec::new()
            }
            Performative::Refuse => {
                let reason = message.content_str("reason").unwrap_or("no reason given");
                warn!("Agent {} refused request: {}", sender, reason);
                let refused = self
                    .active
                    .get(sender)
                    .is_some_and(|a| a.conversation_id == message.conversation_id);
                if refused {
                    self.active.remove(sender);
                }
                Vec::new()
            }
            Performative::Inform => match message.content_str("type") {
                Some("discovery") => self.acknowledge(message, now),
                Some("mission_complete") => self.release(message, now),
                Some("emergency") => self.acknowledge_emergency(message, now),
                Some("status_update") => {
                    if let Some(assignment) = self.active.get_mut(sender) {
                        assignment.last_status = message.content_str("status").map(str::to_string);
                        debug!("Updated {} status: {:?}", sender, assignment.last_status);
                    }
                    Vec::new()
                }
                other => {
                    debug!("Ignoring INFORM from {} of type {:?}", sender, other);
                    Vec::new()
                }
            },
            other => {
                debug!("Coordinator ignores {} from {}", other, sender);
                Vec::new()
            }
        }
    }

    fn acknowledge(&mut self, report: &AclMessage, now: DateTime<Utc>) -> Vec<AclMessage> {
        let discovery = report.content.get("discovery").cloned().unwrap_or(Value::Null);
        info!(
            "📋 Coordinator {} received discovery from {}: {}",
            self.id, report.sender, discovery
        );
        if report.content_str("severity") == Some("critical") {
            info!("Critical discovery from {}, additional support may be needed", report.sender);
        }
        self.discoveries.push(report.content.clone());

        let built = report.reply(
            Performative::Confirm,
            content(json!({ "acknowledged": true, "discovery": discovery })),
        );
        let Some(confirm) = self.stamp(built, now) else {
            return Vec::new();
        };
        if let Some(mut assignment) = self.active.remove(&report.sender) {
            assignment.status = AssignmentStatus::Reported;
            self.completed.push(assignment);
        }
        // A confirmed investigation leaves the agent in its terminal state.
        self.retired.insert(report.sender.clone());
        vec![confirm]
    }

    /// A finished errand frees the agent for the next dispatch.
    fn release(&mut self, report: &AclMessage, now: DateTime<Utc>) -> Vec<AclMessage> {
        let result = report.content_str("result").unwrap_or("no result given");
        info!("🏁 Agent {} completed mission: {}", report.sender, result);

        let built = report.reply(Performative::Confirm, content(json!({ "acknowledged": true })));
        let Some(confirm) = self.stamp(built, now) else {
            return Vec::new();
        };
        let finished = self
            .active
            .get(&report.sender)
            .is_some_and(|a| a.conversation_id == report.conversation_id);
        if finished {
            if let Some(mut assignment) = self.active.remove(&report.sender) {
                assignment.status = AssignmentStatus::Reported;
                self.completed.push(assignment);
            }
        }
        if self.active.is_empty() {
            info!("All missions of coordinator {} completed", self.id);
        }
        vec![confirm]
    }

    fn acknowledge_emergency(
        &mut self,
        report: &AclMessage,
        now: DateTime<Utc>,
    ) -> Vec<AclMessage> {
        let emergency = report.content.get("emergency").cloned().unwrap_or(Value::Null);
        warn!("🚨 EMERGENCY reported by {}: {}", report.sender, emergency);
        let built = report.reply(
            Performative::Confirm,
            content(json!({ "emergency_acknowledged": true, "support_dispatched": true })),
        );
        self.stamp(built, now).into_iter().collect()
    }

    /// Drop the assignment bound to a conversation that was closed elsewhere.
    pub fn forget(&mut self, conversation_id: &ConversationId) {
        self.active.retain(|agent, assignment| {
            let keep = &assignment.conversation_id != conversation_id;
            if !keep {
                info!("Coordinator released {} after {} closed", agent, conversation_id);
            }
            keep
        });
    }
}

//! Step-driven scheduler that owns every agent and conversation.
//!
//! One tick:
//! 1. missions scheduled for this tick are dispatched,
//! 2. each agent drains the triggers queued before its queue was
//!    snapshotted, in FIFO order, then receives a `Tick`,
//! 3. the coordinator handles its mail,
//! 4. stale conversations are closed and their agents told so.
//!
//! Effects produced during a tick are routed immediately but only seen by
//! agents on the next tick.

mod clock;
pub mod coordinator;

pub use clock::SimClock;
pub use coordinator::{Assignment, AssignmentStatus, Coordinator};

use crate::{
    Error, Result,
    acl::{AclMessage, ConversationId},
    agent::{Agent, AgentKind, Behaviors, Effect, Trigger},
    config::{Config, MissionOrder, SimulationConfig},
    conversation::{ConversationRegistry, ConversationState},
    event::{Event, Location, SensorReport, derive_events},
    fsm::{StepOutcome, Trigger as _},
    journal::{Record, RecordSink, TransitionRecord},
};
use serde::Serialize;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, info, warn};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub triggers: usize,
    pub transitions: usize,
    pub messages: usize,
    pub events: usize,
    pub rejections: usize,
    pub timeouts: usize,
}

pub struct Simulation {
    behaviors: Behaviors,
    agents: Vec<Agent>,
    coordinator: Option<Coordinator>,
    conversations: ConversationRegistry,
    sink: Arc<dyn RecordSink>,
    clock: SimClock,
    timeout_ticks: u64,
    ontology: String,
    schedule: VecDeque<MissionOrder>,
}

impl Simulation {
    pub fn new(
        behaviors: Behaviors,
        settings: &SimulationConfig,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            behaviors,
            agents: Vec::new(),
            coordinator: None,
            conversations: ConversationRegistry::new(),
            sink,
            clock: SimClock::new(settings.start_time, settings.tick_seconds),
            timeout_ticks: settings.conversation_timeout_ticks,
            ontology: settings.ontology.clone(),
            schedule: VecDeque::new(),
        }
    }

    /// Build agents, coordinator and mission schedule from a validated config.
    pub fn from_config(config: &Config, sink: Arc<dyn RecordSink>) -> Result<Self> {
        config.validate()?;
        let mut simulation = Self::new(Behaviors::load()?, &config.simulation, sink);

        if let Some(coordinator) = &config.coordinator {
            simulation.set_coordinator(Coordinator::new(
                coordinator.id.clone(),
                coordinator.name.clone(),
                config.simulation.ontology.clone(),
            ))?;
        }
        for agent in &config.agents {
            let name = if agent.name.is_empty() {
                agent.id.clone()
            } else {
                agent.name.clone()
            };
            simulation.add_agent(agent.id.clone(), name, agent.kind, agent.position)?;
        }
        for order in &config.scenario.missions {
            simulation.schedule(order.clone());
        }

        info!(
            "Simulation ready: {} agents, {} scheduled missions",
            simulation.agents.len(),
            simulation.schedule.len()
        );
        Ok(simulation)
    }

    fn knows(&self, id: &str) -> bool {
        self.coordinator.as_ref().is_some_and(|c| c.id() == id)
            || self.agents.iter().any(|a| a.id() == id)
    }

    pub fn add_agent(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        kind: AgentKind,
        base: Location,
    ) -> Result<()> {
        let id = id.into();
        if self.knows(&id) {
            return Err(Error::config(format!("duplicate agent id '{}'", id)));
        }
        let mut agent = self.behaviors.spawn(id.clone(), name, kind, base);
        agent.set_ontology(self.ontology.clone());
        agent.set_clock(self.clock.now());
        if kind == AgentKind::Field {
            if let Some(coordinator) = self.coordinator.as_mut() {
                coordinator.register_field_agent(id.clone());
            }
        }
        info!("Agent {} ({}) joined at {}", id, kind, base);
        self.agents.push(agent);
        Ok(())
    }

    pub fn set_coordinator(&mut self, mut coordinator: Coordinator) -> Result<()> {
        if self.agents.iter().any(|a| a.id() == coordinator.id()) {
            return Err(Error::config(format!(
                "duplicate agent id '{}'",
                coordinator.id()
            )));
        }
        for agent in self.agents.iter().filter(|a| a.kind() == AgentKind::Field) {
            coordinator.register_field_agent(agent.id());
        }
        self.coordinator = Some(coordinator);
        Ok(())
    }

    /// Queue a dispatch; orders stay sorted by tick, ties keep insertion order.
    pub fn schedule(&mut self, order: MissionOrder) {
        let position = self
            .schedule
            .iter()
            .position(|o| o.at_tick > order.at_tick)
            .unwrap_or(self.schedule.len());
        self.schedule.insert(position, order);
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }

    pub fn conversations(&self) -> &ConversationRegistry {
        &self.conversations
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    async fn record(&self, record: Record) -> Result<()> {
        self.sink.write(record).await
    }

    async fn reject(
        &self,
        subject: String,
        error: &Error,
        summary: &mut TickSummary,
    ) -> Result<()> {
        warn!("Rejected {}: {}", subject, error);
        summary.rejections += 1;
        self.record(Record::Rejection {
            timestamp: self.clock.now(),
            subject,
            reason: error.to_string(),
        })
        .await
    }

    /// Derive events from a report and hand them to every agent.
    ///
    /// An invalid report is journaled as a rejection and returned as the error.
    pub async fn ingest(&mut self, report: &SensorReport) -> Result<Vec<Event>> {
        let events = match derive_events(report) {
            Ok(events) => events,
            Err(e) if e.is_recoverable() => {
                self.reject(report.sensor_id.clone(), &e, &mut TickSummary::default())
                    .await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        for event in &events {
            info!("⚡ Event {}", event);
            self.record(Record::Event {
                timestamp: self.clock.now(),
                event: event.clone(),
            })
            .await?;
            self.broadcast(event, None);
        }
        Ok(events)
    }

    fn broadcast(&mut self, event: &Event, except: Option<&str>) {
        for agent in self
            .agents
            .iter_mut()
            .filter(|a| Some(a.id()) != except)
        {
            agent.enqueue(Trigger::Event(event.clone()));
        }
    }

    /// Validate a message against its conversation, journal it and queue it
    /// for the receiver. Returns false when it was rejected.
    async fn route_message(
        &mut self,
        message: AclMessage,
        summary: &mut TickSummary,
    ) -> Result<bool> {
        if !self.knows(&message.receiver) {
            let error = Error::AgentNotFound {
                agent_id: message.receiver.clone(),
            };
            self.reject(message.conversation_id.to_string(), &error, summary)
                .await?;
            return Ok(false);
        }

        let before = self.conversations.state(&message.conversation_id);
        let state = match self.conversations.apply(&message) {
            Ok(state) => state,
            Err(e) if e.is_recoverable() => {
                self.reject(message.conversation_id.to_string(), &e, summary)
                    .await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        debug!(
            "Routing {} {} -> {} ({})",
            message.performative, message.sender, message.receiver, message.conversation_id
        );
        summary.messages += 1;
        self.record(Record::Message(message.clone())).await?;
        if state == ConversationState::Closed && before != Some(ConversationState::Closed) {
            self.record(Record::ConversationClosed {
                timestamp: self.clock.now(),
                conversation_id: message.conversation_id.clone(),
                reason: format!("closed by {}", message.performative),
            })
            .await?;
        }

        match self.coordinator.as_mut() {
            Some(coordinator) if coordinator.id() == message.receiver => {
                coordinator.deliver(message);
            }
            _ => {
                if let Some(agent) = self.agents.iter_mut().find(|a| a.id() == message.receiver) {
                    agent.enqueue(Trigger::Message(message));
                }
            }
        }
        Ok(true)
    }

    /// Send a message from outside the simulation (tests, operators).
    pub async fn post(&mut self, message: AclMessage) -> Result<bool> {
        self.route_message(message, &mut TickSummary::default()).await
    }

    async fn dispatch_order(
        &mut self,
        order: &MissionOrder,
        summary: &mut TickSummary,
    ) -> Result<usize> {
        let now = self.clock.now();
        let requests = match self.coordinator.as_mut() {
            Some(coordinator) => coordinator.dispatch(order, now),
            None => return Err(Error::config("mission dispatch needs a coordinator")),
        };
        let mut sent = 0;
        for request in requests {
            let conversation = request.conversation_id.clone();
            if self.route_message(request, summary).await? {
                sent += 1;
            } else if let Some(coordinator) = self.coordinator.as_mut() {
                coordinator.forget(&conversation);
            }
        }
        Ok(sent)
    }

    /// Ask the coordinator to dispatch field agents right away.
    pub async fn dispatch(&mut self, order: &MissionOrder) -> Result<usize> {
        self.dispatch_order(order, &mut TickSummary::default()).await
    }

    async fn send_request(&mut self, request: Option<AclMessage>) -> Result<bool> {
        let Some(request) = request else {
            return Ok(false);
        };
        let conversation = request.conversation_id.clone();
        let sent = self.post(request).await?;
        if !sent {
            if let Some(coordinator) = self.coordinator.as_mut() {
                coordinator.forget(&conversation);
            }
        }
        Ok(sent)
    }

    /// Have the coordinator send a field agent back to its base.
    pub async fn recall(&mut self, agent_id: &str) -> Result<bool> {
        let base = self
            .agent(agent_id)
            .map(|a| a.context().base)
            .ok_or_else(|| Error::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        let now = self.clock.now();
        let request = match self.coordinator.as_mut() {
            Some(coordinator) => coordinator.recall(agent_id, base, now),
            None => return Err(Error::config("recalls need a coordinator")),
        };
        self.send_request(request).await
    }

    /// Have the coordinator send a field agent to where `assisted` is now.
    pub async fn assist(&mut self, agent_id: &str, assisted: &str) -> Result<bool> {
        let location = self
            .agent(assisted)
            .map(|a| a.context().position)
            .ok_or_else(|| Error::AgentNotFound {
                agent_id: assisted.to_string(),
            })?;
        let now = self.clock.now();
        let request = match self.coordinator.as_mut() {
            Some(coordinator) => coordinator.request_assist(agent_id, assisted, location, now),
            None => return Err(Error::config("assist requests need a coordinator")),
        };
        self.send_request(request).await
    }

    /// Have the coordinator QUERY-IF a field agent about its mission.
    pub async fn query_status(&mut self, agent_id: &str) -> Result<bool> {
        let now = self.clock.now();
        let query = match self.coordinator.as_mut() {
            Some(coordinator) => coordinator.request_status(agent_id, now),
            None => return Err(Error::config("status queries need a coordinator")),
        };
        match query {
            Some(query) => self.post(query).await,
            None => Ok(false),
        }
    }

    async fn step_agent(
        &mut self,
        index: usize,
        trigger: &Trigger,
        summary: &mut TickSummary,
    ) -> Result<()> {
        let Some(agent) = self.agents.get_mut(index) else {
            return Ok(());
        };
        let outcome = self.behaviors.step(agent, trigger);
        let agent_id = agent.id().to_string();
        summary.triggers += 1;

        let effects = match outcome {
            StepOutcome::Transitioned {
                from, to, effects, ..
            } => {
                if from != to {
                    summary.transitions += 1;
                    self.record(Record::Transition(TransitionRecord {
                        timestamp: self.clock.now(),
                        agent_id: agent_id.clone(),
                        from,
                        to,
                        trigger: trigger.describe(),
                    }))
                    .await?;
                }
                effects
            }
            StepOutcome::Unmatched { state } => {
                if let Trigger::Message(message) = trigger {
                    debug!(
                        "{} in {} dropped {} from {}",
                        agent_id, state, message.performative, message.sender
                    );
                }
                Vec::new()
            }
        };

        for effect in effects {
            match effect {
                Effect::Send(message) => {
                    self.route_message(message, summary).await?;
                }
                Effect::Raise(event) => {
                    info!("⚡ {} raised {}", agent_id, event);
                    summary.events += 1;
                    self.record(Record::Event {
                        timestamp: self.clock.now(),
                        event: event.clone(),
                    })
                    .await?;
                    self.broadcast(&event, Some(&agent_id));
                }
            }
        }
        Ok(())
    }

    async fn expire_conversations(&mut self, summary: &mut TickSummary) -> Result<()> {
        let cutoff = self.clock.ago(self.timeout_ticks);
        for id in self.conversations.started_before(cutoff) {
            if !self.conversations.cancel(&id)? {
                continue;
            }
            warn!("⏱️ Conversation {} timed out", id);
            summary.timeouts += 1;
            self.close_record(&id, "timeout").await?;
            self.notify_closed(&id);
        }
        Ok(())
    }

    /// Release the coordinator's assignment and queue a close notice for
    /// every agent in the conversation.
    fn notify_closed(&mut self, id: &ConversationId) {
        if let Some(coordinator) = self.coordinator.as_mut() {
            coordinator.forget(id);
        }
        let Some(conversation) = self.conversations.get(id) else {
            return;
        };
        for agent in self
            .agents
            .iter_mut()
            .filter(|a| conversation.involves(a.id()))
        {
            agent.enqueue(Trigger::ConversationClosed(id.clone()));
        }
    }

    async fn close_record(&self, id: &ConversationId, reason: &str) -> Result<()> {
        self.record(Record::ConversationClosed {
            timestamp: self.clock.now(),
            conversation_id: id.clone(),
            reason: reason.to_string(),
        })
        .await
    }

    /// Force a conversation closed; messages already sent stay delivered.
    pub async fn cancel(&mut self, id: &ConversationId) -> Result<bool> {
        let cancelled = self.conversations.cancel(id)?;
        if cancelled {
            self.close_record(id, "cancelled").await?;
            self.notify_closed(id);
        }
        Ok(cancelled)
    }

    pub async fn tick(&mut self) -> Result<TickSummary> {
        let tick = self.clock.advance();
        let now = self.clock.now();
        let mut summary = TickSummary {
            tick,
            ..Default::default()
        };

        while self.schedule.front().is_some_and(|o| o.at_tick <= tick) {
            if let Some(order) = self.schedule.pop_front() {
                self.dispatch_order(&order, &mut summary).await?;
            }
        }

        let queued: Vec<VecDeque<Trigger>> = self
            .agents
            .iter_mut()
            .map(|agent| {
                agent.set_clock(now);
                agent.take_pending()
            })
            .collect();
        for (index, triggers) in queued.into_iter().enumerate() {
            for trigger in triggers.into_iter().chain(std::iter::once(Trigger::Tick)) {
                self.step_agent(index, &trigger, &mut summary).await?;
            }
        }

        let mail = self
            .coordinator
            .as_mut()
            .map(Coordinator::take_inbox)
            .unwrap_or_default();
        for message in mail {
            let replies = match self.coordinator.as_mut() {
                Some(coordinator) => coordinator.handle(&message, now),
                None => Vec::new(),
            };
            for reply in replies {
                self.route_message(reply, &mut summary).await?;
            }
        }

        self.expire_conversations(&mut summary).await?;
        debug!("Tick {} done: {:?}", tick, summary);
        Ok(summary)
    }

    /// Nothing left to do: no queued work, no open exchanges, every agent at rest.
    pub fn is_settled(&self) -> bool {
        self.schedule.is_empty()
            && self.conversations.open_count() == 0
            && !self.coordinator.as_ref().is_some_and(Coordinator::has_mail)
            && self.agents.iter().all(|a| {
                a.pending_len() == 0
                    && (a.state().is_idle() || self.behaviors.is_terminal(a.state()))
            })
    }

    /// Tick until settled or `max_ticks` is reached; returns the ticks run.
    pub async fn run(&mut self, max_ticks: u64) -> Result<Vec<TickSummary>> {
        let mut ticks = Vec::new();
        while (ticks.len() as u64) < max_ticks {
            if self.is_settled() {
                break;
            }
            ticks.push(self.tick().await?);
        }
        info!(
            "Simulation stopped after {} ticks (settled: {})",
            ticks.len(),
            self.is_settled()
        );
        Ok(ticks)
    }
}

use super::{
    Agent, AgentContext, AgentKind, AgentState, Effect, Trigger,
    field::{self, FieldTable},
    medical::{self, MedicalTable},
    rescue::{self, RescueTable},
};
use crate::{Result, event::Location, fsm::StepOutcome};
use tracing::info;

/// The transition table of every agent kind, built and validated once.
pub struct Behaviors {
    rescue: RescueTable,
    medical: MedicalTable,
    field: FieldTable,
}

impl Behaviors {
    pub fn load() -> Result<Self> {
        let behaviors = Self {
            rescue: rescue::table()?,
            medical: medical::table()?,
            field: field::table()?,
        };
        info!(
            "Loaded behaviors: rescue={} rules, medical={} rules, field={} rules",
            behaviors.rescue.rules().len(),
            behaviors.medical.rules().len(),
            behaviors.field.rules().len()
        );
        Ok(behaviors)
    }

    pub fn initial(&self, kind: AgentKind) -> AgentState {
        match kind {
            AgentKind::Rescue => AgentState::Rescue(self.rescue.initial()),
            AgentKind::Medical => AgentState::Medical(self.medical.initial()),
            AgentKind::Field => AgentState::Field(self.field.initial()),
        }
    }

    pub fn is_terminal(&self, state: AgentState) -> bool {
        match state {
            AgentState::Rescue(s) => self.rescue.is_terminal(s),
            AgentState::Medical(s) => self.medical.is_terminal(s),
            AgentState::Field(s) => self.field.is_terminal(s),
        }
    }

    /// A fresh agent of `kind` in its initial state with the kind's goals.
    pub fn spawn(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        kind: AgentKind,
        base: Location,
    ) -> Agent {
        let id = id.into();
        let goals = match kind {
            AgentKind::Rescue => rescue::goals(),
            AgentKind::Medical => medical::goals(),
            AgentKind::Field => field::goals(),
        };
        let context = AgentContext::new(id.clone(), base);
        Agent::new(id, name, self.initial(kind), context, goals)
    }

    /// Deliver one trigger to an agent through its kind's table.
    pub fn step(&self, agent: &mut Agent, trigger: &Trigger) -> StepOutcome<AgentState, Effect> {
        agent.context.state_label = agent.state.to_string();
        let context = &mut agent.context;
        let outcome = match &mut agent.state {
            AgentState::Rescue(state) => self
                .rescue
                .step(state, context, trigger)
                .map_state(AgentState::Rescue),
            AgentState::Medical(state) => self
                .medical
                .step(state, context, trigger)
                .map_state(AgentState::Medical),
            AgentState::Field(state) => self
                .field
                .step(state, context, trigger)
                .map_state(AgentState::Field),
        };
        if outcome.changed_state() {
            agent.settle_goals();
        }
        outcome
    }
}

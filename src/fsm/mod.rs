//! Generic table-driven state machine.
//!
//! A [`TransitionTable`] is static configuration: a declared state set, an
//! initial state, the terminal states and an ordered list of rules. Stepping
//! never inspects anything kind-specific; agents supply their own state,
//! context, trigger and effect types.

use crate::{Error, Result};
use std::fmt;
use tracing::{debug, info};

/// Something that can drive a transition.
pub trait Trigger: fmt::Debug {
    type Pattern: fmt::Debug;

    fn matches(&self, pattern: &Self::Pattern) -> bool;

    /// Short description used in transition records.
    fn describe(&self) -> String;
}

pub type Guard<C, T> = fn(&C, &T) -> bool;
pub type SideEffect<C, T, E> = fn(&mut C, &T) -> Vec<E>;

pub struct TransitionRule<S, C, T: Trigger, E> {
    pub source: S,
    pub trigger: T::Pattern,
    pub guard: Option<Guard<C, T>>,
    pub destination: S,
    pub effect: Option<SideEffect<C, T, E>>,
}

impl<S, C, T: Trigger, E> TransitionRule<S, C, T, E> {
    pub fn new(source: S, trigger: T::Pattern, destination: S) -> Self {
        Self {
            source,
            trigger,
            guard: None,
            destination,
            effect: None,
        }
    }

    pub fn when(mut self, guard: Guard<C, T>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn then(mut self, effect: SideEffect<C, T, E>) -> Self {
        self.effect = Some(effect);
        self
    }
}

impl<S: fmt::Debug, C, T: Trigger, E> fmt::Debug for TransitionRule<S, C, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRule")
            .field("source", &self.source)
            .field("trigger", &self.trigger)
            .field("guarded", &self.guard.is_some())
            .field("destination", &self.destination)
            .finish()
    }
}

/// Result of delivering one trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<S, E> {
    Transitioned {
        from: S,
        to: S,
        rule: usize,
        effects: Vec<E>,
    },
    /// No rule matched; the trigger is dropped.
    Unmatched { state: S },
}

impl<S: Copy, E> StepOutcome<S, E> {
    pub fn current(&self) -> S {
        match self {
            Self::Transitioned { to, .. } => *to,
            Self::Unmatched { state } => *state,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }

    /// True when a rule fired and moved to a different state.
    pub fn changed_state(&self) -> bool
    where
        S: PartialEq,
    {
        matches!(self, Self::Transitioned { from, to, .. } if from != to)
    }

    pub fn into_effects(self) -> Vec<E> {
        match self {
            Self::Transitioned { effects, .. } => effects,
            Self::Unmatched { .. } => Vec::new(),
        }
    }

    pub fn map_state<R>(self, f: impl Fn(S) -> R) -> StepOutcome<R, E> {
        match self {
            Self::Transitioned {
                from,
                to,
                rule,
                effects,
            } => StepOutcome::Transitioned {
                from: f(from),
                to: f(to),
                rule,
                effects,
            },
            Self::Unmatched { state } => StepOutcome::Unmatched { state: f(state) },
        }
    }
}

pub struct TransitionTable<S, C, T: Trigger, E> {
    name: &'static str,
    states: Vec<S>,
    initial: S,
    terminal: Vec<S>,
    rules: Vec<TransitionRule<S, C, T, E>>,
}

impl<S, C, T, E> TransitionTable<S, C, T, E>
where
    S: Copy + PartialEq + fmt::Debug,
    T: Trigger,
{
    pub fn new(
        name: &'static str,
        states: Vec<S>,
        initial: S,
        terminal: Vec<S>,
        rules: Vec<TransitionRule<S, C, T, E>>,
    ) -> Result<Self> {
        if states.is_empty() {
            return Err(Error::invalid_table(name, "state set is empty"));
        }
        let declared = |s: &S| states.contains(s);
        if !declared(&initial) {
            return Err(Error::invalid_table(
                name,
                format!("initial state {:?} is not declared", initial),
            ));
        }
        if let Some(bad) = terminal.iter().find(|s| !declared(s)) {
            return Err(Error::invalid_table(
                name,
                format!("terminal state {:?} is not declared", bad),
            ));
        }
        for (index, rule) in rules.iter().enumerate() {
            for endpoint in [&rule.source, &rule.destination] {
                if !declared(endpoint) {
                    return Err(Error::invalid_table(
                        name,
                        format!("rule {} uses undeclared state {:?}", index, endpoint),
                    ));
                }
            }
            if terminal.contains(&rule.source) {
                return Err(Error::invalid_table(
                    name,
                    format!("rule {} leaves terminal state {:?}", index, rule.source),
                ));
            }
        }

        debug!(
            "Built transition table '{}' with {} states and {} rules",
            name,
            states.len(),
            rules.len()
        );
        Ok(Self {
            name,
            states,
            initial,
            terminal,
            rules,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn initial(&self) -> S {
        self.initial
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn rules(&self) -> &[TransitionRule<S, C, T, E>] {
        &self.rules
    }

    pub fn is_terminal(&self, state: S) -> bool {
        self.terminal.contains(&state)
    }

    /// Deliver one trigger. The first matching rule in declaration order
    /// wins; the state is committed before its side effect runs.
    pub fn step(&self, state: &mut S, context: &mut C, trigger: &T) -> StepOutcome<S, E> {
        let current = *state;
        debug!(
            "🔄 [{}] processing {} in state {:?}",
            self.name,
            trigger.describe(),
            current
        );

        let view: &C = context;
        let matched = self.rules.iter().enumerate().find(|(_, rule)| {
            rule.source == current
                && trigger.matches(&rule.trigger)
                && rule.guard.is_none_or(|guard| guard(view, trigger))
        });

        let Some((index, rule)) = matched else {
            debug!(
                "[{}] unmatched transition: {} ignored in state {:?}",
                self.name,
                trigger.describe(),
                current
            );
            return StepOutcome::Unmatched { state: current };
        };

        *state = rule.destination;
        if rule.destination != current {
            info!(
                "🎯 [{}] state transition: {:?} -> {:?} (trigger: {})",
                self.name,
                current,
                rule.destination,
                trigger.describe()
            );
        }

        let effects = rule.effect.map(|effect| effect(context, trigger)).unwrap_or_default();
        StepOutcome::Transitioned {
            from: current,
            to: rule.destination,
            rule: index,
            effects,
        }
    }
}

//! One event under construction.

use bytes::BytesMut;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    AssembledEvent, ContractError, EventBody, Fragment, FragmentBody, FragmentKind, NodeId,
    SubRecord, TransitionKind, SUB_RECORD_HEADER_BYTES, TYPE_PHYSICS,
};

use crate::scoreboard::{NodeScoreboard, ScoreboardLayout};

/// What an assembly is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyKind {
    /// Matched by timestamp window against `reference_timestamp`.
    Physics { reference_timestamp: u32 },
    /// Matched by transition type only.
    StateTransition(TransitionKind),
}

#[derive(Debug, Clone)]
pub struct Assembly {
    kind: AssemblyKind,
    scoreboard: NodeScoreboard,
    fragments: Vec<Fragment>,
    received_at: Instant,
}

impl Assembly {
    /// Open a physics assembly from the trigger node's fragment.
    ///
    /// `reference_timestamp` is the trigger timestamp with the trigger
    /// node's offset already applied.
    pub fn physics(
        trigger: Fragment,
        reference_timestamp: u32,
        layout: Arc<ScoreboardLayout>,
        received_at: Instant,
    ) -> Result<Self, ContractError> {
        if !matches!(trigger.body, FragmentBody::Physics(_)) {
            return Err(ContractError::WrongFragmentKind {
                expected: FragmentKind::Physics,
                actual: trigger.kind(),
            });
        }

        let capacity = layout.member_count();
        let mut assembly = Self {
            kind: AssemblyKind::Physics {
                reference_timestamp,
            },
            scoreboard: NodeScoreboard::new(layout),
            fragments: Vec::with_capacity(capacity),
            received_at,
        };
        assembly.add(trigger)?;
        Ok(assembly)
    }

    /// Open a state-transition assembly from the first fragment of its type.
    pub fn transition(
        first: Fragment,
        layout: Arc<ScoreboardLayout>,
        received_at: Instant,
    ) -> Result<Self, ContractError> {
        let FragmentBody::StateTransition(body) = &first.body else {
            return Err(ContractError::WrongFragmentKind {
                expected: FragmentKind::StateTransition(TransitionKind::Begin),
                actual: first.kind(),
            });
        };

        let kind = AssemblyKind::StateTransition(body.transition);
        let capacity = layout.member_count();
        let mut assembly = Self {
            kind,
            scoreboard: NodeScoreboard::new(layout),
            fragments: Vec::with_capacity(capacity),
            received_at,
        };
        assembly.add(first)?;
        Ok(assembly)
    }

    /// Fold a fragment in.
    ///
    /// The scoreboard is updated first, so an `UnknownNode` fragment leaves
    /// the assembly unchanged.
    pub fn add(&mut self, fragment: Fragment) -> Result<(), ContractError> {
        self.check_kind(&fragment)?;
        self.scoreboard.add_node(fragment.node)?;
        self.fragments.push(fragment);
        Ok(())
    }

    fn check_kind(&self, fragment: &Fragment) -> Result<(), ContractError> {
        let compatible = match (&self.kind, &fragment.body) {
            (AssemblyKind::Physics { .. }, FragmentBody::Physics(_)) => true,
            (AssemblyKind::StateTransition(kind), FragmentBody::StateTransition(t)) => {
                *kind == t.transition
            }
            _ => false,
        };

        if compatible {
            Ok(())
        } else {
            Err(ContractError::WrongFragmentKind {
                expected: self.expected_kind(),
                actual: fragment.kind(),
            })
        }
    }

    fn expected_kind(&self) -> FragmentKind {
        match self.kind {
            AssemblyKind::Physics { .. } => FragmentKind::Physics,
            AssemblyKind::StateTransition(kind) => FragmentKind::StateTransition(kind),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.scoreboard.is_complete()
    }

    #[inline]
    pub fn is_physics(&self) -> bool {
        matches!(self.kind, AssemblyKind::Physics { .. })
    }

    pub fn kind(&self) -> AssemblyKind {
        self.kind
    }

    /// Buffer type code of the event being built.
    pub fn type_code(&self) -> u16 {
        match self.kind {
            AssemblyKind::Physics { .. } => TYPE_PHYSICS,
            AssemblyKind::StateTransition(kind) => kind.type_code(),
        }
    }

    /// Reference timestamp; always 0 for transitions.
    pub fn reference_timestamp(&self) -> u32 {
        match self.kind {
            AssemblyKind::Physics {
                reference_timestamp,
            } => reference_timestamp,
            AssemblyKind::StateTransition(_) => 0,
        }
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn contributors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.fragments.iter().map(|f| f.node)
    }

    /// Give the fragments back, e.g. to count them as discarded.
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    /// Build the finished event.
    pub fn materialize(self, event_id: u64) -> AssembledEvent {
        let type_code = self.type_code();
        let contributors: Vec<NodeId> = self.contributors().collect();

        let body = match self.kind {
            AssemblyKind::Physics {
                reference_timestamp,
            } => EventBody::Physics {
                reference_timestamp,
                records: pack_physics(&self.fragments),
            },
            AssemblyKind::StateTransition(transition) => {
                let first = self.fragments.first().and_then(|f| match &f.body {
                    FragmentBody::StateTransition(t) => Some(t),
                    _ => None,
                });
                EventBody::StateTransition {
                    transition,
                    run_number: first.map_or(0, |t| t.run_number),
                    title: first.map(|t| t.title.clone()).unwrap_or_default(),
                    elapsed_time: first.map_or(0, |t| t.elapsed_time),
                    absolute_time: first.map_or(0, |t| t.absolute_time),
                }
            }
        };

        AssembledEvent {
            event_id,
            type_code,
            contributors,
            body,
        }
    }
}

fn pack_physics(fragments: &[Fragment]) -> bytes::Bytes {
    let total: usize = fragments
        .iter()
        .map(|f| SUB_RECORD_HEADER_BYTES + f.payload_len())
        .sum();
    let mut out = BytesMut::with_capacity(total);
    for fragment in fragments {
        if let FragmentBody::Physics(physics) = &fragment.body {
            SubRecord::pack_into(fragment.node, physics.timestamp, &physics.payload, &mut out);
        }
    }
    out.freeze()
}

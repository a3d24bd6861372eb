//! Correlator: drives assemblies from per-node fragment queues to the sink.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    AssembledEvent, ContractError, CorrelatorConfig, CorrelatorStats, EventBody, Fragment,
    FragmentBody, FragmentSource, NodeDescriptor, NodeId, NodeTable, OutputSink, SourceNotice,
};
use tracing::instrument;

use crate::assembly::Assembly;
use crate::ledger::{AssemblyLedger, PendingFragment};
use crate::scoreboard::ScoreboardLayout;
use crate::window::MatchWindow;

/// Why fragments left the correlator without being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscardReason {
    Barrier,
    Prune,
    Reload,
    Shutdown,
}

impl DiscardReason {
    fn as_str(self) -> &'static str {
        match self {
            DiscardReason::Barrier => "barrier",
            DiscardReason::Prune => "prune",
            DiscardReason::Reload => "reload",
            DiscardReason::Shutdown => "shutdown",
        }
    }
}

/// Node table and scoreboard layout of one configuration epoch.
#[derive(Debug)]
struct Epoch {
    config: CorrelatorConfig,
    nodes: HashMap<NodeId, NodeDescriptor>,
    layout: Arc<ScoreboardLayout>,
    trigger: NodeId,
}

impl Epoch {
    fn build(config: CorrelatorConfig) -> Result<Self, ContractError> {
        let descriptors = config.list_nodes();
        let mut seen = HashSet::with_capacity(descriptors.len());
        if let Some(dup) = descriptors.iter().find(|n| !seen.insert(n.id)) {
            return Err(ContractError::config_validation(
                "nodes",
                format!("duplicate node id {}", dup.id),
            ));
        }
        let layout = ScoreboardLayout::configure(descriptors.iter().map(|n| n.id))?;

        let mut triggers = descriptors.iter().filter(|n| n.is_trigger);
        let trigger = match (triggers.next(), triggers.next()) {
            (Some(node), None) => node.id,
            (None, _) => {
                return Err(ContractError::config_validation(
                    "nodes",
                    "no trigger node configured",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ContractError::config_validation(
                    "nodes",
                    "more than one trigger node configured",
                ))
            }
        };

        let nodes = descriptors.into_iter().map(|n| (n.id, n)).collect();
        Ok(Self {
            config,
            nodes,
            layout: Arc::new(layout),
            trigger,
        })
    }
}

/// Fragment correlator.
///
/// Single-threaded and synchronous; callers serialize every call. Time is
/// supplied by the caller, so tests can drive the clock explicitly.
#[derive(Debug)]
pub struct Correlator {
    epoch: Epoch,
    ledger: AssemblyLedger,
    stats: CorrelatorStats,
    next_event_id: u64,
    /// Clock value at which pruning last ran
    last_prune: Option<Instant>,
}

impl Correlator {
    /// # Errors
    /// `TooManyNodes` for more than 32 nodes; `ConfigValidation` for a
    /// repeated node id, or unless exactly one node is the trigger.
    pub fn new(config: CorrelatorConfig) -> Result<Self, ContractError> {
        let epoch = Epoch::build(config)?;
        tracing::info!(
            nodes = epoch.nodes.len(),
            trigger = %epoch.trigger,
            prune_threshold_ms = epoch.config.prune_threshold_ms,
            "correlator configured"
        );
        Ok(Self {
            epoch,
            ledger: AssemblyLedger::new(),
            stats: CorrelatorStats::default(),
            next_event_id: 0,
            last_prune: None,
        })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.epoch.config
    }

    pub fn trigger_node(&self) -> NodeId {
        self.epoch.trigger
    }

    pub fn in_flight_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn unmatched_len(&self) -> usize {
        self.ledger.unmatched_len()
    }

    pub fn ledger(&self) -> &AssemblyLedger {
        &self.ledger
    }

    /// React to one source notice.
    ///
    /// `NewFragments` drains that node's queue fully, runs one matching pass,
    /// then prunes if `now` moved past the last pruning point. Per-fragment
    /// errors are logged and counted; they never stop the drain.
    #[instrument(name = "correlator_notice", skip(self, source, sink))]
    pub fn handle_notice<S, O>(
        &mut self,
        notice: SourceNotice,
        source: &mut S,
        sink: &mut O,
        now: Instant,
    ) where
        S: FragmentSource + ?Sized,
        O: OutputSink + ?Sized,
    {
        match notice {
            SourceNotice::NewFragments(node) => {
                let mut drained = 0usize;
                while let Some(fragment) = source.pop(node) {
                    drained += 1;
                    if let Err(err) = self.process_fragment(fragment, sink, now) {
                        report(&err);
                    }
                }
                tracing::trace!(node = %node, drained, "queue drained");

                self.matching_pass(sink);
                self.advance_clock(now);
            }
            SourceNotice::Starting => {
                tracing::info!("fragment source starting");
            }
            SourceNotice::ShuttingDown => {
                tracing::info!("fragment source shutting down");
                self.shutdown();
            }
            SourceNotice::Error(node) => {
                tracing::warn!(node = %node, "fragment source reported an error");
                metrics::counter!("evb_source_errors_total", "node" => node.to_string())
                    .increment(1);
            }
        }
        self.record_gauges();
    }

    /// Run the per-fragment steps for one fragment.
    ///
    /// Does not run a matching pass for physics fragments; that happens once
    /// per drained batch.
    #[instrument(
        level = "trace",
        name = "correlator_process_fragment",
        skip(self, fragment, sink),
        fields(node = %fragment.node, type_code = fragment.type_code())
    )]
    pub fn process_fragment<O>(
        &mut self,
        fragment: Fragment,
        sink: &mut O,
        now: Instant,
    ) -> Result<(), ContractError>
    where
        O: OutputSink + ?Sized,
    {
        let node = fragment.node;
        let Some(descriptor) = self.epoch.nodes.get(&node) else {
            bump(&mut self.stats.rejected_by_node, node);
            return Err(ContractError::unknown_node(node));
        };
        bump(&mut self.stats.fragments_by_node, node);
        metrics::counter!("evb_fragments_total", "node" => node.to_string()).increment(1);

        match &fragment.body {
            FragmentBody::Physics(physics) if node == self.epoch.trigger => {
                let reference = descriptor.adjust(physics.timestamp);
                let assembly = Assembly::physics(
                    fragment,
                    reference,
                    Arc::clone(&self.epoch.layout),
                    now,
                )
                .inspect_err(|_| bump(&mut self.stats.rejected_by_node, node))?;

                if assembly.is_complete() {
                    self.commit(assembly, sink)
                } else {
                    self.ledger.add(assembly);
                    Ok(())
                }
            }
            FragmentBody::Physics(_) => {
                self.ledger
                    .push_unmatched(PendingFragment::new(fragment, now));
                Ok(())
            }
            FragmentBody::StateTransition(_) => self.handle_transition(fragment, sink, now),
            FragmentBody::Scaler(scaler) => {
                let body = EventBody::Scaler(scaler.clone());
                self.commit_passthrough(&fragment, body, sink)
            }
            FragmentBody::StringList(list) => {
                let body = EventBody::StringList(list.clone());
                self.commit_passthrough(&fragment, body, sink)
            }
        }
    }

    fn handle_transition<O>(
        &mut self,
        fragment: Fragment,
        sink: &mut O,
        now: Instant,
    ) -> Result<(), ContractError>
    where
        O: OutputSink + ?Sized,
    {
        let node = fragment.node;
        let type_code = fragment.type_code();
        let barrier = matches!(
            &fragment.body,
            FragmentBody::StateTransition(t) if t.transition.is_barrier()
        );

        let complete = match self.ledger.find_by_type(type_code, 0) {
            Some(pos) => {
                let assembly = self
                    .ledger
                    .get_mut(pos)
                    .ok_or_else(|| ContractError::Other(format!("stale ledger position {pos}")))?;
                assembly
                    .add(fragment)
                    .inspect_err(|_| bump(&mut self.stats.rejected_by_node, node))?;
                assembly.is_complete()
            }
            None => {
                let assembly =
                    Assembly::transition(fragment, Arc::clone(&self.epoch.layout), now)
                        .inspect_err(|_| bump(&mut self.stats.rejected_by_node, node))?;
                let complete = assembly.is_complete();
                self.ledger.add(assembly);
                complete
            }
        };

        if !complete {
            return Ok(());
        }

        // Salvage physics assemblies that can still finish.
        self.matching_pass(sink);

        let Some(mut pos) = self.ledger.find_by_type(type_code, 0) else {
            return Ok(());
        };

        if barrier {
            let pending: Vec<PendingFragment> = self.ledger.take_unmatched().into();
            let evicted = self.ledger.remove_prior(pos);
            tracing::debug!(
                type_code,
                unmatched = pending.len(),
                assemblies = evicted.len(),
                "barrier flush"
            );
            self.discard_pending(pending, DiscardReason::Barrier);
            self.discard_assemblies(evicted, DiscardReason::Barrier);
            pos = 0;
        }

        match self.ledger.remove_item(pos) {
            Some(assembly) => self.commit(assembly, sink),
            None => Ok(()),
        }
    }

    /// Try to place every unmatched fragment into an in-flight physics
    /// assembly.
    ///
    /// Fragments that find no candidate stay queued, in order, until the
    /// next pass.
    #[instrument(level = "trace", name = "correlator_matching_pass", skip(self, sink))]
    pub fn matching_pass<O>(&mut self, sink: &mut O)
    where
        O: OutputSink + ?Sized,
    {
        let pending = self.ledger.take_unmatched();
        if pending.is_empty() {
            return;
        }

        for entry in pending {
            let node = entry.fragment.node;
            let (Some(descriptor), Some(raw)) =
                (self.epoch.nodes.get(&node), entry.fragment.timestamp())
            else {
                bump(&mut self.stats.rejected_by_node, node);
                continue;
            };
            let window = MatchWindow::around(descriptor.adjust(raw), descriptor.window_width);

            let Some(pos) = self.ledger.find_physics_by_window(&window, 0) else {
                self.ledger.push_unmatched(entry);
                continue;
            };

            let complete = match self.ledger.get_mut(pos) {
                Some(assembly) => match assembly.add(entry.fragment) {
                    Ok(()) => assembly.is_complete(),
                    Err(err) => {
                        bump(&mut self.stats.rejected_by_node, node);
                        report(&err);
                        false
                    }
                },
                None => false,
            };

            if complete {
                if let Some(assembly) = self.ledger.remove_item(pos) {
                    if let Err(err) = self.commit(assembly, sink) {
                        report(&err);
                    }
                }
            }
        }
    }

    /// Prune if `now` is a new clock value.
    ///
    /// Returns the number of fragments discarded.
    pub fn advance_clock(&mut self, now: Instant) -> usize {
        if self.last_prune.is_some_and(|last| now <= last) {
            return 0;
        }
        self.last_prune = Some(now);
        self.prune(now)
    }

    /// Evict unmatched fragments and physics assemblies older than the
    /// prune threshold. Transition assemblies are kept.
    #[instrument(level = "debug", name = "correlator_prune", skip(self))]
    pub fn prune(&mut self, now: Instant) -> usize {
        let threshold = self.epoch.config.prune_threshold();

        let stale = self
            .ledger
            .remove_unmatched_where(|p| p.age(now) > threshold);
        let evicted = self
            .ledger
            .remove_where(|a| a.is_physics() && a.age(now) > threshold);

        if stale.is_empty() && evicted.is_empty() {
            return 0;
        }

        tracing::debug!(
            unmatched = stale.len(),
            assemblies = evicted.len(),
            "pruned stale state"
        );
        self.discard_pending(stale, DiscardReason::Prune)
            + self.discard_assemblies(evicted, DiscardReason::Prune)
    }

    /// Swap in a new configuration.
    ///
    /// All outstanding state is discarded first. On error the current
    /// configuration and state are left untouched.
    #[instrument(name = "correlator_reload", skip(self, config))]
    pub fn reload(&mut self, config: CorrelatorConfig) -> Result<usize, ContractError> {
        let epoch = Epoch::build(config)?;
        let discarded = self.discard_everything(DiscardReason::Reload);
        self.epoch = epoch;
        self.last_prune = None;
        tracing::info!(
            nodes = self.epoch.nodes.len(),
            trigger = %self.epoch.trigger,
            discarded,
            "correlator reloaded"
        );
        self.record_gauges();
        Ok(discarded)
    }

    /// Drop all outstanding state. Returns the number of fragments discarded.
    pub fn shutdown(&mut self) -> usize {
        let discarded = self.discard_everything(DiscardReason::Shutdown);
        if discarded > 0 {
            tracing::info!(discarded, "outstanding fragments discarded at shutdown");
        }
        self.record_gauges();
        discarded
    }

    pub fn statistics(&self) -> CorrelatorStats {
        let mut snapshot = self.stats.clone();
        for pending in self.ledger.unmatched() {
            bump(&mut snapshot.unmatched_by_node, pending.fragment.node);
        }
        snapshot
    }

    pub fn clear_statistics(&mut self) {
        self.stats.clear();
    }

    fn discard_everything(&mut self, reason: DiscardReason) -> usize {
        let pending: Vec<PendingFragment> = self.ledger.take_unmatched().into();
        let assemblies = self.ledger.drain_all();
        self.discard_pending(pending, reason) + self.discard_assemblies(assemblies, reason)
    }

    fn discard_pending(&mut self, pending: Vec<PendingFragment>, reason: DiscardReason) -> usize {
        let count = pending.len();
        for entry in pending {
            self.count_discard(entry.fragment.node, reason);
        }
        count
    }

    fn discard_assemblies(&mut self, assemblies: Vec<Assembly>, reason: DiscardReason) -> usize {
        let mut count = 0;
        for assembly in assemblies {
            for fragment in assembly.into_fragments() {
                self.count_discard(fragment.node, reason);
                count += 1;
            }
        }
        count
    }

    fn count_discard(&mut self, node: NodeId, reason: DiscardReason) {
        bump(&mut self.stats.discarded_by_node, node);
        metrics::counter!(
            "evb_fragments_discarded_total",
            "node" => node.to_string(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    fn commit_passthrough<O>(
        &mut self,
        fragment: &Fragment,
        body: EventBody,
        sink: &mut O,
    ) -> Result<(), ContractError>
    where
        O: OutputSink + ?Sized,
    {
        self.next_event_id += 1;
        let event = AssembledEvent {
            event_id: self.next_event_id,
            type_code: fragment.type_code(),
            contributors: vec![fragment.node],
            body,
        };
        self.submit(event, sink)
    }

    fn commit<O>(&mut self, assembly: Assembly, sink: &mut O) -> Result<(), ContractError>
    where
        O: OutputSink + ?Sized,
    {
        self.next_event_id += 1;
        let event = assembly.materialize(self.next_event_id);
        self.submit(event, sink)
    }

    fn submit<O>(&mut self, event: AssembledEvent, sink: &mut O) -> Result<(), ContractError>
    where
        O: OutputSink + ?Sized,
    {
        let event_id = event.event_id;
        let type_code = event.type_code;
        let contributors = event.contributors.len();

        match sink.submit(event) {
            Ok(()) => {
                *self.stats.completed_by_type.entry(type_code).or_insert(0) += 1;
                metrics::counter!("evb_events_committed_total", "type" => type_code.to_string())
                    .increment(1);
                tracing::trace!(event_id, type_code, contributors, "event committed");
                Ok(())
            }
            Err(source) => {
                self.stats.sink_rejected += 1;
                metrics::counter!("evb_sink_rejected_total").increment(1);
                Err(ContractError::SinkRejected {
                    event_id,
                    type_code,
                    source,
                })
            }
        }
    }

    fn record_gauges(&self) {
        metrics::gauge!("evb_in_flight").set(self.ledger.len() as f64);
        metrics::gauge!("evb_unmatched").set(self.ledger.unmatched_len() as f64);
    }
}

fn bump(map: &mut BTreeMap<NodeId, u64>, node: NodeId) {
    *map.entry(node).or_insert(0) += 1;
}

fn report(err: &ContractError) {
    tracing::warn!(error = %err, kind = err.kind_label(), "fragment handling failed");
    metrics::counter!("evb_errors_total", "kind" => err.kind_label()).increment(1);
}

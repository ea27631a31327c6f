//! # Drain order derived from the queue wiring.
//!
//! Worker groups are nodes and queues are edges from each producer group to
//! each consumer group. Queues no group consumes end at a single sink node:
//! the orchestrator, which reads them itself.
//!
//! ```text
//! heartbeat_receiver ──heartbeat──────────────────────────────┐
//!                                                             ▼
//! telemetry ──telemetry──► command ──command──────────► [orchestrator]
//! ```
//!
//! The groups are sorted topologically and every queue is keyed by the
//! earliest position among its consumers. Queues are drained by descending
//! key (ties keep registration order), so a queue is only drained once every
//! queue consumed further downstream is already empty. For the pipeline
//! above: `heartbeat`, `command`, `telemetry`.
//!
//! A cycle has no end-to-start order and is rejected.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::PipelineError;
use crate::group::WorkerManager;
use crate::queue::{QueueId, QueueRef};

/// Name of the sink node in the group graph.
pub const SINK: &str = "orchestrator";

/// Queue wiring of one group, borrowed from its manager.
#[derive(Clone, Copy)]
pub struct Wiring<'a> {
    /// Group name.
    pub name: &'a str,
    /// Queues the group consumes.
    pub inputs: &'a [QueueRef],
    /// Queues the group produces into.
    pub outputs: &'a [QueueRef],
}

impl WorkerManager {
    /// Borrowed view of this group's wiring.
    pub fn wiring(&self) -> Wiring<'_> {
        Wiring {
            name: self.name(),
            inputs: self.inputs(),
            outputs: self.outputs(),
        }
    }
}

/// Queues in the order the shutdown drain visits them.
#[derive(Clone)]
pub struct DrainPlan {
    queues: Vec<QueueRef>,
}

impl DrainPlan {
    /// Computes the drain order.
    ///
    /// `registered` lists the queues owned by the orchestrator in creation
    /// order; queues only referenced by a group are appended after them.
    ///
    /// ### Errors
    /// [`PipelineError::Cycle`] when the wiring is cyclic.
    pub fn build<'a, G>(registered: &[QueueRef], groups: G) -> Result<Self, PipelineError>
    where
        G: IntoIterator<Item = Wiring<'a>>,
    {
        let groups: Vec<Wiring<'a>> = groups.into_iter().collect();

        let mut graph: DiGraph<&str, QueueId> = DiGraph::new();
        let nodes: Vec<NodeIndex> = groups.iter().map(|g| graph.add_node(g.name)).collect();
        let sink = graph.add_node(SINK);

        let universe = Self::universe(registered, &groups);
        let mut consumers_of: HashMap<QueueId, Vec<NodeIndex>> = HashMap::new();

        for q in &universe {
            let id = q.id();
            let consumers: Vec<NodeIndex> = groups
                .iter()
                .zip(&nodes)
                .filter(|(g, _)| g.inputs.iter().any(|i| i.id() == id))
                .map(|(_, n)| *n)
                .collect();
            let consumers = if consumers.is_empty() {
                vec![sink]
            } else {
                consumers
            };

            for (g, &producer) in groups.iter().zip(&nodes) {
                if g.outputs.iter().any(|o| o.id() == id) {
                    for &consumer in &consumers {
                        graph.add_edge(producer, consumer, id);
                    }
                }
            }
            consumers_of.insert(id, consumers);
        }

        let order = toposort(&graph, None).map_err(|cycle| PipelineError::Cycle {
            group: graph[cycle.node_id()].to_string(),
        })?;
        let rank: HashMap<NodeIndex, usize> =
            order.into_iter().enumerate().map(|(i, n)| (n, i)).collect();

        let mut keyed: Vec<(usize, QueueRef)> = universe
            .into_iter()
            .map(|q| {
                let key = consumers_of
                    .get(&q.id())
                    .into_iter()
                    .flatten()
                    .filter_map(|n| rank.get(n).copied())
                    .min()
                    .unwrap_or(usize::MAX);
                (key, q)
            })
            .collect();
        keyed.sort_by_key(|(key, _)| Reverse(*key));

        Ok(Self {
            queues: keyed.into_iter().map(|(_, q)| q).collect(),
        })
    }

    /// Queues in drain order.
    pub fn queues(&self) -> &[QueueRef] {
        &self.queues
    }

    /// Queue names in drain order.
    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.iter().map(|q| q.name()).collect()
    }

    /// Number of queues to drain.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// True when there is nothing to drain.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn universe(registered: &[QueueRef], groups: &[Wiring<'_>]) -> Vec<QueueRef> {
        let mut seen = HashSet::new();
        let referenced = groups
            .iter()
            .flat_map(|g| g.inputs.iter().chain(g.outputs.iter()));

        registered
            .iter()
            .chain(referenced)
            .filter(|q| seen.insert(q.id()))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for DrainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.queue_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BoundedQueue;
    use std::sync::Arc;

    fn q(name: &str) -> QueueRef {
        Arc::new(BoundedQueue::<()>::new(name, 1))
    }

    fn w<'a>(name: &'a str, inputs: &'a [QueueRef], outputs: &'a [QueueRef]) -> Wiring<'a> {
        Wiring {
            name,
            inputs,
            outputs,
        }
    }

    #[test]
    fn test_flight_pipeline_order() {
        let heartbeat = q("heartbeat");
        let telemetry = q("telemetry");
        let command = q("command");
        let registered = [heartbeat.clone(), telemetry.clone(), command.clone()];

        let hb_out = [heartbeat];
        let tel_out = [telemetry.clone()];
        let cmd_in = [telemetry];
        let cmd_out = [command];
        let groups = [
            w("heartbeat_sender", &[], &[]),
            w("heartbeat_receiver", &[], &hb_out),
            w("telemetry", &[], &tel_out),
            w("command", &cmd_in, &cmd_out),
        ];

        let plan = DrainPlan::build(&registered, groups).unwrap();
        assert_eq!(plan.queue_names(), ["heartbeat", "command", "telemetry"]);
    }

    #[test]
    fn test_linear_chain_is_drained_end_to_start() {
        let (ab, bc, cd) = (q("ab"), q("bc"), q("cd"));
        let registered = [ab.clone(), bc.clone(), cd.clone()];
        let (a_out, b_in, b_out, c_in, c_out) = (
            [ab.clone()],
            [ab],
            [bc.clone()],
            [bc],
            [cd],
        );
        let groups = [
            w("c", &c_in, &c_out),
            w("a", &[], &a_out),
            w("b", &b_in, &b_out),
        ];

        let plan = DrainPlan::build(&registered, groups).unwrap();
        assert_eq!(plan.queue_names(), ["cd", "bc", "ab"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let (x, y) = (q("x"), q("y"));
        let (a_in, a_out, b_in, b_out) = ([y.clone()], [x.clone()], [x], [y]);
        let groups = [w("a", &a_in, &a_out), w("b", &b_in, &b_out)];

        let err = DrainPlan::build(&[], groups).unwrap_err();
        assert!(matches!(err, PipelineError::Cycle { ref group } if group == "a" || group == "b"));
    }

    #[test]
    fn test_unwired_queue_goes_to_sink() {
        let lone = q("lone");
        let plan = DrainPlan::build(&[lone], Vec::<Wiring>::new()).unwrap();
        assert_eq!(plan.queue_names(), ["lone"]);
    }

    #[test]
    fn test_group_only_queue_is_included() {
        let hidden = q("hidden");
        let out = [hidden];
        let plan = DrainPlan::build(&[], [w("p", &[], &out)]).unwrap();
        assert_eq!(plan.len(), 1);
    }
}

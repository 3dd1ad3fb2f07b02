use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use sepal_ir::{CompKind, Design, ModuleKind, TaskIdx};
use sepal_utils::{Error, SepalResult};

/// Order in which tasks should be visited.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Order {
    /// Declaration order, no guarantees about call relationships.
    Declared,
    /// Callees before their callers.
    Post,
    /// Callers before their callees.
    Pre,
}

/// Topological ordering of the tasks of a design induced by cross-task
/// calls.
///
/// Every [`ModuleKind::TaskCall`] found under a task's entry scope adds an
/// edge from the callee to the caller, so `Order::Post` yields callees
/// first. A recursive call chain admits no such order and is reported as a
/// malformed design rather than a panic since it originates in user input.
#[derive(Debug)]
pub struct TaskOrder {
    order: Vec<TaskIdx>,
}

impl TaskOrder {
    pub fn new(design: &Design, order: Order) -> SepalResult<Self> {
        if order == Order::Declared {
            return Ok(TaskOrder {
                order: design.task_ids().collect(),
            });
        }

        let mut graph: DiGraph<TaskIdx, ()> = DiGraph::new();
        let mut nodes: FxHashMap<TaskIdx, NodeIndex> = FxHashMap::default();
        for task in design.task_ids() {
            nodes.insert(task, graph.add_node(task));
        }

        for (caller, task) in design.tasks() {
            for comp in design.graph.subtree(task.top_call) {
                let CompKind::Module(module) = &design.graph[comp].kind
                else {
                    continue;
                };
                if let ModuleKind::TaskCall { task: callee } = module.kind {
                    // A self call shows up as a one-node cycle below.
                    graph.add_edge(nodes[&callee], nodes[&caller], ());
                }
            }
        }

        let sorted = algo::toposort(&graph, None).map_err(|cycle| {
            let task = graph[cycle.node_id()];
            Error::malformed_structure(format!(
                "recursive call chain through task `{}`",
                design[task].name
            ))
        })?;

        let mut order_vec: Vec<TaskIdx> =
            sorted.into_iter().map(|node| graph[node]).collect();
        if order == Order::Pre {
            order_vec.reverse();
        }
        Ok(TaskOrder { order: order_vec })
    }

    /// Tasks in the requested order.
    pub fn iter(&self) -> impl Iterator<Item = TaskIdx> + '_ {
        self.order.iter().copied()
    }
}

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use sepal_ir::{CompIdx, Graph};
use sepal_utils::{Error, SepalResult};

/// Dataflow visit order for the children of one composite module.
///
/// A child is ready once every sibling driving one of its dependencies has
/// been visited. Producers outside the module, such as boundary images or
/// ancestor scopes, never gate readiness. Declared feedback points count
/// as already produced and are visited last; that is what lets a cyclic
/// region settle in a single sweep.
pub struct FlowOrder {
    order: Vec<CompIdx>,
}

impl FlowOrder {
    pub fn of(graph: &Graph, module: CompIdx) -> SepalResult<Self> {
        let m = graph[module].as_module().ok_or_else(|| {
            Error::malformed_structure(format!(
                "`{}` has no children to order",
                graph[module].name
            ))
        })?;

        let feedback: FxHashSet<CompIdx> =
            m.feedback_points.iter().copied().collect();
        let mut produced = feedback.clone();
        let mut queue: VecDeque<CompIdx> = m
            .children
            .iter()
            .copied()
            .filter(|c| !feedback.contains(c))
            .collect();
        let mut order = Vec::with_capacity(m.children.len());
        let mut stalled = 0;

        while let Some(comp) = queue.pop_front() {
            match blocker(graph, module, comp, &produced) {
                None => {
                    produced.insert(comp);
                    order.push(comp);
                    stalled = 0;
                }
                Some(blocking) => {
                    stalled += 1;
                    if stalled > queue.len() + 1 {
                        return Err(Error::malformed_structure(format!(
                            "combinational cycle through `{}`; break it \
                             with a feedback point",
                            graph.path(comp)
                        )));
                    }
                    // Pull the blocker forward so a dependency chain
                    // resolves in one sweep instead of one pass per link.
                    if let Some(at) =
                        queue.iter().position(|&c| c == blocking)
                    {
                        queue.remove(at);
                        queue.push_front(blocking);
                    }
                    queue.push_back(comp);
                }
            }
        }

        // Everything a feedback point reads exists by now.
        order.extend(m.feedback_points.iter().copied());
        Ok(FlowOrder { order })
    }

    pub fn iter(&self) -> impl Iterator<Item = CompIdx> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// First sibling of `comp` inside `module` that drives a dependency of
/// `comp` but has not been produced yet.
fn blocker(
    graph: &Graph,
    module: CompIdx,
    comp: CompIdx,
    produced: &FxHashSet<CompIdx>,
) -> Option<CompIdx> {
    for &entry in &graph[comp].entries {
        for (_, deps) in graph[entry].iter() {
            for dep in deps {
                let producer = graph.producer(dep.bus);
                if producer != comp
                    && graph[producer].owner == Some(module)
                    && !produced.contains(&producer)
                {
                    return Some(producer);
                }
            }
        }
    }
    None
}

use crate::pass_manager::PassResult;
use crate::traversal::{Named, Pass};
use rustc_hash::{FxHashMap, FxHashSet};
use sepal_ir::{CompKind, Design, Prim, ResourceIdx, TaskIdx};

/// Record which tasks reach each shared resource, and flag a resource as
/// arbitrated when more than one does. Purely an annotation pass: a
/// resource nobody touches is simply left unarbitrated.
#[derive(Default)]
pub struct AccessCounter {
    seen: FxHashMap<ResourceIdx, FxHashSet<TaskIdx>>,
}

impl Named for AccessCounter {
    fn name() -> &'static str {
        "access-counter"
    }

    fn description() -> &'static str {
        "count which tasks reach each shared resource"
    }
}

impl Pass for AccessCounter {
    fn run(&mut self, design: &mut Design) -> PassResult<()> {
        for (task_idx, task) in design.tasks() {
            for comp in design.graph.subtree(task.top_call) {
                let resource = match &design.graph[comp].kind {
                    CompKind::Module(m) => m.kind.accessed_resource(),
                    CompKind::Prim(
                        Prim::PinRead { pin } | Prim::PinWrite { pin },
                    ) => Some(*pin),
                    _ => None,
                };
                if let Some(resource) = resource {
                    self.seen.entry(resource).or_default().insert(task_idx);
                }
            }
        }

        for resource in design.resource_ids().collect::<Vec<_>>() {
            let accessors =
                self.seen.get(&resource).map_or(0, |tasks| tasks.len());
            design[resource].arbitrated = accessors > 1;
            log::debug!(
                "resource `{}` reached by {} task(s)",
                design[resource].name,
                accessors
            );
        }
        Ok(())
    }
}

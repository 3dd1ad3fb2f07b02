use crate::pass_manager::PassResult;
use crate::traversal::{ConstructPass, Named, ParseVal, Pass, PassOpt};
use sepal_ir::{CompIdx, Design, Graph, ModuleKind};
use sepal_utils::SepalResult;

/// Marks loop feedback flops redundant for block-I/O shaped loops.
///
/// A loop body with exactly one memory access and exactly one fifo access,
/// at least one of which takes a cycle, cannot overlap its first and last
/// iteration cycles. The feedback flop exists only to break that overlap,
/// so for this shape it can be elided. Anything else leaves the flop in
/// place; disqualification is the normal case and is silent.
pub struct LoopFlop {
    enable: bool,
}

impl ConstructPass for LoopFlop {
    fn from(extra_opts: &[String]) -> SepalResult<Self> {
        let opts = Self::get_opts(extra_opts);
        Ok(LoopFlop {
            enable: opts["enable"].bool(),
        })
    }

    fn clear_data(&mut self) {}
}

impl Named for LoopFlop {
    fn name() -> &'static str {
        "loop-flop"
    }

    fn description() -> &'static str {
        "elide loop feedback flops for block-I/O shaped loop bodies"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "enable",
            "run the elision analysis",
            ParseVal::Bool(true),
            PassOpt::parse_bool,
        )]
    }
}

impl Pass for LoopFlop {
    fn run(&mut self, design: &mut Design) -> PassResult<()> {
        if !self.enable {
            return Ok(());
        }

        let mut loops: Vec<CompIdx> = Vec::new();
        for (_, task) in design.tasks() {
            for comp in design.graph.subtree(task.top_call) {
                if matches!(
                    design.graph[comp].module_kind(),
                    Some(ModuleKind::Loop { .. })
                ) {
                    loops.push(comp);
                }
            }
        }

        for lp in loops {
            if !body_is_overlap_free(&design.graph, lp) {
                continue;
            }
            let declares_feedback = design.graph[lp]
                .as_module()
                .is_some_and(|m| !m.feedback_points.is_empty());
            if !declares_feedback {
                log::warn!(
                    "loop-flop: `{}` qualifies but declares no feedback \
                     points; leaving its flop in place",
                    design.graph.path(lp)
                );
                continue;
            }
            if let Some(module) = design.graph[lp].kind.as_module_mut() {
                module.kind = ModuleKind::Loop { flop_needed: false };
                log::debug!(
                    "loop-flop: `{}` cannot overlap iterations; flop \
                     elided",
                    design.graph.path(lp)
                );
            }
        }
        Ok(())
    }
}

/// Exactly one memory access, exactly one fifo access, and at least one of
/// them spends a cycle. The walk is strictly single level: nested loops
/// and calls are left to their own analysis.
fn body_is_overlap_free(graph: &Graph, lp: CompIdx) -> bool {
    let Some(body) = graph[lp].as_module() else {
        return false;
    };

    let mut mem = 0usize;
    let mut fifo = 0usize;
    let mut cycle_backed = false;
    let mut stack: Vec<CompIdx> = body.children.clone();

    while let Some(comp) = stack.pop() {
        let Some(module) = graph[comp].as_module() else {
            continue;
        };
        match &module.kind {
            ModuleKind::Loop { .. } | ModuleKind::Call => {}
            kind if kind.is_memory_access() => {
                mem += 1;
                cycle_backed |= takes_a_cycle(graph, comp);
            }
            kind if kind.is_fifo_access() => {
                fifo += 1;
                cycle_backed |= takes_a_cycle(graph, comp);
            }
            kind if !kind.is_atomic() => {
                stack.extend(module.children.iter().copied());
            }
            _ => {}
        }
    }

    mem == 1 && fifo == 1 && cycle_backed
}

fn takes_a_cycle(graph: &Graph, comp: CompIdx) -> bool {
    graph[comp]
        .exits
        .first()
        .is_some_and(|&exit| graph[exit].latency.is_nonzero())
}

use crate::analysis::{Order, TaskOrder};
use crate::pass_manager::PassResult;
use crate::traversal::{
    ConstructPass, DiagnosticContext, DiagnosticPass, Named, ParseVal, Pass,
    PassOpt,
};
use sepal_ir::{Design, Printer};
use sepal_utils::{Error, OutputFile, SepalResult};

/// Validate the frontend handoff before any mutating pass runs: wiring
/// must carry dependencies, all references must resolve in the arenas,
/// driving exits must come from siblings, feedback points must be children
/// of the module declaring them, and cross-task calls must be acyclic.
/// Findings accumulate so one run reports every violation at once.
pub struct WellFormed {
    diag: DiagnosticContext,
    dump: Option<OutputFile>,
}

impl ConstructPass for WellFormed {
    fn from(extra_opts: &[String]) -> SepalResult<Self> {
        let opts = Self::get_opts(extra_opts);
        Ok(WellFormed {
            diag: DiagnosticContext::default(),
            dump: opts["dump"].not_null_outstream(),
        })
    }

    fn clear_data(&mut self) {
        self.diag = DiagnosticContext::default();
    }
}

impl Named for WellFormed {
    fn name() -> &'static str {
        "well-formed"
    }

    fn description() -> &'static str {
        "validate structural invariants before scheduling"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "dump",
            "write the design tree to this stream before validating",
            ParseVal::OutStream(OutputFile::Null),
            PassOpt::parse_outstream,
        )]
    }
}

impl DiagnosticPass for WellFormed {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl Pass for WellFormed {
    fn run(&mut self, design: &mut Design) -> PassResult<()> {
        if let Some(out) = &mut self.dump {
            Printer::write_design(design, &mut out.get_write())
                .map_err(Error::from)?;
        }

        let graph = &design.graph;

        for (comp_idx, comp) in graph.components() {
            // Connected ports must carry at least one dependency under
            // some entry, or the schedulers cannot order their producers.
            for port in comp.ports() {
                if graph[port].bus.is_none() {
                    continue;
                }
                let has_dep = comp
                    .entries
                    .iter()
                    .any(|&e| !graph[e].dependencies(port).is_empty());
                if !has_dep {
                    self.diag.err(Error::malformed_structure(format!(
                        "port `{}` of `{}` is wired but carries no \
                         dependency",
                        graph[port].name,
                        graph.path(comp_idx)
                    )));
                }
                if let Some(bus) = graph[port].bus {
                    if !graph.contains_bus(bus) {
                        self.diag.err(Error::malformed_structure(format!(
                            "port `{}` of `{}` is wired to a bus outside \
                             the arena",
                            graph[port].name,
                            graph.path(comp_idx)
                        )));
                    }
                }
            }

            // Feedback points must be children of the declaring module.
            if let Some(module) = comp.as_module() {
                for &point in &module.feedback_points {
                    if graph[point].owner != Some(comp_idx) {
                        self.diag.err(Error::malformed_structure(format!(
                            "feedback point `{}` is not a child of `{}`",
                            graph[point].name,
                            graph.path(comp_idx)
                        )));
                    }
                }
            }
        }

        for (_, entry) in graph.entries() {
            for (port, deps) in entry.iter() {
                for dep in deps {
                    if !graph.contains_bus(dep.bus) {
                        self.diag.err(Error::malformed_structure(format!(
                            "dependency of port `{}` under `{}` names a \
                             bus outside the arena",
                            graph[port].name,
                            graph.path(entry.owner)
                        )));
                    }
                }
            }
            // Driving exits must belong to a sibling, or to the owning
            // component itself for self-feeding feedback entries.
            if let Some(exit) = entry.driving_exit {
                if !graph.contains_exit(exit) {
                    self.diag.err(Error::malformed_structure(format!(
                        "entry of `{}` is driven by an exit outside the \
                         arena",
                        graph.path(entry.owner)
                    )));
                    continue;
                }
                let driver = graph[exit].owner;
                let sibling = graph[driver].owner == graph[entry.owner].owner;
                if !sibling && driver != entry.owner {
                    self.diag.err(Error::malformed_structure(format!(
                        "entry of `{}` is driven by `{}`, which is not a \
                         sibling",
                        graph.path(entry.owner),
                        graph.path(driver)
                    )));
                }
            }
        }

        if let Err(err) = TaskOrder::new(design, Order::Post) {
            self.diag.err(err);
        }

        Ok(())
    }
}

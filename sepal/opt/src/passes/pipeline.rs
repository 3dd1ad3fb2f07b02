use std::io::Write;

use crate::analysis::{
    apply_pipeline, measure_depths, plan_pipeline, DepthReport, DepthTargets,
};
use crate::pass_manager::PassResult;
use crate::traversal::{ConstructPass, Named, ParseVal, Pass, PassOpt};
use linked_hash_map::LinkedHashMap;
use sepal_ir::{Design, Id};
use sepal_utils::{Error, OutputFile, SepalResult};

/// Measure combinational gate depths and, when enabled, insert pipeline
/// registers so every path meets the target.
///
/// The pass always measures and annotates the design; register insertion
/// runs only with `enable` and goes through the planner so the splice is
/// a pure application of a previously computed plan. After applying, the
/// graph is re-measured so the annotations describe the rewritten design.
pub struct Pipeline {
    enable: bool,
    auto_level: Option<u32>,
    gate_depth: u32,
    scope_depths: LinkedHashMap<Id, u32>,
    dump_depths: Option<OutputFile>,
}

impl ConstructPass for Pipeline {
    fn from(extra_opts: &[String]) -> SepalResult<Self> {
        let opts = Self::get_opts(extra_opts);

        let mut scope_depths = LinkedHashMap::new();
        let raw = opts["scope-depths"].string();
        if !raw.is_empty() {
            for binding in raw.split(',') {
                let Some((label, depth)) = binding.split_once('=') else {
                    return Err(Error::invalid_option(format!(
                        "scope-depths binding `{binding}` is not \
                         label=depth"
                    )));
                };
                let depth: u32 = depth.trim().parse().map_err(|_| {
                    Error::invalid_option(format!(
                        "scope-depths depth `{depth}` is not a number"
                    ))
                })?;
                scope_depths.insert(Id::new(label.trim()), depth);
            }
        }

        Ok(Pipeline {
            enable: opts["enable"].bool(),
            auto_level: opts["auto-level"]
                .pos_num()
                .filter(|&n| n >= 1)
                .map(|n| n as u32),
            gate_depth: opts["gate-depth"].pos_num().unwrap_or(0) as u32,
            scope_depths,
            dump_depths: opts["dump-depths"].not_null_outstream(),
        })
    }

    fn clear_data(&mut self) {
        // Configuration only; nothing accumulates across designs.
    }
}

impl Named for Pipeline {
    fn name() -> &'static str {
        "pipeline"
    }

    fn description() -> &'static str {
        "measure gate depths and insert registers to meet a target"
    }

    fn opts() -> Vec<PassOpt> {
        vec![
            PassOpt::new(
                "enable",
                "insert registers; without it the pass only measures",
                ParseVal::Bool(false),
                PassOpt::parse_bool,
            ),
            PassOpt::new(
                "gate-depth",
                "absolute target gate depth; zero disables the global \
                 target",
                ParseVal::Num(0),
                PassOpt::parse_num,
            ),
            PassOpt::new(
                "auto-level",
                "derive the target by dividing the measured maximum into \
                 this many stages",
                ParseVal::Num(0),
                PassOpt::parse_num,
            ),
            PassOpt::new(
                "scope-depths",
                "comma-separated label=depth target overrides for \
                 labeled scopes",
                ParseVal::String(String::new()),
                PassOpt::parse_string,
            ),
            PassOpt::new(
                "dump-depths",
                "write the measured depth report as JSON to this stream",
                ParseVal::OutStream(OutputFile::Null),
                PassOpt::parse_outstream,
            ),
        ]
    }
}

impl Pass for Pipeline {
    fn run(&mut self, design: &mut Design) -> PassResult<()> {
        let mut targets = DepthTargets {
            global: self.gate_depth,
            per_scope: self.scope_depths.clone(),
        };

        let mut report = measure_depths(design, &targets)?;

        // Auto-level wins over an explicit absolute depth.
        if let Some(level) = self.auto_level {
            let resolved = report.design_max.div_ceil(level);
            if self.gate_depth > 0 {
                log::warn!(
                    "pipeline: auto-level {level} overrides explicit \
                     gate-depth {}; using target {resolved}",
                    self.gate_depth
                );
            }
            targets.global = resolved;
        }

        annotate(design, &report);
        log::info!(
            "pipeline: max gate depth {} (unbreakable {})",
            report.design_max,
            report.unbreakable
        );

        let mut inserted = 0;
        if self.enable && (targets.global > 0 || report.predicted > 0) {
            if targets.global > 0 && targets.global < report.unbreakable {
                log::warn!(
                    "pipeline: target {} is below the unbreakable depth \
                     {}; paths inside atomic idioms will stay deeper",
                    targets.global,
                    report.unbreakable
                );
            }
            let plan = plan_pipeline(design, &targets)?;
            inserted = apply_pipeline(design, &plan)?;
            log::info!(
                "pipeline: inserted {inserted} registers at target {}",
                targets.global
            );
            report = measure_depths(design, &targets)?;
            annotate(design, &report);
        } else if !self.enable && report.predicted > 0 {
            log::debug!(
                "pipeline: disabled; targets would insert {} registers",
                report.predicted
            );
        }

        if let Some(out) = &mut self.dump_depths {
            let mut tasks = serde_json::Map::new();
            for &(task, max) in &report.task_max {
                tasks.insert(
                    design[task].name.to_string(),
                    serde_json::json!(max),
                );
            }
            let doc = serde_json::json!({
                "design": design.name.to_string(),
                "max_gate_depth": report.design_max,
                "unbreakable_gate_depth": report.unbreakable,
                "target": targets.global,
                "inserted_registers": inserted,
                "tasks": tasks,
            });
            let mut writer = out.get_write();
            serde_json::to_writer_pretty(&mut writer, &doc).map_err(|e| {
                Error::misc(format!("cannot write depth report: {e}"))
            })?;
            writeln!(writer).map_err(Error::from)?;
        }
        Ok(())
    }
}

fn annotate(design: &mut Design, report: &DepthReport) {
    design.max_gate_depth = report.design_max;
    design.unbreakable_gate_depth = report.unbreakable;
    for &(task, max) in &report.task_max {
        design[task].max_gate_depth = max;
    }
}

//! Combinational gate depth measurement and pipeline register planning.
//!
//! Three operations share one traversal core:
//! * [`measure_depths`] walks every task and reports the deepest
//!   unregistered path, the floor no register can lower, and how many
//!   insertions a target would demand.
//! * [`plan_pipeline`] runs the same walk but treats every edge it decides
//!   to break as already registered, so one register absorbs a whole
//!   overdeep chain instead of one register per link.
//! * [`apply_pipeline`] is the only mutator: it splices the planned
//!   registers into the graph and rewires the marked dependencies.
//!
//! Depths live in a [`SecondaryMap`] keyed by exit, never inside the graph
//! nodes themselves.

use linked_hash_map::LinkedHashMap;
use rustc_hash::FxHashSet;
use sepal_idx::maps::SecondaryMap;
use sepal_ir::{
    Builder, BusIdx, CompIdx, CompKind, DepKind, Dependency, Design,
    EntryIdx, ExitIdx, Id, PortIdx, Prim, TaskIdx, Value,
};
use sepal_utils::{Error, SepalResult};
use smallvec::SmallVec;

use super::dataflow::FlowOrder;
use super::task_order::{Order, TaskOrder};

/// Depth limits the planner works against. A zero global target disables
/// design-wide marking; per-scope entries override the global figure for
/// the subtree under the matching search label.
#[derive(Debug, Clone, Default)]
pub struct DepthTargets {
    pub global: u32,
    pub per_scope: LinkedHashMap<Id, u32>,
}

/// What one full measurement found.
#[derive(Debug, Clone)]
pub struct DepthReport {
    /// Deepest unregistered path anywhere in the design.
    pub design_max: u32,
    /// Largest single-component depth; no target below this is reachable.
    pub unbreakable: u32,
    /// Insertions the current targets would demand.
    pub predicted: usize,
    /// Per-task maxima in visit order.
    pub task_max: Vec<(TaskIdx, u32)>,
}

/// One register insertion the planner committed to.
#[derive(Debug, Clone)]
pub struct PlannedReg {
    /// Consumer entry holding the edge to break.
    pub entry: EntryIdx,
    /// Consumer port the edge lands on.
    pub port: PortIdx,
    /// Position of the edge among the port's dependencies.
    pub dep_pos: usize,
    /// Bus driving the edge when the plan was made.
    pub bus: BusIdx,
    /// Scope the register is spliced into.
    pub parent: CompIdx,
    /// Consumer the register is placed in front of.
    pub before: CompIdx,
    /// Whether the register needs a reset flavor.
    pub reset: bool,
    /// Shape of the consumer port, which sizes the register.
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub regs: Vec<PlannedReg>,
    /// Global target the plan was made against.
    pub target: u32,
}

impl PipelinePlan {
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}

/// Measure gate depths without committing to any insertion. Marking still
/// runs so the report can predict how many registers the targets demand,
/// but crossed edges keep their measured depth.
pub fn measure_depths(
    design: &Design,
    targets: &DepthTargets,
) -> SepalResult<DepthReport> {
    let mut engine = Engine::new(design, targets, Mode::Measure);
    engine.run()?;
    Ok(engine.into_report())
}

/// Decide where registers go. Edges chosen for breaking read back as depth
/// zero for the rest of the walk, which keeps a single overdeep chain from
/// collecting one register per downstream consumer.
pub fn plan_pipeline(
    design: &Design,
    targets: &DepthTargets,
) -> SepalResult<PipelinePlan> {
    let mut engine = Engine::new(design, targets, Mode::Plan);
    engine.run()?;
    log::debug!(
        "planned {} pipeline registers against target {}",
        engine.planned.len(),
        targets.global
    );
    Ok(PipelinePlan {
        regs: engine.planned,
        target: targets.global,
    })
}

/// Splice every planned register into the graph. Fails without touching
/// the remaining insertions when the graph no longer matches the plan.
pub fn apply_pipeline(
    design: &mut Design,
    plan: &PipelinePlan,
) -> SepalResult<usize> {
    for planned in &plan.regs {
        insert_planned_reg(design, planned)?;
    }
    Ok(plan.regs.len())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Measure,
    Plan,
}

struct Engine<'a> {
    design: &'a Design,
    targets: &'a DepthTargets,
    mode: Mode,
    /// Measured depth at each exit for the traversal so far.
    depths: SecondaryMap<ExitIdx, u32>,
    /// Per-scope target overrides currently in force, innermost last.
    target_stack: Vec<u32>,
    planned: Vec<PlannedReg>,
    /// Edges already chosen for breaking; they read back as depth zero.
    planned_edges: FxHashSet<(EntryIdx, PortIdx, usize)>,
    predicted: usize,
    design_max: u32,
    unbreakable: u32,
    task_max: u32,
    task_maxes: Vec<(TaskIdx, u32)>,
}

impl<'a> Engine<'a> {
    fn new(
        design: &'a Design,
        targets: &'a DepthTargets,
        mode: Mode,
    ) -> Self {
        Self {
            design,
            targets,
            mode,
            depths: SecondaryMap::new_with_default(0),
            target_stack: Vec::new(),
            planned: Vec::new(),
            planned_edges: FxHashSet::default(),
            predicted: 0,
            design_max: 0,
            unbreakable: 0,
            task_max: 0,
            task_maxes: Vec::new(),
        }
    }

    fn run(&mut self) -> SepalResult<()> {
        let design = self.design;
        let order = TaskOrder::new(design, Order::Post)?;
        for task in order.iter() {
            self.task_max = 0;
            self.visit_module(design[task].top_call)?;
            self.design_max = self.design_max.max(self.task_max);
            self.task_maxes.push((task, self.task_max));
        }
        Ok(())
    }

    fn into_report(self) -> DepthReport {
        DepthReport {
            design_max: self.design_max,
            unbreakable: self.unbreakable,
            predicted: self.predicted,
            task_max: self.task_maxes,
        }
    }

    fn current_target(&self) -> u32 {
        self.target_stack
            .last()
            .copied()
            .unwrap_or(self.targets.global)
    }

    // ------------------------- traversal -------------------------

    fn visit_module(&mut self, module: CompIdx) -> SepalResult<()> {
        let design = self.design;
        let Some(m) = design.graph[module].as_module() else {
            return Err(Error::malformed_structure(format!(
                "`{}` is not a scope",
                design.graph.path(module)
            )));
        };

        let pushed = match m
            .search_label
            .and_then(|label| self.targets.per_scope.get(&label))
        {
            Some(&t) => {
                self.target_stack.push(t);
                true
            }
            None => false,
        };

        // Feedback exits start each sweep at depth zero so the cycle they
        // close converges instead of accumulating.
        for &point in &m.feedback_points {
            for &exit in &design.graph[point].exits {
                self.depths.insert(exit, 0);
            }
        }

        let order = FlowOrder::of(&design.graph, module)?;
        for comp in order.iter() {
            self.visit_component(comp)?;
        }

        if pushed {
            self.target_stack.pop();
        }
        Ok(())
    }

    fn visit_component(&mut self, comp: CompIdx) -> SepalResult<()> {
        let design = self.design;
        match &design.graph[comp].kind {
            CompKind::Module(m) if !m.kind.is_atomic() => {
                self.visit_module(comp)?;
            }
            // Atomic idioms are opaque: measured and marked like leaves,
            // never entered.
            CompKind::Module(_) => {
                self.leaf_visit(comp);
            }
            CompKind::Prim(Prim::Reg { .. }) => {
                // The input path is measured and counts toward the
                // maximum, but the output starts a fresh path.
                self.leaf_visit(comp);
                for &exit in &design.graph[comp].exits {
                    self.depths.insert(exit, 0);
                }
            }
            CompKind::Prim(Prim::InBuf { .. }) => {
                if let Some(module) = design.graph[comp].owner {
                    self.visit_inbuf(comp, module);
                }
            }
            CompKind::Prim(Prim::OutBuf) => {
                let depth = self.leaf_visit(comp);
                self.propagate_exit(comp, depth);
            }
            CompKind::Prim(_) => {
                self.leaf_visit(comp);
            }
        }
        Ok(())
    }

    /// Mark, then measure: record the component's output depth at every
    /// exit and fold it into the running maxima.
    fn leaf_visit(&mut self, comp: CompIdx) -> u32 {
        self.mark(comp);
        let design = self.design;
        let own = design.graph.exit_gate_depth(comp);
        let input = design.graph[comp]
            .ports()
            .map(|p| self.port_depth(p))
            .max()
            .unwrap_or(0);
        let depth = input + own;
        for &exit in &design.graph[comp].exits {
            self.depths.insert(exit, depth);
        }
        self.task_max = self.task_max.max(depth);
        self.unbreakable = self.unbreakable.max(own);
        depth
    }

    /// An input buffer owns no ports of its own; its exit reflects the
    /// deepest signal arriving at the owning module's boundary, so marks
    /// inside the scope see the depth accumulated outside it.
    fn visit_inbuf(&mut self, comp: CompIdx, module: CompIdx) {
        let design = self.design;
        let own = design.graph.exit_gate_depth(comp);
        let input = design.graph[module]
            .ports()
            .map(|p| self.port_depth(p))
            .max()
            .unwrap_or(0);
        let depth = input + own;
        for &exit in &design.graph[comp].exits {
            self.depths.insert(exit, depth);
        }
        self.task_max = self.task_max.max(depth);
        self.unbreakable = self.unbreakable.max(own);
    }

    /// Copy an output buffer's measured depth onto the module exit it
    /// realizes, so consumers after the module read it without chasing.
    fn propagate_exit(&mut self, outbuf: CompIdx, depth: u32) {
        let design = self.design;
        let Some(module) = design.graph[outbuf].owner else {
            return;
        };
        for &exit in &design.graph[module].exits {
            if design.graph[exit].buf == Some(outbuf) {
                self.depths.insert(exit, depth);
            }
        }
    }

    // ------------------------- measurement -------------------------

    /// Deepest signal arriving on `port` across all entries.
    fn port_depth(&self, port: PortIdx) -> u32 {
        let design = self.design;
        let comp = design.graph[port].owner;
        let mut max = 0;
        for &entry in &design.graph[comp].entries {
            for (pos, dep) in design.graph[entry]
                .dependencies(port)
                .iter()
                .enumerate()
            {
                max = max.max(self.edge_depth(entry, port, pos, dep));
            }
        }
        max
    }

    fn edge_depth(
        &self,
        entry: EntryIdx,
        port: PortIdx,
        pos: usize,
        dep: &Dependency,
    ) -> u32 {
        // Clock and reset nets are balanced distribution trees, not paths.
        if matches!(dep.kind, DepKind::Clock | DepKind::Reset) {
            return 0;
        }
        if self.planned_edges.contains(&(entry, port, pos)) {
            return 0;
        }
        self.bus_depth(dep.bus)
    }

    /// Depth behind a bus. Boundary buses are transparent: the twin port
    /// on the far side is chased instead of reading the buffer's exit,
    /// which keeps per-port precision across scope boundaries.
    fn bus_depth(&self, bus: BusIdx) -> u32 {
        let design = self.design;
        if let Some(peer) = design.graph[bus].peer {
            let through = match &design.graph[design.graph.producer(bus)].kind
            {
                CompKind::Prim(Prim::InBuf { depth }) => *depth,
                _ => 0,
            };
            return self.port_depth(peer) + through;
        }
        *self.depths.get(design.graph.owner_exit(bus))
    }

    // ------------------------- marking -------------------------

    /// Decide, edge by edge, whether a register belongs in front of this
    /// component. Runs before the component's own depth is recorded.
    fn mark(&mut self, comp: CompIdx) {
        let design = self.design;
        let entry_depth = design.graph.entry_gate_depth(comp);
        if entry_depth == 0 {
            return;
        }
        let target = self.current_target();
        if target == 0 {
            return;
        }
        let Some(parent) = design.graph[comp].owner else {
            return;
        };
        let go = design.graph[comp].go_port();

        for &entry in design.graph[comp].entries.iter() {
            for (port, deps) in design.graph[entry].iter() {
                for (pos, dep) in deps.iter().enumerate() {
                    if matches!(dep.kind, DepKind::Clock | DepKind::Reset) {
                        continue;
                    }
                    if design.graph.is_constant_bus(dep.bus) {
                        continue;
                    }
                    let gate_depth =
                        *self.depths.get(design.graph.owner_exit(dep.bus));
                    if gate_depth == 0 {
                        continue;
                    }
                    if gate_depth + entry_depth <= target {
                        continue;
                    }
                    self.predicted += 1;
                    if self.mode == Mode::Plan {
                        self.planned_edges.insert((entry, port, pos));
                        self.planned.push(PlannedReg {
                            entry,
                            port,
                            dep_pos: pos,
                            bus: dep.bus,
                            parent,
                            before: comp,
                            // Control consumers and handshake inputs come
                            // up cleared; pure datapath flops carry X
                            // until first enable.
                            reset: port == go
                                || !design.graph[comp].kind.is_operation(),
                            value: design.graph[port].value.shape(),
                        });
                    }
                }
            }
        }
    }
}

/// Splice one planned register in front of its consumer and swap the
/// marked dependency onto the register's result.
fn insert_planned_reg(
    design: &mut Design,
    planned: &PlannedReg,
) -> SepalResult<()> {
    let current = design.graph[planned.entry]
        .dependencies(planned.port)
        .get(planned.dep_pos)
        .map(|dep| dep.bus);
    if current != Some(planned.bus) {
        return Err(Error::pass_assumption(
            "pipeline",
            "plan no longer matches the graph; re-plan after structural \
             changes",
        ));
    }

    let prefix = format!("{}_pipeline", design.graph[planned.bus].name);
    let reg = Builder::new(design).add_reg(
        planned.parent,
        &prefix,
        planned.value,
        planned.reset,
    );
    design.graph.insert_child_before(planned.parent, planned.before, reg);

    let graph = &mut design.graph;
    let reg_entry = graph[reg].entries[0];
    let driving = graph[planned.entry].driving_exit;
    graph[reg_entry].driving_exit = driving;

    // Data in from the bus that used to feed the consumer directly.
    let Some(data_port) = graph[reg].data_ports().next() else {
        unreachable!("registers are built with an input port");
    };
    graph.connect(data_port, planned.bus);
    graph.add_dependency(
        reg_entry,
        data_port,
        Dependency {
            kind: DepKind::Data,
            bus: planned.bus,
        },
    );

    // The consumer edge moves onto the register's result, keeping its
    // kind and its position among the port's dependencies.
    let Some(result) = graph.result_bus(reg) else {
        unreachable!("registers are built with a result bus");
    };
    let old = graph[planned.entry].dependencies(planned.port)[planned.dep_pos];
    graph[planned.entry].replace_dependency(
        planned.port,
        planned.dep_pos,
        old.same_kind(result),
    );
    if graph[planned.port].bus == Some(planned.bus) {
        graph.connect(planned.port, result);
    }

    // The register runs in lockstep with its consumer: echo the
    // consumer's go, clock, and reset gating onto it.
    let consumer = planned.before;
    let pairs = [
        (graph[consumer].go_port(), graph[reg].go_port()),
        (graph[consumer].clock_port(), graph[reg].clock_port()),
        (graph[consumer].reset_port(), graph[reg].reset_port()),
    ];
    let mut echoes: Vec<(PortIdx, Dependency)> = Vec::new();
    for (from, to) in pairs {
        let mut seen: SmallVec<[BusIdx; 2]> = SmallVec::new();
        for &c_entry in graph[consumer].entries.iter() {
            for dep in graph[c_entry].dependencies(from) {
                if !seen.contains(&dep.bus) {
                    seen.push(dep.bus);
                    echoes.push((to, *dep));
                }
            }
        }
    }
    for (to, dep) in echoes {
        if graph[to].bus.is_none() {
            graph.connect(to, dep.bus);
        }
        graph.add_dependency(reg_entry, to, dep);
    }

    log::debug!(
        "pipeline register `{}` inserted in front of `{}`",
        graph[reg].name,
        graph.path(consumer)
    );
    Ok(())
}

//! End-to-end checks: build graphs through the builder, run the analyses
//! and passes over them, and assert on the rewritten structure.

use sepal_ir::{
    Builder, BusIdx, CompIdx, CompKind, DepKind, Design, Id, Latency,
    ModuleKind, Prim, ResourceKind, Value,
};
use sepal_opt::analysis::{
    apply_pipeline, measure_depths, plan_pipeline, DepthTargets, Order,
    TaskOrder,
};
use sepal_opt::pass_manager::PassManager;
use sepal_opt::passes::{AccessCounter, LoopFlop, PinConnector, Pipeline};
use sepal_opt::traversal::{ConstructPass, Pass};

/// One combinational operation wired into `scope`'s control domain, with
/// its data input optionally fed from `from`.
fn link(
    d: &mut Design,
    scope: CompIdx,
    name: &str,
    depth: u32,
    from: Option<BusIdx>,
) -> CompIdx {
    let op = Builder::new(d).add_op(scope, name, depth, 8, 1);
    let entry = d.graph[op].entries[0];
    let port = d.graph[op].data_ports().next().unwrap();
    let mut b = Builder::new(d);
    b.wire_control(entry, op, scope);
    if let Some(bus) = from {
        b.wire(entry, port, DepKind::Data, bus);
    }
    op
}

/// A straight chain of `n` one-gate operations.
fn chain(d: &mut Design, scope: CompIdx, n: usize) -> Vec<CompIdx> {
    let mut ops: Vec<CompIdx> = Vec::new();
    let mut prev = None;
    for i in 0..n {
        let op = link(d, scope, &format!("c{i}"), 1, prev);
        prev = d.graph.result_bus(op);
        ops.push(op);
    }
    ops
}

fn count_regs(d: &Design, root: CompIdx) -> usize {
    d.graph
        .subtree(root)
        .into_iter()
        .filter(|&c| {
            matches!(d.graph[c].kind, CompKind::Prim(Prim::Reg { .. }))
        })
        .count()
}

#[test]
fn chain_of_six_needs_one_register_at_target_three() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    chain(&mut d, call, 6);

    let targets = DepthTargets {
        global: 3,
        ..Default::default()
    };
    let report = measure_depths(&d, &targets).unwrap();
    assert_eq!(report.design_max, 6);
    assert_eq!(report.unbreakable, 1);

    // One register absorbs the whole overdeep tail; the walk sees the
    // broken edge as depth zero and stops asking for more.
    let plan = plan_pipeline(&d, &targets).unwrap();
    assert_eq!(plan.regs.len(), 1);
    let inserted = apply_pipeline(&mut d, &plan).unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(count_regs(&d, call), 1);

    let after = measure_depths(&d, &targets).unwrap();
    assert_eq!(after.design_max, 3);
    assert_eq!(after.predicted, 0);
}

#[test]
fn zero_target_measures_without_inserting() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    chain(&mut d, call, 6);

    let targets = DepthTargets::default();
    let report = measure_depths(&d, &targets).unwrap();
    assert_eq!(report.design_max, 6);
    assert_eq!(report.predicted, 0);

    let plan = plan_pipeline(&d, &targets).unwrap();
    assert!(plan.is_empty());
    assert_eq!(apply_pipeline(&mut d, &plan).unwrap(), 0);
    assert_eq!(count_regs(&d, call), 0);
}

#[test]
fn replanning_after_apply_inserts_nothing() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    chain(&mut d, call, 6);

    let targets = DepthTargets {
        global: 3,
        ..Default::default()
    };
    let plan = plan_pipeline(&d, &targets).unwrap();
    apply_pipeline(&mut d, &plan).unwrap();

    let again = plan_pipeline(&d, &targets).unwrap();
    assert!(again.is_empty());
    assert_eq!(count_regs(&d, call), 1);
}

#[test]
fn intrinsic_depth_is_the_floor() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let c0 = link(&mut d, call, "c0", 1, None);
    let c0_out = d.graph.result_bus(c0);
    let deep = link(&mut d, call, "deep", 5, c0_out);
    let deep_out = d.graph.result_bus(deep);
    link(&mut d, call, "c2", 1, deep_out);

    let targets = DepthTargets {
        global: 3,
        ..Default::default()
    };
    let report = measure_depths(&d, &targets).unwrap();
    assert_eq!(report.design_max, 7);
    assert_eq!(report.unbreakable, 5);

    let plan = plan_pipeline(&d, &targets).unwrap();
    apply_pipeline(&mut d, &plan).unwrap();

    // Registers isolate the five-gate block but cannot shrink it; the
    // measured maximum settles on the intrinsic floor.
    let after = measure_depths(&d, &targets).unwrap();
    assert_eq!(after.design_max, 5);
    assert_eq!(after.predicted, 0);
    assert!(after.design_max <= targets.global.max(after.unbreakable));
}

#[test]
fn constant_edges_are_never_registered() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let c0 = link(&mut d, call, "c0", 1, None);
    let folded = d.graph.result_bus(c0).unwrap();
    d.graph[folded].value = Value::constant(8, false, 7);
    link(&mut d, call, "c1", 1, Some(folded));

    // Both constant flavors: a bus marked by folding above, a literal
    // driver below.
    let k = Builder::new(&mut d).add_constant(
        call,
        "k",
        Value::constant(8, false, 3),
    );
    let k_out = d.graph.result_bus(k);
    link(&mut d, call, "c2", 1, k_out);

    let targets = DepthTargets {
        global: 1,
        ..Default::default()
    };
    let report = measure_depths(&d, &targets).unwrap();
    assert_eq!(report.design_max, 2);
    assert_eq!(report.predicted, 0);
    assert!(plan_pipeline(&d, &targets).unwrap().is_empty());
}

#[test]
fn latch_counts_as_an_opaque_two_gate_unit() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let a = link(&mut d, call, "a", 2, None);
    let a_out = d.graph.result_bus(a).unwrap();
    let latch =
        Builder::new(&mut d).add_latch(call, "hold", Value::new(8, false));
    let l_entry = d.graph[latch].entries[0];
    let l_port = d.graph[latch].data_ports().next().unwrap();
    Builder::new(&mut d).wire(l_entry, l_port, DepKind::Data, a_out);
    let l_out = d.graph.result_bus(latch).unwrap();
    link(&mut d, call, "b", 2, Some(l_out));

    let targets = DepthTargets {
        global: 4,
        ..Default::default()
    };
    let report = measure_depths(&d, &targets).unwrap();
    assert_eq!(report.design_max, 6);
    assert_eq!(report.unbreakable, 2);

    // The latch is transparent, so the path keeps accumulating through
    // it; the only legal cut is in front of the consumer after it.
    let plan = plan_pipeline(&d, &targets).unwrap();
    assert_eq!(plan.regs.len(), 1);
    apply_pipeline(&mut d, &plan).unwrap();
    let after = measure_depths(&d, &targets).unwrap();
    assert_eq!(after.design_max, 4);
    assert_eq!(after.predicted, 0);
}

#[test]
fn feedback_scope_measures_and_terminates() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let a = link(&mut d, call, "a", 1, None);
    let b = link(&mut d, call, "b", 1, None);
    let a_out = d.graph.result_bus(a).unwrap();
    let b_out = d.graph.result_bus(b).unwrap();
    let a_entry = d.graph[a].entries[0];
    let a_port = d.graph[a].data_ports().next().unwrap();
    let b_entry = d.graph[b].entries[0];
    let b_port = d.graph[b].data_ports().next().unwrap();
    let mut bl = Builder::new(&mut d);
    bl.wire(a_entry, a_port, DepKind::Data, b_out);
    bl.wire(b_entry, b_port, DepKind::Data, a_out);
    bl.declare_feedback(call, b);

    // The feedback exit opens each sweep at depth zero, so the cycle
    // contributes one finite path instead of diverging.
    let report = measure_depths(&d, &DepthTargets::default()).unwrap();
    assert_eq!(report.design_max, 2);
}

#[test]
fn undeclared_cycle_is_reported() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let a = link(&mut d, call, "a", 1, None);
    let b = link(&mut d, call, "b", 1, None);
    let a_out = d.graph.result_bus(a).unwrap();
    let b_out = d.graph.result_bus(b).unwrap();
    let a_entry = d.graph[a].entries[0];
    let a_port = d.graph[a].data_ports().next().unwrap();
    let b_entry = d.graph[b].entries[0];
    let b_port = d.graph[b].data_ports().next().unwrap();
    let mut bl = Builder::new(&mut d);
    bl.wire(a_entry, a_port, DepKind::Data, b_out);
    bl.wire(b_entry, b_port, DepKind::Data, a_out);

    let err = measure_depths(&d, &DepthTargets::default()).unwrap_err();
    assert!(err.to_string().contains("combinational cycle"));
}

#[test]
fn block_io_loop_elides_its_flop() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let mem = d.add_resource(Id::new("heap"), ResourceKind::Memory, 32);
    let q = d.add_resource(Id::new("outq"), ResourceKind::Fifo, 32);
    let lp = Builder::new(&mut d).add_scope(
        call,
        "body",
        ModuleKind::Loop { flop_needed: true },
    );
    let load = Builder::new(&mut d).add_atomic(
        lp,
        "load",
        ModuleKind::HeapRead { mem },
        Latency::ONE,
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "push",
        ModuleKind::FifoWrite { fifo: q },
        Latency::ZERO,
    );
    Builder::new(&mut d).declare_feedback(lp, load);

    let mut pass = <LoopFlop as ConstructPass>::from(&[]).unwrap();
    pass.run(&mut d).unwrap();
    assert!(matches!(
        d.graph[lp].module_kind(),
        Some(ModuleKind::Loop { flop_needed: false })
    ));
}

#[test]
fn loop_with_two_memory_accesses_keeps_its_flop() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let mem = d.add_resource(Id::new("heap"), ResourceKind::Memory, 32);
    let q = d.add_resource(Id::new("outq"), ResourceKind::Fifo, 32);
    let lp = Builder::new(&mut d).add_scope(
        call,
        "body",
        ModuleKind::Loop { flop_needed: true },
    );
    let load = Builder::new(&mut d).add_atomic(
        lp,
        "load_a",
        ModuleKind::HeapRead { mem },
        Latency::ONE,
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "load_b",
        ModuleKind::HeapRead { mem },
        Latency::ONE,
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "push",
        ModuleKind::FifoWrite { fifo: q },
        Latency::ZERO,
    );
    Builder::new(&mut d).declare_feedback(lp, load);

    let mut pass = <LoopFlop as ConstructPass>::from(&[]).unwrap();
    pass.run(&mut d).unwrap();
    assert!(matches!(
        d.graph[lp].module_kind(),
        Some(ModuleKind::Loop { flop_needed: true })
    ));
}

#[test]
fn qualifying_loop_without_feedback_keeps_its_flop() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let mem = d.add_resource(Id::new("heap"), ResourceKind::Memory, 32);
    let q = d.add_resource(Id::new("outq"), ResourceKind::Fifo, 32);
    let lp = Builder::new(&mut d).add_scope(
        call,
        "body",
        ModuleKind::Loop { flop_needed: true },
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "load",
        ModuleKind::HeapRead { mem },
        Latency::ONE,
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "push",
        ModuleKind::FifoWrite { fifo: q },
        Latency::ZERO,
    );

    let mut pass = <LoopFlop as ConstructPass>::from(&[]).unwrap();
    pass.run(&mut d).unwrap();
    assert!(matches!(
        d.graph[lp].module_kind(),
        Some(ModuleKind::Loop { flop_needed: true })
    ));
}

#[test]
fn task_writers_merge_under_arbitration() {
    let mut d = Design::new("chip");
    let pin = d.add_resource(Id::new("status"), ResourceKind::Pin, 8);
    let (_, alpha) = Builder::new(&mut d).add_task("alpha");
    let (_, beta) = Builder::new(&mut d).add_task("beta");
    Builder::new(&mut d).add_pin_write(alpha, "w0", pin, Value::new(8, false));
    Builder::new(&mut d).add_pin_write(beta, "w1", pin, Value::new(8, false));
    Builder::new(&mut d).add_pin_read(beta, "r0", pin, Value::new(8, false));

    let opts = ["pin-connector:arbitrate".to_string()];
    let mut pass = <PinConnector as ConstructPass>::from(&opts).unwrap();
    pass.run(&mut d).unwrap();

    let bus = d[pin].write_bus.expect("pin should be driven");
    let merge = d.graph.producer(bus);
    assert!(matches!(d.graph[merge].kind, CompKind::Prim(Prim::Or)));
    assert_eq!(d.graph[merge].owner, Some(d.top));

    // Exactly one resolution point for the pin.
    let or_count = d
        .graph
        .subtree(d.top)
        .into_iter()
        .filter(|&c| matches!(d.graph[c].kind, CompKind::Prim(Prim::Or)))
        .count();
    assert_eq!(or_count, 1);

    // The reader's lifted port observes the merged bus.
    assert_eq!(d[pin].read_ports.len(), 1);
    let port = d[pin].read_ports[0];
    assert_eq!(d.graph[port].bus, Some(bus));
}

#[test]
fn task_writers_without_arbitration_are_fatal() {
    let mut d = Design::new("chip");
    let pin = d.add_resource(Id::new("status"), ResourceKind::Pin, 8);
    let (_, alpha) = Builder::new(&mut d).add_task("alpha");
    let (_, beta) = Builder::new(&mut d).add_task("beta");
    Builder::new(&mut d).add_pin_write(alpha, "w0", pin, Value::new(8, false));
    Builder::new(&mut d).add_pin_write(beta, "w1", pin, Value::new(8, false));

    let mut pass = <PinConnector as ConstructPass>::from(&[]).unwrap();
    let err = pass.run(&mut d).unwrap_err();
    assert!(err.to_string().contains("arbitration"));
}

#[test]
fn shared_resource_is_flagged_arbitrated() {
    let mut d = Design::new("chip");
    let q = d.add_resource(Id::new("events"), ResourceKind::Fifo, 32);
    let solo = d.add_resource(Id::new("scratch"), ResourceKind::Memory, 32);
    let (_, alpha) = Builder::new(&mut d).add_task("alpha");
    let (_, beta) = Builder::new(&mut d).add_task("beta");
    Builder::new(&mut d).add_atomic(
        alpha,
        "put",
        ModuleKind::FifoWrite { fifo: q },
        Latency::ZERO,
    );
    Builder::new(&mut d).add_atomic(
        beta,
        "get",
        ModuleKind::FifoRead { fifo: q },
        Latency::open(0),
    );
    Builder::new(&mut d).add_atomic(
        alpha,
        "spill",
        ModuleKind::HeapWrite { mem: solo },
        Latency::ONE,
    );

    let mut pass = AccessCounter::default();
    pass.run(&mut d).unwrap();
    assert!(d[q].arbitrated);
    assert!(!d[solo].arbitrated);
}

#[test]
fn callees_order_before_their_callers() {
    let mut d = Design::new("chip");
    let (main, call) = Builder::new(&mut d).add_task("main");
    let (helper, _) = Builder::new(&mut d).add_task("helper");
    let site = Builder::new(&mut d).add_task_call(
        call,
        "invoke",
        helper,
        Latency::open(1),
    );
    let arg = Builder::new(&mut d).add_data_port(
        site,
        "arg0",
        Value::new(8, false),
    );
    let c0 = link(&mut d, call, "c0", 1, None);
    let c0_out = d.graph.result_bus(c0).unwrap();
    let entry = d.graph[site].entries[0];
    Builder::new(&mut d).wire(entry, arg, DepKind::Data, c0_out);

    let declared: Vec<_> =
        TaskOrder::new(&d, Order::Declared).unwrap().iter().collect();
    assert_eq!(declared, vec![main, helper]);
    let post: Vec<_> =
        TaskOrder::new(&d, Order::Post).unwrap().iter().collect();
    assert_eq!(post, vec![helper, main]);
    let pre: Vec<_> =
        TaskOrder::new(&d, Order::Pre).unwrap().iter().collect();
    assert_eq!(pre, vec![main, helper]);

    // The call site is opaque to measurement: one gate of its own on top
    // of whatever feeds its arguments.
    let report = measure_depths(&d, &DepthTargets::default()).unwrap();
    assert_eq!(report.design_max, 2);
}

#[test]
fn recursive_task_calls_are_rejected() {
    let mut d = Design::new("chip");
    let (spin, call) = Builder::new(&mut d).add_task("spin");
    Builder::new(&mut d).add_task_call(call, "again", spin, Latency::open(1));

    let err = TaskOrder::new(&d, Order::Post).unwrap_err();
    assert!(err.to_string().contains("recursive call chain"));
}

#[test]
fn pipeline_pass_annotates_and_inserts() {
    let mut d = Design::new("chip");
    let (task, call) = Builder::new(&mut d).add_task("main");
    chain(&mut d, call, 6);

    let opts = [
        "pipeline:enable".to_string(),
        "pipeline:gate-depth=3".to_string(),
    ];
    let mut pass = <Pipeline as ConstructPass>::from(&opts).unwrap();
    pass.run(&mut d).unwrap();

    assert_eq!(count_regs(&d, call), 1);
    assert_eq!(d.max_gate_depth, 3);
    assert_eq!(d.unbreakable_gate_depth, 1);
    assert_eq!(d[task].max_gate_depth, 3);
}

#[test]
fn auto_level_divides_the_measured_maximum() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    chain(&mut d, call, 6);

    let opts = [
        "pipeline:enable".to_string(),
        "pipeline:auto-level=2".to_string(),
    ];
    let mut pass = <Pipeline as ConstructPass>::from(&opts).unwrap();
    pass.run(&mut d).unwrap();

    // Six gates split into two stages resolves to a target of three.
    assert_eq!(count_regs(&d, call), 1);
    assert_eq!(d.max_gate_depth, 3);
}

#[test]
fn scope_target_overrides_the_global_one() {
    let mut d = Design::new("chip");
    let (_, call) = Builder::new(&mut d).add_task("main");
    let inner = Builder::new(&mut d).add_scope(call, "kernel", ModuleKind::Block);
    Builder::new(&mut d).set_search_label(inner, "kernel");
    chain(&mut d, inner, 6);

    let opts = [
        "pipeline:enable".to_string(),
        "pipeline:scope-depths=kernel=3".to_string(),
    ];
    let mut pass = <Pipeline as ConstructPass>::from(&opts).unwrap();
    pass.run(&mut d).unwrap();

    assert_eq!(count_regs(&d, inner), 1);
    assert_eq!(d.max_gate_depth, 3);
}

#[test]
fn schedule_flow_runs_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut d = Design::new("chip");
    let pin = d.add_resource(Id::new("status"), ResourceKind::Pin, 8);
    let mem = d.add_resource(Id::new("heap"), ResourceKind::Memory, 32);
    let q = d.add_resource(Id::new("events"), ResourceKind::Fifo, 32);
    let (_, alpha) = Builder::new(&mut d).add_task("alpha");
    let (_, beta) = Builder::new(&mut d).add_task("beta");
    chain(&mut d, alpha, 6);
    let lp = Builder::new(&mut d).add_scope(
        beta,
        "scan",
        ModuleKind::Loop { flop_needed: true },
    );
    let load = Builder::new(&mut d).add_atomic(
        lp,
        "load",
        ModuleKind::HeapRead { mem },
        Latency::ONE,
    );
    Builder::new(&mut d).add_atomic(
        lp,
        "push",
        ModuleKind::FifoWrite { fifo: q },
        Latency::ZERO,
    );
    Builder::new(&mut d).declare_feedback(lp, load);
    Builder::new(&mut d).add_pin_write(alpha, "w0", pin, Value::new(8, false));
    Builder::new(&mut d).add_pin_write(beta, "w1", pin, Value::new(8, false));

    let pm = PassManager::default_passes().unwrap();
    let extra = [
        "pin-connector:arbitrate".to_string(),
        "pipeline:enable".to_string(),
        "pipeline:gate-depth=3".to_string(),
    ];
    pm.execute_plan(
        &mut d,
        &["schedule".to_string()],
        &[],
        &[],
        &extra,
        false,
    )
    .unwrap();

    assert!(d[pin].arbitrated);
    assert!(d[pin].write_bus.is_some());
    assert!(matches!(
        d.graph[lp].module_kind(),
        Some(ModuleKind::Loop { flop_needed: false })
    ));
    assert_eq!(count_regs(&d, alpha), 1);
    assert!(d.max_gate_depth <= 3.max(d.unbreakable_gate_depth));
}

//! Convenience methods for constructing well-formed graph structure.
//!
//! The builder owns a mutable borrow of the design so every generated
//! component, bus, and boundary pairing goes through the design's name
//! generator and lands in a consistent state. Misuse (adding a child to a
//! primitive, treating an atomic module as a scope) is a programmer error
//! and panics.

use crate::idx::{
    BusIdx, CompIdx, EntryIdx, ExitIdx, PortIdx, ResourceIdx, TaskIdx,
};
use crate::structure::{
    CompKind, DepKind, Dependency, ExitTag, Module, ModuleKind, PortTag, Prim,
};
use crate::{Design, Id, Latency, Value};
use sepal_utils::bits_needed_for;

pub struct Builder<'a> {
    pub design: &'a mut Design,
}

impl<'a> Builder<'a> {
    pub fn new(design: &'a mut Design) -> Self {
        Self { design }
    }

    // ------------------------- scopes -------------------------

    /// Create a composite scope (block, branch, loop, or call) under
    /// `parent`, complete with its input-side boundary buffer and image
    /// buses for the three control ports.
    pub fn add_scope(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        kind: ModuleKind,
    ) -> CompIdx {
        assert!(
            !kind.is_atomic(),
            "atomic module kinds are created with add_atomic"
        );
        let name = self.design.gen_name(prefix);
        let module = self.design.graph.add_component(
            name,
            None,
            CompKind::Module(Module::new(kind)),
        );
        self.design.graph.add_child(parent, module);

        let inbuf_name = self.design.gen_name(format!("{name}_inbuf"));
        let inbuf = self.design.graph.add_component(
            inbuf_name,
            None,
            CompKind::Prim(Prim::InBuf { depth: 0 }),
        );
        self.design.graph.add_child(module, inbuf);
        let images = self.design.graph.add_exit(
            inbuf,
            ExitTag::Done,
            Latency::ZERO,
        );

        let go_name = self.design.gen_name(format!("{name}_go"));
        let go_image = self.design.graph.add_done_bus(images, go_name);
        self.pair(self.design.graph[module].go_port(), go_image);
        let clk_name = self.design.gen_name(format!("{name}_clk"));
        let clk_image = self.design.graph.add_data_bus(
            images,
            clk_name,
            Value::default(),
        );
        self.pair(self.design.graph[module].clock_port(), clk_image);
        let reset_name = self.design.gen_name(format!("{name}_reset"));
        let reset_image = self.design.graph.add_data_bus(
            images,
            reset_name,
            Value::default(),
        );
        self.pair(self.design.graph[module].reset_port(), reset_image);

        self.design.graph[module]
            .kind
            .as_module_mut()
            .unwrap()
            .inbuf = Some(inbuf);
        module
    }

    /// Add a data input to a composite scope: an outer port twinned with a
    /// fresh image bus inside. Internal consumers depend on the image bus.
    pub fn add_module_port(
        &mut self,
        module: CompIdx,
        prefix: &str,
        value: Value,
    ) -> (PortIdx, BusIdx) {
        let inbuf = self
            .design
            .graph[module]
            .as_module()
            .and_then(|m| m.inbuf)
            .expect("data ports require a scope with a boundary buffer");
        let port = self.design.graph.add_port(
            module,
            Id::new(prefix),
            PortTag::Data,
            value,
        );
        let bus_name = self.design.gen_name(format!(
            "{}_{}",
            self.design.graph[module].name, prefix
        ));
        let images = self.design.graph[inbuf].exits[0];
        let image =
            self.design.graph.add_data_bus(images, bus_name, value);
        self.pair(port, image);
        (port, image)
    }

    /// Out-of-band scope input twinned with an image bus, used when
    /// lifting pin reads through a boundary.
    pub fn add_module_sideband(
        &mut self,
        module: CompIdx,
        prefix: &str,
        value: Value,
    ) -> (PortIdx, BusIdx) {
        let inbuf = self
            .design
            .graph[module]
            .as_module()
            .and_then(|m| m.inbuf)
            .expect("sideband ports require a scope with a boundary buffer");
        let port = self.design.graph.add_port(
            module,
            Id::new(prefix),
            PortTag::Sideband,
            value,
        );
        let bus_name = self.design.gen_name(format!(
            "{}_{}",
            self.design.graph[module].name, prefix
        ));
        let images = self.design.graph[inbuf].exits[0];
        let image =
            self.design.graph.add_data_bus(images, bus_name, value);
        self.pair(port, image);
        (port, image)
    }

    /// Add an exit to a composite scope together with the output-side
    /// buffer that realizes it inside the module.
    pub fn add_module_exit(
        &mut self,
        module: CompIdx,
        latency: Latency,
    ) -> ExitIdx {
        let name = self.design.graph[module].name;
        let exit =
            self.design.graph.add_exit(module, ExitTag::Done, latency);
        let done_name = self.design.gen_name(format!("{name}_done"));
        let done = self.design.graph.add_done_bus(exit, done_name);

        let buf_name = self.design.gen_name(format!("{name}_outbuf"));
        let outbuf = self.design.graph.add_component(
            buf_name,
            None,
            CompKind::Prim(Prim::OutBuf),
        );
        self.design.graph.add_child(module, outbuf);
        self.design.graph.add_exit(outbuf, ExitTag::Done, Latency::ZERO);
        self.design.graph.add_entry(outbuf, None);
        self.design.graph[exit].buf = Some(outbuf);
        self.pair(self.design.graph[outbuf].go_port(), done);
        exit
    }

    /// Out-of-band exit carrying lifted pin writes. It has no done bus;
    /// data buses are added through [`Builder::connect_output`].
    pub fn add_sideband_exit(&mut self, module: CompIdx) -> ExitIdx {
        let name = self.design.graph[module].name;
        let exit = self.design.graph.add_exit(
            module,
            ExitTag::Sideband,
            Latency::ZERO,
        );
        let buf_name = self.design.gen_name(format!("{name}_sideband"));
        let outbuf = self.design.graph.add_component(
            buf_name,
            None,
            CompKind::Prim(Prim::OutBuf),
        );
        self.design.graph.add_child(module, outbuf);
        self.design.graph.add_exit(outbuf, ExitTag::Done, Latency::ZERO);
        self.design.graph.add_entry(outbuf, None);
        self.design.graph[exit].buf = Some(outbuf);
        exit
    }

    /// Drive a module exit's done from a bus inside the module.
    pub fn set_exit_driver(&mut self, exit: ExitIdx, done: BusIdx) {
        let outbuf = self.design.graph[exit]
            .buf
            .expect("exit has no output buffer");
        let go = self.design.graph[outbuf].go_port();
        let entry = self.design.graph[outbuf].entries[0];
        self.wire(entry, go, DepKind::Control, done);
    }

    /// Expose `internal` outside the module as a fresh data bus on `exit`.
    pub fn connect_output(
        &mut self,
        exit: ExitIdx,
        prefix: &str,
        internal: BusIdx,
    ) -> BusIdx {
        let module = self.design.graph[exit].owner;
        let outbuf = self.design.graph[exit]
            .buf
            .expect("exit has no output buffer");
        let value = self.design.graph[internal].value;
        let bus_name = self.design.gen_name(format!(
            "{}_{}",
            self.design.graph[module].name, prefix
        ));
        let outer = self.design.graph.add_data_bus(exit, bus_name, value);
        let port = self.design.graph.add_port(
            outbuf,
            Id::new(prefix),
            PortTag::Data,
            value,
        );
        self.pair(port, outer);
        let entry = self.design.graph[outbuf].entries[0];
        self.wire(entry, port, DepKind::Data, internal);
        outer
    }

    // ------------------------- atomics ------------------------

    /// Create an atomic access idiom. It has no internals; its intrinsic
    /// depth comes from its kind and its timing from `latency`.
    pub fn add_atomic(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        kind: ModuleKind,
        latency: Latency,
    ) -> CompIdx {
        assert!(kind.is_atomic(), "composite kinds are created with add_scope");
        let name = self.design.gen_name(prefix);
        let comp = self.design.graph.add_component(
            name,
            None,
            CompKind::Module(Module::new(kind)),
        );
        self.design.graph.add_child(parent, comp);
        let exit = self.design.graph.add_exit(comp, ExitTag::Done, latency);
        let done_name = self.design.gen_name(format!("{name}_done"));
        self.design.graph.add_done_bus(exit, done_name);
        self.design.graph.add_entry(comp, None);
        comp
    }

    /// Cross-task invocation idiom.
    pub fn add_task_call(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        task: TaskIdx,
        latency: Latency,
    ) -> CompIdx {
        self.add_atomic(parent, prefix, ModuleKind::TaskCall { task }, latency)
    }

    // ------------------------ primitives ----------------------

    fn add_prim(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        prim: Prim,
        latency: Latency,
    ) -> CompIdx {
        let name = self.design.gen_name(prefix);
        let comp =
            self.design.graph.add_component(name, None, CompKind::Prim(prim));
        self.design.graph.add_child(parent, comp);
        let exit = self.design.graph.add_exit(comp, ExitTag::Done, latency);
        let done_name = self.design.gen_name(format!("{name}_done"));
        self.design.graph.add_done_bus(exit, done_name);
        comp
    }

    /// Combinational operation with `inputs` data ports and one result.
    pub fn add_op(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        depth: u32,
        width: u32,
        inputs: usize,
    ) -> CompIdx {
        let comp = self.add_prim(
            parent,
            prefix,
            Prim::Op { depth },
            Latency::ZERO,
        );
        let value = Value::new(width, false);
        for i in 0..inputs {
            self.design.graph.add_port(
                comp,
                Id::new(format!("in{i}")),
                PortTag::Data,
                value,
            );
        }
        self.add_result(comp, value);
        self.design.graph.add_entry(comp, None);
        comp
    }

    /// Or-merge over `inputs` operands.
    pub fn add_or(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        width: u32,
        inputs: usize,
    ) -> CompIdx {
        let comp = self.add_prim(parent, prefix, Prim::Or, Latency::ZERO);
        let value = Value::new(width, false);
        for i in 0..inputs {
            self.design.graph.add_port(
                comp,
                Id::new(format!("in{i}")),
                PortTag::Data,
                value,
            );
        }
        self.add_result(comp, value);
        self.design.graph.add_entry(comp, None);
        comp
    }

    /// Multiplexer selecting among `inputs` operands.
    pub fn add_mux(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        width: u32,
        inputs: usize,
    ) -> CompIdx {
        let comp = self.add_prim(parent, prefix, Prim::Mux, Latency::ZERO);
        let sel_width = bits_needed_for(inputs.max(1) as u64) as u32;
        self.design.graph.add_port(
            comp,
            Id::new("sel"),
            PortTag::Data,
            Value::new(sel_width, false),
        );
        let value = Value::new(width, false);
        for i in 0..inputs {
            self.design.graph.add_port(
                comp,
                Id::new(format!("in{i}")),
                PortTag::Data,
                value,
            );
        }
        self.add_result(comp, value);
        self.design.graph.add_entry(comp, None);
        comp
    }

    /// Enabled flop. Its result carries the input's shape one clock later.
    pub fn add_reg(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        value: Value,
        reset: bool,
    ) -> CompIdx {
        let comp = self.add_prim(
            parent,
            prefix,
            Prim::Reg { reset },
            Latency::ONE,
        );
        self.design.graph.add_port(
            comp,
            Id::new("in"),
            PortTag::Data,
            value.shape(),
        );
        self.add_result(comp, value.shape());
        self.design.graph.add_entry(comp, None);
        comp
    }

    /// Constant driver. Its result bus carries the constant value so
    /// downstream analyses can recognize it without chasing the producer.
    pub fn add_constant(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        value: Value,
    ) -> CompIdx {
        assert!(value.is_constant(), "constant primitive needs a constant value");
        let comp =
            self.add_prim(parent, prefix, Prim::Constant, Latency::ZERO);
        self.add_result(comp, value);
        comp
    }

    /// Transparent latch idiom.
    pub fn add_latch(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        value: Value,
    ) -> CompIdx {
        let comp = self.add_atomic(
            parent,
            prefix,
            ModuleKind::Latch,
            Latency::ZERO,
        );
        self.design.graph.add_port(
            comp,
            Id::new("in"),
            PortTag::Data,
            value.shape(),
        );
        self.add_result(comp, value.shape());
        comp
    }

    /// Direct pin read. The connector later gives it a sideband port fed
    /// from the pin's resolved write bus.
    pub fn add_pin_read(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        pin: ResourceIdx,
        value: Value,
    ) -> CompIdx {
        let comp = self.add_prim(
            parent,
            prefix,
            Prim::PinRead { pin },
            Latency::ZERO,
        );
        self.add_result(comp, value);
        comp
    }

    /// Direct pin write. Its result bus carries the written value masked
    /// by go, which is what the connector merges when several writers
    /// share a pin.
    pub fn add_pin_write(
        &mut self,
        parent: CompIdx,
        prefix: &str,
        pin: ResourceIdx,
        value: Value,
    ) -> CompIdx {
        let comp = self.add_prim(
            parent,
            prefix,
            Prim::PinWrite { pin },
            Latency::ZERO,
        );
        self.design.graph.add_port(
            comp,
            Id::new("in"),
            PortTag::Data,
            value,
        );
        self.add_result(comp, value.shape());
        self.design.graph.add_entry(comp, None);
        comp
    }

    // ------------------------- tasks --------------------------

    /// Register a task and create its top-level call under the design
    /// scope. The call's ports are fed by nothing, which is what makes a
    /// task a clean depth boundary.
    pub fn add_task(&mut self, name: &str) -> (TaskIdx, CompIdx) {
        let top = self.design.top;
        let call = self.add_scope(top, name, ModuleKind::Call);
        let task_name = self.design.graph[call].name;
        let task = self.design.add_task(task_name, call);
        (task, call)
    }

    // ------------------- ports, deps, wiring ------------------

    pub fn add_data_port(
        &mut self,
        comp: CompIdx,
        prefix: &str,
        value: Value,
    ) -> PortIdx {
        self.design.graph.add_port(
            comp,
            Id::new(prefix),
            PortTag::Data,
            value,
        )
    }

    /// Out-of-band input on a leaf component, used for lifted pin wiring.
    pub fn add_sideband_port(
        &mut self,
        comp: CompIdx,
        prefix: &str,
        value: Value,
    ) -> PortIdx {
        self.design.graph.add_port(
            comp,
            Id::new(prefix),
            PortTag::Sideband,
            value,
        )
    }

    /// Add a result bus to a component's first exit.
    pub fn add_result(&mut self, comp: CompIdx, value: Value) -> BusIdx {
        let exit = self.design.graph[comp].exits[0];
        let bus_name = self
            .design
            .gen_name(format!("{}_out", self.design.graph[comp].name));
        self.design.graph.add_data_bus(exit, bus_name, value)
    }

    pub fn add_entry(
        &mut self,
        comp: CompIdx,
        driving_exit: Option<ExitIdx>,
    ) -> EntryIdx {
        self.design.graph.add_entry(comp, driving_exit)
    }

    pub fn add_dep(
        &mut self,
        entry: EntryIdx,
        port: PortIdx,
        kind: DepKind,
        bus: BusIdx,
    ) {
        self.design
            .graph
            .add_dependency(entry, port, Dependency::new(kind, bus));
    }

    pub fn connect(&mut self, port: PortIdx, bus: BusIdx) {
        self.design.graph.connect(port, bus);
    }

    /// Connect `port` to `bus` and record the matching dependency.
    pub fn wire(
        &mut self,
        entry: EntryIdx,
        port: PortIdx,
        kind: DepKind,
        bus: BusIdx,
    ) {
        self.connect(port, bus);
        self.add_dep(entry, port, kind, bus);
    }

    /// Put `comp` in `scope`'s control domain: wire its go, clock, and
    /// reset ports to the scope's image buses under `entry`.
    pub fn wire_control(
        &mut self,
        entry: EntryIdx,
        comp: CompIdx,
        scope: CompIdx,
    ) {
        let graph = &self.design.graph;
        let go = graph.go_image(scope).expect("scope has no go image");
        let clk = graph.clock_image(scope).expect("scope has no clock image");
        let reset = graph.reset_image(scope).expect("scope has no reset image");
        let go_port = graph[comp].go_port();
        let clk_port = graph[comp].clock_port();
        let reset_port = graph[comp].reset_port();
        self.wire(entry, go_port, DepKind::Control, go);
        self.wire(entry, clk_port, DepKind::Clock, clk);
        self.wire(entry, reset_port, DepKind::Reset, reset);
    }

    pub fn declare_feedback(&mut self, module: CompIdx, point: CompIdx) {
        self.design.graph.declare_feedback(module, point);
    }

    pub fn set_search_label(&mut self, module: CompIdx, label: &str) {
        self.design.graph[module]
            .kind
            .as_module_mut()
            .expect("search labels go on composite scopes")
            .search_label = Some(Id::new(label));
    }

    fn pair(&mut self, port: PortIdx, bus: BusIdx) {
        self.design.graph.pair_boundary(port, bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_boundary_is_twinned() {
        let mut d = Design::new("chip");
        let mut b = Builder::new(&mut d);
        let (_, call) = b.add_task("main");
        let (port, image) =
            b.add_module_port(call, "x", Value::new(8, false));
        assert_eq!(d.graph[port].peer, Some(image));
        assert_eq!(d.graph[image].peer, Some(port));
        assert!(d.graph.go_image(call).is_some());
    }

    #[test]
    fn module_exit_gets_an_output_buffer() {
        let mut d = Design::new("chip");
        let mut b = Builder::new(&mut d);
        let (_, call) = b.add_task("main");
        let exit = b.add_module_exit(call, Latency::ONE);
        let buf = d.graph[exit].buf.expect("buffer expected");
        let done = d.graph[exit].done.expect("done expected");
        assert_eq!(d.graph.done_bus(call), Some(done));
        assert_eq!(d.graph[d.graph[buf].go_port()].peer, Some(done));
        assert_eq!(d.graph[buf].owner, Some(call));

        // Driving the exit lands on the buffer's go, behind the peer.
        let src = Builder::new(&mut d).add_op(call, "ready", 1, 1, 1);
        let src_done = d.graph.done_bus(src).unwrap();
        Builder::new(&mut d).set_exit_driver(exit, src_done);
        let go = d.graph[buf].go_port();
        let entry = d.graph[buf].entries[0];
        assert_eq!(d.graph[entry].dependencies(go)[0].bus, src_done);
    }

    #[test]
    fn mux_selector_is_sized_for_its_inputs() {
        let mut d = Design::new("chip");
        let mut b = Builder::new(&mut d);
        let (_, call) = b.add_task("main");
        let mux = b.add_mux(call, "pick", 8, 4);
        let ports: Vec<_> = d.graph[mux].data_ports().collect();
        assert_eq!(ports.len(), 5);
        assert_eq!(d.graph[ports[0]].value.width(), 2);
        assert_eq!(d.graph[ports[1]].value.width(), 8);
        let out = d.graph.result_bus(mux).unwrap();
        assert_eq!(d.graph[out].value.width(), 8);
    }

    #[test]
    fn wire_records_both_views() {
        let mut d = Design::new("chip");
        let mut b = Builder::new(&mut d);
        let (_, call) = b.add_task("main");
        let a = b.add_op(call, "a", 1, 8, 1);
        let sink = b.add_op(call, "sink", 1, 8, 1);
        let bus = d.graph.result_bus(a).unwrap();
        let entry = d.graph[sink].entries[0];
        let port = d.graph[sink].data_ports().next().unwrap();
        let mut b = Builder::new(&mut d);
        b.wire(entry, port, DepKind::Data, bus);
        assert_eq!(d.graph[port].bus, Some(bus));
        assert_eq!(d.graph[entry].dependencies(port)[0].bus, bus);
    }
}

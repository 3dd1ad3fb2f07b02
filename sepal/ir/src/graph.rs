//! Arena storage for the dependency graph and the mutation primitives
//! passes are allowed to use.
//!
//! All nodes live in [`IndexedMap`] arenas owned by a single [`Graph`];
//! cross-references between nodes are index handles, never pointers. Any
//! structural mutation invalidates previously computed gate-depth
//! annotations, so analyses re-measure after applying a plan.

use crate::idx::{BusIdx, CompIdx, EntryIdx, ExitIdx, PortIdx};
use crate::structure::{
    Bus, CompKind, Component, Dependency, Entry, Exit, ExitTag, Module,
    ModuleKind, Port, PortTag, Prim,
};
use crate::{Id, Latency, Value};
use ahash::HashMap as AHashMap;
use ahash::HashMapExt;
use sepal_idx::maps::IndexedMap;
use sepal_utils::bits_needed_for;
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Default)]
pub struct Graph {
    comps: IndexedMap<CompIdx, Component>,
    ports: IndexedMap<PortIdx, Port>,
    buses: IndexedMap<BusIdx, Bus>,
    exits: IndexedMap<ExitIdx, Exit>,
    entries: IndexedMap<EntryIdx, Entry>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------- construction -------------------------

    /// Create a component of the given kind with its three implicit
    /// control ports. Data ports, exits, and entries are added separately.
    pub(crate) fn add_component(
        &mut self,
        name: Id,
        owner: Option<CompIdx>,
        kind: CompKind,
    ) -> CompIdx {
        let idx = self.comps.peek_next_idx();
        let go = self.ports.push(Port {
            name: Id::new("go"),
            tag: PortTag::Go,
            owner: idx,
            bus: None,
            peer: None,
            value: Value::default(),
        });
        let clock = self.ports.push(Port {
            name: Id::new("clk"),
            tag: PortTag::Clock,
            owner: idx,
            bus: None,
            peer: None,
            value: Value::default(),
        });
        let reset = self.ports.push(Port {
            name: Id::new("reset"),
            tag: PortTag::Reset,
            owner: idx,
            bus: None,
            peer: None,
            value: Value::default(),
        });
        let pushed =
            self.comps.push(Component::new(name, owner, kind, go, clock, reset));
        debug_assert_eq!(pushed, idx);
        idx
    }

    pub(crate) fn add_port(
        &mut self,
        comp: CompIdx,
        name: Id,
        tag: PortTag,
        value: Value,
    ) -> PortIdx {
        let port = self.ports.push(Port {
            name,
            tag,
            owner: comp,
            bus: None,
            peer: None,
            value,
        });
        self.comps[comp].push_port(port);
        port
    }

    pub(crate) fn add_exit(
        &mut self,
        comp: CompIdx,
        tag: ExitTag,
        latency: Latency,
    ) -> ExitIdx {
        let exit = self.exits.push(Exit {
            tag,
            owner: comp,
            done: None,
            data: SmallVec::new(),
            latency,
            buf: None,
        });
        self.comps[comp].exits.push(exit);
        exit
    }

    pub(crate) fn add_done_bus(&mut self, exit: ExitIdx, name: Id) -> BusIdx {
        let bus = self.buses.push(Bus {
            name,
            owner: exit,
            peer: None,
            value: Value::default(),
        });
        debug_assert!(self.exits[exit].done.is_none());
        self.exits[exit].done = Some(bus);
        bus
    }

    pub(crate) fn add_data_bus(
        &mut self,
        exit: ExitIdx,
        name: Id,
        value: Value,
    ) -> BusIdx {
        let bus = self.buses.push(Bus {
            name,
            owner: exit,
            peer: None,
            value,
        });
        self.exits[exit].data.push(bus);
        bus
    }

    pub(crate) fn add_entry(
        &mut self,
        comp: CompIdx,
        driving_exit: Option<ExitIdx>,
    ) -> EntryIdx {
        let entry = self.entries.push(Entry::new(comp, driving_exit));
        self.comps[comp].entries.push(entry);
        entry
    }

    // --------------------------- mutation ---------------------------

    /// Wire `port` to `bus`. Connections are the resolved physical wiring;
    /// scheduling constraints are tracked separately as dependencies.
    pub fn connect(&mut self, port: PortIdx, bus: BusIdx) {
        self.ports[port].bus = Some(bus);
    }

    pub fn disconnect(&mut self, port: PortIdx) -> Option<BusIdx> {
        self.ports[port].bus.take()
    }

    /// Twin a module-boundary port and its image bus so traversals can
    /// follow depth across the boundary in either direction.
    pub(crate) fn pair_boundary(&mut self, port: PortIdx, bus: BusIdx) {
        self.ports[port].peer = Some(bus);
        self.buses[bus].peer = Some(port);
    }

    pub fn add_dependency(
        &mut self,
        entry: EntryIdx,
        port: PortIdx,
        dep: Dependency,
    ) {
        self.entries[entry].add_dependency(port, dep);
    }

    /// Remove the dependency at `pos` on `port` under `entry`.
    pub fn zap_dependency(
        &mut self,
        entry: EntryIdx,
        port: PortIdx,
        pos: usize,
    ) -> Dependency {
        self.entries[entry].zap_dependency(port, pos)
    }

    /// Attach `child` at the end of `parent`'s sequence.
    pub fn add_child(&mut self, parent: CompIdx, child: CompIdx) {
        self.comps[child].owner = Some(parent);
        self.module_mut(parent).children.push(child);
    }

    /// Attach or move `child` so it sits immediately before `anchor` when
    /// `parent` is an ordered block, otherwise at the end of the sequence.
    pub fn insert_child_before(
        &mut self,
        parent: CompIdx,
        anchor: CompIdx,
        child: CompIdx,
    ) {
        self.comps[child].owner = Some(parent);
        let module = self.module_mut(parent);
        module.children.retain(|&c| c != child);
        if module.kind == ModuleKind::Block {
            let at = module
                .children
                .iter()
                .position(|&c| c == anchor)
                .unwrap_or(module.children.len());
            module.children.insert(at, child);
        } else {
            module.children.push(child);
        }
    }

    pub fn declare_feedback(&mut self, module: CompIdx, point: CompIdx) {
        self.module_mut(module).feedback_points.push(point);
    }

    fn module_mut(&mut self, comp: CompIdx) -> &mut Module {
        self.comps[comp]
            .kind
            .as_module_mut()
            .expect("composite operation on a primitive")
    }

    // --------------------------- queries ----------------------------

    /// The component producing `bus`.
    pub fn producer(&self, bus: BusIdx) -> CompIdx {
        self.exits[self.buses[bus].owner].owner
    }

    /// The exit owning `bus`.
    pub fn owner_exit(&self, bus: BusIdx) -> ExitIdx {
        self.buses[bus].owner
    }

    /// A bus whose value never changes at runtime: either its value is a
    /// compile-time constant or it is driven by a constant primitive.
    pub fn is_constant_bus(&self, bus: BusIdx) -> bool {
        self.buses[bus].value.is_constant()
            || matches!(
                self.comps[self.producer(bus)].kind,
                CompKind::Prim(Prim::Constant)
            )
    }

    /// Every `(entry, port, position)` holding a dependency on `bus`.
    /// Consumer lists are derived by scanning, never stored, so they can
    /// never go stale across rewrites.
    pub fn dependents_of(
        &self,
        bus: BusIdx,
    ) -> Vec<(EntryIdx, PortIdx, usize)> {
        let mut out = Vec::new();
        for (entry_idx, entry) in self.entries.iter() {
            for (port, deps) in entry.iter() {
                for (pos, dep) in deps.iter().enumerate() {
                    if dep.bus == bus {
                        out.push((entry_idx, port, pos));
                    }
                }
            }
        }
        out
    }

    /// Ports physically wired to `bus`.
    pub fn connected_ports(&self, bus: BusIdx) -> Vec<PortIdx> {
        self.ports
            .iter()
            .filter(|(_, p)| p.bus == Some(bus))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Image bus twinned with a module boundary port.
    pub fn image_of(&self, port: PortIdx) -> Option<BusIdx> {
        self.ports[port].peer
    }

    pub fn go_image(&self, module: CompIdx) -> Option<BusIdx> {
        self.image_of(self.comps[module].go_port())
    }

    pub fn clock_image(&self, module: CompIdx) -> Option<BusIdx> {
        self.image_of(self.comps[module].clock_port())
    }

    pub fn reset_image(&self, module: CompIdx) -> Option<BusIdx> {
        self.image_of(self.comps[module].reset_port())
    }

    /// First data bus of the component's first exit, the conventional slot
    /// for a single-result component.
    pub fn result_bus(&self, comp: CompIdx) -> Option<BusIdx> {
        self.comps[comp]
            .exits
            .first()
            .and_then(|&e| self.exits[e].data.first().copied())
    }

    pub fn done_bus(&self, comp: CompIdx) -> Option<BusIdx> {
        self.comps[comp].exits.first().and_then(|&e| self.exits[e].done)
    }

    pub fn first_entry(&self, comp: CompIdx) -> Option<EntryIdx> {
        self.comps[comp].entries.first().copied()
    }

    /// Dotted owner path for diagnostics, e.g. `top.outer.body.add3`.
    pub fn path(&self, comp: CompIdx) -> String {
        let mut names = Vec::new();
        let mut cur = Some(comp);
        while let Some(c) = cur {
            names.push(self.comps[c].name.as_str());
            cur = self.comps[c].owner;
        }
        names.reverse();
        names.join(".")
    }

    pub fn components(
        &self,
    ) -> impl Iterator<Item = (CompIdx, &Component)> + '_ {
        self.comps.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntryIdx, &Entry)> + '_ {
        self.entries.iter()
    }

    /// Whether `bus` denotes a live arena slot.
    pub fn contains_bus(&self, bus: BusIdx) -> bool {
        self.buses.contains(bus)
    }

    /// Whether `exit` denotes a live arena slot.
    pub fn contains_exit(&self, exit: ExitIdx) -> bool {
        self.exits.contains(exit)
    }

    // -------------------------- gate depth --------------------------

    /// Intrinsic combinational depth a signal accumulates passing through
    /// this component to its exits. Registers and constants contribute
    /// nothing; a mux grows with the log of its selectable input count;
    /// atomic access idioms report the depth of their canonical expansion.
    pub fn exit_gate_depth(&self, comp: CompIdx) -> u32 {
        match &self.comps[comp].kind {
            CompKind::Prim(p) => match p {
                Prim::Op { depth } => *depth,
                Prim::Or => 1,
                Prim::Mux => {
                    let inputs = self.comps[comp]
                        .data_ports()
                        .count()
                        .saturating_sub(1);
                    if inputs < 2 {
                        0
                    } else {
                        bits_needed_for(inputs as u64) as u32 + 1
                    }
                }
                Prim::InBuf { depth } => *depth,
                Prim::Reg { .. }
                | Prim::Constant
                | Prim::OutBuf
                | Prim::PinRead { .. }
                | Prim::PinWrite { .. } => 0,
            },
            CompKind::Module(m) => match m.kind {
                ModuleKind::Latch => 2,
                ModuleKind::TaskCall { .. }
                | ModuleKind::SimplePinAccess { .. }
                | ModuleKind::ArrayWrite { .. }
                | ModuleKind::HeapWrite { .. } => 1,
                ModuleKind::FifoAccess { .. }
                | ModuleKind::FifoRead { .. }
                | ModuleKind::FifoWrite { .. }
                | ModuleKind::Scoreboard
                | ModuleKind::ArrayRead { .. }
                | ModuleKind::HeapRead { .. } => 2,
                ModuleKind::Block
                | ModuleKind::Branch
                | ModuleKind::Loop { .. }
                | ModuleKind::Call => 0,
            },
        }
    }

    /// Depth of the logic consuming this component's inputs, the figure a
    /// register inserted in front of the component would have to absorb.
    /// Zero for components whose inputs land directly on sequential
    /// elements or pass-through buffers: nothing is gained by registering
    /// in front of those.
    pub fn entry_gate_depth(&self, comp: CompIdx) -> u32 {
        match &self.comps[comp].kind {
            CompKind::Prim(
                Prim::Reg { .. } | Prim::Constant | Prim::OutBuf,
            ) => 0,
            _ => self.exit_gate_depth(comp),
        }
    }

    // ------------------------ subgraph clone ------------------------

    /// Deep-copy the subtree rooted at `root`, remapping every internal
    /// cross-reference onto the clones. Dependencies and wiring onto buses
    /// outside the subtree are handled asymmetrically: dependencies keep
    /// their original (external) bus, while port connections to external
    /// buses are dropped so the clone comes back unwired and the caller
    /// decides how to attach it.
    pub fn clone_subtree(&mut self, root: CompIdx) -> CompIdx {
        let members = self.subtree(root);

        let mut comp_map: AHashMap<CompIdx, CompIdx> = AHashMap::new();
        let mut port_map: AHashMap<PortIdx, PortIdx> = AHashMap::new();
        let mut bus_map: AHashMap<BusIdx, BusIdx> = AHashMap::new();
        let mut exit_map: AHashMap<ExitIdx, ExitIdx> = AHashMap::new();
        let mut entry_map: AHashMap<EntryIdx, EntryIdx> = AHashMap::new();

        // First pass: allocate clones of every node, leaving all
        // cross-references pointing at the originals.
        for &comp in &members {
            let new_comp = self.comps.peek_next_idx();
            comp_map.insert(comp, new_comp);
            for port in self.comps[comp].ports().collect::<Vec<_>>() {
                let mut p = self.ports[port].clone();
                p.owner = new_comp;
                port_map.insert(port, self.ports.push(p));
            }
            let mut clone = self.comps[comp].clone();
            let remapped: SmallVec<[PortIdx; 4]> =
                clone.port_list.iter().map(|p| port_map[p]).collect();
            clone.port_list = remapped;
            let pushed = self.comps.push(clone);
            debug_assert_eq!(pushed, new_comp);

            for exit in self.comps[comp].exits.clone() {
                let new_exit = self.exits.peek_next_idx();
                exit_map.insert(exit, new_exit);
                let mut e = self.exits[exit].clone();
                e.owner = new_comp;
                if let Some(done) = e.done {
                    let mut b = self.buses[done].clone();
                    b.owner = new_exit;
                    let nd = self.buses.push(b);
                    bus_map.insert(done, nd);
                    e.done = Some(nd);
                }
                let mut new_data: SmallVec<[BusIdx; 2]> = SmallVec::new();
                for bus in e.data.clone() {
                    let mut b = self.buses[bus].clone();
                    b.owner = new_exit;
                    let nb = self.buses.push(b);
                    bus_map.insert(bus, nb);
                    new_data.push(nb);
                }
                e.data = new_data;
                let pushed = self.exits.push(e);
                debug_assert_eq!(pushed, new_exit);
            }
            for entry in self.comps[comp].entries.clone() {
                let mut e = self.entries[entry].clone();
                e.owner = new_comp;
                entry_map.insert(entry, self.entries.push(e));
            }
        }

        // Second pass: remap the references recorded in the clones.
        for (&old, &new) in &comp_map {
            let exits: SmallVec<[ExitIdx; 1]> =
                self.comps[old].exits.iter().map(|e| exit_map[e]).collect();
            self.comps[new].exits = exits;
            let entries: SmallVec<[EntryIdx; 1]> = self.comps[old]
                .entries
                .iter()
                .map(|e| entry_map[e])
                .collect();
            self.comps[new].entries = entries;
            if let Some(module) = self.comps[new].kind.as_module_mut() {
                let children: Vec<CompIdx> =
                    module.children.iter().map(|c| comp_map[c]).collect();
                module.children = children;
                let feedback: Vec<CompIdx> = module
                    .feedback_points
                    .iter()
                    .map(|c| comp_map[c])
                    .collect();
                module.feedback_points = feedback;
                module.inbuf = module.inbuf.map(|c| comp_map[&c]);
            }
        }
        for &new in port_map.values() {
            let port = &mut self.ports[new];
            port.bus = port.bus.and_then(|b| bus_map.get(&b).copied());
            port.peer = port.peer.and_then(|b| bus_map.get(&b).copied());
        }
        for &new in bus_map.values() {
            let bus = &mut self.buses[new];
            bus.peer = bus.peer.and_then(|p| port_map.get(&p).copied());
        }
        for &new in exit_map.values() {
            let exit = &mut self.exits[new];
            exit.buf = exit.buf.and_then(|c| comp_map.get(&c).copied());
        }
        for (&old, &new) in &entry_map {
            let mut rebuilt = Entry::new(
                self.entries[new].owner,
                self.entries[old].driving_exit.map(|e| exit_map[&e]),
            );
            for (port, deps) in self.entries[old].clone().iter() {
                let new_port = port_map[&port];
                for dep in deps {
                    let bus =
                        bus_map.get(&dep.bus).copied().unwrap_or(dep.bus);
                    rebuilt.add_dependency(new_port, dep.same_kind(bus));
                }
            }
            self.entries[new] = rebuilt;
        }

        let new_root = comp_map[&root];
        self.comps[new_root].owner = None;
        log::debug!(
            "cloned {} components under {}",
            members.len(),
            self.comps[new_root].name
        );
        new_root
    }

    /// Every component under `root` (inclusive), parents before children.
    pub fn subtree(&self, root: CompIdx) -> Vec<CompIdx> {
        let mut members = Vec::new();
        let mut stack = vec![root];
        while let Some(comp) = stack.pop() {
            members.push(comp);
            if let Some(module) = self.comps[comp].kind.as_module() {
                stack.extend(module.children.iter().copied());
            }
        }
        members
    }
}

impl Index<CompIdx> for Graph {
    type Output = Component;
    fn index(&self, idx: CompIdx) -> &Component {
        &self.comps[idx]
    }
}

impl IndexMut<CompIdx> for Graph {
    fn index_mut(&mut self, idx: CompIdx) -> &mut Component {
        &mut self.comps[idx]
    }
}

impl Index<PortIdx> for Graph {
    type Output = Port;
    fn index(&self, idx: PortIdx) -> &Port {
        &self.ports[idx]
    }
}

impl IndexMut<PortIdx> for Graph {
    fn index_mut(&mut self, idx: PortIdx) -> &mut Port {
        &mut self.ports[idx]
    }
}

impl Index<BusIdx> for Graph {
    type Output = Bus;
    fn index(&self, idx: BusIdx) -> &Bus {
        &self.buses[idx]
    }
}

impl IndexMut<BusIdx> for Graph {
    fn index_mut(&mut self, idx: BusIdx) -> &mut Bus {
        &mut self.buses[idx]
    }
}

impl Index<ExitIdx> for Graph {
    type Output = Exit;
    fn index(&self, idx: ExitIdx) -> &Exit {
        &self.exits[idx]
    }
}

impl IndexMut<ExitIdx> for Graph {
    fn index_mut(&mut self, idx: ExitIdx) -> &mut Exit {
        &mut self.exits[idx]
    }
}

impl Index<EntryIdx> for Graph {
    type Output = Entry;
    fn index(&self, idx: EntryIdx) -> &Entry {
        &self.entries[idx]
    }
}

impl IndexMut<EntryIdx> for Graph {
    fn index_mut(&mut self, idx: EntryIdx) -> &mut Entry {
        &mut self.entries[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::DepKind;

    fn op(g: &mut Graph, name: &str, depth: u32) -> CompIdx {
        let c = g.add_component(
            Id::new(name),
            None,
            CompKind::Prim(Prim::Op { depth }),
        );
        g.add_port(c, Id::new("a"), PortTag::Data, Value::default());
        let exit = g.add_exit(c, ExitTag::Done, Latency::ZERO);
        g.add_done_bus(exit, Id::new(&format!("{name}_done")));
        g.add_data_bus(exit, Id::new(&format!("{name}_out")), Value::default());
        g.add_entry(c, None);
        c
    }

    #[test]
    fn zap_shifts_later_positions() {
        let mut g = Graph::new();
        let a = op(&mut g, "a", 1);
        let b = op(&mut g, "b", 1);
        let bus_a = g[g[a].exits[0]].data[0];
        let bus_b = g[g[b].exits[0]].data[0];
        let sink = op(&mut g, "sink", 1);
        let entry = g[sink].entries[0];
        let port = g[sink].data_ports().next().unwrap();
        g.add_dependency(entry, port, Dependency::new(DepKind::Data, bus_a));
        g.add_dependency(entry, port, Dependency::new(DepKind::Data, bus_b));

        let zapped = g.zap_dependency(entry, port, 0);
        assert_eq!(zapped.bus, bus_a);
        assert_eq!(
            g[entry].dependencies(port).to_vec(),
            vec![Dependency::new(DepKind::Data, bus_b)]
        );
    }

    #[test]
    fn disconnect_returns_the_old_wiring() {
        let mut g = Graph::new();
        let a = op(&mut g, "a", 1);
        let bus = g[g[a].exits[0]].data[0];
        let sink = op(&mut g, "sink", 1);
        let port = g[sink].data_ports().next().unwrap();

        g.connect(port, bus);
        assert_eq!(g.connected_ports(bus), vec![port]);
        assert_eq!(g.disconnect(port), Some(bus));
        assert_eq!(g[port].bus, None);
        assert!(g.connected_ports(bus).is_empty());
        assert_eq!(g.disconnect(port), None);
    }

    #[test]
    fn dependents_are_derived_fresh() {
        let mut g = Graph::new();
        let a = op(&mut g, "a", 1);
        let bus = g[g[a].exits[0]].data[0];
        let sink = op(&mut g, "sink", 1);
        let entry = g[sink].entries[0];
        let port = g[sink].data_ports().next().unwrap();
        g.add_dependency(entry, port, Dependency::new(DepKind::Data, bus));

        assert_eq!(g.dependents_of(bus), vec![(entry, port, 0)]);
        g.zap_dependency(entry, port, 0);
        assert!(g.dependents_of(bus).is_empty());
    }

    #[test]
    fn block_insertion_lands_before_anchor() {
        let mut g = Graph::new();
        let block = g.add_component(
            Id::new("blk"),
            None,
            CompKind::Module(Module::new(ModuleKind::Block)),
        );
        let a = op(&mut g, "a", 1);
        let b = op(&mut g, "b", 1);
        g.add_child(block, a);
        g.add_child(block, b);
        let r = op(&mut g, "r", 0);
        g.insert_child_before(block, b, r);
        assert_eq!(g[block].as_module().unwrap().children, vec![a, r, b]);
        assert_eq!(g[r].owner, Some(block));
    }

    #[test]
    fn mux_depth_grows_with_inputs() {
        let mut g = Graph::new();
        let mux = g.add_component(
            Id::new("mux"),
            None,
            CompKind::Prim(Prim::Mux),
        );
        g.add_port(mux, Id::new("sel"), PortTag::Data, Value::default());
        for i in 0..2 {
            g.add_port(
                mux,
                Id::new(&format!("d{i}")),
                PortTag::Data,
                Value::default(),
            );
        }
        assert_eq!(g.exit_gate_depth(mux), 2);
        for i in 2..8 {
            g.add_port(
                mux,
                Id::new(&format!("d{i}")),
                PortTag::Data,
                Value::default(),
            );
        }
        assert_eq!(g.exit_gate_depth(mux), 4);
    }

    #[test]
    fn constant_buses_are_recognized() {
        let mut g = Graph::new();
        let k = g.add_component(
            Id::new("k"),
            None,
            CompKind::Prim(Prim::Constant),
        );
        let exit = g.add_exit(k, ExitTag::Done, Latency::ZERO);
        let bus = g.add_data_bus(
            exit,
            Id::new("k_out"),
            Value::constant(8, false, 42),
        );
        assert!(g.is_constant_bus(bus));

        let a = op(&mut g, "a", 1);
        let plain = g[g[a].exits[0]].data[0];
        assert!(!g.is_constant_bus(plain));
    }

    #[test]
    fn clone_remaps_internal_references() {
        let mut g = Graph::new();
        let outer = op(&mut g, "outer", 1);
        let outer_bus = g[g[outer].exits[0]].data[0];

        let block = g.add_component(
            Id::new("blk"),
            None,
            CompKind::Module(Module::new(ModuleKind::Block)),
        );
        let a = op(&mut g, "a", 1);
        let b = op(&mut g, "b", 1);
        g.add_child(block, a);
        g.add_child(block, b);
        let a_bus = g[g[a].exits[0]].data[0];
        let b_entry = g[b].entries[0];
        let b_port = g[b].data_ports().next().unwrap();
        // One internal dependency and one onto a bus outside the subtree.
        g.add_dependency(b_entry, b_port, Dependency::new(DepKind::Data, a_bus));
        g.add_dependency(
            b_entry,
            b_port,
            Dependency::new(DepKind::Data, outer_bus),
        );

        let cloned = g.clone_subtree(block);
        assert_ne!(cloned, block);
        assert_eq!(g[cloned].owner, None);
        let kids = g[cloned].as_module().unwrap().children.clone();
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|&k| g[k].owner == Some(cloned)));

        let new_b = kids[1];
        let new_entry = g[new_b].entries[0];
        let new_port = g[new_b].data_ports().next().unwrap();
        let deps = g[new_entry].dependencies(new_port);
        // Internal reference remapped onto the clone of `a`, external one
        // preserved as-is.
        let new_a_bus = g[g[kids[0]].exits[0]].data[0];
        assert_eq!(deps[0].bus, new_a_bus);
        assert_eq!(deps[1].bus, outer_bus);
    }
}

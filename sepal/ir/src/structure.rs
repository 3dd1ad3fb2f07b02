//! Node and edge types stored in the graph arenas.

use crate::{BusIdx, CompIdx, EntryIdx, ExitIdx, Id, Latency, PortIdx};
use crate::{ResourceIdx, TaskIdx, Value};
use linked_hash_map::LinkedHashMap;
use smallvec::SmallVec;

/// Role of a port on its component. Every component carries one go, one
/// clock, and one reset port; everything else is data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortTag {
    Go,
    Clock,
    Reset,
    Data,
    /// Out-of-band connection created by the pin/fifo connector.
    Sideband,
}

/// Grouping tag for an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTag {
    /// The main control-flow exit; its done bus signals completion.
    Done,
    /// Out-of-band exit carrying lifted pin/fifo wiring.
    Sideband,
}

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Data,
    Control,
    Clock,
    Reset,
    /// Ordering edge between accesses to a shared resource.
    Resource,
}

/// A typed edge from a consuming port to the producing ("logical") bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DepKind,
    pub bus: BusIdx,
}

impl Dependency {
    pub fn new(kind: DepKind, bus: BusIdx) -> Self {
        Self { kind, bus }
    }

    /// A dependency of the same kind targeting a different bus. This is the
    /// splice primitive pipelining uses when redirecting an edge through a
    /// freshly inserted register.
    pub fn same_kind(&self, bus: BusIdx) -> Self {
        Self {
            kind: self.kind,
            bus,
        }
    }
}

/// A named input terminal on a component.
#[derive(Debug, Clone)]
pub struct Port {
    pub name: Id,
    pub tag: PortTag,
    pub owner: CompIdx,
    /// The bus this port is wired to, if any. Connections are the resolved
    /// wiring; scheduling constraints live in entry dependencies.
    pub bus: Option<BusIdx>,
    /// Boundary twin: for a port on a composite module, the image bus
    /// inside it; for a port on an output buffer, the module exit bus
    /// outside it.
    pub peer: Option<BusIdx>,
    pub value: Value,
}

/// A named output terminal owned by an exit.
#[derive(Debug, Clone)]
pub struct Bus {
    pub name: Id,
    pub owner: ExitIdx,
    /// Boundary twin: for a module input image, the module port outside;
    /// for a module exit bus, the output-buffer port inside.
    pub peer: Option<PortIdx>,
    pub value: Value,
}

/// Groups a component's output buses and carries the latency between the
/// component's go and this exit's done.
#[derive(Debug, Clone)]
pub struct Exit {
    pub tag: ExitTag,
    pub owner: CompIdx,
    pub done: Option<BusIdx>,
    pub data: SmallVec<[BusIdx; 2]>,
    pub latency: Latency,
    /// The boundary buffer realizing this exit inside a composite module.
    pub buf: Option<CompIdx>,
}

/// One admissible invocation context for a component: the dependencies that
/// must hold for each port when the component is started this way. A loop
/// body component typically has an init entry and a feedback entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub owner: CompIdx,
    /// The exit whose done drives this entry.
    pub driving_exit: Option<ExitIdx>,
    deps: LinkedHashMap<PortIdx, SmallVec<[Dependency; 2]>>,
}

impl Entry {
    pub fn new(owner: CompIdx, driving_exit: Option<ExitIdx>) -> Self {
        Self {
            owner,
            driving_exit,
            deps: LinkedHashMap::new(),
        }
    }

    pub fn add_dependency(&mut self, port: PortIdx, dep: Dependency) {
        self.deps.entry(port).or_insert_with(SmallVec::new).push(dep);
    }

    /// Dependencies recorded for `port` under this entry.
    pub fn dependencies(&self, port: PortIdx) -> &[Dependency] {
        self.deps.get(&port).map_or(&[], |deps| deps.as_slice())
    }

    /// Remove ("zap") the dependency at `pos` for `port`, returning it.
    /// Positions of later dependencies on the same port shift down by one.
    pub fn zap_dependency(&mut self, port: PortIdx, pos: usize) -> Dependency {
        let deps = self
            .deps
            .get_mut(&port)
            .expect("zap on a port with no dependencies");
        deps.remove(pos)
    }

    /// Replace the dependency at `pos` for `port` in place, keeping the
    /// position stable for any plan that refers to it.
    pub fn replace_dependency(
        &mut self,
        port: PortIdx,
        pos: usize,
        dep: Dependency,
    ) {
        let deps = self
            .deps
            .get_mut(&port)
            .expect("replace on a port with no dependencies");
        deps[pos] = dep;
    }

    /// Ports with at least one dependency, in insertion order.
    pub fn ports(&self) -> impl Iterator<Item = PortIdx> + '_ {
        self.deps.keys().copied()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (PortIdx, &SmallVec<[Dependency; 2]>)> + '_ {
        self.deps.iter().map(|(p, d)| (*p, d))
    }
}

/// A primitive (leaf) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    /// Combinational operation with a declared intrinsic gate depth.
    Op { depth: u32 },
    /// Bitwise or, used among other things to merge multiple pin writers.
    Or,
    /// N-way multiplexer; its depth grows with the log of its input count.
    Mux,
    /// Enabled flop. `reset` picks the resettable flavor used when the
    /// register sits in a control domain.
    Reg { reset: bool },
    /// Compile-time constant driver.
    Constant,
    /// Input-side boundary buffer of a composite module; owns the image
    /// buses of the module's ports.
    InBuf { depth: u32 },
    /// Output-side boundary buffer; its ports mirror one module exit.
    OutBuf,
    /// Design-level direct read of a simple pin.
    PinRead { pin: ResourceIdx },
    /// Design-level direct write of a simple pin.
    PinWrite { pin: ResourceIdx },
}

/// Flavor of a composite module.
///
/// The pre-built access idioms (everything from `Latch` down) are atomic:
/// the gate-depth engine treats them as single opaque units and never
/// descends into or pipelines their internals, because their internal
/// timing is load-bearing (a fifo write's retry flop must stay in the same
/// cycle as its go).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Ordered sequence of children.
    Block,
    /// Decision between arms.
    Branch,
    /// Iteration; `flop_needed` is cleared when the block-IO analyzer
    /// proves the feedback flop redundant.
    Loop { flop_needed: bool },
    /// Procedure invocation. A call owned directly by the design top is a
    /// task boundary and measures zero input depth.
    Call,
    /// Transparent latch built from a fixed two-gate idiom.
    Latch,
    /// Cross-task invocation.
    TaskCall { task: TaskIdx },
    SimplePinAccess { pin: ResourceIdx },
    FifoAccess { fifo: ResourceIdx },
    FifoRead { fifo: ResourceIdx },
    FifoWrite { fifo: ResourceIdx },
    /// Completion-synchronization idiom joining parallel done signals.
    Scoreboard,
    ArrayRead { mem: ResourceIdx },
    ArrayWrite { mem: ResourceIdx },
    HeapRead { mem: ResourceIdx },
    HeapWrite { mem: ResourceIdx },
}

impl ModuleKind {
    /// Atomic modules are visited as single opaque units.
    pub fn is_atomic(&self) -> bool {
        !matches!(
            self,
            ModuleKind::Block
                | ModuleKind::Branch
                | ModuleKind::Loop { .. }
                | ModuleKind::Call
        )
    }

    /// The shared resource this module accesses, if it is an access idiom.
    pub fn accessed_resource(&self) -> Option<ResourceIdx> {
        match self {
            ModuleKind::SimplePinAccess { pin } => Some(*pin),
            ModuleKind::FifoAccess { fifo }
            | ModuleKind::FifoRead { fifo }
            | ModuleKind::FifoWrite { fifo } => Some(*fifo),
            ModuleKind::ArrayRead { mem }
            | ModuleKind::ArrayWrite { mem }
            | ModuleKind::HeapRead { mem }
            | ModuleKind::HeapWrite { mem } => Some(*mem),
            _ => None,
        }
    }

    pub fn is_memory_access(&self) -> bool {
        matches!(
            self,
            ModuleKind::ArrayRead { .. }
                | ModuleKind::ArrayWrite { .. }
                | ModuleKind::HeapRead { .. }
                | ModuleKind::HeapWrite { .. }
        )
    }

    pub fn is_fifo_access(&self) -> bool {
        matches!(
            self,
            ModuleKind::FifoAccess { .. }
                | ModuleKind::FifoRead { .. }
                | ModuleKind::FifoWrite { .. }
        )
    }
}

/// Composite payload of a component: the child sequence plus the loop
/// feedback declarations and the label used to look up scoped options.
#[derive(Debug, Clone)]
pub struct Module {
    pub kind: ModuleKind,
    /// Children in sequence order. Order is meaningful for `Block`.
    pub children: Vec<CompIdx>,
    /// Components whose exits close a cycle; seeded to depth zero at the
    /// start of every traversal of this module.
    pub feedback_points: Vec<CompIdx>,
    /// Input-side boundary buffer, when this module has expanded internals.
    pub inbuf: Option<CompIdx>,
    /// Label for per-scope option lookup.
    pub search_label: Option<Id>,
}

impl Module {
    pub fn new(kind: ModuleKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            feedback_points: Vec::new(),
            inbuf: None,
            search_label: None,
        }
    }
}

/// What a component is.
#[derive(Debug, Clone)]
pub enum CompKind {
    Prim(Prim),
    Module(Module),
}

impl CompKind {
    pub fn as_module(&self) -> Option<&Module> {
        match self {
            CompKind::Module(m) => Some(m),
            CompKind::Prim(_) => None,
        }
    }

    pub fn as_module_mut(&mut self) -> Option<&mut Module> {
        match self {
            CompKind::Module(m) => Some(m),
            CompKind::Prim(_) => None,
        }
    }

    /// Combinational operations, as opposed to stateful or composite
    /// components. Registers feeding anything else take the resettable
    /// flavor.
    pub fn is_operation(&self) -> bool {
        matches!(
            self,
            CompKind::Prim(Prim::Op { .. } | Prim::Or | Prim::Mux)
        )
    }
}

/// A hardware operation node.
///
/// Ports are stored with the three implicit control ports first (go, clock,
/// reset) followed by the data ports, so `ports()` walks all of them.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: Id,
    pub owner: Option<CompIdx>,
    pub kind: CompKind,
    pub(crate) port_list: SmallVec<[PortIdx; 4]>,
    pub exits: SmallVec<[ExitIdx; 1]>,
    pub entries: SmallVec<[EntryIdx; 1]>,
}

impl Component {
    pub(crate) fn new(
        name: Id,
        owner: Option<CompIdx>,
        kind: CompKind,
        go: PortIdx,
        clock: PortIdx,
        reset: PortIdx,
    ) -> Self {
        let mut port_list = SmallVec::new();
        port_list.push(go);
        port_list.push(clock);
        port_list.push(reset);
        Self {
            name,
            owner,
            kind,
            port_list,
            exits: SmallVec::new(),
            entries: SmallVec::new(),
        }
    }

    pub fn go_port(&self) -> PortIdx {
        self.port_list[0]
    }

    pub fn clock_port(&self) -> PortIdx {
        self.port_list[1]
    }

    pub fn reset_port(&self) -> PortIdx {
        self.port_list[2]
    }

    /// All ports: go, clock, reset, then data in declaration order.
    pub fn ports(&self) -> impl Iterator<Item = PortIdx> + '_ {
        self.port_list.iter().copied()
    }

    /// Data and sideband ports only.
    pub fn data_ports(&self) -> impl Iterator<Item = PortIdx> + '_ {
        self.port_list.iter().skip(3).copied()
    }

    pub(crate) fn push_port(&mut self, port: PortIdx) {
        self.port_list.push(port);
    }

    pub fn as_module(&self) -> Option<&Module> {
        self.kind.as_module()
    }

    pub fn module_kind(&self) -> Option<&ModuleKind> {
        self.kind.as_module().map(|m| &m.kind)
    }
}

use crate::pass_manager::PassResult;
use crate::traversal::{ConstructPass, Named, ParseVal, Pass, PassOpt};
use linked_hash_map::LinkedHashMap;
use sepal_ir::{
    Builder, BusIdx, CompIdx, CompKind, DepKind, Dependency, Design, PortIdx,
    Prim, ResourceIdx, ResourceKind, Value,
};
use sepal_utils::{Error, SepalResult};

/// Aggregates scattered pin accesses into one resolved connection per pin.
///
/// Accesses are lifted bottom-up: every composite scope exposes at most one
/// sideband port (reads) and one sideband exit (writes) per pin it touches,
/// so at the design root each pin has a single writer-resolution point.
/// Writers mask their data with their own go, which is what makes an
/// or-merge of several writers sound; merging across tasks is therefore
/// gated on the `arbitrate` option, since only the simple-arbitration
/// contract guarantees the masking.
pub struct PinConnector {
    arbitrate: bool,
}

/// What a scope child means to the connector.
enum PinRef {
    Read(ResourceIdx),
    Write(ResourceIdx),
    Scope,
    Other,
}

/// Pin references collected inside one composite scope.
#[derive(Default)]
struct Frame {
    reads: LinkedHashMap<ResourceIdx, Vec<PortIdx>>,
    writes: LinkedHashMap<ResourceIdx, Vec<BusIdx>>,
}

impl ConstructPass for PinConnector {
    fn from(extra_opts: &[String]) -> SepalResult<Self> {
        let opts = Self::get_opts(extra_opts);
        Ok(PinConnector {
            arbitrate: opts["arbitrate"].bool(),
        })
    }

    fn clear_data(&mut self) {}
}

impl Named for PinConnector {
    fn name() -> &'static str {
        "pin-connector"
    }

    fn description() -> &'static str {
        "lift and merge scattered pin accesses into single connections"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "arbitrate",
            "or-merge multiple task writers to one pin instead of failing",
            ParseVal::Bool(false),
            PassOpt::parse_bool,
        )]
    }
}

impl Pass for PinConnector {
    fn run(&mut self, design: &mut Design) -> PassResult<()> {
        // A second run would stack fresh boundary ports on every reader.
        let connected = design.resources().any(|(_, r)| {
            r.kind == ResourceKind::Pin
                && (r.write_bus.is_some() || !r.read_ports.is_empty())
        });
        if connected {
            log::debug!("pin-connector: pins already resolved; nothing to do");
            return Ok(());
        }

        // Lift inside every task, finishing on the task's call wrapper, so
        // the frame left over holds design-level ports and buses.
        let mut lifted = Frame::default();
        let tops: Vec<CompIdx> =
            design.tasks().map(|(_, t)| t.top_call).collect();
        for top in tops {
            let inner = collect(design, top)?;
            lift(design, top, inner, &mut lifted);
        }

        // Direct design-level accesses connect straight to their pins.
        let mut direct = Frame::default();
        let top_children: Vec<CompIdx> = design.graph[design.top]
            .as_module()
            .map(|m| m.children.clone())
            .unwrap_or_default();
        for child in top_children {
            match classify(design, child) {
                PinRef::Read(pin) => {
                    let port = reader_port(design, child, pin);
                    direct.reads.entry(pin).or_insert_with(Vec::new).push(port);
                }
                PinRef::Write(pin) => {
                    let bus = writer_bus(design, child)?;
                    direct.writes.entry(pin).or_insert_with(Vec::new).push(bus);
                }
                // Task wrappers were already lifted above.
                PinRef::Scope | PinRef::Other => {}
            }
        }

        for pin in design.resource_ids().collect::<Vec<_>>() {
            if design[pin].kind != ResourceKind::Pin {
                continue;
            }
            self.resolve(design, pin, &mut lifted, &mut direct)?;
        }
        Ok(())
    }
}

impl PinConnector {
    /// Pick the single write bus for `pin` and wire every reader to it.
    fn resolve(
        &self,
        design: &mut Design,
        pin: ResourceIdx,
        lifted: &mut Frame,
        direct: &mut Frame,
    ) -> PassResult<()> {
        let task_writers = lifted.writes.remove(&pin).unwrap_or_default();
        let direct_writers = direct.writes.remove(&pin).unwrap_or_default();
        if !task_writers.is_empty() && !direct_writers.is_empty() {
            return Err(Error::malformed_structure(format!(
                "pin `{}` is written both from inside a task and directly \
                 at the design level",
                design[pin].name
            ))
            .into());
        }

        let mut writers = task_writers;
        writers.extend(direct_writers);
        let write_bus = match writers.len() {
            0 => None,
            1 => Some(writers[0]),
            n => {
                if !self.arbitrate {
                    return Err(Error::malformed_structure(format!(
                        "pin `{}` has {n} writers; enable simple state \
                         arbitration to merge them",
                        design[pin].name
                    ))
                    .into());
                }
                let name = design[pin].name;
                let width = design[pin].width;
                let top = design.top;
                let or = Builder::new(design).add_or(
                    top,
                    &format!("{name}_merge"),
                    width,
                    n,
                );
                wire_merge(design, or, &writers);
                log::debug!(
                    "pin-connector: merged {n} writers of pin `{name}`"
                );
                design.graph.result_bus(or)
            }
        };
        design[pin].write_bus = write_bus;

        let mut readers = lifted.reads.remove(&pin).unwrap_or_default();
        readers.extend(direct.reads.remove(&pin).unwrap_or_default());
        if let Some(bus) = write_bus {
            for &port in &readers {
                wire_reader(design, port, bus);
            }
        }
        // Readers of an externally driven pin stay unwired but are still
        // recorded, so reports can see them.
        design[pin].read_ports = readers;
        Ok(())
    }
}

fn classify(design: &Design, comp: CompIdx) -> PinRef {
    match &design.graph[comp].kind {
        CompKind::Prim(Prim::PinRead { pin }) => PinRef::Read(*pin),
        CompKind::Prim(Prim::PinWrite { pin }) => PinRef::Write(*pin),
        CompKind::Module(m) if !m.kind.is_atomic() => PinRef::Scope,
        _ => PinRef::Other,
    }
}

/// Walk `scope`'s children, recursing through composites and lifting each
/// one's references onto its own boundary on the way back up.
fn collect(design: &mut Design, scope: CompIdx) -> SepalResult<Frame> {
    let mut frame = Frame::default();
    let children: Vec<CompIdx> = match design.graph[scope].as_module() {
        Some(m) => m.children.clone(),
        None => return Ok(frame),
    };
    for child in children {
        match classify(design, child) {
            PinRef::Read(pin) => {
                let port = reader_port(design, child, pin);
                frame.reads.entry(pin).or_insert_with(Vec::new).push(port);
            }
            PinRef::Write(pin) => {
                let bus = writer_bus(design, child)?;
                frame.writes.entry(pin).or_insert_with(Vec::new).push(bus);
            }
            PinRef::Scope => {
                let inner = collect(design, child)?;
                lift(design, child, inner, &mut frame);
            }
            PinRef::Other => {}
        }
    }
    Ok(frame)
}

/// Expose `inner`'s references on `scope`'s boundary and record the new
/// boundary ports and buses in the caller's frame.
fn lift(design: &mut Design, scope: CompIdx, inner: Frame, out: &mut Frame) {
    for (pin, ports) in inner.reads {
        let name = design[pin].name.to_string();
        let value = Value::new(design[pin].width, false);
        let (outer, image) =
            Builder::new(design).add_module_sideband(scope, &name, value);
        for port in ports {
            wire_reader(design, port, image);
        }
        out.reads.entry(pin).or_insert_with(Vec::new).push(outer);
    }
    for (pin, buses) in inner.writes {
        let name = design[pin].name.to_string();
        let merged = if buses.len() == 1 {
            buses[0]
        } else {
            let width = design[pin].width;
            let or = Builder::new(design).add_or(
                scope,
                &format!("{name}_merge"),
                width,
                buses.len(),
            );
            wire_merge(design, or, &buses);
            design
                .graph
                .result_bus(or)
                .unwrap_or_else(|| unreachable!("or gates carry a result bus"))
        };
        let exit = Builder::new(design).add_sideband_exit(scope);
        let outer = Builder::new(design).connect_output(exit, &name, merged);
        out.writes.entry(pin).or_insert_with(Vec::new).push(outer);
    }
}

fn reader_port(design: &mut Design, comp: CompIdx, pin: ResourceIdx) -> PortIdx {
    let name = design[pin].name.to_string();
    let value = Value::new(design[pin].width, false);
    Builder::new(design).add_sideband_port(comp, &name, value)
}

fn writer_bus(design: &Design, comp: CompIdx) -> SepalResult<BusIdx> {
    design.graph.result_bus(comp).ok_or_else(|| {
        Error::malformed_structure(format!(
            "pin writer `{}` has no result bus",
            design.graph.path(comp)
        ))
    })
}

/// Connect a reader port to its resolved bus, with the dependency that
/// keeps traversals honest about the new edge.
fn wire_reader(design: &mut Design, port: PortIdx, bus: BusIdx) {
    let owner = design.graph[port].owner;
    let entry = match design.graph.first_entry(owner) {
        Some(entry) => entry,
        None => Builder::new(design).add_entry(owner, None),
    };
    design.graph.connect(port, bus);
    design
        .graph
        .add_dependency(entry, port, Dependency::new(DepKind::Data, bus));
}

fn wire_merge(design: &mut Design, or: CompIdx, buses: &[BusIdx]) {
    let entry = design.graph[or].entries[0];
    let ports: Vec<PortIdx> = design.graph[or].data_ports().collect();
    let mut builder = Builder::new(design);
    for (&port, &bus) in ports.iter().zip(buses) {
        builder.wire(entry, port, DepKind::Data, bus);
    }
}

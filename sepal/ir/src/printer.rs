//! Implements a formatter for the in-memory representation of designs.
//! Printing never mutates the graph.

use itertools::Itertools;

use crate::structure::{CompKind, ModuleKind, Prim};
use crate::{CompIdx, Design, Graph};
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    fn kind_label(graph: &Graph, comp: CompIdx) -> String {
        match &graph[comp].kind {
            CompKind::Prim(p) => match p {
                Prim::Op { depth } => format!("op(depth={depth})"),
                Prim::Or => "or".to_string(),
                Prim::Mux => "mux".to_string(),
                Prim::Reg { reset: true } => "reg.reset".to_string(),
                Prim::Reg { reset: false } => "reg".to_string(),
                Prim::Constant => "const".to_string(),
                Prim::InBuf { depth } => format!("inbuf(depth={depth})"),
                Prim::OutBuf => "outbuf".to_string(),
                Prim::PinRead { .. } => "pin.read".to_string(),
                Prim::PinWrite { .. } => "pin.write".to_string(),
            },
            CompKind::Module(m) => {
                let base = match m.kind {
                    ModuleKind::Block => "block",
                    ModuleKind::Branch => "branch",
                    ModuleKind::Loop { flop_needed: true } => "loop",
                    ModuleKind::Loop { flop_needed: false } => {
                        "loop.noflop"
                    }
                    ModuleKind::Call => "call",
                    ModuleKind::Latch => "latch",
                    ModuleKind::TaskCall { .. } => "taskcall",
                    ModuleKind::SimplePinAccess { .. } => "pin.access",
                    ModuleKind::FifoAccess { .. } => "fifo.access",
                    ModuleKind::FifoRead { .. } => "fifo.read",
                    ModuleKind::FifoWrite { .. } => "fifo.write",
                    ModuleKind::Scoreboard => "scoreboard",
                    ModuleKind::ArrayRead { .. } => "array.read",
                    ModuleKind::ArrayWrite { .. } => "array.write",
                    ModuleKind::HeapRead { .. } => "heap.read",
                    ModuleKind::HeapWrite { .. } => "heap.write",
                };
                match m.search_label {
                    Some(label) => format!("{base} #{label}"),
                    None => base.to_string(),
                }
            }
        }
    }

    fn format_deps(graph: &Graph, comp: CompIdx) -> String {
        graph[comp]
            .entries
            .iter()
            .flat_map(|&entry| {
                graph[entry].iter().flat_map(|(port, deps)| {
                    let port_name = graph[port].name;
                    deps.iter()
                        .map(move |d| {
                            format!("{}<-{}", port_name, graph[d.bus].name)
                        })
                        .collect_vec()
                })
            })
            .join(", ")
    }

    /// Writes the subtree rooted at `comp` with one line per component.
    pub fn write_component<F: io::Write>(
        graph: &Graph,
        comp: CompIdx,
        indent_level: usize,
        f: &mut F,
    ) -> io::Result<()> {
        write!(f, "{}", " ".repeat(indent_level))?;
        write!(
            f,
            "{} [{}]",
            graph[comp].name,
            Self::kind_label(graph, comp)
        )?;
        let exits = graph[comp]
            .exits
            .iter()
            .map(|&e| format!("{}", graph[e].latency))
            .join(",");
        if !exits.is_empty() {
            write!(f, " lat={exits}")?;
        }
        let deps = Self::format_deps(graph, comp);
        if !deps.is_empty() {
            write!(f, " deps: {deps}")?;
        }
        writeln!(f)?;
        if let Some(module) = graph[comp].kind.as_module() {
            for &child in &module.children {
                Self::write_component(graph, child, indent_level + 2, f)?;
            }
        }
        Ok(())
    }

    /// Prints out the whole design: resources, tasks, then the component
    /// tree under the design scope.
    pub fn write_design<F: io::Write>(
        design: &Design,
        f: &mut F,
    ) -> io::Result<()> {
        writeln!(f, "design {} {{", design.name)?;
        for (_, res) in design.resources() {
            writeln!(
                f,
                "  resource {} : {} width={}{}",
                res.name,
                res.kind,
                res.width,
                if res.arbitrated { " arbitrated" } else { "" }
            )?;
        }
        for (_, task) in design.tasks() {
            writeln!(
                f,
                "  task {} maxdepth={}",
                task.name, task.max_gate_depth
            )?;
        }
        Self::write_component(&design.graph, design.top, 2, f)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    #[test]
    fn dump_includes_nested_components() {
        let mut d = Design::new("chip");
        let mut b = Builder::new(&mut d);
        let (_, call) = b.add_task("main");
        b.add_op(call, "add", 1, 8, 2);
        let mut out = Vec::new();
        Printer::write_design(&d, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("design chip {"));
        assert!(text.contains("main [call]"));
        assert!(text.contains("add [op(depth=1)]"));
    }
}

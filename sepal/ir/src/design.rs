//! The top-level container: one graph plus the tasks and shared resources
//! defined against it.

use crate::idx::{BusIdx, CompIdx, PortIdx, ResourceIdx, TaskIdx};
use crate::structure::{CompKind, Module, ModuleKind};
use crate::{Graph, Id};
use sepal_idx::maps::IndexedMap;
use sepal_utils::NameGenerator;
use std::ops::{Index, IndexMut};

/// An independently started thread of hardware activity. Its body hangs off
/// a single top-level call owned by the design scope; input depth at that
/// call is zero by construction since nothing feeds it.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: Id,
    pub top_call: CompIdx,
    /// Largest combinational depth measured anywhere in this task's call
    /// tree. Refreshed by depth analysis; stale after structural edits.
    pub max_gate_depth: u32,
    /// Minimum number of clocks between consecutive activations, when the
    /// environment guarantees one.
    pub go_spacing: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A wire on the design boundary.
    Pin,
    /// A handshaked stream endpoint.
    Fifo,
    /// An addressable memory port.
    Memory,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Pin => "pin",
            ResourceKind::Fifo => "fifo",
            ResourceKind::Memory => "memory",
        };
        s.fmt(f)
    }
}

/// A shared structure accessed from task logic: a pin, fifo endpoint, or
/// memory port. Accesses target the resource symbolically; the connector
/// and access-counter passes fill in the physical wiring and arbitration
/// annotations.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: Id,
    pub kind: ResourceKind,
    pub width: u32,
    /// More than one task touches this resource, so its hardware needs an
    /// arbiter in front of it.
    pub arbitrated: bool,
    /// The single merged bus driving this resource after write merging.
    pub write_bus: Option<BusIdx>,
    /// Boundary ports through which lifted readers observe the resource.
    pub read_ports: Vec<PortIdx>,
}

#[derive(Debug, Clone)]
pub struct Design {
    pub name: Id,
    pub graph: Graph,
    /// The design scope: a block owning each task's top call plus any
    /// design-level pin logic.
    pub top: CompIdx,
    tasks: IndexedMap<TaskIdx, Task>,
    resources: IndexedMap<ResourceIdx, Resource>,
    /// Largest combinational depth measured across all tasks.
    pub max_gate_depth: u32,
    /// Largest intrinsic depth of any single component, the floor no
    /// amount of register insertion can get under.
    pub unbreakable_gate_depth: u32,
    namegen: NameGenerator,
}

impl Design {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        let name = name.into();
        let mut graph = Graph::new();
        let top = graph.add_component(
            name,
            None,
            CompKind::Module(Module::new(ModuleKind::Block)),
        );
        Self {
            name,
            graph,
            top,
            tasks: IndexedMap::new(),
            resources: IndexedMap::new(),
            max_gate_depth: 0,
            unbreakable_gate_depth: 0,
            namegen: NameGenerator::default(),
        }
    }

    /// A fresh name starting with `prefix`, unique across the design.
    pub fn gen_name<S: Into<Id>>(&mut self, prefix: S) -> Id {
        self.namegen.gen_name(prefix)
    }

    pub fn add_task(&mut self, name: Id, top_call: CompIdx) -> TaskIdx {
        self.tasks.push(Task {
            name,
            top_call,
            max_gate_depth: 0,
            go_spacing: None,
        })
    }

    pub fn add_resource(
        &mut self,
        name: Id,
        kind: ResourceKind,
        width: u32,
    ) -> ResourceIdx {
        self.resources.push(Resource {
            name,
            kind,
            width,
            arbitrated: false,
            write_bus: None,
            read_ports: Vec::new(),
        })
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskIdx, &Task)> + '_ {
        self.tasks.iter()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskIdx> + '_ {
        self.tasks.keys()
    }

    pub fn resources(
        &self,
    ) -> impl Iterator<Item = (ResourceIdx, &Resource)> + '_ {
        self.resources.iter()
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceIdx> + '_ {
        self.resources.keys()
    }
}

impl Index<TaskIdx> for Design {
    type Output = Task;
    fn index(&self, idx: TaskIdx) -> &Task {
        &self.tasks[idx]
    }
}

impl IndexMut<TaskIdx> for Design {
    fn index_mut(&mut self, idx: TaskIdx) -> &mut Task {
        &mut self.tasks[idx]
    }
}

impl Index<ResourceIdx> for Design {
    type Output = Resource;
    fn index(&self, idx: ResourceIdx) -> &Resource {
        &self.resources[idx]
    }
}

impl IndexMut<ResourceIdx> for Design {
    fn index_mut(&mut self, idx: ResourceIdx) -> &mut Resource {
        &mut self.resources[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_stay_unique() {
        let mut d = Design::new("chip");
        let a = d.gen_name("mul_pipeline");
        let b = d.gen_name("mul_pipeline");
        assert_ne!(a, b);
    }

    #[test]
    fn resource_annotations_are_writable() {
        let mut d = Design::new("chip");
        let r = d.add_resource(Id::new("din"), ResourceKind::Pin, 8);
        assert!(!d[r].arbitrated);
        d[r].arbitrated = true;
        assert!(d[r].arbitrated);
        assert_eq!(d[r].kind.to_string(), "pin");
    }
}

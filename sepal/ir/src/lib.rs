//! Dependency-graph representation for the sepal scheduling core.
//!
//! The graph models a hardware netlist with control flow: every operation is
//! a [`Component`] with input [`Port`]s and output [`Bus`]es grouped under
//! [`Exit`]s, and [`Entry`]s record the typed [`Dependency`] edges that must
//! be satisfied for an invocation. Nodes live in arenas inside [`Graph`] and
//! refer to each other through index handles, so splicing in new components
//! never invalidates existing references.

// Modules defining internal structures.
mod builder;
mod design;
mod graph;
mod idx;
mod latency;
mod printer;
mod structure;
mod value;

// Re-export types at the module level.
pub use builder::Builder;
pub use design::{Design, Resource, ResourceKind, Task};
pub use graph::Graph;
pub use idx::{BusIdx, CompIdx, EntryIdx, ExitIdx, PortIdx, ResourceIdx, TaskIdx};
pub use latency::Latency;
pub use printer::Printer;
pub use sepal_utils::Id;
pub use structure::{
    Bus, CompKind, Component, DepKind, Dependency, Entry, Exit, ExitTag,
    Module, ModuleKind, Port, PortTag, Prim,
};
pub use value::Value;

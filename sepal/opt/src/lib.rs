//! Analysis and scheduling passes over the sepal IR.
//!
//! The crate is split the same way the work is: [analysis] holds reusable,
//! non-mutating machinery (dataflow ordering, gate-depth measurement and
//! pipeline planning, task ordering), [passes] holds the transformations
//! that tie analyses to graph rewrites, and [pass_manager] runs registered
//! passes in a configurable order. Pass options arrive as
//! `-x pass:opt=val` strings and are parsed by the machinery in
//! [traversal].

pub mod analysis;
pub mod default_passes;
pub mod pass_manager;
pub mod passes;
pub mod traversal;

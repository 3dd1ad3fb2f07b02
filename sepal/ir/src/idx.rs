//! Handles for the arena-allocated graph structures.

use sepal_idx::{impl_index, impl_index_nonzero};

/// Handle to a [Component](crate::Component) in a [Graph](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CompIdx(u32);
impl_index!(CompIdx);

/// Handle to a [Port](crate::Port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct PortIdx(u32);
impl_index!(PortIdx);

/// Handle to a [Bus](crate::Bus). NonZero-backed so that the optional
/// connection slots on ports and exits cost nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct BusIdx(std::num::NonZeroU32);
impl_index_nonzero!(BusIdx);

/// Handle to an [Exit](crate::Exit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ExitIdx(u32);
impl_index!(ExitIdx);

/// Handle to an [Entry](crate::Entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct EntryIdx(u32);
impl_index!(EntryIdx);

/// Handle to a [Task](crate::Task) in a [Design](crate::Design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TaskIdx(u32);
impl_index!(TaskIdx);

/// Handle to a shared [Resource](crate::Resource): a memory port, pin, or
/// fifo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ResourceIdx(u32);
impl_index!(ResourceIdx);

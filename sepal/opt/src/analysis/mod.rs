//! Analyses shared between passes.
//!
//! Each analysis reads the design and produces a result the caller owns;
//! none of them mutate the graph. Structural rewrites go through
//! [`apply_pipeline`] exclusively.

mod dataflow;
mod gate_depth;
mod task_order;

pub use dataflow::FlowOrder;
pub use gate_depth::{
    apply_pipeline, measure_depths, plan_pipeline, DepthReport, DepthTargets,
    PipelinePlan, PlannedReg,
};
pub use task_order::{Order, TaskOrder};

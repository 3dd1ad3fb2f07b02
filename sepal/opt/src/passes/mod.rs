mod access_counter;
mod loop_flop;
mod pin_connector;
mod pipeline;
mod well_formed;

pub use access_counter::AccessCounter;
pub use loop_flop::LoopFlop;
pub use pin_connector::PinConnector;
pub use pipeline::Pipeline;
pub use well_formed::WellFormed;

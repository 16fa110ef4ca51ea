pub mod analysis;
pub mod context;
pub mod research;
pub mod workflow;

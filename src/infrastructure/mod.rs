pub mod cache;
pub mod messenger;
pub mod process;
pub mod queue;

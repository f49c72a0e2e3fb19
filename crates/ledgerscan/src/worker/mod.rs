//! Queue consumers: a thread pool pulling job messages and the processor
//! that runs one job end to end.

mod pool;
mod processor;

pub use pool::WorkerPool;
pub use processor::JobProcessor;

mod record;
mod store;

pub use record::{JobStatus, OcrJob};
pub use store::{JobStore, MemoryJobStore};

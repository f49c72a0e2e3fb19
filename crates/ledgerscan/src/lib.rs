pub mod categorize;
pub mod config;
pub mod error;
pub mod extract;
pub mod job;
pub mod logging;
pub mod ocr;
pub mod queue;
pub mod raster;
pub mod select;
pub mod storage;
pub mod worker;

pub use categorize::{Category, CategorySource, CategorySuggestor, TextClassifier};
pub use config::{load_config, Config, ProviderKind};
pub use error::{
    ConfigError, LedgerscanError, ProcessError, QueueError, Result, StorageError, WorkerError,
};
pub use extract::{ExtractionResult, FieldExtractor, VatAmount};
pub use job::{JobStatus, JobStore, MemoryJobStore, OcrJob};
pub use ocr::{Extraction, OcrEngine, OcrProvider};
pub use queue::{ChannelBroker, DispatchService, JobMessage, MessageBroker};
pub use raster::{DocumentRasterizer, RasterOutcome};
pub use storage::{FsObjectStorage, ObjectStorage, StoredObject};
pub use worker::{JobProcessor, WorkerPool};

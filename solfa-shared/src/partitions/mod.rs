/// Partition lifecycle
///
/// ```text
/// staging --validate--> validated
/// ```
///
/// - `duplicate`: Duplicate detection strategies
/// - `workflow`: Upload, validation and search orchestration

pub mod duplicate;
pub mod workflow;

pub use duplicate::{
    content_hash, ContentHashDetector, DuplicateDetector, FuzzyFieldsDetector,
    PartitionFingerprint,
};
pub use workflow::{
    PartitionWorkflow, UploadOutcome, UploadRequest, WorkflowError, DEFAULT_PARTITION_INDEX,
};

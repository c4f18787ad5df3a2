//! File preprocessing for user turns
//!
//! Uploads the files a user attached to a message and turns them into
//! attachment references the assistant can use. One failed upload never
//! aborts the rest of the batch.

mod preprocessor;

pub use preprocessor::{is_search_eligible, AttachmentBatch, FilePreprocessor, UploadFailure};

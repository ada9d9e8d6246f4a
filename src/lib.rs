// Library root
// -----------
// This crate exposes the transfer core used by the `file-push` binary.
// The binary (`main.rs`) only parses arguments, sets up logging and
// prints the final report.
//
// Module responsibilities:
// - `progress`: byte counting reader that feeds a progress sink.
// - `multipart`: streaming multipart/form-data encoder.
// - `pipeline`: open → encode → send → receive → report, one transfer.
// - `console`: indicatif rendering of the pipeline's progress on stderr.
// - `error`: the pipeline's error kinds.
//
// Keeping rendering behind `TransferObserver` lets the pipeline run
// headless in tests.
pub mod console;
pub mod error;
pub mod multipart;
pub mod pipeline;
pub mod progress;

pub use error::{Result, Stream, TransferError};
pub use pipeline::{
    NoopObserver, ResponseStrategy, SourceInfo, TransferConfig, TransferObserver,
    TransferPipeline, TransferRequest, TransferResult,
};
pub use progress::{ProgressReader, ProgressState};
pub use reqwest::Url;

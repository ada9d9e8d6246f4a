// Transfer pipeline: opens the source file, encodes it into an in-memory
// multipart body while metering the reads, POSTs it with a blocking
// reqwest client and reads the response back, metered when its length is
// known. Every step blocks until done; nothing is retried.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::error::{Result, Stream, TransferError};
use crate::multipart::{EncodeError, MultipartWriter};
use crate::progress::{ProgressReader, ProgressState};

/// Overall deadline for one exchange, sized for large uploads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Form field the file is sent under.
pub const FILE_FIELD: &str = "file";

/// Settings the pipeline is built with. Passed explicitly, never read
/// from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Overall deadline for the HTTP exchange.
    pub timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// What to upload and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    source_path: PathBuf,
    destination_url: Url,
}

impl TransferRequest {
    /// Validate the parameters. Both must be non-empty and the URL must be
    /// an absolute `http` or `https` URL.
    pub fn new(source_path: impl Into<PathBuf>, destination_url: &str) -> Result<Self> {
        let source_path = source_path.into();
        if source_path.as_os_str().is_empty() {
            return Err(TransferError::InvalidRequest(
                "source path is empty".to_string(),
            ));
        }
        let trimmed = destination_url.trim();
        if trimmed.is_empty() {
            return Err(TransferError::InvalidRequest(
                "destination URL is empty".to_string(),
            ));
        }
        let destination_url = Url::parse(trimmed).map_err(|e| {
            TransferError::InvalidRequest(format!("destination URL {trimmed:?}: {e}"))
        })?;
        if !matches!(destination_url.scheme(), "http" | "https") {
            return Err(TransferError::InvalidRequest(format!(
                "unsupported URL scheme {:?}",
                destination_url.scheme()
            )));
        }
        Ok(Self {
            source_path,
            destination_url,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_url(&self) -> &Url {
        &self.destination_url
    }
}

/// Name and size of the opened source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    pub size: u64,
}

/// How the response body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStrategy {
    /// Length announced: read through a [`ProgressReader`].
    Metered { total: u64 },
    /// Length unknown: read directly, no progress is reported.
    Plain,
}

impl ResponseStrategy {
    pub fn for_content_length(content_length: Option<u64>) -> Self {
        match content_length {
            Some(total) if total > 0 => ResponseStrategy::Metered { total },
            _ => ResponseStrategy::Plain,
        }
    }
}

/// Outcome of a completed exchange. Any status the server answered with
/// ends up here, including errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Serialize)]
struct ResultJson<'a> {
    status: u16,
    success: bool,
    body: Cow<'a, str>,
}

impl TransferResult {
    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ResultJson {
            status: self.status,
            success: self.is_success(),
            body: self.body_text(),
        })
    }
}

/// Hooks called while a transfer runs. Every method defaults to doing
/// nothing, so implementors only override what they display or record.
pub trait TransferObserver {
    fn source_opened(&mut self, _source: &SourceInfo) {}

    /// Called after every read of the source file when its size is known.
    fn upload_progress(&mut self, _state: &ProgressState) {}

    fn upload_finished(&mut self, _bytes: u64) {}

    fn sending(&mut self, _url: &Url, _body_len: u64) {}

    fn receiving(&mut self, _status: u16, _strategy: ResponseStrategy) {}

    /// Only called for [`ResponseStrategy::Metered`] responses.
    fn download_progress(&mut self, _state: &ProgressState) {}

    fn download_finished(&mut self, _bytes: u64) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

struct SourceFile {
    file: File,
    info: SourceInfo,
}

struct EncodedBody {
    content_type: String,
    bytes: Vec<u8>,
}

/// Runs one transfer per [`run`](Self::run) call.
pub struct TransferPipeline {
    request: TransferRequest,
    client: Client,
}

impl TransferPipeline {
    pub fn new(request: TransferRequest, config: &TransferConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransferError::network(request.destination_url.as_str(), e))?;
        Ok(Self { request, client })
    }

    /// Upload the file and read the answer.
    ///
    /// The source file is closed before the request is sent, on success
    /// and on every error path.
    pub fn run(&self, observer: &mut dyn TransferObserver) -> Result<TransferResult> {
        let span = info_span!(
            "transfer",
            file = %self.request.source_path.display(),
            url = %self.request.destination_url,
        );
        let _enter = span.enter();

        let SourceFile { file, info } = open_source(&self.request.source_path)?;
        info!(name = %info.name, size = info.size, "opened source file");
        observer.source_opened(&info);

        let body = encode_body(file, &info, observer)?;
        let response = self.send(body, observer)?;
        let result = receive(response, observer)?;

        if result.is_success() {
            info!(status = result.status, bytes = result.body.len(), "transfer complete");
        } else {
            warn!(status = result.status, "server reported failure");
        }
        Ok(result)
    }

    fn send(&self, body: EncodedBody, observer: &mut dyn TransferObserver) -> Result<Response> {
        let url = &self.request.destination_url;
        observer.sending(url, body.bytes.len() as u64);
        debug!(bytes = body.bytes.len(), content_type = %body.content_type, "sending request");

        self.client
            .post(url.clone())
            .header(CONTENT_TYPE, body.content_type)
            .body(body.bytes)
            .send()
            .map_err(|e| TransferError::network(url.as_str(), e))
    }
}

fn open_source(path: &Path) -> Result<SourceFile> {
    let file = File::open(path).map_err(|e| TransferError::file_access(path, e))?;
    let metadata = file
        .metadata()
        .map_err(|e| TransferError::file_access(path, e))?;
    if metadata.is_dir() {
        return Err(TransferError::file_access(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
        ));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or(EncodeError::MissingFileName)?;

    Ok(SourceFile {
        file,
        info: SourceInfo {
            name,
            size: metadata.len(),
        },
    })
}

/// Stream the source into a single-part body. Consumes the source so it
/// is closed when this returns, whatever the outcome.
fn encode_body<R: Read>(
    source: R,
    info: &SourceInfo,
    observer: &mut dyn TransferObserver,
) -> Result<EncodedBody> {
    let capacity = usize::try_from(info.size).unwrap_or(0).saturating_add(512);
    let mut writer = MultipartWriter::new(Vec::with_capacity(capacity));
    let content_type = writer.content_type();
    let part = writer.create_form_file(FILE_FIELD, &info.name)?;

    let mut reader = ProgressReader::new(source, info.size, |state: &ProgressState| {
        observer.upload_progress(state)
    });
    // Writes go to a Vec, so any failure here comes from the file.
    io::copy(&mut reader, part).map_err(|e| TransferError::read(Stream::Source, e))?;
    let copied = reader.bytes_read();
    drop(reader);

    observer.upload_finished(copied);
    let bytes = writer
        .finish()
        .map_err(|e| TransferError::Encoding(e.into()))?;
    debug!(source_bytes = copied, body_bytes = bytes.len(), "encoded multipart body");

    Ok(EncodedBody {
        content_type,
        bytes,
    })
}

fn receive(mut response: Response, observer: &mut dyn TransferObserver) -> Result<TransferResult> {
    let status = response.status().as_u16();
    let strategy = ResponseStrategy::for_content_length(response.content_length());
    debug!(status, ?strategy, "receiving response");
    observer.receiving(status, strategy);

    let mut body = Vec::new();
    let received = match strategy {
        ResponseStrategy::Metered { total } => {
            let mut reader = ProgressReader::new(&mut response, total, |state: &ProgressState| {
                observer.download_progress(state)
            });
            reader
                .read_to_end(&mut body)
                .map_err(|e| TransferError::read(Stream::Response, e))?;
            reader.bytes_read()
        }
        ResponseStrategy::Plain => {
            let n = response
                .read_to_end(&mut body)
                .map_err(|e| TransferError::read(Stream::Response, e))?;
            n as u64
        }
    };
    observer.download_finished(received);

    Ok(TransferResult { status, body })
}

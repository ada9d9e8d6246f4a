// Streaming `multipart/form-data` encoder.
//
// Writes parts straight into any `io::Write`, so a file can be copied
// into a part without holding it in memory twice.

use std::io::{self, Write};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("invalid boundary {0:?}")]
    InvalidBoundary(String),

    #[error("{what} {value:?} contains a control character")]
    ControlCharacter { what: &'static str, value: String },

    #[error("source path has no file name")]
    MissingFileName,

    #[error("failed writing part header: {0}")]
    Io(#[from] io::Error),
}

/// Builds a multipart body part by part.
///
/// The opening delimiter is written together with the first part header,
/// and [`finish`](Self::finish) writes the closing delimiter.
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    has_parts: bool,
}

impl<W: Write> MultipartWriter<W> {
    /// Create a writer with a random boundary.
    pub fn new(inner: W) -> Self {
        let boundary = Uuid::new_v4().simple().to_string();
        Self {
            inner,
            boundary,
            has_parts: false,
        }
    }

    /// Create a writer with a caller supplied boundary (RFC 2046 rules).
    pub fn with_boundary(inner: W, boundary: &str) -> Result<Self, EncodeError> {
        if !valid_boundary(boundary) {
            return Err(EncodeError::InvalidBoundary(boundary.to_string()));
        }
        Ok(Self {
            inner,
            boundary: boundary.to_string(),
            has_parts: false,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Start a file part and return the writer its content goes to.
    pub fn create_form_file(
        &mut self,
        field: &str,
        filename: &str,
    ) -> Result<&mut W, EncodeError> {
        check_header_value("field name", field)?;
        check_header_value("filename", filename)?;

        let lead = if self.has_parts { "\r\n" } else { "" };
        write!(
            self.inner,
            "{lead}--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary = self.boundary,
            name = escape_quotes(field),
            file = escape_quotes(filename),
        )?;
        self.has_parts = true;
        Ok(&mut self.inner)
    }

    /// Write the closing delimiter and hand back the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let lead = if self.has_parts { "\r\n" } else { "" };
        write!(self.inner, "{lead}--{}--\r\n", self.boundary)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn valid_boundary(boundary: &str) -> bool {
    if boundary.is_empty() || boundary.len() > 70 || boundary.ends_with(' ') {
        return false;
    }
    boundary.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&b)
    })
}

fn check_header_value(what: &'static str, value: &str) -> Result<(), EncodeError> {
    if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
        return Err(EncodeError::ControlCharacter {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

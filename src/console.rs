// Console rendering of a transfer: status lines and indicatif bars, all
// on stderr so stdout only carries the server's answer.

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Url;

use crate::pipeline::{ResponseStrategy, SourceInfo, TransferObserver};
use crate::progress::ProgressState;

/// Repaints per second, about one every 65ms.
const REFRESH_HZ: u8 = 15;

const BAR_TEMPLATE: &str =
    "{msg} [{bar:30}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} {eta}";

/// Shows upload and download bars on stderr.
pub struct ConsoleObserver {
    target: String,
    upload: Option<ProgressBar>,
    download: Option<ProgressBar>,
}

impl ConsoleObserver {
    pub fn new(target: &Url) -> Self {
        Self {
            target: target.to_string(),
            upload: None,
            download: None,
        }
    }
}

/// Lines printed before the upload starts.
fn source_summary(source: &SourceInfo, target: &str) -> String {
    format!(
        "File: {}\nSize: {}\nTarget: {}",
        source.name,
        HumanBytes(source.size),
        target
    )
}

fn bar(total: u64, message: String) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(
        Some(total),
        ProgressDrawTarget::stderr_with_hz(REFRESH_HZ),
    );
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(message);
    bar
}

impl TransferObserver for ConsoleObserver {
    fn source_opened(&mut self, source: &SourceInfo) {
        eprintln!("{}", source_summary(source, &self.target));
        let upload = bar(source.size, format!("Uploading {}", source.name));
        upload.tick();
        self.upload = Some(upload);
    }

    fn upload_progress(&mut self, state: &ProgressState) {
        if let Some(upload) = &self.upload {
            upload.set_position(state.bytes_so_far);
        }
    }

    fn upload_finished(&mut self, bytes: u64) {
        if let Some(upload) = self.upload.take() {
            upload.set_position(bytes);
            upload.finish();
        }
    }

    fn sending(&mut self, url: &Url, body_len: u64) {
        eprintln!("\nConnecting to {url} ({} request body)...", HumanBytes(body_len));
    }

    fn receiving(&mut self, status: u16, strategy: ResponseStrategy) {
        eprintln!("Receiving server response (status {status})...");
        if let ResponseStrategy::Metered { total } = strategy {
            self.download = Some(bar(total, "Downloading response".to_string()));
        }
    }

    fn download_progress(&mut self, state: &ProgressState) {
        if let Some(download) = &self.download {
            download.set_position(state.bytes_so_far);
        }
    }

    fn download_finished(&mut self, _bytes: u64) {
        if let Some(download) = self.download.take() {
            download.finish();
        }
    }
}

pub mod files;

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

use crate::transport::Response;

pub use files::{decode_screenshot, ArtifactWriter, DecodedImage};

/// Lines of HTML shown inline before the rest is left to the saved file.
pub const HTML_PREVIEW_LINES: usize = 50;

/// Human-readable summary of a response, as printed by the CLI.
pub fn render_report(response: &Response, saved: &[PathBuf]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Command Response:");
    let _ = writeln!(out, "Status: {}", response.success);
    let _ = writeln!(out, "Action: {}", response.action_name());
    let _ = writeln!(out, "Timestamp: {}", response.timestamp.as_deref().unwrap_or("-"));

    if let Some(error) = &response.error {
        let _ = writeln!(out, "\nError:\n{}", error);
    }

    if let Some(html) = &response.html {
        let _ = writeln!(out, "\nHTML Content:");
        let total = html.lines().count();
        for line in html.lines().take(HTML_PREVIEW_LINES) {
            let _ = writeln!(out, "{}", line);
        }
        if total > HTML_PREVIEW_LINES {
            let _ = writeln!(out, "... (truncated, {} more lines)", total - HTML_PREVIEW_LINES);
        }
    }

    if let Some(url) = &response.url {
        let _ = writeln!(out, "\nURL: {}", url);
    }

    for path in saved {
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("html") => "Full HTML saved to",
            _ => "Screenshot saved as",
        };
        let _ = writeln!(out, "\n{} {}", kind, path.display());
    }

    if let Some(message) = &response.message {
        let _ = writeln!(out, "\nMessage:\n{}", message);
    }

    out
}

/// Save the artifacts of a successful answer, then write the report to `out`.
///
/// A response carrying `error` saves nothing and ends in [`RelayError::RemoteReported`].
/// A failed save is reported after the report is written. Returns the saved paths.
///
/// [`RelayError::RemoteReported`]: crate::RelayError::RemoteReported
pub fn conclude<W: io::Write>(
    response: &Response,
    writer: &ArtifactWriter,
    out: &mut W,
) -> anyhow::Result<Vec<PathBuf>> {
    let (saved, save_error) = if response.is_failure() {
        (Vec::new(), None)
    } else {
        match writer.persist(response) {
            Ok(paths) => (paths, None),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to save artifacts");
                (Vec::new(), Some(e))
            }
        }
    };

    writeln!(out).context("writing report")?;
    write!(out, "{}", render_report(response, &saved)).context("writing report")?;

    response.check()?;
    if let Some(e) = save_error {
        return Err(e.context("saving artifacts"));
    }
    Ok(saved)
}

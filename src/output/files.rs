use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::transport::{Response, Screenshot};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Strip an optional `data:<mime>;base64,` header and decode the rest.
pub fn decode_screenshot(shot: &Screenshot) -> Result<DecodedImage, RelayError> {
    let raw = shot.as_str().trim();
    let (mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| RelayError::Decode("data URI without ',' separator".to_string()))?;
            let mime = header.split(';').next().filter(|m| !m.is_empty()).unwrap_or("image/png");
            (mime.to_string(), data)
        }
        None => ("image/png".to_string(), raw),
    };

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| RelayError::Decode(format!("screenshot is not valid base64: {e}")))?;
    Ok(DecodedImage { mime, bytes })
}

/// Writes the HTML and screenshot a response carries into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Paths of the files written, HTML first.
    ///
    /// The screenshot is decoded before anything is written, so an undecodable image
    /// leaves no files behind.
    pub fn persist(&self, response: &Response) -> Result<Vec<PathBuf>> {
        let image = response
            .screenshot
            .as_ref()
            .map(decode_screenshot)
            .transpose()
            .context("decoding screenshot")?;

        let mut written = Vec::new();
        let stamp = Local::now().format("%Y%m%d-%H%M%S-%3f").to_string();

        if let Some(html) = &response.html {
            let path = self.write_new("page", &stamp, "html", html.as_bytes())?;
            info!(path = %path.display(), bytes = html.len(), "saved HTML");
            written.push(path);
        }

        if let Some(image) = image {
            let path = self.write_new("screenshot", &stamp, image.extension(), &image.bytes)?;
            info!(path = %path.display(), bytes = image.bytes.len(), "saved screenshot");
            written.push(path);
        }

        Ok(written)
    }

    /// Never overwrites: a taken name gets a numeric suffix.
    fn write_new(&self, prefix: &str, stamp: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;

        let mut n = 0u32;
        loop {
            let name = match n {
                0 => format!("{prefix}-{stamp}.{ext}"),
                _ => format!("{prefix}-{stamp}-{n}.{ext}"),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "name taken, trying next");
                    n += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("creating {}", path.display()));
                }
            }
        }
    }
}

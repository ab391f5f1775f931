//! Streaming HTTP fetcher.
//!
//! Single attempt, no retry policy. Bodies are streamed to `<dest>.tmp` in
//! 1 MiB chunks and renamed into place only on success, so a partial file is
//! never observable at the final path.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::DownloadError;
use crate::progress::ProgressReporter;
use crate::utils::DOWNLOAD_C;

const CHUNK_SIZE: usize = 1 << 20;

/// Download `url` into `dest` atomically.
pub fn fetch(url: &str, dest: &Path, reporter: &dyn ProgressReporter) -> Result<(), DownloadError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| DownloadError::new(url, e))?;
    }

    tracing::debug!("{DOWNLOAD_C} {url} -> {}", dest.display());

    let response = ureq::get(url)
        .call()
        .map_err(|e| DownloadError::new(url, e))?;

    let content_length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = response.into_body().into_reader();

    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DownloadError::new(url, "destination has no file name"))?;
    let tmp = dest.with_file_name(format!("{file_name}.tmp"));

    let mut handle = reporter.task(&format!("{DOWNLOAD_C} {file_name}"), content_length);

    let result = (|| -> std::io::Result<()> {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            handle.advance(n as u64);
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(DownloadError::new(url, e));
    }

    fs::rename(&tmp, dest).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DownloadError::new(url, e)
    })?;

    Ok(())
}

/// Fetch a small text body (directory listings).
pub fn fetch_text(url: &str) -> Result<String, DownloadError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| DownloadError::new(url, e))?;
    response
        .into_body()
        .read_to_string()
        .map_err(|e| DownloadError::new(url, e))
}

/// Probe whether a resource exists without downloading it.
pub fn probe(url: &str) -> bool {
    ureq::head(url).call().is_ok()
}

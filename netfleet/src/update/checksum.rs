//! Upstream MD5 digest scrape.
//!
//! The vendor download page carries one HTML block per release, identified by
//! `id="md5_<version-with-underscores>"`, whose text lines pair a file name
//! with its MD5 digest. Only lines inside that block are trusted.

use std::collections::HashMap;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::UpdateError;

use super::FirmwareVersion;

/// File name to lowercase hex MD5 digest.
pub type ChecksumMap = HashMap<String, String>;

/// Download page carrying the per-release digest blocks.
pub const DOWNLOAD_PAGE_URL: &str = "https://mikrotik.com/download";

// `wireless-6.47.7.npk: 0c8a2e...` inside the release block.
static CHECKSUM_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*([\w.-]+-\d+\.\d+\.\d+\.\w+):\s*([0-9a-fA-F]{32})\s*$")
        .expect("checksum line pattern")
});

/// Extract the digest map for one release from the download page HTML.
///
/// A page without the release's block yields an empty map; digest lines
/// outside the block are ignored.
pub fn parse_checksum_page(html: &str, version: FirmwareVersion) -> ChecksumMap {
    let block_id = format!(
        "id=\"md5_{}_{}_{}\"",
        version.major, version.minor, version.patch
    );
    let Some(start) = html.find(&block_id) else {
        warn!("No checksum block for version {version} on the download page");
        return ChecksumMap::new();
    };
    // The block runs until the next id= attribute or the end of the page.
    let body = &html[start + block_id.len()..];
    let block = match body.find("id=\"") {
        Some(end) => &body[..end],
        None => body,
    };

    CHECKSUM_LINE
        .captures_iter(block)
        .map(|captures| {
            (
                captures[1].to_string(),
                captures[2].to_ascii_lowercase(),
            )
        })
        .collect()
}

/// Fetch the download page and extract the digest map for `version`.
///
/// Any HTTP failure is logged and yields an empty map; the planner treats an
/// empty map as "nothing verifiable, nothing downloadable".
pub async fn fetch_checksums(
    client: &reqwest::Client,
    version: FirmwareVersion,
) -> Result<ChecksumMap, UpdateError> {
    let response = client.get(DOWNLOAD_PAGE_URL).send().await?;
    if !response.status().is_success() {
        warn!(
            "Checksum page returned {} for version {version}",
            response.status()
        );
        return Ok(ChecksumMap::new());
    }
    let html = response.text().await?;
    Ok(parse_checksum_page(&html, version))
}

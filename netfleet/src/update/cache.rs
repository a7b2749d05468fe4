//! Hash-gated local package cache.
//!
//! Release bundles land in one cache directory. A bundle whose MD5 matches
//! the upstream digest is never fetched again, so re-running the planner with
//! an unchanged fleet performs no downloads. There is no partial-file cleanup:
//! a write interrupted mid-stream fails the next hash check and is simply
//! re-downloaded.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{info, warn};
use md5::{Digest, Md5};

use crate::error::UpdateError;

use super::FirmwareVersion;

/// Base URL the release bundles are served from.
pub const DOWNLOAD_BASE_URL: &str = "https://download.mikrotik.com/routeros";

/// Capability: fetch a URL's body. Lets tests count downloads without HTTP.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpdateError>;
}

/// `reqwest`-backed fetcher used outside tests.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, UpdateError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Local directory of release bundles and the `.npk` files unpacked from them.
pub struct PackageCache {
    dir: PathBuf,
}

impl PackageCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, UpdateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Release bundle file name for an architecture.
    pub fn bundle_name(version: FirmwareVersion, arch: &str) -> String {
        format!("all_packages-{arch}-{version}.zip")
    }

    fn bundle_url(version: FirmwareVersion, arch: &str) -> String {
        format!(
            "{DOWNLOAD_BASE_URL}/{version}/{}",
            Self::bundle_name(version, arch)
        )
    }

    /// Streamed MD5 of a file, as lowercase hex.
    pub fn md5_hex(path: &Path) -> Result<String, UpdateError> {
        let mut file = fs::File::open(path)?;
        let mut hasher = Md5::new();
        let mut buffer = [0u8; 4096];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Make sure the release bundle is cached and hash-verified.
    ///
    /// Returns `Ok(None)` when the cached copy already matches `expected_md5`
    /// (nothing was fetched, nothing needs unpacking) and `Ok(Some(path))`
    /// after a fresh download. A fetch failure leaves the cache untouched.
    pub async fn ensure_bundle(
        &self,
        version: FirmwareVersion,
        arch: &str,
        expected_md5: &str,
        fetcher: &dyn PackageFetcher,
    ) -> Result<Option<PathBuf>, UpdateError> {
        let path = self.dir.join(Self::bundle_name(version, arch));
        if path.exists() && Self::md5_hex(&path)?.eq_ignore_ascii_case(expected_md5) {
            info!("Bundle {} already cached and verified", path.display());
            return Ok(None);
        }

        let url = Self::bundle_url(version, arch);
        info!("Downloading {url}");
        let body = fetcher.fetch(&url).await?;
        fs::write(&path, &body)?;

        let actual = Self::md5_hex(&path)?;
        if !actual.eq_ignore_ascii_case(expected_md5) {
            warn!(
                "Digest mismatch for {}: expected {expected_md5}, got {actual}",
                path.display()
            );
        }
        Ok(Some(path))
    }

    /// Unpack a downloaded bundle into the cache directory.
    pub fn unpack_bundle(&self, bundle: &Path) -> Result<(), UpdateError> {
        let file = fs::File::open(bundle)?;
        let mut archive = zip::ZipArchive::new(file)?;
        archive.extract(&self.dir)?;
        info!("Unpacked {} into {}", bundle.display(), self.dir.display());
        Ok(())
    }

    /// Cache paths of the `.npk` files a device with this package set needs.
    pub fn package_paths(
        &self,
        packages: &[String],
        version: FirmwareVersion,
        arch: &str,
    ) -> Vec<PathBuf> {
        packages
            .iter()
            .map(|package| self.dir.join(format!("{package}-{version}-{arch}.npk")))
            .collect()
    }

    /// Sum of file sizes; a missing file is an error, not a zero.
    pub fn total_size(paths: &[PathBuf]) -> Result<u64, UpdateError> {
        let mut total = 0;
        for path in paths {
            total += fs::metadata(path)?.len();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PackageFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, UpdateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn version() -> FirmwareVersion {
        "6.47.7".parse().unwrap()
    }

    #[test]
    fn test_md5_hex_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            PackageCache::md5_hex(&path).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[tokio::test]
    async fn test_ensure_bundle_downloads_into_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path()).unwrap();
        let fetcher = CountingFetcher::new(b"bundle-bytes");

        let path = cache
            .ensure_bundle(version(), "mmips", "ffffffffffffffffffffffffffffffff", &fetcher)
            .await
            .unwrap()
            .expect("fresh download returns the path");

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "all_packages-mmips-6.47.7.zip"
        );
        assert_eq!(fs::read(&path).unwrap(), b"bundle-bytes");
    }

    #[tokio::test]
    async fn test_ensure_bundle_skips_verified_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path()).unwrap();
        let path = dir.path().join(PackageCache::bundle_name(version(), "mmips"));
        fs::write(&path, b"bundle-bytes").unwrap();
        let digest = PackageCache::md5_hex(&path).unwrap();
        let fetcher = CountingFetcher::new(b"bundle-bytes");

        let result = cache
            .ensure_bundle(version(), "mmips", &digest, &fetcher)
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_bundle_refetches_on_digest_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path()).unwrap();
        let path = dir.path().join(PackageCache::bundle_name(version(), "mmips"));
        fs::write(&path, b"corrupted").unwrap();
        let fetcher = CountingFetcher::new(b"good-bytes");
        let expected = {
            let tmp = dir.path().join("scratch");
            fs::write(&tmp, b"good-bytes").unwrap();
            PackageCache::md5_hex(&tmp).unwrap()
        };

        let result = cache
            .ensure_bundle(version(), "mmips", &expected, &fetcher)
            .await
            .unwrap();

        assert!(result.is_some());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read(&path).unwrap(), b"good-bytes");
    }

    #[test]
    fn test_package_paths_follow_npk_naming() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path()).unwrap();
        let paths = cache.package_paths(
            &["system".to_string(), "wireless".to_string()],
            version(),
            "mmips",
        );
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["system-6.47.7-mmips.npk", "wireless-6.47.7-mmips.npk"]);
    }

    #[test]
    fn test_total_size_errors_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.npk");
        fs::write(&a, vec![0u8; 100]).unwrap();
        assert_eq!(PackageCache::total_size(&[a.clone()]).unwrap(), 100);
        assert!(PackageCache::total_size(&[a, dir.path().join("missing.npk")]).is_err());
    }
}

//! Local site contents staged for a deployment.

use std::path::{Path, PathBuf};

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tracing::{debug, info};

use crate::error::{SiteError, SiteResult};

/// JSON array of the staged keys, kept beside the prefix so no site file can
/// collide with it. Written last, so its presence means every file of the
/// prefix is staged.
const MANIFEST_SUFFIX: &str = ".manifest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// path relative to the asset root, `/` separated
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source_dir: PathBuf,
    pub staging_bucket: String,
    /// adler32 over every key and file body, hex encoded
    pub hash: String,
    pub files: Vec<AssetFile>,
}

fn iter_files_recursively<P: AsRef<Path>>(
    start_dir: P,
    callback: &mut impl FnMut(PathBuf) -> SiteResult<()>,
) -> SiteResult<()> {
    let readdir = std::fs::read_dir(start_dir.as_ref())
        .map_err(|e| SiteError::Asset(format!("Failed to read dir {:?}\n{:?}", start_dir.as_ref(), e)))?;
    for entry in readdir {
        let direntry = entry?;
        let path = direntry.path();
        let fp = direntry.file_type()?;
        if fp.is_dir() {
            iter_files_recursively(&path, callback)?;
        } else {
            callback(path)?;
        }
    }
    Ok(())
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

impl Asset {
    /// Reads `source_dir` recursively. The directory must exist and hold at
    /// least one file.
    pub fn from_dir<P: AsRef<Path>, S: Into<String>>(source_dir: P, staging_bucket: S) -> SiteResult<Self> {
        let source_dir = source_dir.as_ref().to_path_buf();
        if !source_dir.is_dir() {
            return Err(SiteError::Asset(format!("Site contents directory {:?} does not exist", source_dir)));
        }
        let mut paths = vec![];
        iter_files_recursively(&source_dir, &mut |p| {
            paths.push(p);
            Ok(())
        })?;
        let mut files = vec![];
        for path in paths {
            let relative = path.strip_prefix(&source_dir)
                .map_err(|e| SiteError::Asset(format!("{:?} is outside of {:?}: {e}", path, source_dir)))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let size = std::fs::metadata(&path)?.len();
            let content_type = content_type_for(&path);
            files.push(AssetFile { key, path, size, content_type });
        }
        if files.is_empty() {
            return Err(SiteError::Asset(format!("Site contents directory {:?} is empty", source_dir)));
        }
        files.sort_by(|a, b| a.key.cmp(&b.key));

        let mut hasher = adler::Adler32::new();
        for file in files.iter() {
            let body = std::fs::read(&file.path)?;
            hasher.write_slice(file.key.as_bytes());
            hasher.write_slice(&[0]);
            hasher.write_slice(&body);
        }
        let hash = format!("{:08x}", hasher.checksum());
        debug!("Asset {:?} has {} files, hash {hash}", source_dir, files.len());
        Ok(Self { source_dir, staging_bucket: staging_bucket.into(), hash, files })
    }

    /// `assets/<hash>/`; a content change gives a new prefix.
    pub fn prefix(&self) -> String {
        format!("assets/{}/", self.hash)
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.files.iter().map(|f| f.key.clone()).collect()
    }

    /// Key of the manifest the deployment reads the object keys from.
    pub fn manifest_key(&self) -> String {
        format!("assets/{}{MANIFEST_SUFFIX}", self.hash)
    }

    pub fn manifest_body(&self) -> SiteResult<String> {
        Ok(serde_json::to_string(&self.object_keys())?)
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Creates the staging bucket in `region` unless it already exists.
    pub async fn ensure_staging_bucket(&self, client: &aws_sdk_s3::Client, region: &str) -> SiteResult<()> {
        if client.head_bucket().bucket(&self.staging_bucket).send().await.is_ok() {
            debug!("Staging bucket {} exists", self.staging_bucket);
            return Ok(());
        }
        info!("Creating staging bucket {} in {region}", self.staging_bucket);
        let mut req = client.create_bucket().bucket(&self.staging_bucket);
        // us-east-1 is the default location and must not be passed explicitly
        if region != "us-east-1" {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        req.send().await.map_err(SiteError::provider)?;
        Ok(())
    }

    /// Puts every file under the staging prefix, then the manifest. Skipped
    /// when a previous run already staged the same contents.
    pub async fn upload(&self, client: &aws_sdk_s3::Client) -> SiteResult<()> {
        let prefix = self.prefix();
        let manifest_key = self.manifest_key();
        let already_staged = client
            .head_object()
            .bucket(&self.staging_bucket)
            .key(&manifest_key)
            .send()
            .await
            .is_ok();
        if already_staged {
            info!("Asset {} already staged in s3://{}/{prefix}", self.hash, self.staging_bucket);
            return Ok(());
        }
        info!("Staging {} files ({} bytes) to s3://{}/{prefix}", self.files.len(), self.total_size(), self.staging_bucket);
        for file in self.files.iter() {
            let body = ByteStream::from_path(&file.path).await.map_err(SiteError::provider)?;
            client
                .put_object()
                .bucket(&self.staging_bucket)
                .key(format!("{prefix}{}", file.key))
                .content_type(file.content_type)
                .body(body)
                .send()
                .await
                .map_err(SiteError::provider)?;
            debug!("Uploaded {}", file.key);
        }
        client
            .put_object()
            .bucket(&self.staging_bucket)
            .key(&manifest_key)
            .content_type("application/json")
            .body(ByteStream::from(self.manifest_body()?.into_bytes()))
            .send()
            .await
            .map_err(SiteError::provider)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn files_are_sorted_with_slash_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<h1>hi</h1>");
        write(dir.path(), "css/site.css", "body {}");
        write(dir.path(), "error.html", "oops");
        let asset = Asset::from_dir(dir.path(), "staging").unwrap();
        assert_eq!(asset.object_keys(), vec!["css/site.css", "error.html", "index.html"]);
        assert_eq!(asset.files[0].content_type, "text/css");
        assert_eq!(asset.prefix(), format!("assets/{}/", asset.hash));
        assert_eq!(asset.hash.len(), 8);
    }

    #[test]
    fn hash_follows_content() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write(a.path(), "index.html", "same");
        write(b.path(), "index.html", "same");
        let ha = Asset::from_dir(a.path(), "s").unwrap().hash;
        assert_eq!(ha, Asset::from_dir(b.path(), "s").unwrap().hash);
        write(b.path(), "index.html", "changed");
        assert_ne!(ha, Asset::from_dir(b.path(), "s").unwrap().hash);
    }

    #[test]
    fn missing_or_empty_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Asset::from_dir(dir.path(), "s"), Err(SiteError::Asset(_))));
        assert!(matches!(Asset::from_dir(dir.path().join("missing"), "s"), Err(SiteError::Asset(_))));
    }

    #[test]
    fn manifest_lists_keys_next_to_the_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<h1>hi</h1>");
        write(dir.path(), "notes/c++ & more #1.html", "x");
        let asset = Asset::from_dir(dir.path(), "staging").unwrap();
        assert_eq!(asset.manifest_key(), format!("assets/{}.manifest.json", asset.hash));
        let keys: Vec<String> = serde_json::from_str(&asset.manifest_body().unwrap()).unwrap();
        assert_eq!(keys, vec!["index.html", "notes/c++ & more #1.html"]);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a/INDEX.HTML")), "text/html");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}

//! Project asset handling: purging stale working images and fetching the
//! per-project photos into the working directory.
//!
//! Every project folder uses fixed file stems: `1.*` is the main progress
//! photo, `2.*` the optional company-statement image. Extensions vary by
//! what the site uploads, so lookups scan a known raster extension list.

use crate::error::ReportError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed stem of the main progress photo inside a project folder.
pub const MAIN_ASSET_STEM: &str = "1";
/// Fixed stem of the optional company-statement image.
pub const STATEMENT_ASSET_STEM: &str = "2";

const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Project images fetched into the working directory.
#[derive(Debug, Default, Clone)]
pub struct FetchedAssets {
    pub main: Option<PathBuf>,
    pub statement: Option<PathBuf>,
}

/// Source of per-project photos. The production implementation pulls from
/// a shared drive folder; tests and local runs copy from a directory.
pub trait AssetSource {
    fn fetch(
        &self,
        folder_url: &str,
        workdir: &Path,
    ) -> impl std::future::Future<Output = Result<FetchedAssets, ReportError>> + Send;
}

/// Delete leftover working images from a previous run of the same
/// directory, so a project without a statement photo never inherits the
/// previous project's.
pub fn purge_stale_assets(workdir: &Path) -> Result<(), ReportError> {
    for stem in [MAIN_ASSET_STEM, STATEMENT_ASSET_STEM] {
        for ext in RASTER_EXTENSIONS {
            let path = workdir.join(format!("{stem}.{ext}"));
            if path.exists() {
                debug!("Purging stale asset {}", path.display());
                std::fs::remove_file(&path).map_err(|e| ReportError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
    }
    Ok(())
}

/// Locate a previously fetched asset by stem, trying each known extension.
pub fn find_asset(workdir: &Path, stem: &str) -> Option<PathBuf> {
    RASTER_EXTENSIONS
        .iter()
        .map(|ext| workdir.join(format!("{stem}.{ext}")))
        .find(|p| p.exists())
}

/// Extract the drive folder id from a shared-folder URL: the last
/// non-empty path segment, with any query string stripped.
pub fn folder_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Google Drive asset source: lists the project folder and downloads the
/// `1.*` / `2.*` files.
pub struct DriveAssetSource {
    client: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

impl DriveAssetSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, ReportError> {
        let resp = self
            .client
            .get("https://www.googleapis.com/drive/v3/files")
            .bearer_auth(&self.token)
            .query(&[
                ("q", format!("'{folder_id}' in parents and trashed = false")),
                ("fields", "files(id,name)".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?
            .error_for_status()
            .map_err(|e| ReportError::transport("drive", e.to_string()))?;
        let list: DriveFileList = resp
            .json()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?;
        Ok(list.files)
    }

    async fn download(&self, file: &DriveFile, dest: &Path) -> Result<(), ReportError> {
        let bytes = self
            .client
            .get(format!(
                "https://www.googleapis.com/drive/v3/files/{}",
                file.id
            ))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?
            .error_for_status()
            .map_err(|e| ReportError::transport("drive", e.to_string()))?
            .bytes()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?;
        std::fs::write(dest, &bytes).map_err(|e| ReportError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}

impl AssetSource for DriveAssetSource {
    async fn fetch(&self, folder_url: &str, workdir: &Path) -> Result<FetchedAssets, ReportError> {
        let folder_id = folder_id_from_url(folder_url).ok_or_else(|| {
            ReportError::InvalidInput(format!("cannot parse folder id from '{folder_url}'"))
        })?;
        let files = self.list_folder(folder_id).await?;
        let mut fetched = FetchedAssets::default();
        for file in &files {
            let Some((stem, ext)) = file.name.rsplit_once('.') else {
                continue;
            };
            if !RASTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                continue;
            }
            let slot = match stem {
                MAIN_ASSET_STEM => &mut fetched.main,
                STATEMENT_ASSET_STEM => &mut fetched.statement,
                _ => continue,
            };
            let dest = workdir.join(&file.name);
            self.download(file, &dest).await?;
            info!("Fetched {} → {}", file.name, dest.display());
            *slot = Some(dest);
        }
        if fetched.main.is_none() {
            warn!("Folder {folder_id} has no main photo ({MAIN_ASSET_STEM}.*)");
        }
        Ok(fetched)
    }
}

/// Directory-backed asset source for tests and local runs. The folder URL
/// is interpreted as a subdirectory name under the source root.
pub struct LocalAssetSource {
    root: PathBuf,
}

impl LocalAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for LocalAssetSource {
    async fn fetch(&self, folder_url: &str, workdir: &Path) -> Result<FetchedAssets, ReportError> {
        let folder = folder_id_from_url(folder_url).ok_or_else(|| {
            ReportError::InvalidInput(format!("cannot parse folder id from '{folder_url}'"))
        })?;
        let src_dir = self.root.join(folder);
        let mut fetched = FetchedAssets::default();
        for (stem, slot) in [
            (MAIN_ASSET_STEM, &mut fetched.main),
            (STATEMENT_ASSET_STEM, &mut fetched.statement),
        ] {
            if let Some(src) = find_asset(&src_dir, stem) {
                let dest = workdir.join(src.file_name().unwrap_or_default());
                std::fs::copy(&src, &dest).map_err(|e| ReportError::OutputWriteFailed {
                    path: dest.clone(),
                    source: e,
                })?;
                *slot = Some(dest);
            }
        }
        Ok(fetched)
    }
}

// Media Path Planner: deterministic hash -> on-disk path mapping, directory
// provisioning, and archive-escape validation. Grounded on db/mod.rs's
// `init_library_folders`/`get_db_path` (same archive-root-relative layout
// idea), generalized from a single originals/ dir to per-location BagIt
// folders plus content-addressed buckets.

use std::path::{Path, PathBuf};

use crate::constants::{
    ARCHIVE_FOLDER, DB_FILENAME, LOCATIONS_FOLDER, MEDIA_SUBDIR, PROXIES_FOLDER, THUMBS_FOLDER,
    THUMB_SIZES, WEB_SOURCES_SUBDIR,
};
use crate::error::{CoreError, Result};

/// Path helper bound to one archive root. All paths it returns are
/// guaranteed descendants of that root.
#[derive(Debug, Clone)]
pub struct MediaPathPlanner {
    archive_root: PathBuf,
}

impl MediaPathPlanner {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// `.locarch/` control directory: catalog db, thumbnails, proxies.
    pub fn control_dir(&self) -> PathBuf {
        self.archive_root.join(ARCHIVE_FOLDER)
    }

    pub fn db_path(&self) -> PathBuf {
        self.control_dir().join(DB_FILENAME)
    }

    pub fn thumbs_root(&self) -> PathBuf {
        self.control_dir().join(THUMBS_FOLDER)
    }

    pub fn proxies_root(&self) -> PathBuf {
        self.control_dir().join(PROXIES_FOLDER)
    }

    pub fn locations_root(&self) -> PathBuf {
        self.archive_root.join(LOCATIONS_FOLDER)
    }

    /// `{archive_root}/locations/{location_id}/`
    pub fn location_dir(&self, location_id: &str) -> PathBuf {
        self.locations_root().join(location_id)
    }

    /// `{archive_root}/locations/{location_id}/media/`
    pub fn location_media_dir(&self, location_id: &str) -> PathBuf {
        self.location_dir(location_id).join(MEDIA_SUBDIR)
    }

    /// `{archive_root}/locations/{location_id}/web-sources/`
    pub fn location_web_sources_dir(&self, location_id: &str) -> PathBuf {
        self.location_dir(location_id).join(WEB_SOURCES_SUBDIR)
    }

    /// `{archive_root}/.locarch/web-sources/` — holding area for captures not
    /// yet linked to a location.
    pub fn unlinked_web_sources_dir(&self) -> PathBuf {
        self.control_dir().join(WEB_SOURCES_SUBDIR)
    }

    /// First two hex characters of the content hash, used as the
    /// fan-out bucket directory so no single directory accumulates every
    /// media file in the archive.
    fn bucket(hash: &str) -> Result<&str> {
        if hash.len() < 2 || !hash.chars().take(2).all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::Hash(format!(
                "hash too short or non-hex to bucket: {}",
                hash
            )));
        }
        Ok(&hash[..2])
    }

    /// `{archive_root}/locations/{location_id}/media/{bucket}/{hash}.{ext}`
    pub fn media_archive_path(
        &self,
        location_id: &str,
        hash: &str,
        extension: &str,
    ) -> Result<PathBuf> {
        let bucket = Self::bucket(hash)?;
        Ok(self
            .location_media_dir(location_id)
            .join(bucket)
            .join(format!("{}.{}", hash, extension.trim_start_matches('.'))))
    }

    /// `{archive_root}/.locarch/thumbnails/{tier}/{bucket}/{hash}.jpg`
    pub fn thumbnail_path(&self, hash: &str, tier: &str) -> Result<PathBuf> {
        if !THUMB_SIZES.iter().any(|(name, _)| *name == tier) {
            return Err(CoreError::Other(format!("unknown thumbnail tier: {}", tier)));
        }
        let bucket = Self::bucket(hash)?;
        Ok(self
            .thumbs_root()
            .join(tier)
            .join(bucket)
            .join(format!("{}.jpg", hash)))
    }

    /// `{archive_root}/.locarch/proxies/{bucket}/{hash}.mp4`
    pub fn proxy_path(&self, hash: &str) -> Result<PathBuf> {
        let bucket = Self::bucket(hash)?;
        Ok(self.proxies_root().join(bucket).join(format!("{}.mp4", hash)))
    }

    /// Create the control directory and the three thumbnail-tier roots.
    /// Guaranteed-release: every directory created is removed again if a
    /// later one in the sequence fails, so a partial call never leaves the
    /// archive in a half-initialized state that later code mistakes for
    /// "already set up".
    pub fn ensure_directories(&self) -> Result<()> {
        let mut created = Vec::new();
        let result = self.ensure_directories_inner(&mut created);
        if result.is_err() {
            for dir in created.iter().rev() {
                let _ = std::fs::remove_dir(dir);
            }
        }
        result
    }

    fn ensure_directories_inner(&self, created: &mut Vec<PathBuf>) -> Result<()> {
        let mut dirs = vec![
            self.control_dir(),
            self.thumbs_root(),
            self.proxies_root(),
            self.locations_root(),
        ];
        for (tier, _) in THUMB_SIZES.iter() {
            dirs.push(self.thumbs_root().join(tier));
        }

        for dir in dirs {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| CoreError::Io {
                    path: dir.display().to_string(),
                    source: e,
                })?;
                created.push(dir);
            }
        }
        Ok(())
    }

    /// Create the per-location folder skeleton (media/ and web-sources/).
    pub fn ensure_location_directories(&self, location_id: &str) -> Result<()> {
        for dir in [
            self.location_dir(location_id),
            self.location_media_dir(location_id),
            self.location_web_sources_dir(location_id),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| CoreError::Io {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Confirm `candidate` canonicalizes to a descendant of the archive
    /// root. Used before any write or any media:// read to rule out
    /// symlink or `..`-based archive escapes.
    pub fn validate_archive_path(&self, candidate: &Path) -> Result<PathBuf> {
        let root = self.archive_root.canonicalize().map_err(|e| CoreError::Io {
            path: self.archive_root.display().to_string(),
            source: e,
        })?;

        // The candidate may not exist yet (pre-copy destination); canonicalize
        // the deepest existing ancestor and rebuild the remaining components.
        let canonical = canonicalize_best_effort(candidate)?;

        if !canonical.starts_with(&root) {
            return Err(CoreError::PathEscape(candidate.display().to_string()));
        }
        Ok(canonical)
    }
}

/// Canonicalize `path`, walking up to the nearest existing ancestor if the
/// full path does not exist yet, then re-appending the missing suffix.
fn canonicalize_best_effort(path: &Path) -> Result<PathBuf> {
    if let Ok(c) = path.canonicalize() {
        return Ok(c);
    }

    let mut missing = Vec::new();
    let mut cursor = path.to_path_buf();
    loop {
        match cursor.parent() {
            Some(parent) => {
                missing.push(
                    cursor
                        .file_name()
                        .map(|n| n.to_os_string())
                        .ok_or_else(|| CoreError::PathEscape(path.display().to_string()))?,
                );
                cursor = parent.to_path_buf();
                if let Ok(canonical_parent) = cursor.canonicalize() {
                    let mut result = canonical_parent;
                    for component in missing.iter().rev() {
                        result.push(component);
                    }
                    return Ok(result);
                }
            }
            None => {
                return Err(CoreError::Io {
                    path: path.display().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no existing ancestor directory found",
                    ),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn media_archive_path_buckets_by_first_two_hex_chars() {
        let planner = MediaPathPlanner::new("/archive");
        let path = planner
            .media_archive_path("loc123", "abcdef00112233", "jpg")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/archive/locations/loc123/media/ab/abcdef00112233.jpg")
        );
    }

    #[test]
    fn media_archive_path_rejects_short_hash() {
        let planner = MediaPathPlanner::new("/archive");
        assert!(planner.media_archive_path("loc123", "a", "jpg").is_err());
    }

    #[test]
    fn thumbnail_path_rejects_unknown_tier() {
        let planner = MediaPathPlanner::new("/archive");
        assert!(planner
            .thumbnail_path("abcdef00112233", "huge")
            .is_err());
    }

    #[test]
    fn ensure_directories_creates_thumbnail_tiers() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        planner.ensure_directories().unwrap();

        for (tier, _) in THUMB_SIZES.iter() {
            assert!(planner.thumbs_root().join(tier).is_dir());
        }
        assert!(planner.proxies_root().is_dir());
        assert!(planner.locations_root().is_dir());
    }

    #[test]
    fn validate_archive_path_accepts_descendant() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        let inner = dir.path().join("locations").join("loc1");
        std::fs::create_dir_all(&inner).unwrap();

        let validated = planner.validate_archive_path(&inner).unwrap();
        assert!(validated.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn validate_archive_path_rejects_traversal_outside_root() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path().join("archive"));
        std::fs::create_dir_all(dir.path().join("archive")).unwrap();

        let escape = dir.path().join("archive").join("..").join("outside");
        let result = planner.validate_archive_path(&escape);
        assert!(matches!(result, Err(CoreError::PathEscape(_))));
    }
}

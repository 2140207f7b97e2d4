//! Filesystem storage for enrolled people and their face images
//!
//! Layout: `<root>/<person>/<images...>` plus an optional `info.txt` per
//! person.

use chrono::Utc;
use facedb_common::{Error, IdentitySummary, PersonDetails, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Image extensions the engine can read
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "webp", "gif", "tiff", "tif", "heic", "heif", "avif",
];

const INFO_FILE: &str = "info.txt";

/// An uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Whether `file_name` has an allowed image extension
pub fn is_allowed_image(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reject names that could leave the library root
pub fn validate_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("empty name".to_string()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidName("invalid characters in name".to_string()));
    }
    // "." and friends resolve to the library root itself
    if name.chars().all(|c| c == '.' || c.is_whitespace()) {
        return Err(Error::InvalidName("invalid characters in name".to_string()));
    }
    Ok(name)
}

/// Reduce an uploaded file name to a safe ASCII name
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Enrolled-person image library
#[derive(Debug, Clone)]
pub struct ImageLibrary {
    root: PathBuf,
}

impl ImageLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All people with their image counts, sorted by name
    pub fn list_identities(&self) -> Result<Vec<IdentitySummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut identities = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let count = image_names(&entry.path())?.len();
            identities.push(IdentitySummary(name, count));
        }

        identities.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(identities)
    }

    /// One person's images and info text
    pub fn person(&self, name: &str) -> Result<PersonDetails> {
        let folder = self.existing_person_dir(name)?;

        let info_file = folder.join(INFO_FILE);
        let info = if info_file.exists() {
            fs::read_to_string(info_file)?
        } else {
            String::new()
        };

        Ok(PersonDetails {
            images: image_names(&folder)?,
            info,
        })
    }

    /// Path of an existing image, checked to stay inside the person folder
    pub fn image_path(&self, person: &str, file_name: &str) -> Result<PathBuf> {
        let folder = self.existing_person_dir(person)?;
        let path = folder.join(file_name);
        if !path.is_file() {
            return Err(Error::ImageNotFound);
        }
        ensure_within(&path, &folder)?;
        Ok(path)
    }

    /// Create (or extend) a person and store every allowed upload
    ///
    /// Returns how many images were saved.
    pub fn enroll(&self, name: &str, info: &str, uploads: &[Upload]) -> Result<usize> {
        let name = validate_name(name)?;
        fs::create_dir_all(&self.root)?;
        let folder = self.root.join(name);
        fs::create_dir_all(&folder)?;
        ensure_within(&folder, &self.root)?;

        fs::write(folder.join(INFO_FILE), info)?;

        let mut saved = 0;
        for upload in uploads.iter().filter(|u| is_allowed_image(&u.file_name)) {
            store_upload(&folder, upload)?;
            saved += 1;
        }

        info!("Enrolled {} with {} images", name, saved);
        Ok(saved)
    }

    /// Add one image to an existing person, returning the stored file name
    pub fn add_image(&self, person: &str, upload: &Upload) -> Result<String> {
        let folder = self.existing_person_dir(person)?;
        if !is_allowed_image(&upload.file_name) {
            return Err(Error::InvalidFileType);
        }

        let stored = store_upload(&folder, upload)?;
        info!("Added image {} to {}", stored, person);
        Ok(stored)
    }

    /// Remove a person and all their images
    pub fn delete_person(&self, person: &str) -> Result<()> {
        let folder = self.existing_person_dir(person)?;
        fs::remove_dir_all(folder)?;
        info!("Deleted {}", person);
        Ok(())
    }

    /// Remove a single image
    pub fn delete_image(&self, person: &str, file_name: &str) -> Result<()> {
        if file_name.is_empty() {
            return Err(Error::MissingField("filename required".to_string()));
        }
        let path = self.image_path(person, file_name)?;
        fs::remove_file(path)?;
        info!("Deleted {} from {}", file_name, person);
        Ok(())
    }

    pub fn total_images(identities: &[IdentitySummary]) -> usize {
        identities.iter().map(IdentitySummary::image_count).sum()
    }

    fn existing_person_dir(&self, name: &str) -> Result<PathBuf> {
        let name = validate_name(name)?;
        let folder = self.root.join(name);
        if !folder.is_dir() {
            return Err(Error::PersonNotFound);
        }
        ensure_within(&folder, &self.root)?;
        Ok(folder)
    }
}

/// Sorted names of the allowed images in `folder`
fn image_names(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && is_allowed_image(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn store_upload(folder: &Path, upload: &Upload) -> Result<String> {
    let stored = format!(
        "{}_{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(&upload.file_name)
    );
    fs::write(folder.join(&stored), &upload.data)?;
    Ok(stored)
}

/// `path` must lie strictly below `root`
///
/// Both paths must exist; symlinks are resolved before comparing.
fn ensure_within(path: &Path, root: &Path) -> Result<()> {
    let path = path.canonicalize()?;
    let root = root.canonicalize()?;
    if path != root && path.starts_with(&root) {
        Ok(())
    } else {
        Err(Error::PathEscapesRoot)
    }
}

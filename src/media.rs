use std::fs;
use std::path::PathBuf;

use crate::constants::MEDIA_RECIPES_DIR;
use crate::error::Error;

/// A decoded image ready to be persisted by a media backend.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl ImageFile {
    pub fn new(ext: &str, content: Vec<u8>) -> Self {
        ImageFile {
            file_name: format!("{}.{}", uuid::Uuid::new_v4(), ext),
            content,
        }
    }

    pub fn raw(content: Vec<u8>) -> Self {
        ImageFile {
            file_name: uuid::Uuid::new_v4().to_string(),
            content,
        }
    }
}

/// Where recipe images end up. The store returns the path recorded in the
/// recipe's `image` column; serving the file back is the caller's concern.
pub trait MediaStore {
    fn store(&self, file: &ImageFile) -> Result<String, Error>;
}

/// Filesystem-backed store writing under a media root.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsMediaStore { root: root.into() }
    }
}

impl MediaStore for FsMediaStore {
    fn store(&self, file: &ImageFile) -> Result<String, Error> {
        let dir = self.root.join(MEDIA_RECIPES_DIR);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(&file.file_name), &file.content)?;
        log::debug!("stored image {}", file.file_name);

        Ok(format!("{}/{}", MEDIA_RECIPES_DIR, file.file_name))
    }
}

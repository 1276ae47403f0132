use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Image formats accepted for upload, recognised by their magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        match name.rsplit_once('.')?.1 {
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }
}

/// Manages on-disk storage for uploaded images.
///
/// Each image is a flat file `{dir}/{uuid}.{ext}`; the database stores only
/// the file name.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Names come from `save`; anything with a path separator is refused so a
    /// corrupt row cannot reach outside the storage directory.
    fn file_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Invalid stored file name '{}'", name);
        }
        Ok(self.dir.join(name))
    }

    /// Writes a new image and returns its stored file name.
    pub async fn save(&self, format: ImageFormat, data: &[u8]) -> Result<String> {
        let name = format!("{}.{}", Uuid::new_v4(), format.extension());
        let path = self.file_path(&name)?;

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(name)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.file_path(name)?;
        Ok(fs::read(&path).await?)
    }

    /// Delete an image from disk. A file that is already gone is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted image {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Image {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

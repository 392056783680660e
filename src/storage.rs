use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::UploadedImage;

/// Keeps uploaded dish images in a single directory, addressed by the
/// generated filename stored in the `dishes.image` column.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DiskStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(&self, image: &UploadedImage) -> io::Result<String> {
        let filename = format!(
            "{}-{}",
            Uuid::new_v4().to_simple(),
            sanitize(&image.file_name)
        );
        fs::write(self.root.join(&filename), &image.bytes)?;
        Ok(filename)
    }

    /// Removing a file that is already gone is not an error.
    pub fn delete(&self, filename: &str) -> io::Result<()> {
        let path = self.resolve(filename)?;
        match fs::remove_file(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.resolve(filename).map(|path| path.is_file()).unwrap_or(false)
    }

    fn resolve(&self, filename: &str) -> io::Result<PathBuf> {
        match Path::new(filename).file_name() {
            Some(name) if name == filename => Ok(self.root.join(name)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a stored filename: {filename}"),
            )),
        }
    }
}

fn sanitize(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|base| base.to_str())
        .unwrap_or("image");
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

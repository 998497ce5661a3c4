//! Storage boundary for uploaded image bytes.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Somewhere addressable to keep uploaded images.
pub trait ImageStore: Send + Sync {
    /// Persists `bytes` and returns an identifier for the stored image.
    fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<String>;
}

/// Writes uploads into a directory as `<digest>_<sanitized name>`, so two
/// uploads sharing a file name but not content never overwrite each other.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl ImageStore for FsImageStore {
    fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<String> {
        let id = storage_id(filename, bytes);
        fs::write(self.root.join(&id), bytes)?;
        Ok(id)
    }
}

/// Keeps uploads in memory. Useful when nothing needs to outlive the request.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.images.lock().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageStore for MemoryImageStore {
    fn store(&self, filename: &str, bytes: &[u8]) -> io::Result<String> {
        let id = storage_id(filename, bytes);
        let mut images = self
            .images
            .lock()
            .map_err(|_| io::Error::other("image store lock poisoned"))?;
        images.insert(id.clone(), bytes.to_vec());
        Ok(id)
    }
}

fn storage_id(filename: &str, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let prefix = hex::encode(&digest[..6]);
    format!("{prefix}_{}", sanitize_filename(filename))
}

/// Reduces an uploaded file name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => out.push(ch),
            c if c.is_whitespace() => out.push('_'),
            c => {
                if let Some(ascii) = fold_accent(c) {
                    out.push(ascii);
                }
            }
        }
    }
    let trimmed = out.trim_start_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

/// ASCII base letter for common Latin accented letters.
fn fold_accent(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_strips_paths_and_unsafe_chars() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\fotos\\hoja 1.jpg"), "hoja_1.jpg");
        assert_eq!(sanitize_filename("palta dañada.png"), "palta_danada.png");
        assert_eq!(sanitize_filename("Árbol güero.JPG"), "Arbol_guero.JPG");
        assert_eq!(sanitize_filename("plaga🐛.jpg"), "plaga.jpg");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("***"), "upload");
    }

    #[test]
    fn fs_store_writes_bytes_under_returned_id() -> io::Result<()> {
        let dir = tempdir()?;
        let store = FsImageStore::new(dir.path().join("uploads"))?;
        let id = store.store("leaf.jpg", b"abc")?;
        assert!(id.ends_with("_leaf.jpg"));
        assert_eq!(fs::read(store.path_of(&id))?, b"abc");
        Ok(())
    }

    #[test]
    fn same_name_different_content_gets_distinct_ids() -> io::Result<()> {
        let store = MemoryImageStore::new();
        let a = store.store("x.png", b"one")?;
        let b = store.store("x.png", b"two")?;
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&a).as_deref(), Some(&b"one"[..]));
        Ok(())
    }
}

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::AssetError;

/// A 32-byte BLAKE3 hash used to address cached transformation results.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    /// Hash of the source bytes together with the settings used to transform
    /// them, so changing a setting misses the cache.
    pub fn hash_with(buffer: impl AsRef<[u8]>, variant: &str) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .update(&[0])
            .update(variant.as_bytes())
            .finalize()
            .into()
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in &self.0 {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

/// On-disk store of transformation results keyed by the hash of their input.
///
/// Entries live at `<root>/<hex>.<ext>`.
#[derive(Debug, Clone)]
pub struct HashCache {
    root: Utf8PathBuf,
}

impl HashCache {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn path(&self, hash: Hash32, ext: &str) -> Utf8PathBuf {
        self.root.join(format!("{}.{}", hash.to_hex(), ext))
    }

    pub fn get(&self, hash: Hash32, ext: &str) -> Option<Utf8PathBuf> {
        let path = self.path(hash, ext);
        path.is_file().then_some(path)
    }

    pub fn put(&self, hash: Hash32, ext: &str, data: &[u8]) -> Result<Utf8PathBuf, AssetError> {
        fs::create_dir_all(&self.root).map_err(AssetError::fs(&self.root))?;

        let path = self.path(hash, ext);
        fs::write(&path, data).map_err(AssetError::fs(&path))?;

        Ok(path)
    }

    /// Drops every entry. A cache which was never written is already clear.
    pub fn clear(&self) -> Result<(), AssetError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AssetError::fs(&self.root)(e)),
        }
    }
}

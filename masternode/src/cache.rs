//! Masternode cache file (mncache.dat)
//!
//! Self-describing binary container: a 16-byte magic string, the 4-byte
//! network magic, the serialized registry, and a trailing content hash.
//! A mismatched magic or hash aborts the load; unknown formats trigger
//! recreation on the next dump.

use crate::error::{MasternodeError, Result};
use crate::manager::MasternodeManager;
use crate::masternode::Masternode;
use ember_core::Hash256;
use std::path::{Path, PathBuf};

/// Cache-file specific magic message, exactly 16 bytes
const MAGIC_MESSAGE: &[u8; 16] = b"EmberMNCache-1.0";

const HASH_LEN: usize = 32;

#[derive(Debug, PartialEq, Eq)]
pub enum ReadResult {
    Ok(Vec<Masternode>),
    FileError,
    HashReadError,
    IncorrectHash,
    IncorrectMagicMessage,
    IncorrectMagicNumber,
    IncorrectFormat,
}

pub struct MasternodeCache {
    path: PathBuf,
    network_magic: [u8; 4],
}

impl MasternodeCache {
    pub fn new<P: AsRef<Path>>(datadir: P, network_magic: [u8; 4]) -> Self {
        MasternodeCache {
            path: datadir.as_ref().join("mncache.dat"),
            network_magic,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the registry with its magic header and trailing checksum
    pub fn write(&self, entries: &[Masternode]) -> Result<()> {
        let mut payload = Vec::new();
        payload.extend_from_slice(MAGIC_MESSAGE);
        payload.extend_from_slice(&self.network_magic);
        let body = bincode::serialize(entries)
            .map_err(|e| MasternodeError::Serialization(e.to_string()))?;
        payload.extend_from_slice(&body);

        let hash = Hash256::double_sha256(&payload);
        payload.extend_from_slice(hash.as_bytes());

        std::fs::write(&self.path, payload)?;
        log::debug!("written {} masternode entries to {}", entries.len(), self.path.display());
        Ok(())
    }

    /// Load and verify the cache file
    pub fn read(&self) -> ReadResult {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("failed to open {}: {}", self.path.display(), e);
                return ReadResult::FileError;
            }
        };

        if data.len() < MAGIC_MESSAGE.len() + self.network_magic.len() + HASH_LEN {
            return ReadResult::HashReadError;
        }

        let (payload, stored_hash) = data.split_at(data.len() - HASH_LEN);
        let computed = Hash256::double_sha256(payload);
        if computed.as_bytes().as_slice() != stored_hash {
            log::warn!("mncache checksum mismatch, data corrupted");
            return ReadResult::IncorrectHash;
        }

        let (magic, rest) = payload.split_at(MAGIC_MESSAGE.len());
        if magic != MAGIC_MESSAGE.as_slice() {
            log::warn!("invalid masternode cache magic message");
            return ReadResult::IncorrectMagicMessage;
        }

        let (network, body) = rest.split_at(self.network_magic.len());
        if network != self.network_magic.as_slice() {
            log::warn!("invalid network magic number in masternode cache");
            return ReadResult::IncorrectMagicNumber;
        }

        match bincode::deserialize::<Vec<Masternode>>(body) {
            Ok(entries) => ReadResult::Ok(entries),
            Err(e) => {
                log::warn!("mncache deserialize error: {}", e);
                ReadResult::IncorrectFormat
            }
        }
    }

    /// Restore the registry from disk. Any verification failure leaves the
    /// registry empty; the next dump overwrites the bad file.
    pub fn load(&self, manager: &MasternodeManager, now: i64) -> ReadResult {
        match self.read() {
            ReadResult::Ok(entries) => {
                log::info!(
                    "loaded {} masternode entries from {}",
                    entries.len(),
                    self.path.display()
                );
                manager.load_snapshot(entries.clone(), now);
                ReadResult::Ok(entries)
            }
            other => {
                log::warn!("mncache load failed, starting with an empty registry");
                manager.clear();
                other
            }
        }
    }

    /// Write the current registry, first sanity-checking any existing file
    /// the way the original cache did: unreadable-but-well-formed files are
    /// left alone, everything else is recreated.
    pub fn dump(&self, manager: &MasternodeManager) -> Result<()> {
        match self.read() {
            ReadResult::FileError => {
                log::debug!("missing masternode cache file, will try to recreate");
            }
            ReadResult::Ok(_) | ReadResult::IncorrectHash | ReadResult::IncorrectFormat => {}
            other => {
                log::warn!("mncache file format is unknown or invalid ({:?}), not overwriting", other);
                return Ok(());
            }
        }
        self.write(&manager.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::NetworkParams;
    use tempfile::tempdir;

    fn magic() -> [u8; 4] {
        NetworkParams::regtest().message_start
    }

    #[test]
    fn test_write_read_roundtrip_empty() {
        let dir = tempdir().unwrap();
        let cache = MasternodeCache::new(dir.path(), magic());

        cache.write(&[]).unwrap();
        assert_eq!(cache.read(), ReadResult::Ok(vec![]));
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let dir = tempdir().unwrap();
        let cache = MasternodeCache::new(dir.path(), magic());
        assert_eq!(cache.read(), ReadResult::FileError);
    }

    #[test]
    fn test_tampered_hash_is_detected() {
        let dir = tempdir().unwrap();
        let cache = MasternodeCache::new(dir.path(), magic());
        cache.write(&[]).unwrap();

        let mut data = std::fs::read(cache.path()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        std::fs::write(cache.path(), data).unwrap();

        assert_eq!(cache.read(), ReadResult::IncorrectHash);
    }

    #[test]
    fn test_wrong_network_magic_is_detected() {
        let dir = tempdir().unwrap();
        let writer = MasternodeCache::new(dir.path(), magic());
        writer.write(&[]).unwrap();

        let reader = MasternodeCache::new(dir.path(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(reader.read(), ReadResult::IncorrectMagicNumber);
    }
}

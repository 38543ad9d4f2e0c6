//! Reed-Solomon Erasure Coding
//!
//! Splits a file into `data_shards` equally sized shards plus
//! `parity_shards` parity shards, written as individual files into the
//! staging directory. Any `data_shards` of the total are enough to rebuild
//! the original.

use crate::error::{Result, UnicError};
use crate::{DATA_SHARDS, PARITY_SHARDS};
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (k)
    pub data_shards: usize,
    /// Number of parity shards (m)
    pub parity_shards: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            data_shards: DATA_SHARDS,
            parity_shards: PARITY_SHARDS,
        }
    }
}

impl ErasureConfig {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(UnicError::Configuration(
                "data_shards must be > 0".to_string(),
            ));
        }
        if parity_shards == 0 {
            return Err(UnicError::Configuration(
                "parity_shards must be > 0".to_string(),
            ));
        }
        if data_shards + parity_shards > 256 {
            return Err(UnicError::Configuration(
                "at most 256 shards in total are supported".to_string(),
            ));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Maximum number of lost shards that can be tolerated
    pub fn max_failures(&self) -> usize {
        self.parity_shards
    }
}

/// Result of encoding one file
#[derive(Debug, Clone)]
pub struct EncodedFile {
    /// Shard files in index order (data first, then parity)
    pub shards: Vec<PathBuf>,
    /// Zero bytes appended so the data splits evenly
    pub padding: u64,
    /// Sum of all shard sizes
    pub encoded_size: u64,
}

/// Erasure coding capability
pub trait Codec: Send + Sync {
    /// Encode `file` into shard files inside `out_dir`
    fn encode(&self, file: &Path, out_dir: &Path, config: ErasureConfig) -> Result<EncodedFile>;

    /// Rebuild the original file from the available shards
    ///
    /// `shards` is indexed by shard number; missing shards are `None`.
    fn decode(
        &self,
        shards: &[Option<PathBuf>],
        config: ErasureConfig,
        original_size: u64,
        output: &Path,
    ) -> Result<PathBuf>;
}

/// Local file name of shard `index` of `original_name`
pub fn shard_file_name(original_name: &str, index: usize) -> String {
    format!("{}.{}", original_name, index)
}

/// Galois-8 Reed-Solomon codec
#[derive(Debug, Default, Clone, Copy)]
pub struct ReedSolomonCodec;

impl ReedSolomonCodec {
    pub fn new() -> Self {
        Self
    }

    /// Size of each shard given the data size (never zero)
    fn shard_size(data_size: usize, config: &ErasureConfig) -> usize {
        data_size.div_ceil(config.data_shards).max(1)
    }
}

impl Codec for ReedSolomonCodec {
    fn encode(&self, file: &Path, out_dir: &Path, config: ErasureConfig) -> Result<EncodedFile> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UnicError::NotFound(format!("file name of {}", file.display())))?
            .to_string();
        let data = fs::read(file)?;
        let encoder = ReedSolomon::new(config.data_shards, config.parity_shards)?;

        let shard_size = Self::shard_size(data.len(), &config);

        // Pad data to be evenly divisible by data_shards
        let padded_size = shard_size * config.data_shards;
        let padding = (padded_size - data.len()) as u64;
        let mut padded = data;
        padded.resize(padded_size, 0);

        let mut shards: Vec<Vec<u8>> = padded.chunks(shard_size).map(|c| c.to_vec()).collect();
        for _ in 0..config.parity_shards {
            shards.push(vec![0u8; shard_size]);
        }

        // Fills in parity shards
        encoder.encode(&mut shards)?;

        fs::create_dir_all(out_dir)?;
        let mut paths = Vec::with_capacity(shards.len());
        for (i, shard) in shards.iter().enumerate() {
            let path = out_dir.join(shard_file_name(&name, i));
            fs::write(&path, shard)?;
            paths.push(path);
        }

        debug!(
            file = %name,
            shards = paths.len(),
            shard_size,
            padding,
            "File encoded"
        );

        Ok(EncodedFile {
            shards: paths,
            padding,
            encoded_size: (shard_size * config.total_shards()) as u64,
        })
    }

    fn decode(
        &self,
        shards: &[Option<PathBuf>],
        config: ErasureConfig,
        original_size: u64,
        output: &Path,
    ) -> Result<PathBuf> {
        let total = config.total_shards();
        if shards.len() != total {
            return Err(UnicError::ErasureCoding(format!(
                "expected {} shard slots, got {}",
                total,
                shards.len()
            )));
        }

        let mut buffers: Vec<Option<Vec<u8>>> = Vec::with_capacity(total);
        for slot in shards {
            let buffer = match slot {
                Some(path) => match fs::read(path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) if e.kind() == ErrorKind::NotFound => None,
                    Err(e) => return Err(e.into()),
                },
                None => None,
            };
            buffers.push(buffer);
        }

        let available = buffers.iter().filter(|b| b.is_some()).count();
        if available < config.data_shards {
            return Err(UnicError::InsufficientShards {
                available,
                required: config.data_shards,
            });
        }

        let encoder = ReedSolomon::new(config.data_shards, config.parity_shards)?;
        encoder.reconstruct_data(&mut buffers)?;

        let mut result = Vec::new();
        for buffer in buffers.iter().take(config.data_shards) {
            match buffer {
                Some(shard) => result.extend_from_slice(shard),
                None => {
                    return Err(UnicError::ErasureCoding(
                        "reconstruction failed".to_string(),
                    ))
                }
            }
        }

        if (result.len() as u64) < original_size {
            return Err(UnicError::ErasureCoding(format!(
                "reconstructed {} bytes, expected at least {}",
                result.len(),
                original_size
            )));
        }
        result.truncate(original_size as usize);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output, &result)?;
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_input(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_erasure_config() {
        let config = ErasureConfig::default();
        assert_eq!(config.data_shards, 10);
        assert_eq!(config.parity_shards, 4);
        assert_eq!(config.total_shards(), 14);
        assert_eq!(config.max_failures(), 4);
        assert!(ErasureConfig::new(0, 1).is_err());
        assert!(ErasureConfig::new(1, 0).is_err());
    }

    #[test]
    fn test_encode_decode_simple() {
        let tmp = TempDir::new().unwrap();
        let original = b"Hello, unic!";
        let input = write_input(tmp.path(), "hello.txt", original);
        let config = ErasureConfig::new(3, 2).unwrap();

        let codec = ReedSolomonCodec::new();
        let encoded = codec.encode(&input, &tmp.path().join("shard"), config).unwrap();
        assert_eq!(encoded.shards.len(), 5);
        assert_eq!(encoded.shards[0], tmp.path().join("shard/hello.txt.0"));
        // 12 bytes over 3 shards of 4 bytes
        assert_eq!(encoded.padding, 0);
        assert_eq!(encoded.encoded_size, 20);

        let slots: Vec<Option<PathBuf>> = encoded.shards.into_iter().map(Some).collect();
        let out = tmp.path().join("out/hello.txt");
        codec
            .decode(&slots, config, original.len() as u64, &out)
            .unwrap();
        assert_eq!(fs::read(out).unwrap(), original);
    }

    #[test]
    fn test_decode_with_missing_shards() {
        let tmp = TempDir::new().unwrap();
        let original: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
        let input = write_input(tmp.path(), "big.bin", &original);
        let config = ErasureConfig::default();

        let codec = ReedSolomonCodec::new();
        let encoded = codec.encode(&input, tmp.path(), config).unwrap();
        assert_eq!(encoded.padding, 0);

        let mut slots: Vec<Option<PathBuf>> = encoded.shards.into_iter().map(Some).collect();
        slots[0] = None;
        slots[5] = None;
        slots[10] = None;
        // Removed on disk rather than in the slot list
        fs::remove_file(slots[13].as_ref().unwrap()).unwrap();

        let out = tmp.path().join("restored.bin");
        codec
            .decode(&slots, config, original.len() as u64, &out)
            .unwrap();
        assert_eq!(fs::read(out).unwrap(), original);
    }

    #[test]
    fn test_too_many_missing_shards() {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "t.bin", b"test data");
        let config = ErasureConfig::new(3, 1).unwrap();

        let codec = ReedSolomonCodec::new();
        let encoded = codec.encode(&input, tmp.path(), config).unwrap();
        let mut slots: Vec<Option<PathBuf>> = encoded.shards.into_iter().map(Some).collect();
        slots[0] = None;
        slots[1] = None;

        let result = codec.decode(&slots, config, 9, &tmp.path().join("o"));
        assert!(matches!(
            result,
            Err(UnicError::InsufficientShards {
                available: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn test_padding_and_empty_file() {
        let tmp = TempDir::new().unwrap();
        let config = ErasureConfig::new(4, 2).unwrap();
        let codec = ReedSolomonCodec::new();

        let input = write_input(tmp.path(), "odd.bin", b"12345");
        let encoded = codec.encode(&input, &tmp.path().join("s"), config).unwrap();
        // 5 bytes over 4 shards of 2 bytes
        assert_eq!(encoded.padding, 3);

        let empty = write_input(tmp.path(), "empty.bin", b"");
        let encoded = codec.encode(&empty, &tmp.path().join("e"), config).unwrap();
        assert_eq!(encoded.padding, 4);
        let slots: Vec<Option<PathBuf>> = encoded.shards.into_iter().map(Some).collect();
        let out = tmp.path().join("empty.out");
        codec.decode(&slots, config, 0, &out).unwrap();
        assert!(fs::read(out).unwrap().is_empty());
    }
}

//! Per-file compression transform
//!
//! Eligibility is decided from the file name alone. The deny-list of binary
//! or already-compressed formats is checked first, so it always wins over the
//! allow-list of text formats. Anything on neither list passes through.
//!
//! Payloads are zlib-wrapped deflate streams at best compression.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::uploader::core::error::{PublishError, Result};

/// Text and config formats worth compressing
pub const COMPRESSIBLE_EXTENSIONS: &[&str] =
    &[".json", ".txt", ".xml", ".toml", ".js", ".cfg", ".properties"];

/// Formats that are binary or already compressed
pub const NON_COMPRESSIBLE_EXTENSIONS: &[&str] = &[".png", ".zip", ".jar"];

/// Decide whether a file should be compressed before upload
pub fn is_compressible(name: &str) -> bool {
    let name = name.to_ascii_lowercase();

    if NON_COMPRESSIBLE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return false;
    }

    COMPRESSIBLE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Deflate `data` unconditionally
pub fn deflate(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|source| PublishError::Compression {
            name: name.to_string(),
            source,
        })
}

/// Apply the transform: returns the payload and whether it was compressed
pub fn compress(name: &str, data: Vec<u8>) -> Result<(Vec<u8>, bool)> {
    if is_compressible(name) {
        Ok((deflate(name, &data)?, true))
    } else {
        Ok((data, false))
    }
}

/// Exact inverse of [`deflate`]
pub fn decompress(name: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|source| PublishError::Compression {
            name: name.to_string(),
            source,
        })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_by_extension() {
        assert!(is_compressible("config/mod.cfg"));
        assert!(is_compressible("pack.JSON"));
        assert!(is_compressible("server.properties"));
        assert!(!is_compressible("mods/somemod.jar"));
        assert!(!is_compressible("textures/icon.png"));
        assert!(!is_compressible("README"));
        assert!(!is_compressible("changelog.md"));
    }

    #[test]
    fn test_deny_list_wins_over_allow_list() {
        // Both lists can match when a denied suffix ends an allowed-looking name
        assert!(!is_compressible("notes.txt.zip"));
        assert!(!is_compressible("bundle.json.jar"));
        assert!(is_compressible("archive.zip.json"));
    }

    #[test]
    fn test_exactly_one_branch_is_chosen() {
        for name in ["a.json", "a.png", "a.bin", "a.json.png", "A.TOML"] {
            let (payload, compressed) = compress(name, b"payload".to_vec()).unwrap();
            assert_eq!(compressed, is_compressible(name), "{}", name);
            if !compressed {
                assert_eq!(payload, b"payload".to_vec());
            }
        }
    }

    #[test]
    fn test_round_trip_for_every_eligible_extension() {
        let samples: [&[u8]; 4] = [b"", b"X", b"{\"k\": [1, 2, 3]}", &[0u8, 255, 7, 0, 0, 13]];

        for ext in COMPRESSIBLE_EXTENSIONS {
            let name = format!("file{}", ext);
            for sample in samples {
                let (payload, compressed) = compress(&name, sample.to_vec()).unwrap();
                assert!(compressed);
                assert_eq!(decompress(&name, &payload).unwrap(), sample.to_vec());
            }
        }
    }

    #[test]
    fn test_round_trip_large_repetitive_input_shrinks() {
        let data = "key=value\n".repeat(10_000).into_bytes();
        let packed = deflate("big.cfg", &data).unwrap();

        assert!(packed.len() < data.len() / 10);
        assert_eq!(decompress("big.cfg", &packed).unwrap(), data);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let result = decompress("bad.json", b"definitely not zlib");
        assert!(matches!(result, Err(PublishError::Compression { .. })));
    }
}

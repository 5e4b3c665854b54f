use anyhow::{Context, Result};
use ballot_registry::Identity;
use flate2::read::GzDecoder;
use std::io::{self, Read};
use std::path::Path;

// ENV config for maximum allowed size (in bytes) of a decompressed snapshot payload.
// This prevents zip-bomb style decompression from exhausting memory.
pub const DEFAULT_MAX_DECOMPRESSED_SNAPSHOT_BYTES: usize = 256 * 1024 * 1024; // 256 MiB

pub fn max_snapshot_bytes() -> usize {
    if let Ok(mb_str) = std::env::var("BALLOT_MAX_SNAPSHOT_MB") {
        if let Ok(mb) = mb_str.parse::<usize>() {
            return mb.saturating_mul(1024 * 1024);
        }
    }
    DEFAULT_MAX_DECOMPRESSED_SNAPSHOT_BYTES
}

pub fn read_all_with_limit<R: Read>(mut reader: R, max_size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(std::cmp::min(max_size, 64 * 1024));
    let mut chunk = [0u8; 8192];
    let mut total = 0usize;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        total += n;
        if total > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "decompressed size limit exceeded",
            ));
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

pub fn decompress_gzip_with_limit<R: Read>(reader: R, max_size: usize) -> io::Result<Vec<u8>> {
    let decoder = GzDecoder::new(reader);
    read_all_with_limit(decoder, max_size)
}

/// Parses a whitelist file: one base58 identity per line. Blank lines and
/// lines starting with `#` are skipped.
pub fn parse_identity_list(contents: &str) -> Result<Vec<Identity>> {
    contents
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            line.parse::<Identity>()
                .with_context(|| format!("line {}: invalid identity {:?}", n, line))
        })
        .collect()
}

pub fn read_identity_list(path: &Path) -> Result<Vec<Identity>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read whitelist {}", path.display()))?;
    parse_identity_list(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn test_decompress_limit() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&[0u8; 10_000]).unwrap();
        let compressed = enc.finish().unwrap();

        assert_eq!(
            decompress_gzip_with_limit(&compressed[..], 10_000).unwrap().len(),
            10_000
        );
        assert!(decompress_gzip_with_limit(&compressed[..], 9_999).is_err());
    }

    #[test]
    fn test_parse_identity_list() {
        let a = Identity::new([1; 32]);
        let b = Identity::new([2; 32]);
        let contents = format!("# voters\n{}\n\n  {}  \n", a, b);
        assert_eq!(parse_identity_list(&contents).unwrap(), vec![a, b]);

        let err = parse_identity_list("# header\nnot-a-key\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}

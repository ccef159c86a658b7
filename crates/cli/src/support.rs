//! Shared helpers for the subcommands: config layering (§10.3),
//! index-thread-pool sizing, and digest parsing at the CLI boundary.

use crate::error::{CommandError, Result};
use media_dedup_common::Digest;
use media_dedup_engine::EngineConfig;
use std::path::Path;

/// Compiled-in defaults -> optional YAML file -> `--index-threads`/env
/// override. Mirrors the corpus CLI's rayon-env-var startup idiom,
/// generalized to size the engine's own bounded index-thread pool instead
/// of a global rayon pool (§10.3, §10.4).
pub fn load_config(config_path: Option<&Path>, index_threads: Option<usize>) -> Result<EngineConfig> {
    let mut config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CommandError::user(anyhow::anyhow!("failed to read config {}: {e}", path.display())))?;
            serde_yaml::from_str(&text)
                .map_err(|e| CommandError::user(anyhow::anyhow!("invalid config {}: {e}", path.display())))?
        }
        None => EngineConfig::default(),
    };

    if let Some(threads) = index_threads {
        config.index_threads = threads;
    } else if let Ok(env_threads) = std::env::var("MEDIA_DEDUP_INDEX_THREADS") {
        if let Ok(n) = env_threads.parse() {
            config.index_threads = n;
        }
    }

    Ok(config)
}

pub fn parse_digest(s: &str) -> Result<Digest> {
    let bytes = hex::decode(s)
        .map_err(|e| CommandError::user(anyhow::anyhow!("invalid hex digest {s:?}: {e}")))?;
    let arr: [u8; 16] = bytes
        .try_into()
        .map_err(|_| CommandError::user(anyhow::anyhow!("digest {s:?} must be 32 hex characters")))?;
    Ok(Digest(arr))
}

mod hex {
    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_32_char_digest() {
        let d = parse_digest("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(d.0[0], 0x00);
        assert_eq!(d.0[15], 0xff);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = parse_digest("00112233").unwrap_err();
        assert!(matches!(err.kind, crate::error::ExitKind::User));
    }

    #[test]
    fn rejects_non_hex() {
        let err = parse_digest("zz").unwrap_err();
        assert!(matches!(err.kind, crate::error::ExitKind::User));
    }
}

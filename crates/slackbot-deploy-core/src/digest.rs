use crate::error::AppError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex-encoded SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String, AppError> {
    if !path.exists() {
        return Err(AppError::MissingFile(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "slack_bolt\n").unwrap();
        let first = sha256_file(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, sha256_file(&path).unwrap());

        std::fs::write(&path, "slack_bolt\npython-dotenv\n").unwrap();
        assert_ne!(first, sha256_file(&path).unwrap());
    }
}

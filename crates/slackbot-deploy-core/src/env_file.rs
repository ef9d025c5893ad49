//! Reading the bot's dotenv file.

use crate::error::AppError;
use std::path::Path;

/// Key/value pairs from a dotenv file, in file order. Values are not
/// interpolated against the current process environment.
pub fn read_env(path: &Path) -> Result<Vec<(String, String)>, AppError> {
    if !path.exists() {
        return Err(AppError::MissingFile(path.to_path_buf()));
    }
    let mut vars = Vec::new();
    for item in dotenvy::from_path_iter(path)? {
        vars.push(item?);
    }
    Ok(vars)
}

/// Required keys that are absent or set to an empty value.
pub fn missing_keys<'a>(vars: &[(String, String)], required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|key| {
            !vars
                .iter()
                .any(|(k, v)| k == key && !v.trim().is_empty())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REQUIRED_ENV_KEYS;

    #[test]
    fn reads_pairs_and_reports_blank_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment\nSLACK_BOT_TOKEN=xoxb-1\nSLACK_SIGNING_SECRET=\nPORT=3000\n",
        )
        .unwrap();

        let vars = read_env(&path).unwrap();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars[0], ("SLACK_BOT_TOKEN".to_string(), "xoxb-1".to_string()));
        assert_eq!(missing_keys(&vars, REQUIRED_ENV_KEYS), ["SLACK_SIGNING_SECRET"]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_env(&dir.path().join(".env")).unwrap_err();
        assert!(matches!(err, AppError::MissingFile(_)));
    }
}

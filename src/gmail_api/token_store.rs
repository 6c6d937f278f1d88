use crate::error::TokenStoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

// Tokens are treated as expired slightly early so a request never goes out
// with a token that lapses in flight.
const EXPIRY_LEEWAY_SECS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_LEEWAY_SECS) <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Flat-file token cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Token, TokenStoreError> {
        let not_found = |reason: String| TokenStoreError::NotFound {
            path: self.path.clone(),
            reason,
        };
        let contents = fs::read_to_string(&self.path).map_err(|e| not_found(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| not_found(e.to_string()))
    }

    /// Overwrites the cache file, readable only by the owning user.
    pub fn save(&self, token: &Token) -> Result<(), TokenStoreError> {
        let io_err = |source: std::io::Error| TokenStoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec(token).map_err(|e| io_err(e.into()))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(io_err)?;

        // `mode` only applies on creation.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        file.write_all(&json).map_err(io_err)?;
        tracing::info!(path = %self.path.display(), "Saved OAuth token");
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TokenStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_token() -> Token {
        Token {
            access_token: "ya29.access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_token()).unwrap();
        assert_eq!(store.load().unwrap(), sample_token());
    }

    #[test]
    fn test_save_overwrites_existing_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample_token()).unwrap();

        let mut newer = sample_token();
        newer.access_token = "ya29.newer".to_string();
        newer.refresh_token = None;
        store.save(&newer).unwrap();

        assert_eq!(store.load().unwrap(), newer);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("absent.json"));
        assert!(matches!(
            store.load(),
            Err(TokenStoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_malformed_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();
        let store = TokenStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(TokenStoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_accepts_minimal_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"access_token":"abc"}"#).unwrap();
        let token = TokenStore::new(&path).load().unwrap();
        assert_eq!(token.access_token, "abc");
        assert!(token.refresh_token.is_none());
        assert!(!token.is_expired());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        TokenStore::new(&path).save(&sample_token()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_clear_removes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample_token()).unwrap();

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_expiry_leeway() {
        let now = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).unwrap();
        let mut token = sample_token();

        // Expires 5s after `now`, inside the leeway.
        assert!(token.is_expired_at(now));

        token.expiry = Some(now + Duration::minutes(5));
        assert!(!token.is_expired_at(now));

        token.expiry = None;
        assert!(!token.is_expired_at(now));
    }
}

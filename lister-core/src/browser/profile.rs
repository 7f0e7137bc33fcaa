use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::{AutomationError, AutomationResult};

/// Persistent browser profile directory owned by one marketplace account.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    account_id: String,
    path: PathBuf,
}

impl AccountProfile {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn touch(&self) -> AutomationResult<()> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let marker = self.path.join(".last_used");
        let mut file = fs::File::create(&marker).await.map_err(|err| {
            AutomationError::Profile(format!("failed to write profile marker: {err}"))
        })?;
        file.write_all(stamp.to_string().as_bytes())
            .await
            .map_err(|err| {
                AutomationError::Profile(format!("failed to update profile marker: {err}"))
            })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProfileManager {
    base_dir: PathBuf,
}

impl ProfileManager {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> AutomationResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir).map_err(|err| {
            AutomationError::Profile(format!("failed to create profile base dir: {err}"))
        })?;
        let base_dir = std::fs::canonicalize(&base_dir).map_err(|err| {
            AutomationError::Profile(format!("failed to resolve profile base dir: {err}"))
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns (creating if needed) the profile reused by every session of `account_id`.
    pub fn profile_for(&self, account_id: &str) -> AutomationResult<AccountProfile> {
        if account_id.is_empty()
            || account_id == "."
            || account_id == ".."
            || account_id.contains(['/', '\\'])
        {
            return Err(AutomationError::Profile(format!(
                "account id {account_id:?} cannot name a profile directory"
            )));
        }
        let path = self.base_dir.join(account_id);
        std::fs::create_dir_all(&path)
            .map_err(|err| AutomationError::Profile(format!("failed to create profile dir: {err}")))?;
        Ok(AccountProfile {
            account_id: account_id.to_string(),
            path,
        })
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

const OFFLINE_UUID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Microsoft,
}

/// The account data handed to a game process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchAccountProfile {
    pub mode: AccountMode,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
}

impl Default for LaunchAccountProfile {
    fn default() -> Self {
        Self::offline("Player")
    }
}

impl LaunchAccountProfile {
    pub fn offline(username: &str) -> Self {
        let username = username.trim();
        Self {
            mode: AccountMode::Offline,
            username: if username.is_empty() {
                "Player".into()
            } else {
                username.to_string()
            },
            uuid: OFFLINE_UUID.into(),
            access_token: "offline_access_token".into(),
        }
    }

    fn usable_online(&self) -> bool {
        self.mode == AccountMode::Microsoft && !self.access_token.trim().is_empty()
    }
}

/// Accounts known to the launcher, persisted as `accounts.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountList {
    #[serde(default)]
    pub accounts: Vec<LaunchAccountProfile>,
}

impl AccountList {
    pub fn load(path: &Path) -> LauncherResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn find(&self, username: &str) -> Option<&LaunchAccountProfile> {
        self.accounts
            .iter()
            .find(|account| account.username.eq_ignore_ascii_case(username))
    }

    /// Picks the account for a launch.
    ///
    /// The requested profile wins over the default. Offline launches never
    /// fail: they fall back to an offline profile carrying the chosen name.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        default: Option<&str>,
        online: bool,
    ) -> LauncherResult<LaunchAccountProfile> {
        let wanted = requested.or(default);
        let found = wanted.and_then(|name| self.find(name));

        if !online {
            let name = found
                .map(|account| account.username.as_str())
                .or(wanted)
                .unwrap_or("Player");
            return Ok(LaunchAccountProfile::offline(name));
        }

        match (found, wanted) {
            (Some(account), _) if account.usable_online() => Ok(account.clone()),
            (Some(account), _) => Err(LauncherError::AccountResolution(format!(
                "account '{}' cannot be used for online play",
                account.username
            ))),
            (None, Some(name)) => Err(LauncherError::AccountResolution(format!(
                "no account named '{name}'"
            ))),
            (None, None) => Err(LauncherError::AccountResolution(
                "no account selected and no default account configured".into(),
            )),
        }
    }
}

use std::fmt;

use crate::{Error, Result};

pub const EMAIL_ENV: &str = "HTCC_EMAIL";
pub const PASSWORD_ENV: &str = "HTCC_PASS";
/// Older names, still honoured when the primary variable is unset.
pub const LEGACY_EMAIL_ENV: &str = "PYHTCC_EMAIL";
pub const LEGACY_PASSWORD_ENV: &str = "PYHTCC_PASS";

/// Portal login. `Debug` output never includes the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads `HTCC_EMAIL` and `HTCC_PASS`, falling back to `PYHTCC_EMAIL` and
    /// `PYHTCC_PASS`. Empty values count as missing.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None)
    }

    /// Explicit values win; each missing one is read from the environment on its own.
    pub fn resolve(username: Option<String>, password: Option<String>) -> Result<Self> {
        Self::resolve_with(username, password, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        username: Option<String>,
        password: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let username = match username {
            Some(u) => u,
            None => first_non_empty(&[EMAIL_ENV, LEGACY_EMAIL_ENV], &lookup)?,
        };
        let password = match password {
            Some(p) => p,
            None => first_non_empty(&[PASSWORD_ENV, LEGACY_PASSWORD_ENV], &lookup)?,
        };
        Ok(Self::new(username, password))
    }
}

/// First variable in `names` with a non-blank value; the error names the primary one.
fn first_non_empty(
    names: &[&'static str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    names
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|v| !v.trim().is_empty())
        .ok_or(Error::MissingCredentials(names[0]))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

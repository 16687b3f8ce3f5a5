//! Access to credentials. Storage itself (encrypted or otherwise) lives
//! behind [`SecretProvider`]; the pipeline only ever reads a token and wraps
//! it in [`BearerToken`] so it cannot end up in logs.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Mutex;

use crate::notifetch::pipeline::error::{Result, ToolError};

/// Key-value secret storage.
pub trait SecretProvider {
    fn get_secret(&self, name: &str) -> Result<Option<String>>;
    fn set_secret(&self, name: &str, value: &str) -> Result<()>;
}

/// Reads secrets from environment variables. A secret named `notion_token`
/// is looked up as `NOTION_TOKEN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn variable_name(name: &str) -> String {
        name.to_ascii_uppercase().replace(['-', '.', ' '], "_")
    }
}

impl SecretProvider for EnvSecrets {
    fn get_secret(&self, name: &str) -> Result<Option<String>> {
        match env::var(Self::variable_name(name)) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
            Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
            Err(error @ env::VarError::NotUnicode(_)) => Err(ToolError::SecretStore(format!(
                "{}: {error}",
                Self::variable_name(name)
            ))),
        }
    }

    fn set_secret(&self, name: &str, _value: &str) -> Result<()> {
        Err(ToolError::SecretStore(format!(
            "environment secrets are read-only; export {} instead",
            Self::variable_name(name)
        )))
    }
}

/// Process-local secret store.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    values: Mutex<HashMap<String, String>>,
}

impl SecretProvider for MemorySecrets {
    fn get_secret(&self, name: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| ToolError::SecretStore("secret store poisoned".to_string()))?;
        Ok(values.get(name).cloned())
    }

    fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ToolError::SecretStore("secret store poisoned".to_string()))?;
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Bearer credential. Formats as `***` so it is safe to log the struct that
/// holds it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Looks up `name` in `provider`, failing when it is absent.
    pub fn from_provider(provider: &dyn SecretProvider, name: &str) -> Result<Self> {
        provider
            .get_secret(name)?
            .map(Self)
            .ok_or_else(|| ToolError::MissingSecret(name.to_string()))
    }

    /// The raw value, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_never_formats_its_value() {
        let token = BearerToken::new("secret_abc");
        assert_eq!(format!("{token}"), "***");
        assert!(!format!("{token:?}").contains("secret_abc"));
        assert_eq!(token.expose(), "secret_abc");
    }

    #[test]
    fn memory_store_round_trips_and_reports_missing() {
        let store = MemorySecrets::default();
        store.set_secret("notion_token", "abc").expect("stored");
        let token = BearerToken::from_provider(&store, "notion_token").expect("present");
        assert_eq!(token.expose(), "abc");
        assert!(matches!(
            BearerToken::from_provider(&store, "other"),
            Err(ToolError::MissingSecret(_))
        ));
    }

    #[test]
    fn env_names_are_upper_snake_case() {
        assert_eq!(EnvSecrets::variable_name("notion-token"), "NOTION_TOKEN");
    }
}

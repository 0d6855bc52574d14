//! Credential handling for model providers.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read, so they
//! cannot reach `Debug`/`Display` output or logs. The raw value is only
//! exposed when the request header is set.
//!
//! ```ignore
//! let cred = ApiCredential::from_env(GEMINI_API_KEY_ENV, "Gemini API key")?;
//! request.header("x-goog-api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from an environment variable
    Environment,
    /// Passed in by the caller
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is zeroed on drop.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a raw value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    ///
    /// Unset and empty variables are both treated as not configured.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        match std::env::var(env_var) {
            Ok(value) if !value.is_empty() => {
                Ok(Self::new(value, CredentialSource::Environment, name))
            }
            _ => Err(ProviderError::NotConfigured(format!(
                "{} not set: configure '{}' environment variable",
                name, env_var
            ))),
        }
    }

    /// Use an explicit value when given, otherwise the environment variable.
    pub fn explicit_or_env(
        explicit: Option<String>,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        match explicit {
            Some(value) if !value.is_empty() => {
                Ok(Self::new(value, CredentialSource::Programmatic, name))
            }
            _ => Self::from_env(env_var, name),
        }
    }

    /// Expose the raw value at the point of use.
    ///
    /// Never store the returned string.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "AIza-super-secret-key-12345";

    #[test]
    fn test_credential_redacted_in_debug() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Programmatic, "Test API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(SECRET), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Environment, "Test API key");

        let display = format!("{}", cred);
        assert!(!display.contains(SECRET), "Secret exposed in Display!");
        assert!(display.contains("[REDACTED]"));
        assert!(display.contains("Test API key"));
        assert!(display.contains("environment"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Programmatic, "Test API key");
        assert_eq!(cred.expose(), SECRET);
    }

    #[test]
    fn test_explicit_value_wins() {
        std::env::set_var("FACTCHECK_TEST_KEY_PRIORITY", "env-key");
        let cred = ApiCredential::explicit_or_env(
            Some("explicit-key".to_string()),
            "FACTCHECK_TEST_KEY_PRIORITY",
            "Test key",
        )
        .unwrap();

        assert_eq!(cred.expose(), "explicit-key");
        assert_eq!(cred.source, CredentialSource::Programmatic);
        std::env::remove_var("FACTCHECK_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_falls_back_to_env() {
        std::env::set_var("FACTCHECK_TEST_KEY_FALLBACK", "env-key");
        let cred =
            ApiCredential::explicit_or_env(None, "FACTCHECK_TEST_KEY_FALLBACK", "Test key").unwrap();

        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source, CredentialSource::Environment);
        std::env::remove_var("FACTCHECK_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let err = ApiCredential::from_env("FACTCHECK_NONEXISTENT_VAR_12345", "Test key").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("FACTCHECK_NONEXISTENT_VAR_12345"));

        std::env::set_var("FACTCHECK_TEST_KEY_EMPTY", "");
        assert!(ApiCredential::from_env("FACTCHECK_TEST_KEY_EMPTY", "Test key").is_err());
        std::env::remove_var("FACTCHECK_TEST_KEY_EMPTY");
    }
}

use anyhow::{Context, Result};

const DEFAULT_DATABASE: &str = "lifetracker";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Application configuration loaded from environment variables.
/// Every external dependency has a mock fallback, so nothing is strictly required.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub node_env: String,
    /// Browser origins allowed by CORS (`CORS_ORIGINS`, comma separated). Empty allows any.
    pub cors_origins: Vec<String>,
    pub cosmos: CosmosConfig,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub text_analytics: Option<TextAnalyticsConfig>,
    pub key_vault: KeyVaultConfig,
}

#[derive(Debug, Clone)]
pub struct CosmosConfig {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub database: String,
    /// Resolved at load time: explicit flag, missing credentials, or a test environment.
    pub use_mock: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub authority: String,
    pub mock: bool,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub mock: bool,
}

#[derive(Debug, Clone)]
pub struct TextAnalyticsConfig {
    pub endpoint: String,
    pub key: String,
}

/// Key Vault settings are read and reported; secrets always come from the environment.
#[derive(Debug, Clone)]
pub struct KeyVaultConfig {
    pub url: Option<String>,
    pub enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            get(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let node_env = get("NODE_ENV").unwrap_or_else(|| "development".to_string());

        let endpoint = get("COSMOS_DB_ENDPOINT");
        let key = get("COSMOS_DB_KEY");
        let use_mock = flag("USE_MOCK_DATABASE")
            || endpoint.is_none()
            || key.is_none()
            || node_env == "test";

        let client_id = get("AZURE_CLIENT_ID");
        let auth = AuthConfig {
            mock: flag("MOCK_AUTH") || client_id.is_none(),
            client_id,
            authority: get("AZURE_AUTHORITY")
                .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let openai_key = get("OPENAI_API_KEY");
        let openai = OpenAiConfig {
            mock: flag("MOCK_OPENAI") || openai_key.is_none(),
            api_key: openai_key,
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        };

        let text_analytics = match (get("TEXT_ANALYTICS_ENDPOINT"), get("TEXT_ANALYTICS_KEY")) {
            (Some(endpoint), Some(key)) => Some(TextAnalyticsConfig { endpoint, key }),
            _ => None,
        };

        Ok(Config {
            port: get("PORT")
                .unwrap_or_else(|| "3001".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            node_env,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().trim_end_matches('/').to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            cosmos: CosmosConfig {
                endpoint,
                key,
                database: get("COSMOS_DB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                use_mock,
            },
            auth,
            openai,
            text_analytics,
            key_vault: KeyVaultConfig {
                url: get("AZURE_KEY_VAULT_URL"),
                enabled: flag("USE_KEY_VAULT"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_defaults_select_mocks() {
        let config = config_from(&[]);
        assert!(config.cosmos.use_mock);
        assert!(config.auth.mock);
        assert!(config.openai.mock);
        assert_eq!(config.port, 3001);
        assert_eq!(config.cosmos.database, "lifetracker");
        assert!(config.text_analytics.is_none());
    }

    #[test]
    fn test_credentials_select_real_database() {
        let config = config_from(&[
            ("COSMOS_DB_ENDPOINT", "https://acct.documents.azure.com:443/"),
            ("COSMOS_DB_KEY", "c2VjcmV0"),
        ]);
        assert!(!config.cosmos.use_mock);
    }

    #[test]
    fn test_explicit_mock_flag_and_test_env_win() {
        let flagged = config_from(&[
            ("COSMOS_DB_ENDPOINT", "https://acct.documents.azure.com:443/"),
            ("COSMOS_DB_KEY", "c2VjcmV0"),
            ("USE_MOCK_DATABASE", "true"),
        ]);
        assert!(flagged.cosmos.use_mock);

        let test_env = config_from(&[
            ("COSMOS_DB_ENDPOINT", "https://acct.documents.azure.com:443/"),
            ("COSMOS_DB_KEY", "c2VjcmV0"),
            ("NODE_ENV", "test"),
        ]);
        assert!(test_env.cosmos.use_mock);
    }

    #[test]
    fn test_openai_key_disables_mock_unless_flagged() {
        let real = config_from(&[("OPENAI_API_KEY", "sk-test")]);
        assert!(!real.openai.mock);

        let mocked = config_from(&[("OPENAI_API_KEY", "sk-test"), ("MOCK_OPENAI", "true")]);
        assert!(mocked.openai.mock);
    }

    #[test]
    fn test_authority_trailing_slash_is_trimmed() {
        let config = config_from(&[
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_AUTHORITY", "https://login.microsoftonline.com/tenant/"),
        ]);
        assert!(!config.auth.mock);
        assert_eq!(
            config.auth.authority,
            "https://login.microsoftonline.com/tenant"
        );
    }

    #[test]
    fn test_cors_origins_are_split() {
        assert!(config_from(&[]).cors_origins.is_empty());
        let config = config_from(&[(
            "CORS_ORIGINS",
            "https://app.example.com/, http://localhost:3000 ,",
        )]);
        assert_eq!(
            config.cors_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = Config::from_lookup(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert!(result.is_err());
    }
}

use dotenvy::dotenv;
use std::env;

use crate::auth::JwtAudience;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Horizon base URL. When unset, confirmation times fall back to the
    /// local clock.
    pub horizon_url: Option<String>,
    /// JSON file with the served assets; the builtin catalog is used when
    /// unset.
    pub assets_file: Option<String>,
    pub sep10_jwt_secret: Option<String>,
    pub sep24_interactive_url_jwt_secret: Option<String>,
    pub sep24_more_info_url_jwt_secret: Option<String>,
    pub callback_auth_secret: Option<String>,
    pub platform_auth_secret: Option<String>,
    pub custody_auth_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            horizon_url: env::var("STELLAR_HORIZON_URL").ok(),
            assets_file: env::var("ASSETS_FILE").ok(),
            sep10_jwt_secret: env::var("SEP10_JWT_SECRET").ok(),
            sep24_interactive_url_jwt_secret: env::var("SEP24_INTERACTIVE_URL_JWT_SECRET").ok(),
            sep24_more_info_url_jwt_secret: env::var("SEP24_MORE_INFO_URL_JWT_SECRET").ok(),
            callback_auth_secret: env::var("CALLBACK_AUTH_SECRET").ok(),
            platform_auth_secret: env::var("PLATFORM_AUTH_SECRET").ok(),
            custody_auth_secret: env::var("CUSTODY_AUTH_SECRET").ok(),
        })
    }

    /// The configured (audience, secret) pairs.
    pub fn jwt_secrets(&self) -> Vec<(JwtAudience, String)> {
        [
            (JwtAudience::Sep10, &self.sep10_jwt_secret),
            (
                JwtAudience::Sep24Interactive,
                &self.sep24_interactive_url_jwt_secret,
            ),
            (
                JwtAudience::Sep24MoreInfo,
                &self.sep24_more_info_url_jwt_secret,
            ),
            (JwtAudience::Callback, &self.callback_auth_secret),
            (JwtAudience::Platform, &self.platform_auth_secret),
            (JwtAudience::Custody, &self.custody_auth_secret),
        ]
        .into_iter()
        .filter_map(|(audience, secret)| {
            secret.as_ref().map(|secret| (audience, secret.clone()))
        })
        .collect()
    }
}

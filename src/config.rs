use serde::de::{value::StrDeserializer, IntoDeserializer};
use serde::Deserialize;
use std::fmt;

/// What happens to `Set-Cookie` headers sent by the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookiePolicy {
    /// Forward cookies with their `Domain` attribute removed.
    #[default]
    Rewrite,
    /// Drop every cookie.
    Suppress,
}

impl std::str::FromStr for CookiePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let deserializer: StrDeserializer<'_, serde::de::value::Error> =
            normalized.as_str().into_deserializer();
        Self::deserialize(deserializer).map_err(|e| format!("unknown cookie policy: {e}"))
    }
}

/// Independent response rewriting stages.
#[derive(Debug, Clone)]
pub struct RewriteStages {
    pub cookies: CookiePolicy,
    pub redirects: bool,
    pub css: bool,
    pub home_button: bool,
    pub base_tag: bool,
}

impl Default for RewriteStages {
    fn default() -> Self {
        Self {
            cookies: CookiePolicy::Rewrite,
            redirects: true,
            css: true,
            home_button: true,
            base_tag: false,
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_hosts: Vec<String>,
    pub credentials: Option<Credentials>,
    pub stages: RewriteStages,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        let allowed_hosts = std::env::var("DETOUR_ALLOWED_HOSTS")
            .ok()
            .map(|hosts_str| {
                hosts_str
                    .split(',')
                    .map(|host| host.trim().to_ascii_lowercase())
                    .filter(|host| !host.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let credentials = match (
            std::env::var("DETOUR_AUTH_USER"),
            std::env::var("DETOUR_AUTH_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() => Some(Credentials {
                username,
                password,
            }),
            _ => None,
        };

        let defaults = RewriteStages::default();
        Self {
            port: env_or("DETOUR_PORT", 8080),
            allowed_hosts,
            credentials,
            stages: RewriteStages {
                cookies: env_or("DETOUR_COOKIES", defaults.cookies),
                redirects: env_or("DETOUR_REWRITE_REDIRECTS", defaults.redirects),
                css: env_or("DETOUR_REWRITE_CSS", defaults.css),
                home_button: env_or("DETOUR_HOME_BUTTON", defaults.home_button),
                base_tag: env_or("DETOUR_BASE_TAG", defaults.base_tag),
            },
        }
    }
}

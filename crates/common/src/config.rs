use anyhow::{Result, anyhow};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// 个人资料可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileVisibility {
    /// 对所有登录用户共享
    AllUsers,
    /// 仅公开最少字段
    Private,
}

impl ProfileVisibility {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "all_users" => Some(Self::AllUsers),
            "private" => Some(Self::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllUsers => "all_users",
            Self::Private => "private",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub lms_addr: String,
    pub platform_name: String,
    pub site_name: String,
    pub debug: bool,
    pub api_key: Option<String>,
    pub xqueue_url: String,
    pub xqueue_username: Option<String>,
    pub xqueue_password: Option<String>,
    /// `user:password`，队列前置代理要求的 HTTP basic auth
    pub xqueue_basic_auth: Option<(String, String)>,
    pub xqueue_timeout_secs: u64,
    pub cert_queue: String,
    pub use_https_callbacks: bool,
    pub certificates_html_view: bool,
    pub certs_html_view_config_path: Option<PathBuf>,
    pub config_cache_ttl_secs: u64,
    pub callback_bad_request_limit: u64,
    pub callback_bad_request_window_secs: u64,
    /// 只有来自这些地址的请求才读取 `X-Forwarded-For` / `X-Real-IP`
    pub trusted_proxies: Vec<IpAddr>,
    pub default_profile_visibility: ProfileVisibility,
    pub shared_profile_fields: Vec<String>,
    pub private_profile_fields: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL is required"))?;
        let lms_addr = env::var("LMS_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let platform_name = env::var("PLATFORM_NAME").unwrap_or_else(|_| "CourseHub".to_string());
        let site_name = env::var("SITE_NAME").unwrap_or_else(|_| "localhost:8000".to_string());
        let debug = env_bool("DEBUG", false);
        let api_key = env::var("EDX_API_KEY").ok().filter(|v| !v.is_empty());

        let xqueue_url =
            env::var("XQUEUE_URL").unwrap_or_else(|_| "http://localhost:18040".to_string());
        let xqueue_username = env::var("XQUEUE_USERNAME").ok();
        let xqueue_password = env::var("XQUEUE_PASSWORD").ok();
        let xqueue_basic_auth = match env::var("XQUEUE_BASIC_AUTH") {
            Ok(raw) if !raw.is_empty() => Some(
                parse_basic_auth(&raw)
                    .ok_or_else(|| anyhow!("XQUEUE_BASIC_AUTH must be user:password"))?,
            ),
            _ => None,
        };
        let xqueue_timeout_secs = env_u64("XQUEUE_TIMEOUT_SECS", 5);
        let cert_queue = env::var("CERT_QUEUE").unwrap_or_else(|_| "certificates".to_string());
        let use_https_callbacks = env_bool("CALLBACK_USE_HTTPS", true);

        let certificates_html_view = env_bool("CERTIFICATES_HTML_VIEW", false);
        let certs_html_view_config_path = env::var("CERTS_HTML_VIEW_CONFIG_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let config_cache_ttl_secs = env_u64("CONFIG_CACHE_TTL_SECS", 60);
        let callback_bad_request_limit = env_u64("CALLBACK_BAD_REQUEST_LIMIT", 30);
        let callback_bad_request_window_secs = env_u64("CALLBACK_BAD_REQUEST_WINDOW_SECS", 300);
        let trusted_proxies = parse_ip_list(&env::var("TRUSTED_PROXIES").unwrap_or_default())?;

        let default_profile_visibility = match env::var("DEFAULT_PROFILE_VISIBILITY") {
            Ok(raw) => ProfileVisibility::parse(&raw)
                .ok_or_else(|| anyhow!("DEFAULT_PROFILE_VISIBILITY invalid value {}", raw))?,
            Err(_) => ProfileVisibility::AllUsers,
        };
        let shared_profile_fields = env_list(
            "SHARED_PROFILE_PUBLIC_FIELDS",
            &["username", "profile_image", "country", "time_zone", "languages", "bio"],
        );
        let private_profile_fields =
            env_list("PRIVATE_PROFILE_PUBLIC_FIELDS", &["username", "profile_image"]);

        Ok(Self {
            database_url,
            lms_addr,
            platform_name,
            site_name,
            debug,
            api_key,
            xqueue_url,
            xqueue_username,
            xqueue_password,
            xqueue_basic_auth,
            xqueue_timeout_secs,
            cert_queue,
            use_https_callbacks,
            certificates_html_view,
            certs_html_view_config_path,
            config_cache_ttl_secs,
            callback_bad_request_limit,
            callback_bad_request_window_secs,
            trusted_proxies,
            default_profile_visibility,
            shared_profile_fields,
            private_profile_fields,
        })
    }

    /// 测试与本地开发使用的默认配置
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            lms_addr: "127.0.0.1:8000".to_string(),
            platform_name: "CourseHub".to_string(),
            site_name: "lms.example.com".to_string(),
            debug: false,
            api_key: None,
            xqueue_url: "http://localhost:18040".to_string(),
            xqueue_username: None,
            xqueue_password: None,
            xqueue_basic_auth: None,
            xqueue_timeout_secs: 5,
            cert_queue: "certificates".to_string(),
            use_https_callbacks: true,
            certificates_html_view: false,
            certs_html_view_config_path: None,
            config_cache_ttl_secs: 60,
            callback_bad_request_limit: 30,
            callback_bad_request_window_secs: 300,
            trusted_proxies: Vec::new(),
            default_profile_visibility: ProfileVisibility::AllUsers,
            shared_profile_fields: to_strings(&[
                "username",
                "profile_image",
                "country",
                "time_zone",
                "languages",
                "bio",
            ]),
            private_profile_fields: to_strings(&["username", "profile_image"]),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_list(&raw),
        _ => to_strings(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>> {
    parse_list(raw)
        .into_iter()
        .map(|item| {
            item.parse()
                .map_err(|_| anyhow!("TRUSTED_PROXIES invalid address {}", item))
        })
        .collect()
}

fn parse_basic_auth(raw: &str) -> Option<(String, String)> {
    let (user, password) = raw.split_once(':')?;
    if user.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_blank_items() {
        assert_eq!(
            parse_list(" username, bio ,,country "),
            vec!["username", "bio", "country"]
        );
    }

    #[test]
    fn trusted_proxies_must_be_addresses() {
        assert_eq!(
            parse_ip_list("10.0.0.1, ::1").unwrap(),
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert!(parse_ip_list("").unwrap().is_empty());
        assert!(parse_ip_list("10.0.0.0/8").is_err());
    }

    #[test]
    fn basic_auth_requires_user() {
        assert_eq!(
            parse_basic_auth("queue:secret"),
            Some(("queue".to_string(), "secret".to_string()))
        );
        assert_eq!(parse_basic_auth(":secret"), None);
        assert_eq!(parse_basic_auth("nocolon"), None);
    }

    #[test]
    fn profile_visibility_round_trips_known_values() {
        assert_eq!(
            ProfileVisibility::parse("all_users"),
            Some(ProfileVisibility::AllUsers)
        );
        assert_eq!(
            ProfileVisibility::parse("private"),
            Some(ProfileVisibility::Private)
        );
        assert_eq!(ProfileVisibility::parse("friends"), None);
        assert_eq!(ProfileVisibility::Private.as_str(), "private");
    }

    #[test]
    fn default_config_uses_shared_profile_fields() {
        let config = AppConfig::for_database("sqlite::memory:");
        assert_eq!(config.shared_profile_fields.len(), 6);
        assert_eq!(config.private_profile_fields, vec!["username", "profile_image"]);
        assert_eq!(config.cert_queue, "certificates");
    }
}

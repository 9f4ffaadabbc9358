use crate::fetcher::DEFAULT_TIMEOUT_MS;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::runtime_config::DEFAULT_API_BASE_URL;
use anyhow::{anyhow, Result};
use clap::Args;

/// Connection and list settings shared by every scanx command.
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Path or http(s) URL of the runtime config.json (provides apiBaseUrl)
    #[arg(long, env = "RUNTIME_CONFIG_URL")]
    pub runtime_config_url: Option<String>,

    /// API base URL used when config.json is absent or fails to load
    #[arg(long, env = "API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Request timeout in milliseconds (1000-60000)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Page size used until the user picks one (must be one of the choices)
    #[arg(long, env = "DEFAULT_PAGE_SIZE")]
    pub default_page_size: Option<u32>,

    /// Allowed page sizes (comma-separated, e.g. "10,25,50,100")
    #[arg(long, env = "PAGE_SIZE_CHOICES")]
    pub page_size_choices: Option<String>,

    /// Where persisted settings (page size) are stored
    #[arg(long, env = "SETTINGS_PATH")]
    pub settings_path: Option<String>,

    /// Bearer token sent with API requests
    #[arg(long, env = "API_AUTH_TOKEN")]
    pub api_auth_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub runtime_config_url: Option<String>,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub default_page_size: u32,
    pub page_size_choices: Vec<u32>,
    pub settings_path: String,
    pub api_auth_token: Option<String>,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Parse comma-separated page sizes, keeping valid values in order
fn parse_page_sizes(s: &str) -> Vec<u32> {
    let mut sizes: Vec<u32> = Vec::new();
    for n in s
        .split(',')
        .filter_map(|v| v.trim().parse::<u32>().ok())
        .filter(|n| (1..=1000).contains(n))
    {
        if !sizes.contains(&n) {
            sizes.push(n);
        }
    }
    sizes
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

/// Build configuration from parsed CLI args (env fallbacks already applied
/// by clap). Priority: CLI args > Environment variables > Defaults
pub fn load(args: CliArgs) -> Result<Config> {
    let api_base_url = args
        .api_base_url
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    validate_url(&api_base_url, "API_BASE_URL")?;

    // config.json may be a local path; only URLs get scheme-checked
    let runtime_config_url = args.runtime_config_url.filter(|s| !s.trim().is_empty());
    if let Some(ref loc) = runtime_config_url {
        if loc.contains("://") {
            validate_url(loc, "RUNTIME_CONFIG_URL")?;
        }
    }

    let request_timeout_ms = args.request_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    let request_timeout_ms =
        validate_in_range(request_timeout_ms, 1000, 60000, "REQUEST_TIMEOUT_MS")?;

    let page_size_choices = args
        .page_size_choices
        .map(|s| parse_page_sizes(&s))
        .unwrap_or_else(|| vec![10, 25, 50, 100]);
    if page_size_choices.is_empty() {
        return Err(anyhow!(
            "PAGE_SIZE_CHOICES must contain at least one valid value (1-1000)"
        ));
    }

    let default_page_size = args.default_page_size.unwrap_or_else(|| {
        if page_size_choices.contains(&DEFAULT_PAGE_SIZE) {
            DEFAULT_PAGE_SIZE
        } else {
            page_size_choices[0]
        }
    });
    if !page_size_choices.contains(&default_page_size) {
        return Err(anyhow!(
            "DEFAULT_PAGE_SIZE {default_page_size} is not one of PAGE_SIZE_CHOICES {page_size_choices:?}"
        ));
    }

    Ok(Config {
        runtime_config_url,
        api_base_url,
        request_timeout_ms,
        default_page_size,
        page_size_choices,
        settings_path: args
            .settings_path
            .unwrap_or_else(|| "./scanx_settings.json".to_string()),
        api_auth_token: args.api_auth_token.filter(|t| !t.is_empty()),
    })
}

impl Config {
    /// Whether `n` is an allowed page size.
    pub fn allows_page_size(&self, n: u32) -> bool {
        self.page_size_choices.contains(&n)
    }

    /// Print current configuration (useful for debugging)
    pub fn print_summary(&self) {
        eprintln!("scanx configuration:");
        match &self.runtime_config_url {
            Some(loc) => eprintln!("  Runtime config: {loc}"),
            None => eprintln!("  Runtime config: (none)"),
        }
        eprintln!("  Fallback API: {}", self.api_base_url);
        eprintln!("  Timeout: {}ms", self.request_timeout_ms);
        eprintln!(
            "  Page size: {} (choices {:?})",
            self.default_page_size, self.page_size_choices
        );
        eprintln!("  Settings: {}", self.settings_path);
        if self.api_auth_token.is_some() {
            eprintln!("  API auth: Configured");
        }
    }
}

use serde::Deserialize;

/// Main configuration structure for Harvest Engine
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URLs inserted into the frontier before the first dispatch
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub frontier: FrontierConfig,

    #[serde(default)]
    pub learner: LearnerConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,
}

/// Scheduler and rate governor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Base delay between dispatches (milliseconds)
    pub request_interval_ms: u64,

    /// How long a single fetch may run before it is abandoned (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Fractional jitter applied to the interval, 0.4 means ±40%
    pub jitter: f64,

    /// Pause after a blocking signal (milliseconds)
    pub cooldown_ms: u64,

    /// Per-domain delay before request-count tiers are applied (milliseconds)
    pub base_domain_delay_ms: u64,

    /// A domain idle for longer than this gets a 30% delay discount (milliseconds)
    pub domain_idle_ms: u64,

    /// Longest time dirty state may stay unwritten while idle (seconds)
    pub flush_interval_secs: u64,

    /// Case-insensitive phrases that mark a page as an anti-bot wall
    pub blocking_keywords: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: 30_000,
            fetch_timeout_ms: 15_000,
            jitter: 0.4,
            cooldown_ms: 300_000,
            base_domain_delay_ms: 30_000,
            domain_idle_ms: 300_000,
            flush_interval_secs: 30,
            blocking_keywords: [
                "access denied",
                "captcha",
                "verify you are human",
                "unusual traffic",
                "automated access",
                "rate limit exceeded",
                "too many requests",
                "rate limit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Frontier store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FrontierConfig {
    /// Maximum number of discovered URLs kept; the oldest are evicted first
    pub capacity: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self { capacity: 5_000 }
    }
}

/// Pattern learner settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LearnerConfig {
    /// A page must yield more entities than this to update path patterns
    pub learn_threshold: u32,

    /// Number of example URLs remembered per pattern
    pub example_limit: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learn_threshold: 10,
            example_limit: 5,
        }
    }
}

/// What the crawl is looking for and where it may go
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Path fragments identifying entity (company profile) links
    pub entity_paths: Vec<String>,

    /// Domain patterns links must match (e.g. "*.example.com"); empty allows all
    pub allowed_domains: Vec<String>,

    /// Path fragments of navigation pages that never enter the frontier
    pub excluded_paths: Vec<String>,

    /// Collection tag patterns added at startup when not already stored
    pub collection_patterns: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            entity_paths: vec!["/agency/".to_string(), "/company/".to_string()],
            allowed_domains: Vec::new(),
            excluded_paths: [
                "/login", "/signup", "/register", "/terms", "/privacy", "/about", "/contact",
                "/blog", "/news", "/help", "/faq", "/careers", "/jobs",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            collection_patterns: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding persisted engine state
    #[serde(rename = "database-path")]
    pub database_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Host-level configuration for the automation scheduler, loaded from the
/// environment. All scheduler knobs are plain scalars; conversion to
/// `Duration` happens at the call site.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub worker_count: usize,
    pub default_max_history: usize,
    pub tick_interval_ms: u64,
    pub shutdown_grace_secs: u64,
    pub job_interval_secs: u64,
}

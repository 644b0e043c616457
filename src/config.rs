use std::env;

/// Immutable, environment-sourced configuration loaded once at process start.
///
/// Every field has a hardcoded default; an unparsable environment variable logs
/// a warning and falls back to that default rather than aborting startup. This
/// mirrors the teacher's `RateLimitConfig::from_env` pattern.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub temp_dir_root: String,
    pub max_temp_file_age_secs: u64,
    pub max_upload_size_mb: u64,
    pub analysis_timeout_secs: u64,
    pub max_concurrent_ai_calls: usize,
    pub ai_queue_timeout_secs: u64,
    pub val_api_key: Option<String>,
    pub llm_api_keys: Vec<String>,
    pub llm_fallback_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            temp_dir_root: "/tmp/chatlens-uploads".to_string(),
            max_temp_file_age_secs: 3600,
            max_upload_size_mb: 25,
            analysis_timeout_secs: 300,
            max_concurrent_ai_calls: 4,
            ai_queue_timeout_secs: 20,
            val_api_key: None,
            llm_api_keys: Vec::new(),
            llm_fallback_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("HOST") {
            config.host = val;
        }
        set_parsed(&mut config.port, "PORT");
        if let Ok(val) = env::var("TEMP_DIR_ROOT") {
            config.temp_dir_root = val;
        }
        set_parsed(&mut config.max_temp_file_age_secs, "MAX_TEMP_FILE_AGE_SECONDS");
        set_parsed(&mut config.max_upload_size_mb, "MAX_UPLOAD_SIZE_MB");
        set_parsed(&mut config.analysis_timeout_secs, "ANALYSIS_TIMEOUT_SECONDS");
        set_parsed(&mut config.max_concurrent_ai_calls, "MAX_CONCURRENT_AI_CALLS");
        set_parsed(&mut config.ai_queue_timeout_secs, "AI_QUEUE_TIMEOUT_SECONDS");

        if let Ok(val) = env::var("VAL_API_KEY") {
            if !val.is_empty() {
                config.val_api_key = Some(val);
            }
        }
        if let Ok(val) = env::var("LLM_API_KEYS") {
            config.llm_api_keys = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(val) = env::var("LLM_FALLBACK_API_KEY") {
            if !val.is_empty() {
                config.llm_fallback_api_key = Some(val);
            }
        }
        if let Ok(val) = env::var("LLM_BASE_URL") {
            config.llm_base_url = val;
        }
        if let Ok(val) = env::var("LLM_MODEL") {
            config.llm_model = val;
        }

        config
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Parse an environment variable into `field`'s type, logging and keeping the
/// default on failure.
fn set_parsed<T: std::str::FromStr>(field: &mut T, key: &str) {
    if let Ok(val) = env::var(key) {
        match val.parse::<T>() {
            Ok(parsed) => *field = parsed,
            Err(_) => eprintln!("⚠️  Invalid value for {key}={val:?}, keeping default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_upload_size_bytes(), 25 * 1024 * 1024);
        assert!(config.val_api_key.is_none());
    }
}

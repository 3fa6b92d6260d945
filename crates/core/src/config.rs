use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HEYREACH_BASE_URL: &str = "https://api.heyreach.io";

const DEFAULT_ACCOUNT_IDS: [i64; 29] = [
    93126, 94526, 94527, 94530, 94531, 94533, 94534, 94559, 94576, 94837, 94853, 96268, 96269,
    96274, 96280, 96283, 96291, 96298, 103961, 106125, 118434, 122980, 123017, 123026, 135173,
    135177, 135181, 135183, 135189,
];
const DEFAULT_CAMPAIGN_IDS: [i64; 6] = [223998, 240191, 274509, 181549, 180990, 180988];
const DEFAULT_CAZVID_CAMPAIGN_IDS: [i64; 4] = [274509, 181549, 180990, 180988];
const DEFAULT_AGENCY_LEADS_CAMPAIGN_IDS: [i64; 2] = [223998, 240191];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub heyreach: HeyReachConfig,
    pub llm: LlmConfig,
    pub processing: ProcessingConfig,
    pub links: LinksConfig,
    pub dashboard: DashboardConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct HeyReachConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub account_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
    pub fetch_limit: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Explicit provider choice. When unset the provider is inferred from which key is present.
    pub provider: Option<LlmProvider>,
    pub openai_api_key: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub primary_model: String,
    pub review_model: String,
    pub anthropic_model: String,
    pub vector_store_id: Option<String>,
    pub review_enabled: bool,
    /// Output cap for Anthropic calls.
    pub max_tokens: u32,
    /// Output cap for OpenAI Responses calls. Unset sends no cap, since reasoning
    /// tokens count against it.
    pub openai_max_output_tokens: Option<u32>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub send_enabled: bool,
    pub auto_approve_confidence: f64,
    pub max_messages_per_run: u32,
    pub cazvid_campaign_ids: Vec<i64>,
    pub agency_leads_campaign_ids: Vec<i64>,
    pub escalation_tag: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinksConfig {
    pub cazvid_job_posting_es: String,
    pub cazvid_job_posting_en: String,
    pub cazvid_tutorial_es: String,
    pub cazvid_tutorial_en: String,
    pub cazvid_contact_tutorial_es: String,
    pub agency_leads_calendly: String,
}

#[derive(Clone, Debug, Default)]
pub struct DashboardConfig {
    pub password: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub heyreach_api_key: Option<String>,
    pub heyreach_base_url: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub send_enabled: Option<bool>,
    pub max_messages_per_run: Option<u32>,
    pub dashboard_password: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            heyreach: HeyReachConfig {
                api_key: String::new().into(),
                base_url: DEFAULT_HEYREACH_BASE_URL.to_string(),
                account_ids: DEFAULT_ACCOUNT_IDS.to_vec(),
                campaign_ids: DEFAULT_CAMPAIGN_IDS.to_vec(),
                fetch_limit: 25,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: None,
                openai_api_key: None,
                anthropic_api_key: None,
                primary_model: "gpt-5-mini".to_string(),
                review_model: "gpt-5".to_string(),
                anthropic_model: "claude-sonnet-4-20250514".to_string(),
                vector_store_id: None,
                review_enabled: true,
                max_tokens: 1024,
                openai_max_output_tokens: None,
                timeout_secs: 120,
            },
            processing: ProcessingConfig {
                send_enabled: false,
                auto_approve_confidence: 0.85,
                max_messages_per_run: 30,
                cazvid_campaign_ids: DEFAULT_CAZVID_CAMPAIGN_IDS.to_vec(),
                agency_leads_campaign_ids: DEFAULT_AGENCY_LEADS_CAMPAIGN_IDS.to_vec(),
                escalation_tag: None,
            },
            links: LinksConfig::default(),
            dashboard: DashboardConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            cazvid_job_posting_es: "https://cazvid.com/es/vacantes/publicar".to_string(),
            cazvid_job_posting_en: "https://cazvid.com/en/vacancies/post".to_string(),
            cazvid_tutorial_es: "https://youtu.be/mldU26l91ZA".to_string(),
            cazvid_tutorial_en: "https://youtu.be/Y3l1YJlLWIk".to_string(),
            cazvid_contact_tutorial_es: "https://youtu.be/tJ2z3gGrub4".to_string(),
            agency_leads_calendly: "https://calendly.com/jan-at-cazvid/agency-leads".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_provider(&self) -> LlmProvider {
        if let Some(provider) = self.provider {
            return provider;
        }
        if has_secret(self.openai_api_key.as_ref()) {
            LlmProvider::OpenAi
        } else if has_secret(self.anthropic_api_key.as_ref()) {
            LlmProvider::Anthropic
        } else {
            LlmProvider::OpenAi
        }
    }

    pub fn api_key_for(&self, provider: LlmProvider) -> Option<&SecretString> {
        match provider {
            LlmProvider::OpenAi => self.openai_api_key.as_ref(),
            LlmProvider::Anthropic => self.anthropic_api_key.as_ref(),
        }
    }
}

impl DashboardConfig {
    pub fn password_required(&self) -> bool {
        has_secret(self.password.as_ref())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn has_secret(value: Option<&SecretString>) -> bool {
    value.map(|secret| !secret.expose_secret().trim().is_empty()).unwrap_or(false)
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("outreach.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(environment) = patch.environment {
            self.environment = environment;
        }

        if let Some(heyreach) = patch.heyreach {
            if let Some(api_key) = heyreach.api_key {
                self.heyreach.api_key = secret_value(api_key);
            }
            if let Some(base_url) = heyreach.base_url {
                self.heyreach.base_url = base_url;
            }
            if let Some(account_ids) = heyreach.account_ids {
                self.heyreach.account_ids = account_ids;
            }
            if let Some(campaign_ids) = heyreach.campaign_ids {
                self.heyreach.campaign_ids = campaign_ids;
            }
            if let Some(fetch_limit) = heyreach.fetch_limit {
                self.heyreach.fetch_limit = fetch_limit;
            }
            if let Some(timeout_secs) = heyreach.timeout_secs {
                self.heyreach.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = Some(provider);
            }
            if let Some(openai_api_key) = llm.openai_api_key {
                self.llm.openai_api_key = Some(secret_value(openai_api_key));
            }
            if let Some(anthropic_api_key) = llm.anthropic_api_key {
                self.llm.anthropic_api_key = Some(secret_value(anthropic_api_key));
            }
            if let Some(primary_model) = llm.primary_model {
                self.llm.primary_model = primary_model;
            }
            if let Some(review_model) = llm.review_model {
                self.llm.review_model = review_model;
            }
            if let Some(anthropic_model) = llm.anthropic_model {
                self.llm.anthropic_model = anthropic_model;
            }
            if let Some(vector_store_id) = llm.vector_store_id {
                self.llm.vector_store_id = Some(vector_store_id);
            }
            if let Some(review_enabled) = llm.review_enabled {
                self.llm.review_enabled = review_enabled;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(max_output_tokens) = llm.openai_max_output_tokens {
                self.llm.openai_max_output_tokens = Some(max_output_tokens);
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(processing) = patch.processing {
            if let Some(send_enabled) = processing.send_enabled {
                self.processing.send_enabled = send_enabled;
            }
            if let Some(auto_approve_confidence) = processing.auto_approve_confidence {
                self.processing.auto_approve_confidence = auto_approve_confidence;
            }
            if let Some(max_messages_per_run) = processing.max_messages_per_run {
                self.processing.max_messages_per_run = max_messages_per_run;
            }
            if let Some(ids) = processing.cazvid_campaign_ids {
                self.processing.cazvid_campaign_ids = ids;
            }
            if let Some(ids) = processing.agency_leads_campaign_ids {
                self.processing.agency_leads_campaign_ids = ids;
            }
            if let Some(escalation_tag) = processing.escalation_tag {
                self.processing.escalation_tag = Some(escalation_tag);
            }
        }

        if let Some(links) = patch.links {
            if let Some(value) = links.cazvid_job_posting_es {
                self.links.cazvid_job_posting_es = value;
            }
            if let Some(value) = links.cazvid_job_posting_en {
                self.links.cazvid_job_posting_en = value;
            }
            if let Some(value) = links.cazvid_tutorial_es {
                self.links.cazvid_tutorial_es = value;
            }
            if let Some(value) = links.cazvid_tutorial_en {
                self.links.cazvid_tutorial_en = value;
            }
            if let Some(value) = links.cazvid_contact_tutorial_es {
                self.links.cazvid_contact_tutorial_es = value;
            }
            if let Some(value) = links.agency_leads_calendly {
                self.links.agency_leads_calendly = value;
            }
        }

        if let Some(dashboard) = patch.dashboard {
            if let Some(password) = dashboard.password {
                self.dashboard.password = Some(secret_value(password));
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some((_, value)) = read_env_any(&["OUTREACH_ENVIRONMENT", "NODE_ENV"]) {
            self.environment = value;
        }

        if let Some((_, value)) = read_env_any(&["OUTREACH_HEYREACH_API_KEY", "HEYREACH_API_KEY"])
        {
            self.heyreach.api_key = secret_value(value);
        }
        if let Some((_, value)) = read_env_any(&["OUTREACH_HEYREACH_BASE_URL"]) {
            self.heyreach.base_url = value;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_ACCOUNT_IDS"]) {
            self.heyreach.account_ids = parse_id_list(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_CAMPAIGN_IDS"]) {
            self.heyreach.campaign_ids = parse_id_list(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_FETCH_LIMIT", "FETCH_LIMIT"]) {
            self.heyreach.fetch_limit = parse_u32(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_HEYREACH_TIMEOUT_SECS"]) {
            self.heyreach.timeout_secs = parse_u64(key, &value)?;
        }

        if let Some((_, value)) = read_env_any(&["OUTREACH_LLM_PROVIDER"]) {
            self.llm.provider = Some(value.parse()?);
        }
        if let Some((_, value)) = read_env_any(&["OUTREACH_OPENAI_API_KEY", "OPENAI_API_KEY"]) {
            self.llm.openai_api_key = Some(secret_value(value));
        }
        if let Some((_, value)) =
            read_env_any(&["OUTREACH_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"])
        {
            self.llm.anthropic_api_key = Some(secret_value(value));
        }
        if let Some((_, value)) =
            read_env_any(&["OUTREACH_PRIMARY_MODEL", "OPENAI_PRIMARY_MODEL"])
        {
            self.llm.primary_model = value;
        }
        if let Some((_, value)) = read_env_any(&["OUTREACH_REVIEW_MODEL", "OPENAI_REVIEW_MODEL"]) {
            self.llm.review_model = value;
        }
        if let Some((_, value)) = read_env_any(&["OUTREACH_ANTHROPIC_MODEL", "CLAUDE_MODEL"]) {
            self.llm.anthropic_model = value;
        }
        if let Some((_, value)) =
            read_env_any(&["OUTREACH_VECTOR_STORE_ID", "OPENAI_VECTOR_STORE_ID"])
        {
            self.llm.vector_store_id = Some(value);
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_REVIEW_ENABLED"]) {
            self.llm.review_enabled = parse_bool(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_LLM_MAX_TOKENS"]) {
            self.llm.max_tokens = parse_u32(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_OPENAI_MAX_OUTPUT_TOKENS"]) {
            self.llm.openai_max_output_tokens = Some(parse_u32(key, &value)?);
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_LLM_TIMEOUT_SECS"]) {
            self.llm.timeout_secs = parse_u64(key, &value)?;
        }

        if let Some((key, value)) = read_env_any(&["OUTREACH_SEND_ENABLED", "SEND_ENABLED"]) {
            self.processing.send_enabled = parse_bool(key, &value)?;
        }
        if let Some((key, value)) =
            read_env_any(&["OUTREACH_AUTO_APPROVE_CONFIDENCE", "AUTO_APPROVE_CONFIDENCE"])
        {
            self.processing.auto_approve_confidence = parse_f64(key, &value)?;
        }
        if let Some((key, value)) =
            read_env_any(&["OUTREACH_MAX_MESSAGES_PER_RUN", "MAX_MESSAGES_PER_RUN"])
        {
            self.processing.max_messages_per_run = parse_u32(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_CAZVID_CAMPAIGN_IDS"]) {
            self.processing.cazvid_campaign_ids = parse_id_list(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_AGENCY_LEADS_CAMPAIGN_IDS"]) {
            self.processing.agency_leads_campaign_ids = parse_id_list(key, &value)?;
        }
        if let Some((_, value)) = read_env_any(&["OUTREACH_ESCALATION_TAG"]) {
            self.processing.escalation_tag = Some(value);
        }

        if let Some((_, value)) =
            read_env_any(&["OUTREACH_DASHBOARD_PASSWORD", "DASHBOARD_PASSWORD"])
        {
            self.dashboard.password = Some(secret_value(value));
        }

        if let Some((_, value)) = read_env_any(&["OUTREACH_SERVER_BIND_ADDRESS"]) {
            self.server.bind_address = value;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_SERVER_PORT", "PORT"]) {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some((key, value)) = read_env_any(&["OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS"]) {
            self.server.graceful_shutdown_secs = parse_u64(key, &value)?;
        }

        if let Some((_, value)) = read_env_any(&["OUTREACH_LOGGING_LEVEL", "OUTREACH_LOG_LEVEL"])
        {
            self.logging.level = value;
        }
        if let Some((_, value)) =
            read_env_any(&["OUTREACH_LOGGING_FORMAT", "OUTREACH_LOG_FORMAT"])
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.heyreach_api_key {
            self.heyreach.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.heyreach_base_url {
            self.heyreach.base_url = base_url;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = Some(provider);
        }
        if let Some(openai_api_key) = overrides.openai_api_key {
            self.llm.openai_api_key = Some(secret_value(openai_api_key));
        }
        if let Some(anthropic_api_key) = overrides.anthropic_api_key {
            self.llm.anthropic_api_key = Some(secret_value(anthropic_api_key));
        }
        if let Some(send_enabled) = overrides.send_enabled {
            self.processing.send_enabled = send_enabled;
        }
        if let Some(max_messages_per_run) = overrides.max_messages_per_run {
            self.processing.max_messages_per_run = max_messages_per_run;
        }
        if let Some(password) = overrides.dashboard_password {
            self.dashboard.password = Some(secret_value(password));
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_heyreach(&self.heyreach)?;
        validate_llm(&self.llm)?;
        validate_processing(&self.processing)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("outreach.toml"), PathBuf::from("config/outreach.toml")]
        .into_iter()
        .find(|path| path.exists())
}

pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_heyreach(heyreach: &HeyReachConfig) -> Result<(), ConfigError> {
    if heyreach.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "heyreach.api_key is required. Set HEYREACH_API_KEY (HeyReach > Settings > API)"
                .to_string(),
        ));
    }

    let base_url = heyreach.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "heyreach.base_url must start with http:// or https://".to_string(),
        ));
    }

    if heyreach.fetch_limit == 0 || heyreach.fetch_limit > 100 {
        return Err(ConfigError::Validation(
            "heyreach.fetch_limit must be in range 1..=100".to_string(),
        ));
    }

    if heyreach.timeout_secs == 0 || heyreach.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "heyreach.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.openai_max_output_tokens == Some(0) {
        return Err(ConfigError::Validation(
            "llm.openai_max_output_tokens must be greater than zero when set".to_string(),
        ));
    }

    let provider = llm.resolved_provider();
    if !has_secret(llm.api_key_for(provider)) {
        let message = match (llm.provider, provider) {
            (None, _) => "an llm api key is required: set OPENAI_API_KEY or ANTHROPIC_API_KEY",
            (Some(_), LlmProvider::OpenAi) => {
                "llm.openai_api_key is required for the openai provider"
            }
            (Some(_), LlmProvider::Anthropic) => {
                "llm.anthropic_api_key is required for the anthropic provider"
            }
        };
        return Err(ConfigError::Validation(message.to_string()));
    }

    Ok(())
}

fn validate_processing(processing: &ProcessingConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&processing.auto_approve_confidence) {
        return Err(ConfigError::Validation(
            "processing.auto_approve_confidence must be in range 0.0..=1.0".to_string(),
        ));
    }

    if processing.max_messages_per_run == 0 {
        return Err(ConfigError::Validation(
            "processing.max_messages_per_run must be greater than zero".to_string(),
        ));
    }

    if matches!(&processing.escalation_tag, Some(tag) if tag.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "processing.escalation_tag must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env_any(keys: &[&'static str]) -> Option<(&'static str, String)> {
    keys.iter().find_map(|key| {
        env::var(key).ok().filter(|value| !value.trim().is_empty()).map(|value| (*key, value))
    })
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| invalid(key, value))
}

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>().map_err(|_| invalid(key, value)))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    environment: Option<String>,
    heyreach: Option<HeyReachPatch>,
    llm: Option<LlmPatch>,
    processing: Option<ProcessingPatch>,
    links: Option<LinksPatch>,
    dashboard: Option<DashboardPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct HeyReachPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    account_ids: Option<Vec<i64>>,
    campaign_ids: Option<Vec<i64>>,
    fetch_limit: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    openai_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    primary_model: Option<String>,
    review_model: Option<String>,
    anthropic_model: Option<String>,
    vector_store_id: Option<String>,
    review_enabled: Option<bool>,
    max_tokens: Option<u32>,
    openai_max_output_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProcessingPatch {
    send_enabled: Option<bool>,
    auto_approve_confidence: Option<f64>,
    max_messages_per_run: Option<u32>,
    cazvid_campaign_ids: Option<Vec<i64>>,
    agency_leads_campaign_ids: Option<Vec<i64>>,
    escalation_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    cazvid_job_posting_es: Option<String>,
    cazvid_job_posting_en: Option<String>,
    cazvid_tutorial_es: Option<String>,
    cazvid_tutorial_en: Option<String>,
    cazvid_contact_tutorial_es: Option<String>,
    agency_leads_calendly: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardPatch {
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Every variable the loader reads. Tests clear these to get a clean slate.
pub const ENV_KEYS: &[&str] = &[
    "OUTREACH_ENVIRONMENT",
    "NODE_ENV",
    "OUTREACH_HEYREACH_API_KEY",
    "HEYREACH_API_KEY",
    "OUTREACH_HEYREACH_BASE_URL",
    "OUTREACH_ACCOUNT_IDS",
    "OUTREACH_CAMPAIGN_IDS",
    "OUTREACH_FETCH_LIMIT",
    "FETCH_LIMIT",
    "OUTREACH_HEYREACH_TIMEOUT_SECS",
    "OUTREACH_LLM_PROVIDER",
    "OUTREACH_OPENAI_API_KEY",
    "OPENAI_API_KEY",
    "OUTREACH_ANTHROPIC_API_KEY",
    "ANTHROPIC_API_KEY",
    "OUTREACH_PRIMARY_MODEL",
    "OPENAI_PRIMARY_MODEL",
    "OUTREACH_REVIEW_MODEL",
    "OPENAI_REVIEW_MODEL",
    "OUTREACH_ANTHROPIC_MODEL",
    "CLAUDE_MODEL",
    "OUTREACH_VECTOR_STORE_ID",
    "OPENAI_VECTOR_STORE_ID",
    "OUTREACH_REVIEW_ENABLED",
    "OUTREACH_LLM_MAX_TOKENS",
    "OUTREACH_OPENAI_MAX_OUTPUT_TOKENS",
    "OUTREACH_LLM_TIMEOUT_SECS",
    "OUTREACH_SEND_ENABLED",
    "SEND_ENABLED",
    "OUTREACH_AUTO_APPROVE_CONFIDENCE",
    "AUTO_APPROVE_CONFIDENCE",
    "OUTREACH_MAX_MESSAGES_PER_RUN",
    "MAX_MESSAGES_PER_RUN",
    "OUTREACH_CAZVID_CAMPAIGN_IDS",
    "OUTREACH_AGENCY_LEADS_CAMPAIGN_IDS",
    "OUTREACH_ESCALATION_TAG",
    "OUTREACH_DASHBOARD_PASSWORD",
    "DASHBOARD_PASSWORD",
    "OUTREACH_SERVER_BIND_ADDRESS",
    "OUTREACH_SERVER_PORT",
    "PORT",
    "OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "OUTREACH_LOGGING_LEVEL",
    "OUTREACH_LOG_LEVEL",
    "OUTREACH_LOGGING_FORMAT",
    "OUTREACH_LOG_FORMAT",
];

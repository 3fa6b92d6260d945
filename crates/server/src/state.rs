use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use outreach_agent::AgentRuntime;
use outreach_core::config::AppConfig;
use outreach_db::Store;
use outreach_heyreach::CrmClient;

/// Settings the HTTP surface reads on every request.
#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub environment: String,
    pub dashboard_password: Option<SecretString>,
    pub send_enabled: bool,
    pub auto_approve_confidence: f64,
    pub max_messages_per_run: u32,
    pub account_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
}

impl ServerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            dashboard_password: config
                .dashboard
                .password
                .clone()
                .filter(|password| !password.expose_secret().trim().is_empty()),
            send_enabled: config.processing.send_enabled,
            auto_approve_confidence: config.processing.auto_approve_confidence,
            max_messages_per_run: config.processing.max_messages_per_run,
            account_ids: config.heyreach.account_ids.clone(),
            campaign_ids: config.heyreach.campaign_ids.clone(),
        }
    }

    pub fn password_required(&self) -> bool {
        self.dashboard_password.is_some()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServerSettings>,
    pub store: Store,
    pub crm: Arc<dyn CrmClient>,
    pub runtime: Arc<AgentRuntime>,
    /// Held for the whole find-send-save sequence of an approval.
    pub approvals: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        settings: ServerSettings,
        store: Store,
        crm: Arc<dyn CrmClient>,
        runtime: Arc<AgentRuntime>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            crm,
            runtime,
            approvals: Arc::new(Mutex::new(())),
        }
    }
}

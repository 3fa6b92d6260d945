use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use outreach_agent::{
    client_from_config, AgentRuntime, Drafter, DrafterSettings, LlmError, PromptBuilder,
    PromptError, RuntimeSettings,
};
use outreach_core::config::{AppConfig, ConfigError};
use outreach_core::knowledge::KnowledgeBase;
use outreach_db::Store;
use outreach_heyreach::{CrmClient, CrmError, HeyReachClient};

use crate::state::{AppState, ServerSettings};

pub struct Application {
    pub config: AppConfig,
    pub store: Store,
    pub crm: Arc<dyn CrmClient>,
    pub runtime: Arc<AgentRuntime>,
}

impl Application {
    pub fn state(&self) -> AppState {
        AppState::new(
            ServerSettings::from_config(&self.config),
            self.store.clone(),
            self.crm.clone(),
            self.runtime.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("heyreach client setup failed: {0}")]
    Crm(#[source] CrmError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
    #[error("prompt templates failed to load: {0}")]
    Prompt(#[source] PromptError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = %config.environment,
        "starting application bootstrap"
    );

    let crm: Arc<dyn CrmClient> =
        Arc::new(HeyReachClient::from_config(&config.heyreach).map_err(BootstrapError::Crm)?);

    let llm = client_from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let prompts =
        PromptBuilder::new(KnowledgeBase::from_config(&config)).map_err(BootstrapError::Prompt)?;
    let drafter = Drafter::new(llm.clone(), prompts, DrafterSettings::from_config(&config.llm));
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = ?llm.provider(),
        retrieval = llm.retrieval_enabled(),
        "llm provider initialized"
    );

    let store = Store::in_memory();
    let runtime = Arc::new(AgentRuntime::new(
        crm.clone(),
        drafter,
        store.clone(),
        RuntimeSettings::from_config(&config),
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        send_enabled = config.processing.send_enabled,
        dashboard_password = config.dashboard.password_required(),
        "application bootstrap complete"
    );

    Ok(Application { config, store, crm, runtime })
}

#[cfg(test)]
mod tests {
    use outreach_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

    use super::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(options)?;
        bootstrap_with_config(config).await
    }

    fn options(heyreach_key: &str, openai_key: &str) -> LoadOptions {
        LoadOptions {
            config_path: None,
            require_file: false,
            overrides: ConfigOverrides {
                heyreach_api_key: Some(heyreach_key.to_string()),
                llm_provider: Some(LlmProvider::OpenAi),
                openai_api_key: Some(openai_key.to_string()),
                dashboard_password: Some(String::new()),
                ..ConfigOverrides::default()
            },
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_heyreach_key() {
        let result = bootstrap(options("   ", "sk-test")).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_state_from_config() {
        let app = bootstrap(options("hr-test", "sk-test")).await.expect("bootstrap");
        let state = app.state();

        assert!(!state.settings.password_required());
        assert!(!state.runtime.is_running());
        assert_eq!(state.settings.send_enabled, app.config.processing.send_enabled);
    }
}

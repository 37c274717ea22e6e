//! `edubridge invoke`: one orchestration turn from the terminal.

use chrono::Utc;
use clap::Args;
use edubridge_agent::{Orchestration, OrchestrationRequest};
use edubridge_config::{AppConfig, ParameterStore};
use edubridge_core::event::EventBus;
use edubridge_core::session::{derive_session_id, normalize_phone};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// The user's message
    pub text: String,

    /// student, teacher or administrator
    #[arg(short, long, default_value = "student")]
    pub persona: String,

    /// Caller phone number; also used as user id when `--user-id` is absent
    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub user_id: Option<String>,

    /// Explicit session id; derived from the phone (or user id) otherwise
    #[arg(long)]
    pub session_id: Option<String>,

    #[arg(long)]
    pub memory_id: Option<String>,
}

impl InvokeArgs {
    fn request(&self) -> OrchestrationRequest {
        let actor = self
            .user_id
            .clone()
            .or_else(|| self.phone.as_deref().map(normalize_phone));
        OrchestrationRequest {
            input_text: Some(self.text.clone()),
            persona: Some(self.persona.clone()),
            user_id: actor.clone(),
            persona_id: actor,
            whatsapp_phone_number: self.phone.clone(),
            memory_id: self.memory_id.clone(),
            ..Default::default()
        }
    }

    fn session_id(&self) -> Result<String, Box<dyn std::error::Error>> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }
        let key = self
            .phone
            .as_deref()
            .or(self.user_id.as_deref())
            .ok_or("Provide --phone, --user-id or --session-id")?;
        Ok(derive_session_id(key, Utc::now())?)
    }
}

pub async fn run(args: InvokeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store: Arc<dyn ParameterStore> = Arc::new(config.parameter_store()?);
    let orchestration =
        edubridge_gateway::setup::orchestration_from_config(&config, store, Arc::new(EventBus::default())).await?;

    let session_id = args.session_id()?;
    debug!(session_id = %session_id, persona = %args.persona, runtime = %config.runtime.mode, "Invoking orchestration");
    eprint!("  Thinking...");
    let response = orchestration.invoke(args.request(), Some(&session_id)).await;
    eprint!("\r              \r");

    let response = response?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

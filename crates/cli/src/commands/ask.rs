//! `tiller ask` — send one message through the agent and stream the result.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;

use tiller_agent::{AgentMode, Orchestrator};
use tiller_client::OpenAiClient;
use tiller_config::AppConfig;
use tiller_core::event::AgentEvent;
use tiller_core::turn::ImageAttachment;
use tiller_skills::{default_skills, SkillMatcher};
use tiller_store::{ConversationDoc, ConversationStore, JsonFileStore};

const DEFAULT_SYSTEM_PROMPT: &str = "You are Tiller, a coding assistant embedded in the user's \
editor. Be concise and concrete. When you change or inspect the project, use the tools you are \
given rather than guessing.";

pub async fn run(
    message: String,
    plan: bool,
    conversation: Option<String>,
    images: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.model.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TILLER_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let mut client = OpenAiClient::new(&config.model.api_url, api_key, &config.model.name)?
        .with_temperature(config.model.temperature)
        .with_max_tokens(config.model.max_tokens);
    if !config.model.native_tools {
        client = client.without_native_tools();
    }

    let tools = Arc::new(tiller_tools::default_registry(
        config.tools.allowed_commands.clone(),
    ));

    let system_prompt = config
        .agent
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let mut orchestrator = Orchestrator::new(
        Arc::new(client),
        tools,
        system_prompt,
        config.model.name.clone(),
    )
    .with_budget_threshold(config.agent.budget_threshold);

    if config.agent.skills_enabled {
        orchestrator = orchestrator.with_skills(Arc::new(SkillMatcher::new(default_skills())));
    }

    // Resume a stored conversation if requested.
    let store = JsonFileStore::new(config.store.dir.clone());
    let mut created_at = None;
    if let Some(id) = &conversation {
        let doc = store
            .load(id)
            .await
            .map_err(|e| format!("Cannot resume conversation: {e}"))?;
        created_at = Some(doc.created_at);
        orchestrator.restore_turns(id.clone(), doc.turns).await;
    }

    let attachments = load_images(&images)?;
    let mode = if plan { AgentMode::Plan } else { AgentMode::React };

    let mut rx = orchestrator.process_message(message, attachments, mode).await;
    let mut streamed = false;

    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Token { content } => {
                streamed = true;
                print!("{content}");
                std::io::stdout().flush()?;
            }
            AgentEvent::Answer { content } => {
                if streamed {
                    println!();
                } else {
                    println!("{content}");
                }
            }
            AgentEvent::Thought { content } => eprintln!("  [thought] {content}"),
            AgentEvent::Action { tool, params } => eprintln!("  [tool] {tool} {params}"),
            AgentEvent::Observation { result } => {
                if result.success {
                    eprintln!("  [tool ok] {}", preview(&result.output));
                } else {
                    eprintln!(
                        "  [tool failed] {}",
                        preview(result.error.as_deref().unwrap_or("unknown failure"))
                    );
                }
            }
            AgentEvent::Plan { plan } => {
                eprintln!("  [plan]");
                for step in &plan.steps {
                    eprintln!("    {}. {}", step.id, step.description);
                }
            }
            AgentEvent::StepComplete { step, result } => {
                eprintln!("  [step {} {:?}] {}", step.id, step.status, preview(&result));
            }
            AgentEvent::Skill { name, .. } => eprintln!("  [skill] {name}"),
            AgentEvent::Error { message } => eprintln!("  [error] {message}"),
            AgentEvent::TokenUsage {
                current,
                limit,
                percentage,
                ..
            } => {
                tracing::debug!(current, limit, percentage, "context usage");
            }
        }
    }

    // Persist the updated history.
    let id = orchestrator.conversation_id().await;
    let mut doc = ConversationDoc::new(id, orchestrator.turns().await);
    if let Some(created) = created_at {
        doc.created_at = created;
    }
    store.save(&doc).await?;
    eprintln!("  [saved conversation {}]", doc.id);

    Ok(())
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > 80 {
        let mut s: String = first_line.chars().take(80).collect();
        s.push('…');
        s
    } else {
        first_line.to_string()
    }
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageAttachment>, Box<dyn std::error::Error>> {
    let mut attachments = Vec::new();
    for path in paths {
        let bytes =
            std::fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
        attachments.push(ImageAttachment {
            mime_type: mime_for(path).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        });
    }
    Ok(attachments)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

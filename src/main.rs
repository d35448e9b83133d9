use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narrative_gate::config::settings_io::{load_settings, save_settings, settings_path};
use narrative_gate::engine::protocol::EngineCommand;
use narrative_gate::engine::streaming::NarrationPreview;
use narrative_gate::model::message::Reply;
use narrative_gate::model::narrative::NarrationResult;
use narrative_gate::model::session_state::PlayerState;
use narrative_gate::{
    ChatBackend, ConstraintGate, EngineHandle, GateConfig, NarrationEngine, NarratorConfig, OllamaClient,
    Router, RouterConfig, ScenarioRegistry, SessionState, Settings,
};

fn main() -> ExitCode {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {:#}", e);
            return ExitCode::from(1);
        }
    };
    init_tracing(settings.debug);

    if std::env::args().skip(1).any(|arg| arg == "--write-config") {
        let path = settings_path();
        return match save_settings(&settings, &path) {
            Ok(()) => {
                println!("Settings written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to write settings: {:#}", e);
                ExitCode::from(1)
            }
        };
    }

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "failed to initialize game");
            eprintln!("Failed to initialize game: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_registry(settings: &Settings) -> Result<ScenarioRegistry> {
    let Some(path) = &settings.scenarios_path else {
        return Ok(ScenarioRegistry::builtin());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read scenarios from {}", path.display()))?;
    ScenarioRegistry::from_json_str(&json)
        .with_context(|| format!("invalid scenario file {}", path.display()))
}

/// Probes the backend once. An unreachable backend puts the game in
/// limited mode: no classifier, offline narration.
fn connect(settings: &Settings) -> Option<Arc<dyn ChatBackend>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let client = match OllamaClient::new(&settings.backend_url, timeout) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "cannot build backend client");
            return None;
        }
    };

    match client.test_connection() {
        Ok(status) => {
            info!(url = %settings.backend_url, %status, "backend reachable");
            let backend: Arc<dyn ChatBackend> = Arc::new(client);
            Some(backend)
        }
        Err(e) => {
            warn!(url = %settings.backend_url, error = %e, "backend unreachable");
            None
        }
    }
}

fn run(settings: Settings) -> Result<()> {
    let registry = Arc::new(load_registry(&settings)?);
    let backend = connect(&settings);
    if backend.is_none() {
        println!("Running in limited mode - AI features will be disabled");
    }

    let classifier = backend.clone().filter(|_| settings.classifier_model.is_some());
    let player = PlayerState {
        name: settings.player_name.clone(),
        ..PlayerState::default()
    };

    let router = Router::new(
        registry,
        SessionState::new(player),
        ConstraintGate::new(classifier, GateConfig::from(&settings)),
        NarrationEngine::new(backend, NarratorConfig::from(&settings)),
        RouterConfig::from(&settings),
    );
    let engine = EngineHandle::spawn(router);

    let mut preview = LivePreview::default();
    let opening = engine
        .request(
            EngineCommand::LoadScenario(settings.initial_scenario.clone()),
            &mut |f: &str| preview.push(f),
        )
        .ok_or_else(|| anyhow!("engine stopped during startup"))?
        .with_context(|| format!("cannot load initial scenario '{}'", settings.initial_scenario))?;

    println!("Welcome to the AI Narrative Game!");
    println!("Type {}help for available commands.\n", settings.command_prefix);
    match opening.narration() {
        Some(result) => print_narration(result, &preview.finish(), "You could try:"),
        None => println!("You find yourself in an unknown place...\n"),
    }

    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = line.context("cannot read input")?;
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(&format!("{}quit", settings.command_prefix)) {
            break;
        }

        let mut preview = LivePreview::default();
        let Some(reply) = engine.request(EngineCommand::UserInput(line.clone()), &mut |f: &str| {
            preview.push(f)
        }) else {
            break;
        };
        let shown = preview.finish();

        match reply {
            Ok(reply) => render(&reply, &shown),
            Err(e) => eprintln!("\nError: {}", e),
        }
        println!();
        prompt();
    }

    engine.shutdown();
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Prints narration prose while the narrator is still writing.
#[derive(Default)]
struct LivePreview {
    extractor: NarrationPreview,
    shown: String,
}

impl LivePreview {
    fn push(&mut self, fragment: &str) {
        let text = self.extractor.push(fragment);
        if text.is_empty() {
            return;
        }
        if self.shown.is_empty() {
            println!();
        }
        print!("{}", text);
        self.shown.push_str(&text);
        let _ = io::stdout().flush();
    }

    /// Returns the narration text that reached the screen.
    fn finish(self) -> String {
        if !self.shown.is_empty() {
            println!();
        }
        self.shown
    }
}

/// Prints the parsed narration unless the live preview already showed it.
fn print_narration(result: &NarrationResult, shown: &str, heading: &str) {
    if shown.trim() != result.narration.trim() {
        println!("\n{}", result.narration);
    }
    if !result.suggested_actions.is_empty() {
        println!("\n{}", heading);
        for (index, action) in result.suggested_actions.iter().enumerate() {
            println!("{}. {}", index + 1, action);
        }
    }
}

fn render(reply: &Reply, shown: &str) {
    match reply {
        Reply::Narration { result, .. } => print_narration(result, shown, "You can try:"),
        Reply::Dialogue { npc_name, result, .. } => {
            if shown.is_empty() {
                println!("\n{}:", npc_name);
            }
            print_narration(result, shown, "You can try:");
        }
        Reply::NarratorError { message, details } => {
            eprintln!("\nError: {}", message);
            eprintln!("Details: {}", details);
        }
        Reply::Blocked { message, .. } => println!("\n{}", message),
        Reply::Info(message) => println!("\n{}", message),
        Reply::Help(commands) => {
            println!("\nAvailable commands:");
            for command in commands {
                println!("  {:<18} {}", command.usage, command.description);
            }
        }
        Reply::Inventory(items) => {
            if items.is_empty() {
                println!("\nYour inventory is empty.");
            } else {
                println!("\nYou are carrying:");
                for item in items {
                    println!("- {}", item);
                }
            }
        }
        Reply::RealitySwitched { reality_id, description } => {
            println!("\nReality shifts to {}.", reality_id);
            println!("{}", description);
        }
        Reply::ScenarioLoaded { name, reality_id, opening, .. } => {
            println!("\nScenario: {} ({})", name, reality_id);
            if let Some(result) = opening {
                print_narration(result, shown, "You could try:");
            }
        }
        Reply::Scenarios(list) => {
            println!("\nScenarios:");
            for scenario in list {
                println!("  {:<18} {} - {}", scenario.id, scenario.name, scenario.description);
            }
        }
        Reply::DialogueStarted { npc_name, greeting, .. } => {
            println!("\nYou approach {}.", npc_name);
            if !greeting.is_empty() {
                println!("{}: \"{}\"", npc_name, greeting);
            }
        }
        Reply::DialogueEnded { npc_name } => match npc_name {
            Some(name) => println!("\nYou end your conversation with {}.", name),
            None => println!("\nYou are not talking to anyone."),
        },
    }
}

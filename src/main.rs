use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use sentibot::api::ResponseService;
use sentibot::api::server;
use sentibot::bot::{
    ApiClient, CursorStore, Database, FileCursorStore, MentionPoller, PollerSettings, ReplyMode,
    TwitterClient,
};
use sentibot::config::{Config, CursorBackend};
use sentibot::logging;

const DEFAULT_CONFIG: &str = "sentibot.json";

fn usage(program: &str) -> ExitCode {
    eprintln!("Usage:");
    eprintln!("  {program} serve [config.json]          Run the reply API");
    eprintln!("  {program} bot [config.json]            Run the mention bot");
    eprintln!("  {program} compare <text> [config.json] Show both replies for a text");
    eprintln!();
    eprintln!("The config path defaults to {DEFAULT_CONFIG}.");
    ExitCode::FAILURE
}

fn load_config(path: &str) -> Option<Config> {
    match Config::load(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("{e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("sentibot");

    match args.get(1).map(String::as_str) {
        Some("serve") => {
            let path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
            let Some(config) = load_config(path) else { return ExitCode::FAILURE };
            serve(config, path).await
        }
        Some("bot") => {
            let path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
            let Some(config) = load_config(path) else { return ExitCode::FAILURE };
            bot(config, path).await
        }
        Some("compare") => {
            let Some(text) = args.get(2) else { return usage(program) };
            let path = args.get(3).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
            let Some(config) = load_config(path) else { return ExitCode::FAILURE };
            compare(config, text).await
        }
        _ => usage(program),
    }
}

async fn serve(config: Config, config_path: &str) -> ExitCode {
    let _guard = match logging::init(&config.data_dir, "serve.log") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("🚀 Starting reply API...");
    info!("Loaded config from {config_path}");

    let service = Arc::new(ResponseService::load(&config.api).await);
    match server::serve(config.api.bind, service).await {
        Ok(()) => {
            info!("Reply API stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn bot(config: Config, config_path: &str) -> ExitCode {
    let _guard = match logging::init(&config.data_dir, "bot.log") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("🚀 Starting mention bot...");
    info!("Loaded config from {config_path}");

    let bot = &config.bot;
    let credentials = match bot.credentials() {
        Ok(c) => c,
        Err(e) => {
            error!(severity = "critical", "Authentication failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let feed = match TwitterClient::new(&bot.twitter_api_url, credentials, bot.request_timeout) {
        Ok(feed) => feed,
        Err(e) => {
            error!("Failed to build feed client: {e}");
            return ExitCode::FAILURE;
        }
    };
    let responder = match ApiClient::new(&bot.api_url, bot.reply_mode, bot.request_timeout) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to build reply API client: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Replying in {} mode via {}",
        match bot.reply_mode {
            ReplyMode::Retrieval => "retrieval",
            ReplyMode::Generative => "generative",
        },
        bot.api_url
    );

    let settings = PollerSettings::new(bot.poll_interval, bot.max_fetch_attempts);
    match bot.cursor_backend {
        CursorBackend::File => {
            let store = FileCursorStore::new(&bot.cursor_path);
            run_poller(feed, responder, store, settings).await
        }
        CursorBackend::Sqlite => match Database::open(&bot.cursor_path) {
            Ok(store) => run_poller(feed, responder, store, settings).await,
            Err(e) => {
                error!(severity = "critical", "Cannot open state database: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_poller<S: CursorStore>(
    feed: TwitterClient,
    responder: ApiClient,
    store: S,
    settings: PollerSettings,
) -> ExitCode {
    let mut poller = match MentionPoller::connect(feed, responder, store, settings).await {
        Ok(p) => p,
        Err(e) => {
            error!("Bot not started: {e}");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = poller.run_forever() => {
            if let Err(e) = result {
                error!("Mention bot stopped: {e}");
            }
            ExitCode::FAILURE
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            ExitCode::SUCCESS
        }
    }
}

async fn compare(config: Config, text: &str) -> ExitCode {
    let client = match ApiClient::new(&config.bot.api_url, ReplyMode::Retrieval, config.bot.request_timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build reply API client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = client.compare(text).await;
    println!("Input: {text:?}");
    println!();
    match result.retrieval {
        Ok(r) => println!("Retrieval ({}): {}", r.sentiment, r.reply),
        Err(e) => println!("Retrieval: error: {e}"),
    }
    match result.generative {
        Ok(r) => println!("Generative: {}", r.reply),
        Err(e) => println!("Generative: error: {e}"),
    }
    ExitCode::SUCCESS
}

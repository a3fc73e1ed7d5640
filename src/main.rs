use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prompter_gateway::api::{ApiServer, ApiState};
use prompter_gateway::asr::Recognizer;
use prompter_gateway::audio::Transcoder;
use prompter_gateway::bridge::ListenerBridge;
use prompter_gateway::cache::EmbeddingCache;
use prompter_gateway::embedding::Embedder;
use prompter_gateway::matching::{LexicalStrategy, SemanticStrategy, Strategy};
use prompter_gateway::pipeline::Pipeline;
use prompter_gateway::relay::ResultRelay;
use prompter_gateway::{Config, Corpus, MatchEngine, Normalizer, SessionRegistry, StrategyKind};

/// Prompter - real-time speech question/answer relay gateway
#[derive(Parser)]
#[command(name = "prompter", version, about)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, env = "PROMPTER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(long, env = "PROMPTER_PORT")]
    port: Option<u16>,

    /// Knowledge base file (overrides config)
    #[arg(long)]
    knowledge_base: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect as the listener device and print relayed answers
    Listen {
        /// Gateway WebSocket URL; defaults to the local gateway
        #[arg(long)]
        url: Option<String>,
    },
    /// Write a sample knowledge base to get started
    InitKb {
        /// Output path
        #[arg(default_value = "knowledge_base.csv")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,prompter_gateway=info",
        1 => "info,prompter_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(kb) = cli.knowledge_base {
        config.knowledge_base = kb;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Listen { url } => {
                let bridge =
                    url.map_or_else(|| ListenerBridge::local(config.port), ListenerBridge::new);
                tokio::select! {
                    () = bridge.run() => {}
                    _ = tokio::signal::ctrl_c() => tracing::info!("listener stopped"),
                }
                Ok(())
            }
            Command::InitKb { path } => {
                prompter_gateway::corpus::write_sample(&path)?;
                println!("sample knowledge base written to {}", path.display());
                Ok(())
            }
        };
    }

    serve(config).await
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        knowledge_base = %config.knowledge_base.display(),
        strategy = ?config.matching.strategy,
        "starting prompter gateway"
    );

    let corpus = Corpus::load(&config.knowledge_base).map_err(|e| {
        anyhow::anyhow!(
            "cannot load knowledge base {}: {e} (run `prompter init-kb` to create a sample)",
            config.knowledge_base.display()
        )
    })?;

    let normalizer = Arc::new(Normalizer::new());
    let strategy = build_strategy(&config, &normalizer)?;
    let engine = Arc::new(
        MatchEngine::new(
            strategy,
            corpus,
            config.matching.result_cache_size,
            config.matching.scoring_workers,
        )
        .await?,
    );

    let registry = Arc::new(SessionRegistry::new());
    let relay = Arc::new(ResultRelay::new(
        Arc::clone(&registry),
        config.matching.notify_listener_on_miss,
    ));

    let transcoder = match Transcoder::new(config.ffmpeg_path.as_deref()) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(error = %e, "transcoder unavailable, audio segments will be dropped");
            None
        }
    };

    let recognizer = Recognizer::from_config(&config.asr);
    if recognizer.is_none() {
        tracing::warn!("no ASR backend configured, recognition disabled");
    }

    let pipeline = Arc::new(Pipeline::new(
        transcoder,
        recognizer,
        Arc::clone(&normalizer),
        Arc::clone(&engine),
        relay,
    ));

    let state = Arc::new(ApiState {
        registry,
        pipeline,
        engine,
        knowledge_base: config.knowledge_base.clone(),
        api_key: config.api_key.clone(),
    });

    let server = ApiServer::new(state, config.port).spawn();

    tokio::select! {
        result = server => result??,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }

    Ok(())
}

/// Construct the configured matching strategy
fn build_strategy(
    config: &Config,
    normalizer: &Arc<Normalizer>,
) -> anyhow::Result<Box<dyn Strategy>> {
    Ok(match config.matching.strategy {
        StrategyKind::Lexical => Box::new(LexicalStrategy::new(
            Arc::clone(normalizer),
            config.matching.lexical_threshold,
        )),
        StrategyKind::Semantic => {
            let embedder = Embedder::new(&config.embedding)?;
            let kb_id = config
                .knowledge_base
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("knowledge");
            let cache = match EmbeddingCache::new(&config.cache_dir, kb_id) {
                Ok(c) => Some(Arc::new(c)),
                Err(e) => {
                    tracing::warn!(error = %e, "embedding cache unavailable, vectors recompute each start");
                    None
                }
            };
            Box::new(SemanticStrategy::new(
                embedder,
                cache,
                config.matching.semantic_threshold,
            ))
        }
    })
}

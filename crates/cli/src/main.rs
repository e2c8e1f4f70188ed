//! Codify CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags and `CODIFY_*` environment variables
//!    override the built-in [`ClientConfig`] defaults, which are validated
//!    before anything is sent.
//! 2. **Wire observability**: see [`telemetry`].
//! 3. **Construct infrastructure**: an [`HttpTransport`], one
//!    [`RequestRegistry`], and console-backed ports injected into an
//!    [`InferenceClient`].
//! 4. **Run one subcommand**: `complete`, `report`, or `login`.

mod ports;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use inference::{
    ApiKey, CancellationToken, ClientConfig, ClientPorts, CompletionParams, CredentialStore,
    InferenceClient, LoginOutcome, LoginTicket, ModelName, ReportParams, RequestRegistry, Sources,
    Temperature,
};
use tracing::{info, warn};
use transport::HttpTransport;

use crate::ports::{CliSettings, ConsoleSession, ProcessCredentials};

#[derive(Debug, Parser)]
#[command(name = "codify", version, about = "Client for the Codify inference API")]
struct Cli {
    /// API key sent with inference and report calls.
    #[arg(long, env = "CODIFY_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Model name; `CONTRASTcode/stable` when unset.
    #[arg(long, env = "CODIFY_MODEL")]
    model: Option<String>,

    /// Sampling temperature in [0, 2].
    #[arg(long, env = "CODIFY_TEMPERATURE")]
    temperature: Option<f64>,

    #[arg(long, env = "CODIFY_INFERENCE_URL")]
    inference_url: Option<String>,

    #[arg(long, env = "CODIFY_REPORT_URL")]
    report_url: Option<String>,

    #[arg(long, env = "CODIFY_ACTIVATION_URL")]
    activation_url: Option<String>,

    /// Whole-request timeout in seconds.
    #[arg(long, env = "CODIFY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CODIFY_LOG_JSON")]
    log_json: bool,

    /// Export spans to this OTLP/gRPC collector.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request an edit of FILE and print the raw response.
    Complete {
        file: PathBuf,
        #[arg(long)]
        intent: String,
        #[arg(long, default_value = "")]
        function: String,
        #[arg(long, default_value_t = 0)]
        cursor0: u64,
        #[arg(long, default_value_t = 0)]
        cursor1: u64,
        #[arg(long, default_value_t = 50)]
        max_tokens: u32,
        #[arg(long, default_value_t = 1)]
        max_edits: u32,
        /// Stop sequence; repeatable.
        #[arg(long = "stop")]
        stop_tokens: Vec<String>,
    },
    /// Send feedback about an edit of FILE.
    Report {
        file: PathBuf,
        /// File contents after the edit.
        #[arg(long)]
        result: PathBuf,
        /// Mark the edit as rejected instead of accepted.
        #[arg(long)]
        negative: bool,
        #[arg(long, default_value = "")]
        intent: String,
        #[arg(long, default_value = "")]
        function: String,
        #[arg(long, default_value_t = 0)]
        cursor0: u64,
        #[arg(long, default_value_t = 0)]
        cursor1: u64,
    },
    /// Exchange a login ticket for an API key.
    Login {
        #[arg(long, env = "CODIFY_TICKET")]
        ticket: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_json, cli.otlp_endpoint.as_deref())?;

    let config = client_config(&cli);
    config.validate().context("invalid client configuration")?;

    let ticket = match &cli.command {
        Command::Login { ticket } => LoginTicket::new(ticket.as_str()),
        _ => None,
    };
    let credentials = Arc::new(ProcessCredentials::new(ApiKey::new(cli.api_key.as_str())));
    let settings = CliSettings {
        model: cli.model.as_deref().and_then(ModelName::new),
        temperature: cli
            .temperature
            .map(|t| Temperature::new(t).context("temperature must be within [0, 2]"))
            .transpose()?,
    };

    let transport =
        HttpTransport::new(config.request_timeout).context("building HTTP transport")?;
    let client = InferenceClient::new(
        config,
        Arc::new(transport),
        Arc::new(RequestRegistry::new()),
        ClientPorts {
            credentials: credentials.clone(),
            settings: Arc::new(settings),
            session: Arc::new(ConsoleSession::new(ticket)),
        },
    )?;

    match cli.command {
        Command::Complete {
            file,
            intent,
            function,
            cursor0,
            cursor1,
            max_tokens,
            max_edits,
            stop_tokens,
        } => {
            let (cursor_file, sources) = read_sources(&file)?;
            let params = CompletionParams {
                sources,
                intent,
                function_name: function,
                cursor_file,
                cursor0,
                cursor1,
                max_tokens,
                max_edits,
                stop_tokens,
            };
            complete(&client, &params).await
        }
        Command::Report {
            file,
            result,
            negative,
            intent,
            function,
            cursor0,
            cursor1,
        } => {
            let (cursor_file, sources) = read_sources(&file)?;
            let edited = std::fs::read_to_string(&result)
                .with_context(|| format!("reading {}", result.display()))?;
            let results = Sources::from([(cursor_file.clone(), edited)]);
            let params = ReportParams {
                positive: !negative,
                sources,
                results,
                intent,
                function_name: function,
                cursor_file,
                cursor0,
                cursor1,
            };
            client
                .report(params)
                .await
                .context("report task panicked")?;
            Ok(())
        }
        Command::Login { .. } => match client.login().await? {
            LoginOutcome::LoggedIn { account } => {
                match account {
                    Some(account) => println!("logged in as {account}"),
                    None => println!("key issued without an account"),
                }
                println!("export CODIFY_API_KEY={}", credentials.api_key().expose());
                if let Some(fine_tune) = credentials.fine_tune() {
                    println!("fine_tune: {fine_tune}");
                }
                Ok(())
            }
            LoginOutcome::Rejected { message } => bail!("login rejected: {message}"),
            LoginOutcome::AlreadyLoggedIn => Ok(()),
        },
    }
}

/// Runs one completion. Ctrl-C cancels the signal, aborts everything still
/// registered, and drains the registry before reporting the outcome.
async fn complete(client: &InferenceClient, params: &CompletionParams) -> Result<()> {
    let signal = CancellationToken::new();
    let record = client.fetch_completion(&signal, params)?;
    info!(seq = %record.seq(), "completion in flight");

    let outcome = tokio::select! {
        outcome = record.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling in-flight requests");
            signal.cancel();
            let registry = client.registry();
            registry.cancel_all();
            registry.await_all().await;
            record.wait().await
        }
    };

    let value = outcome.with_context(|| format!("completion {} failed", record.seq()))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn read_sources(path: &Path) -> Result<(String, Sources)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok((name.clone(), Sources::from([(name, contents)])))
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(url) = &cli.inference_url {
        config.inference_url = url.clone();
    }
    if let Some(url) = &cli.report_url {
        config.report_url = url.clone();
    }
    if let Some(url) = &cli.activation_url {
        config.activation_url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    config
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use deployguard::config::Config;
use deployguard::datadog::{AuthStyle, DatadogClient};
use deployguard::probe::{self, ProbeMethod, ProbePlan, Prober};
use deployguard::server::{self, AppState};
use deployguard::utils::mask_secret;
use deployguard::workflow::{BreachScenario, DeployGuardWorkflow, EventSink, WorkflowSettings};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "deployguard")]
#[command(about = "Guarded model deployment demo backed by Datadog")]
#[command(
    after_help = "Environment:\n  DATADOG_API_KEY / DD_API_KEY      Datadog API key\n  DATADOG_APP_KEY / DD_APP_KEY      Datadog application key\n  DATADOG_MCP_SERVER_URL            MCP server URL\n  LOG_LEVEL                         Log level when RUST_LOG is unset"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the demo UI and its event streams
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run one deployment workflow and print its events as JSON lines
    Run {
        /// Inject a compliance breach once the deployment is monitored
        #[arg(long)]
        breach: bool,
    },
    /// Try MCP endpoint permutations against Datadog
    Probe {
        #[arg(long, value_delimiter = ',', default_values = ["GET", "POST", "PUT"])]
        methods: Vec<String>,
        #[arg(long, value_delimiter = ',', default_values = ["app-keys", "basic", "both"])]
        auth: Vec<String>,
        #[arg(long)]
        stop_on_success: bool,
        /// Follow a discovered monitor event stream for this many seconds
        #[arg(long, value_name = "SECS")]
        follow_streams: Option<u64>,
    },
    /// Validate the API key and list dashboards and monitors with the application key
    CheckKeys,
    /// Watch a running server's deploy stream
    Watch {
        #[arg(long, default_value = probe::watch::DEFAULT_WATCH_URL)]
        url: String,
        /// Seconds before giving up
        #[arg(long, default_value_t = probe::watch::DEFAULT_WATCH_TIMEOUT.as_secs())]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env.local wins over .env; neither overrides the real environment
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    // RUST_LOG takes precedence, then LOG_LEVEL, then "warn"
    let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or(config.bind);
            let state = AppState::from_config(&config)?;
            println!("DeployGuard UI on http://{}", bind);
            server::serve(state, bind).await?;
        }
        Command::Run { breach } => run_once(&config, breach).await?,
        Command::Probe {
            methods,
            auth,
            stop_on_success,
            follow_streams,
        } => {
            let mut plan = ProbePlan::for_config(&config);
            plan.methods = methods
                .iter()
                .map(|m| m.parse::<ProbeMethod>())
                .collect::<Result<_, _>>()?;
            plan.auth_styles = auth
                .iter()
                .map(|a| a.parse::<AuthStyle>())
                .collect::<Result<_, _>>()?;
            plan.stop_on_success = stop_on_success;
            run_probe(&config, plan, follow_streams.map(Duration::from_secs)).await?;
        }
        Command::CheckKeys => check_keys(&config).await?,
        Command::Watch { url, timeout } => {
            let report = probe::watch(&url, Duration::from_secs(timeout), |event| {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{}", line);
                }
            })
            .await?;

            match report.ended_by {
                Some(kind) => log::info!("Stream ended with {}", kind),
                None if report.timed_out => log::warn!("Timed out after {}s", timeout),
                None => log::warn!("Stream closed without a final event"),
            }
            if !report.succeeded() {
                anyhow::bail!("workflow did not complete");
            }
        }
    }

    Ok(())
}

async fn run_once(config: &Config, breach: bool) -> anyhow::Result<()> {
    let client = Arc::new(DatadogClient::from_config(config)?);
    let settings = WorkflowSettings::from_config(config);
    let workflow = DeployGuardWorkflow::new(settings.clone(), client);

    let (sink, mut rx) = EventSink::channel(server::EVENT_BUFFER);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        }
    });

    let outcome = async {
        let deployment = workflow.run(&sink).await?;
        if breach {
            BreachScenario::new(settings).run(&deployment, &sink).await?;
        }
        Ok::<_, deployguard::DeployGuardError>(())
    }
    .await;

    drop(sink);
    printer.await?;
    outcome?;
    Ok(())
}

async fn run_probe(
    config: &Config,
    plan: ProbePlan,
    follow: Option<Duration>,
) -> anyhow::Result<()> {
    let client = Arc::new(DatadogClient::from_config(config)?);
    println!(
        "Probing {} endpoints x {} methods x {} auth styles",
        plan.endpoints.len(),
        plan.methods.len(),
        plan.auth_styles.len()
    );

    let outcomes = Prober::new(client.clone()).run(&plan).await;
    for outcome in &outcomes {
        let result = match (outcome.status, &outcome.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(error)) => format!("error: {}", error),
            (None, None) => "no response".to_string(),
        };
        println!(
            "{:<5} {:<15} {} -> {}",
            outcome.method, outcome.auth, outcome.endpoint, result
        );
        if outcome.is_success() && !outcome.preview.is_empty() {
            println!("      {}", outcome.preview);
        }
    }

    let working = outcomes.iter().filter(|o| o.is_success()).count();
    println!("{} of {} requests succeeded", working, outcomes.len());

    if let Some(limit) = follow {
        match probe::follow_discovered(&client, &outcomes, limit).await? {
            Some((url, events)) => {
                println!("Read {} events from {}", events.len(), url);
                for event in events {
                    println!("      {}", event.data);
                }
            }
            None => println!("No monitors discovered, nothing to follow"),
        }
    }
    Ok(())
}

async fn check_keys(config: &Config) -> anyhow::Result<()> {
    let credentials = &config.credentials;
    for (label, key) in [
        ("API key", &credentials.api_key),
        ("App key", &credentials.app_key),
    ] {
        match key {
            Some(key) => println!("{}: {}", label, mask_secret(key)),
            None => println!("{}: <not set>", label),
        }
    }

    let client = Arc::new(DatadogClient::from_config(config)?);
    let check = Prober::new(client).check_keys().await?;

    match check.api_key_valid {
        Some(true) => println!("API key is valid"),
        Some(false) => println!("API key was rejected"),
        None => println!("API key could not be checked"),
    }
    if let Some(count) = check.dashboards {
        println!("Found {} dashboards", count);
    }
    if let Some(count) = check.monitors {
        println!(
            "Found {} monitors, {} mention MCP or a model",
            count,
            check.related_monitors.len()
        );
        for name in &check.related_monitors {
            println!("      {}", name);
        }
    }
    for error in &check.errors {
        println!("error: {}", error);
    }
    Ok(())
}

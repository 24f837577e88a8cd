use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loadctl::client::LoadTestService;
use loadctl::config::{LoadctlConfig, LoggingConfig};
use loadctl::model::{TestConfigDraft, TestId};
use loadctl::report;
use loadctl::workflow::{TestWorkflow, WorkflowState};

#[derive(Parser)]
#[command(
    name = "loadctl",
    about = "Submit HTTP load tests to a remote execution service and follow them to completion",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the load test service
    #[arg(long, global = true, env = "LOADCTL_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a load test and follow its progress until it finishes
    Run {
        /// Target URL the load engine sends traffic to
        #[arg(long)]
        url: String,

        /// HTTP method: GET, POST, PUT or DELETE
        #[arg(long, default_value = "GET")]
        method: String,

        /// Peak number of concurrent virtual users
        #[arg(long, default_value = "100")]
        target_users: u32,

        /// Virtual users at the start of the ramp
        #[arg(long, default_value = "1")]
        users_to_start_with: u32,

        /// Minutes until the peak is reached
        #[arg(long, default_value = "2")]
        reach_peak_after: u32,

        /// Extra request header, repeatable
        #[arg(long = "header", value_name = "NAME:VALUE")]
        headers: Vec<String>,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        /// Status code counted as success, repeatable (service default: 200)
        #[arg(long = "success-code", value_name = "CODE")]
        success_codes: Vec<u16>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List previously created tests
    List {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show a test's details and final report
    Show {
        /// Test identifier
        id: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Check that the service is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = LoadctlConfig::load_or_default(cli.config.as_deref())?;
    config.override_base_url(cli.api_url);
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run {
            url,
            method,
            target_users,
            users_to_start_with,
            reach_peak_after,
            headers,
            body,
            success_codes,
            json,
        } => {
            let draft = TestConfigDraft {
                url,
                method: method.parse()?,
                target_users,
                users_to_start_with,
                reach_peak_after_minutes: reach_peak_after,
                headers: parse_headers(&headers)?,
                body: body
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .context("--body is not valid JSON")?,
                success_status_codes: success_codes,
            };
            // Reject bad input before touching the network or the config.
            draft.clone().validate()?;
            run_test(&config, draft, json).await
        }
        Commands::List { json } => {
            let service = loadctl::connect(&config)?;
            let tests = service.list_tests().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tests)?);
            } else {
                print!("{}", report::format_record_table(&tests));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { id, json } => {
            let service = loadctl::connect(&config)?;
            let record = service.get_test(&TestId::new(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print!("{}", report::format_record(&record));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ping => {
            let service = loadctl::connect(&config)?;
            service.ping().await?;
            println!("{} is reachable", service.base_url());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_headers(raw: &[String]) -> Result<std::collections::BTreeMap<String, String>> {
    raw.iter()
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .with_context(|| format!("header {:?} must look like NAME:VALUE", h))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Submit, print progress as it arrives, then show the results surface.
async fn run_test(config: &LoadctlConfig, draft: TestConfigDraft, json: bool) -> Result<ExitCode> {
    let service: Arc<dyn LoadTestService> = Arc::new(loadctl::connect(config)?);
    let mut workflow = TestWorkflow::with_poll_interval(service.clone(), config.poll_interval()?);
    let mut rx = workflow.subscribe();

    let id = match workflow.submit(draft).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Submission failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    if !json {
        println!("Test {} submitted, waiting for progress...", id);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let final_state = loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break workflow.state();
                }
                let state = rx.borrow_and_update().clone();
                if state.is_terminal() {
                    break state;
                }
                if let Some(snapshot) = state.snapshot() {
                    if json {
                        println!("{}", serde_json::to_string(snapshot)?);
                    } else {
                        println!("{}", report::format_progress(snapshot));
                    }
                }
            }
            _ = &mut ctrl_c => {
                workflow.stop();
                eprintln!(
                    "Interrupted. Test {} keeps running on the service; check it later with `loadctl show {}`.",
                    id, id
                );
                return Ok(ExitCode::from(130));
            }
        }
    };

    match final_state {
        WorkflowState::Completed { id, last } => {
            match service.get_test(&id).await {
                Ok(record) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    } else {
                        println!("\n=== Test {} finished ===", id);
                        print!("{}", report::format_record(&record));
                    }
                }
                Err(e) => {
                    tracing::warn!(test_id = %id, error = %e, "could not fetch final report");
                    if let Some(snapshot) = last {
                        println!("Last progress: {}", report::format_progress(&snapshot));
                    }
                    eprintln!("Test {} finished but its report is unavailable: {}", id, e);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        WorkflowState::Failed { message, .. } => {
            eprintln!("Test failed: {}", message);
            Ok(ExitCode::FAILURE)
        }
        other => {
            eprintln!("Polling ended unexpectedly in state {}", other);
            Ok(ExitCode::FAILURE)
        }
    }
}

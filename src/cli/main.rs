use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use health_plan_search::{
    config::Config,
    elastic::ElasticClient,
    qa::{render_markdown, QaEngine, QaStatus},
};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hps-cli")]
#[command(about = "Health Plan Search CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "HPS_ENDPOINT", default_value = "http://localhost:3000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Run a search
    Search {
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(short, long)]
        state: Option<String>,

        /// keyword, semantic or hybrid
        #[arg(short, long, default_value = "semantic")]
        mode: String,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Inspect or replace the boost configuration
    Boosts {
        #[command(subcommand)]
        action: BoostsAction,
    },

    /// Manage pinned results
    Curations {
        #[command(subcommand)]
        action: CurationsAction,
    },

    /// Versioned content indices and aliases
    Indices {
        #[command(subcommand)]
        action: IndicesAction,
    },

    /// Run the QA validation suite
    Validate {
        #[arg(short, long)]
        environment: Option<String>,

        /// Run in-process against the configured backend instead of the server
        #[arg(long)]
        local: bool,

        /// Print the JSON report instead of markdown
        #[arg(long)]
        json: bool,
    },

    /// Stored QA reports
    Reports {
        #[arg(short, long)]
        environment: Option<String>,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Delete reports older than this RFC 3339 timestamp instead of listing
        #[arg(long)]
        prune_before: Option<String>,
    },
}

#[derive(Subcommand)]
enum BoostsAction {
    /// Show the active configuration
    Get,
    /// List fields that can be weighted or boosted
    Fields,
    /// Store a configuration read from a JSON file
    Set {
        #[arg(value_name = "FILE")]
        file: String,
    },
}

#[derive(Subcommand)]
enum CurationsAction {
    List,
    Save {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Document URL to pin; repeat to pin several in order
        #[arg(short, long = "pin")]
        pins: Vec<String>,

        /// Document URL to exclude
        #[arg(short = 'x', long = "exclude")]
        excludes: Vec<String>,
    },
    Delete {
        #[arg(value_name = "QUERY")]
        query: String,
    },
}

#[derive(Subcommand)]
enum IndicesAction {
    List,
    /// Delete an index after detaching the search alias
    Delete {
        #[arg(value_name = "INDEX")]
        index: String,
    },
    /// Add, remove or repoint an alias
    Alias {
        /// add, remove or repoint
        #[arg(value_name = "ACTION")]
        action: String,
        #[arg(value_name = "INDEX")]
        index: String,
        #[arg(short, long, default_value = "health-plans")]
        alias: String,
    },
    /// Keep only the newest document per document URL
    Dedup,
}

async fn print_json(response: Response) -> anyhow::Result<()> {
    let status = response.status();
    let body: Value = response.json().await.context("Response was not JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("Request failed with HTTP {}", status.as_u16());
    }
    Ok(())
}

async fn validate_local(environment: Option<String>, json_output: bool) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let client = Arc::new(ElasticClient::new(&config.elasticsearch)?);
    let engine = QaEngine::new(client, config.qa);

    let report = engine.run_full_validation(environment.as_deref()).await;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_markdown(&report));
    }

    if report.overall_status == QaStatus::Fail {
        bail!("{} of {} checks failed", report.failed_tests, report.total_tests);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.endpoint.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let response = client.get(format!("{}/api/health", base)).send().await?;
            print_json(response).await?;
        }

        Commands::Search {
            query,
            state,
            mode,
            page,
            limit,
        } => {
            let mut filters = json!({});
            if let Some(state) = state {
                filters["state"] = json!(state);
            }
            let response = client
                .post(format!("{}/api/search", base))
                .json(&json!({
                    "query": query,
                    "filters": filters,
                    "mode": mode,
                    "page": page,
                    "limit": limit,
                }))
                .send()
                .await?;
            print_json(response).await?;
        }

        Commands::Boosts { action } => match action {
            BoostsAction::Get => {
                let response = client.get(format!("{}/api/admin/boosts", base)).send().await?;
                print_json(response).await?;
            }
            BoostsAction::Fields => {
                let response = client
                    .get(format!("{}/api/admin/boosts/fields", base))
                    .send()
                    .await?;
                print_json(response).await?;
            }
            BoostsAction::Set { file } => {
                let raw = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file))?;
                let body: Value = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not valid JSON", file))?;
                let response = client
                    .post(format!("{}/api/admin/boosts", base))
                    .json(&body)
                    .send()
                    .await?;
                print_json(response).await?;
            }
        },

        Commands::Curations { action } => match action {
            CurationsAction::List => {
                let response = client
                    .get(format!("{}/api/admin/curations", base))
                    .send()
                    .await?;
                print_json(response).await?;
            }
            CurationsAction::Save {
                query,
                pins,
                excludes,
            } => {
                let response = client
                    .post(format!("{}/api/admin/curations", base))
                    .json(&json!({ "query": query, "pins": pins, "excludes": excludes }))
                    .send()
                    .await?;
                print_json(response).await?;
            }
            CurationsAction::Delete { query } => {
                let response = client
                    .delete(format!("{}/api/admin/curations", base))
                    .query(&[("query", query)])
                    .send()
                    .await?;
                print_json(response).await?;
            }
        },

        Commands::Indices { action } => {
            let request = match action {
                IndicesAction::List => client.get(format!("{}/api/admin/indices", base)),
                IndicesAction::Delete { index } => {
                    client.delete(format!("{}/api/admin/indices/{}", base, index))
                }
                IndicesAction::Alias {
                    action,
                    index,
                    alias,
                } => client
                    .post(format!("{}/api/admin/aliases", base))
                    .json(&json!({ "action": action, "index": index, "alias": alias })),
                IndicesAction::Dedup => client.post(format!("{}/api/admin/deduplicate", base)),
            };
            print_json(request.send().await?).await?;
        }

        Commands::Validate {
            environment,
            local,
            json: json_output,
        } => {
            if local {
                validate_local(environment, json_output).await?;
            } else {
                let response = client
                    .post(format!("{}/api/qa/validate", base))
                    .json(&json!({ "environment": environment }))
                    .send()
                    .await?;
                if json_output {
                    print_json(response).await?;
                } else {
                    let body: Value = response.json().await?;
                    println!("{}", body["markdown_report"].as_str().unwrap_or_default());
                    if body["report"]["overall_status"] == "fail" {
                        bail!("Validation failed");
                    }
                }
            }
        }

        Commands::Reports {
            environment,
            limit,
            prune_before,
        } => {
            let mut params: Vec<(&str, String)> = Vec::new();
            if let Some(env) = environment {
                params.push(("environment", env));
            }
            let response = match prune_before {
                Some(older_than) => {
                    params.push(("olderThan", older_than));
                    client
                        .delete(format!("{}/api/qa/reports", base))
                        .query(&params)
                        .send()
                        .await?
                }
                None => {
                    params.push(("limit", limit.to_string()));
                    client
                        .get(format!("{}/api/qa/reports", base))
                        .query(&params)
                        .send()
                        .await?
                }
            };
            print_json(response).await?;
        }
    }

    Ok(())
}

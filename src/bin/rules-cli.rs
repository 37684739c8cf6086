use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::path::PathBuf;

use rules_proxy::config::ProjectConfig;
use rules_proxy::observability::logging::init_logging;
use rules_proxy::RuleSet;

#[derive(Parser)]
#[command(name = "rules-cli")]
#[command(about = "Inspect redirect rules of a project or a running rules-proxy", long_about = None)]
struct Cli {
    /// Admin endpoint of a running proxy.
    #[arg(short, long, default_value = "http://127.0.0.1:8889")]
    url: String,

    /// Admin api key, if the proxy requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy status
    Status,
    /// List the active rules in match order
    Rules,
    /// Show the decision for a request
    Match {
        path: String,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        scheme: Option<String>,
    },
    /// Load a project's rule files offline and report problems
    Check {
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        #[arg(long)]
        dist_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Rules => client.get(format!("{}/admin/rules", cli.url)),
        Commands::Match { path, query, host, scheme } => {
            let mut params = vec![("path", path)];
            params.extend(query.map(|v| ("query", v)));
            params.extend(host.map(|v| ("host", v)));
            params.extend(scheme.map(|v| ("scheme", v)));
            client.get(format!("{}/admin/match", cli.url)).query(&params)
        }
        Commands::Check { project_dir, dist_dir } => return check(project_dir, dist_dir),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

fn check(project_dir: PathBuf, dist_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    init_logging("warn");
    let project = ProjectConfig {
        project_dir,
        dist_dir,
        ..Default::default()
    };

    let (rules, warnings) = RuleSet::load(&project)?;
    for rule in rules.summaries() {
        println!(
            "{:>3}  {:<40} {:<40} {} {}",
            rule.index,
            rule.from,
            rule.to,
            rule.status,
            if rule.force { "!" } else { "" }
        );
    }
    println!("{} rules loaded, {} skipped", rules.len(), warnings.len());
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

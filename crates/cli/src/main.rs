//! VSL CLI - Command-line interface for the VSL supervisor daemon

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9528";

#[derive(Parser)]
#[command(name = "vsl")]
#[command(about = "Vintage Story launcher supervisor CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "VSL_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

/// Identifies one (version, installation) launch
#[derive(Args)]
struct GameArgs {
    /// Game version label (e.g. 1.19.8)
    #[arg(long)]
    version_label: String,

    /// Directory holding the game executable
    #[arg(long)]
    version_path: PathBuf,

    /// Installation id
    #[arg(long)]
    installation_id: String,

    /// Installation data directory
    #[arg(long)]
    installation_path: PathBuf,

    /// Extra game parameters
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    start_params: String,
}

impl GameArgs {
    fn to_params(&self) -> serde_json::Value {
        json!({
            "version": {
                "version": self.version_label,
                "path": self.version_path,
            },
            "installation": {
                "id": self.installation_id,
                "path": self.installation_path,
                "start_params": self.start_params,
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the game and wait until it exits
    Launch(GameArgs),

    /// Terminate a running game
    Cancel(GameArgs),

    /// Inspect and drive tasks
    #[command(subcommand)]
    Tasks(TaskCommands),

    /// Recursively apply a permission mode
    Perms {
        /// Octal mode (e.g. 755)
        mode: String,

        /// Root paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List all tasks
    List,

    /// Register a task
    Create {
        /// download, extract, compress, permission-normalize, game-launch
        #[arg(short, long)]
        task_type: String,

        description: String,
    },

    /// Report progress (percent)
    Progress { task_id: String, percent: f64 },

    /// Mark a task completed
    Complete { task_id: String },

    /// Mark a task failed
    Fail {
        task_id: String,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Discard a finished task
    Remove { task_id: String },

    /// Discard every finished task
    Clear,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct TaskView {
    id: String,
    task_type: String,
    status: String,
    progress: f64,
    description: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Tabled)]
struct TaskRow {
    id: String,
    #[tabled(rename = "type")]
    task_type: String,
    status: String,
    progress: String,
    description: String,
}

impl From<TaskView> for TaskRow {
    fn from(task: TaskView) -> Self {
        let status = match task.error {
            Some(reason) => format!("{} ({})", task.status, reason),
            None => task.status,
        };
        Self {
            id: task.id,
            task_type: task.task_type,
            status,
            progress: format!("{:.0}%", task.progress),
            description: task.description,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Parse an octal permission string: `755`, `0755` or `0o755`
fn parse_mode(raw: &str) -> Result<u32> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    let mode = u32::from_str_radix(digits, 8)
        .with_context(|| format!("Invalid octal mode: {}", raw))?;
    if mode > 0o7777 {
        anyhow::bail!("Mode out of range: {}", raw);
    }
    Ok(mode)
}

fn print_task_result(result: &serde_json::Value, action: &str) -> Result<()> {
    if !result["applied"].as_bool().unwrap_or(false) {
        println!("{}", format!("○ {} ignored (unknown or finished task)", action).yellow());
        return Ok(());
    }
    println!("{}", format!("✓ {}", action).green().bold());
    if let Some(task) = result.get("task").filter(|t| !t.is_null()) {
        let task: TaskView = serde_json::from_value(task.clone())?;
        println!("{}", Table::new(vec![TaskRow::from(task)]));
    }
    Ok(())
}

async fn run_tasks(url: &str, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::List => {
            let result = call_rpc(url, "task.list.v1", json!({})).await?;
            let tasks: Vec<TaskView> = serde_json::from_value(result["tasks"].clone())?;
            if tasks.is_empty() {
                println!("{}", "No tasks".yellow());
                return Ok(());
            }
            let rows: Vec<TaskRow> = tasks.into_iter().map(TaskRow::from).collect();
            println!("{}", Table::new(rows));
        }

        TaskCommands::Create {
            task_type,
            description,
        } => {
            let params = json!({ "task_type": task_type, "description": description });
            let result = call_rpc(url, "task.create.v1", params).await?;
            println!(
                "{} {}",
                "✓ Task created:".green().bold(),
                result["task_id"].as_str().unwrap_or_default()
            );
        }

        TaskCommands::Progress { task_id, percent } => {
            let params = json!({ "task_id": task_id, "percent": percent });
            let result = call_rpc(url, "task.progress.v1", params).await?;
            print_task_result(&result, "Progress updated")?;
        }

        TaskCommands::Complete { task_id } => {
            let result = call_rpc(url, "task.complete.v1", json!({ "task_id": task_id })).await?;
            print_task_result(&result, "Task completed")?;
        }

        TaskCommands::Fail { task_id, reason } => {
            let params = json!({ "task_id": task_id, "reason": reason });
            let result = call_rpc(url, "task.fail.v1", params).await?;
            print_task_result(&result, "Task failed")?;
        }

        TaskCommands::Remove { task_id } => {
            call_rpc(url, "task.remove.v1", json!({ "task_id": task_id })).await?;
            println!("{}", format!("✓ Task {} removed", task_id).green().bold());
        }

        TaskCommands::Clear => {
            let result = call_rpc(url, "task.clear.v1", json!({})).await?;
            println!(
                "{}",
                format!("✓ {} finished task(s) removed", result["cleared"]).green().bold()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Launch(game) => {
            println!(
                "{}",
                format!("Launching Vintage Story {}...", game.version_label)
                    .cyan()
                    .bold()
            );
            let result = call_rpc(&cli.rpc_url, "game.execute.v1", game.to_params()).await?;

            match result["exit_code"].as_i64() {
                Some(0) => println!("{}", "✓ Game closed normally".green().bold()),
                Some(code) => println!("{}", format!("✗ Game exited with code {}", code).red()),
                None => println!("{}", "✗ Game was terminated".red()),
            }
            println!("  {} {}", "Task:".bold(), result["task_id"].as_str().unwrap_or_default());
        }

        Commands::Cancel(game) => {
            let result = call_rpc(&cli.rpc_url, "game.cancel.v1", game.to_params()).await?;
            if result["cancelled"].as_bool().unwrap_or(false) {
                println!("{}", "✓ Game terminated".green().bold());
            } else {
                println!("{}", "○ Game is still starting; try again".yellow());
            }
        }

        Commands::Tasks(command) => run_tasks(&cli.rpc_url, command).await?,

        Commands::Perms { mode, paths } => {
            let mode = parse_mode(&mode)?;
            let params = json!({ "paths": paths, "mode": mode });
            let result = call_rpc(&cli.rpc_url, "fs.change_perms.v1", params).await?;

            if result["result"] == "done" {
                println!("{}", format!("✓ Mode {:o} applied", mode).green().bold());
            } else {
                println!(
                    "  {} {}",
                    "✗".red(),
                    result["error"].as_str().unwrap_or("permission change failed")
                );
            }
        }
    }

    Ok(())
}

//! Repo Genome MCP server binary.
//!
//! Serves the genome over stdio. Protocol purity matters: stdout carries
//! MCP frames only, logging goes to stderr and stays off unless
//! explicitly enabled.

use anyhow::Result;
use genome_engine::ScanConfig;
use genome_mcp::GenomeService;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::env;
use std::path::PathBuf;

fn print_help() {
    println!("Repo Genome MCP server");
    println!();
    println!("Usage: genome-mcp [--print-tools|--version|--help]");
    println!();
    println!("Flags:");
    println!("  --print-tools  Print the tool inventory and exit");
    println!("  --version      Print version and exit");
    println!("  --help         Print this help and exit");
    println!();
    println!("Env:");
    println!("  GENOME_MCP_ROOT  Repository root to serve (default: current directory)");
    println!("  GENOME_MCP_LOG   Enable stderr logging (off by default)");
    println!("  GENOME_MCP_GZIP  Persist the artifact gzipped");
}

const TOOL_NAMES: &[&str] = &[
    "scan",
    "query",
    "get_node",
    "search",
    "dependencies",
    "stats",
    "export",
    "impact",
    "update",
    "validate",
    "build_context",
    "explain_context",
    "get_context_skeleton",
    "get_context_feedback",
    "set_context_session",
    "filter",
    "compare",
    "find_path",
];

fn handle_cli_args() -> Option<i32> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--print-tools") => {
            let payload = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "tools": TOOL_NAMES,
            });
            println!("{payload}");
            Some(0)
        }
        Some("--version" | "-V") => {
            println!("genome-mcp {}", env!("CARGO_PKG_VERSION"));
            Some(0)
        }
        Some("--help" | "-h") => {
            print_help();
            Some(0)
        }
        // Some MCP clients unconditionally pass `--stdio`; serve anyway.
        Some("--stdio" | "stdio") | None => None,
        Some(other) => {
            if logging_enabled() {
                log::warn!("ignoring unknown argument: {other}");
            }
            None
        }
    }
}

fn logging_enabled() -> bool {
    env::var("GENOME_MCP_LOG")
        .ok()
        .map(|v| {
            let v = v.trim();
            !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
        })
        .unwrap_or(false)
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Some(code) = handle_cli_args() {
        std::process::exit(code);
    }

    if logging_enabled() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .target(env_logger::Target::Stderr)
            .init();
        log::info!("starting Repo Genome MCP server");
    }

    let root = env::var("GENOME_MCP_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let mut config = ScanConfig::default();
    config.gzip = env_flag("GENOME_MCP_GZIP");

    let service = GenomeService::new(root, config);
    let server = service.serve(stdio()).await?;
    server.waiting().await?;

    if logging_enabled() {
        log::info!("Repo Genome MCP server stopped");
    }
    Ok(())
}

//! Flare CLI — one-shot and batch command risk assessment.
//!
//! This binary is the local driver for the assessment engine: `assess` runs
//! one command through the pipeline and prints the JSON assessment, `check`
//! reads commands line-by-line from stdin and prints one assessment per
//! line (sharing a single engine, and therefore a single oracle cache).
//! Transports that embed the engine (RPC servers, editor integrations) are
//! expected to mirror the error handling here: a rejected input degrades to
//! a synthetic "Analysis error" assessment instead of failing the request.

use anyhow::Result;
use tokio::io::AsyncBufReadExt;

use flare::{error_assessment, AssessmentEngine, FlareConfig, RiskAssessment};

fn print_help() {
    eprintln!(
        r#"🔥 Flare — advisory risk assessment for shell commands

USAGE:
    flare assess "<command>" [OPTIONS]   Assess one command, print JSON
    flare check [OPTIONS]                Assess commands from stdin (one per line)
    flare help                           Show this help message
    flare version                        Show version info

OPTIONS:
    --cwd DIR        Working directory of the command (default: current dir)
    --config PATH    TOML config file (default: reference policy, no extras)
    --pretty         Pretty-print the JSON output

EXAMPLES:
    flare assess "rm -rf /tmp/build"
    flare assess "npm install express@4.16.0" --cwd /work/app
    cat commands.txt | flare check --config /etc/flare/config.toml

Flare is advisory only: it never executes or blocks commands.
"#
    );
}

fn print_version() {
    eprintln!("Flare v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Advisory risk assessment for shell commands run by AI agents");
}

/// Value of a `--flag VALUE` option, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

fn load_config(args: &[String]) -> Result<FlareConfig> {
    match flag_value(args, "--config") {
        Some(path) => FlareConfig::load(std::path::Path::new(&path)),
        None => Ok(FlareConfig::reference()),
    }
}

fn resolve_cwd(args: &[String]) -> String {
    flag_value(args, "--cwd").unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "/".to_string())
    })
}

fn render(assessment: &RiskAssessment, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(assessment).unwrap_or_default()
    } else {
        serde_json::to_string(assessment).unwrap_or_default()
    }
}

async fn run_assess(rest_args: &[String]) -> Result<()> {
    let Some(command) = rest_args.first().filter(|a| !a.starts_with("--")) else {
        eprintln!("No command given. Usage: flare assess \"<command>\" [--cwd DIR]");
        std::process::exit(1);
    };
    let config = load_config(rest_args)?;
    let cwd = resolve_cwd(rest_args);
    let pretty = rest_args.iter().any(|a| a == "--pretty");

    let engine = AssessmentEngine::new(config);
    let assessment = match engine.assess(command, &cwd).await {
        Ok(assessment) => assessment,
        Err(err) => error_assessment(&err.to_string()),
    };
    println!("{}", render(&assessment, pretty));
    Ok(())
}

async fn run_check(rest_args: &[String]) -> Result<()> {
    let config = load_config(rest_args)?;
    let cwd = resolve_cwd(rest_args);
    let engine = AssessmentEngine::new(config);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let assessment = match engine.assess(&line, &cwd).await {
            Ok(assessment) => assessment,
            Err(err) => error_assessment(&err.to_string()),
        };
        println!("{}", render(&assessment, false));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let subcommand = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest_args: Vec<String> = args.iter().skip(2).cloned().collect();

    match subcommand {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            print_version();
            Ok(())
        }
        "assess" => run_assess(&rest_args).await,
        "check" => run_check(&rest_args).await,
        other => {
            eprintln!("Unknown command: {}\n", other);
            print_help();
            std::process::exit(1);
        }
    }
}

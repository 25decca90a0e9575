//! SmartCAPTCHA CLI
//!
//! Usage:
//!   smartcaptcha --serve                               # HTTP API server
//!   smartcaptcha --features '{"avg_mouse_speed":0.6,...}'  # Single evaluation
//!   smartcaptcha --interactive                         # One JSON object per line
//!   smartcaptcha --simulate --samples 200              # Score synthetic sessions
//!   smartcaptcha --features '...' --json               # JSON output

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use smartcaptcha::config::AppConfig;
use smartcaptcha::core::{
    run_server, simulate, Classifier, DecisionPolicy, ModelArtifact, ScoreSummary, TokenStore,
    VerificationService,
};
use smartcaptcha::error::VerifyError;
use smartcaptcha::logging::{init_logging, LogFormat};
use smartcaptcha::types::{FeatureVector, RawFeatures, VerificationResult};
use smartcaptcha::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "smartcaptcha",
    version = VERSION,
    about = "SmartCAPTCHA - behavioral-biometrics human verification",
    long_about = "SmartCAPTCHA scores pointer-interaction features with a trained\n\
                  classifier and issues single-use proof tokens to likely humans.\n\n\
                  Modes:\n  \
                  --serve        HTTP API server\n  \
                  --features     Evaluate one JSON feature map\n  \
                  --interactive  Evaluate one JSON feature map per stdin line\n  \
                  --simulate     Score synthetic bot-like and human-like sessions\n\n\
                  Verdicts:\n  \
                  HUMAN       - Above the upper cutoff, token issued\n  \
                  SUSPICIOUS  - Between the cutoffs\n  \
                  BOT         - Below the lower cutoff"
)]
struct Args {
    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Feature map to evaluate (JSON object)
    #[arg(short, long)]
    features: Option<String>,

    /// Interactive mode - read one JSON feature map per stdin line
    #[arg(short, long)]
    interactive: bool,

    /// Score synthetic sessions against the loaded model
    #[arg(long)]
    simulate: bool,

    /// Samples per population for --simulate
    #[arg(long, default_value_t = 200)]
    samples: usize,

    /// RNG seed for --simulate
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address (overrides config)
    #[arg(long)]
    addr: Option<String>,

    /// Model artifact path (overrides config)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show feature breakdown
    #[arg(long)]
    verbose: bool,

    /// Log format (overrides config)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log filter, e.g. "debug" (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "config error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    init_logging(config.log_format, &config.log_level);

    let model = load_model(&config);
    let service = match build_service(&config, model.clone()) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("{} {}", "config error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    if args.serve {
        run_serve(&config, service).await;
    } else if args.simulate {
        run_simulate(&args, model.as_ref());
    } else if let Some(ref text) = args.features {
        run_single(text, &args, &service);
    } else {
        // Default to interactive if no mode specified
        run_interactive(&args, &service);
    }
}

/// Config file (or defaults) with CLI overrides applied
fn load_config(args: &Args) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_toml_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(addr) = &args.addr {
        config.addr = addr.clone();
    }
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(format) = args.log_format {
        config.log_format = format;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

/// A missing or broken model is not fatal; the service reports it
fn load_model(config: &AppConfig) -> Option<Arc<ModelArtifact>> {
    match ModelArtifact::load(&config.model_path) {
        Ok(model) => {
            tracing::info!(
                path = %config.model_path.display(),
                kind = model.kind(),
                columns = model.feature_columns.len(),
                digest = model.digest.as_deref().unwrap_or("-"),
                "model loaded"
            );
            Some(Arc::new(model))
        }
        Err(e) => {
            tracing::warn!(path = %config.model_path.display(), error = %e, "model not loaded");
            None
        }
    }
}

fn build_service(
    config: &AppConfig,
    model: Option<Arc<ModelArtifact>>,
) -> Result<VerificationService, Box<dyn std::error::Error>> {
    let policy = DecisionPolicy::new(config.policy)?;
    let tokens = Arc::new(TokenStore::new(config.tokens));
    let digest = model.as_ref().and_then(|m| m.digest.clone());
    let classifier = model.map(|m| m as Arc<dyn Classifier>);
    Ok(VerificationService::new(classifier, policy, tokens, config.service).with_model_digest(digest))
}

/// Evaluate one feature map
fn run_single(text: &str, args: &Args, service: &VerificationService) {
    if !evaluate_line(text, args, service) {
        std::process::exit(1);
    }
}

/// Evaluate one feature map per stdin line
fn run_interactive(args: &Args, service: &VerificationService) {
    print_header("Interactive Mode");
    println!("Paste a JSON feature map and press Enter. Type 'quit' to exit.");
    println!(
        "Required: avg_mouse_speed, mouse_path_entropy, click_delay, task_completion_time, idle_time"
    );
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut evaluated = 0usize;

    loop {
        print!("{} ", ">".bold());
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Evaluated: {}", evaluated);
            break;
        }
        if line.is_empty() {
            continue;
        }

        if evaluate_line(line, args, service) {
            evaluated += 1;
        }
    }
}

/// Parse, verify and print; false on any error
fn evaluate_line(text: &str, args: &Args, service: &VerificationService) -> bool {
    let raw: RawFeatures = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            print_error(&format!("not a JSON object: {e}"), args.json);
            return false;
        }
    };

    match service.verify(&raw) {
        Ok(result) => {
            print_result(&result, &raw, args);
            true
        }
        Err(e) => {
            print_verify_error(&e, args.json);
            false
        }
    }
}

fn print_result(result: &VerificationResult, raw: &RawFeatures, args: &Args) {
    if args.json {
        match serde_json::to_string(result) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&e.to_string(), true),
        }
    } else if args.verbose {
        print_verbose(result, raw);
    } else if args.no_color {
        println!("{}", result.to_parseable_string());
    } else {
        println!("{}", result.to_terminal_string());
    }
}

fn print_verify_error(e: &VerifyError, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "error": e.code(), "detail": e.to_string() })
        );
    } else {
        println!("{} {}", format!("{}:", e.code()).red().bold(), e);
    }
}

fn print_error(message: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "error": "input_error", "detail": message }));
    } else {
        println!("{} {}", "error:".red().bold(), message);
    }
}

/// Verdict plus the feature vector it was computed from
fn print_verbose(result: &VerificationResult, raw: &RawFeatures) {
    println!("┌──────────────────────────────────────┐");
    println!(
        "│ {} P(human) = {:.4}",
        result.verdict.painted(),
        result.confidence
    );
    println!("├──────────────────────────────────────┤");
    println!("│ Features:");
    // already validated by verify()
    if let Ok(features) = FeatureVector::from_raw(raw) {
        for (feature, value) in features.iter() {
            let marker = if feature.is_required() { " " } else { "·" };
            println!("│  {}{:<28} {:>8.4}", marker, feature.name(), value);
        }
    }
    println!("├──────────────────────────────────────┤");
    println!("│ is_human: {}", result.is_human);
    println!(
        "│ Token:    {}",
        if result.has_token() { result.token.cyan().to_string() } else { "-".dimmed().to_string() }
    );
    println!("│ Reason:   {} ({})", result.reason.code(), result.reason.description().dimmed());
    println!("└──────────────────────────────────────┘");
}

/// Score synthetic populations and print their distributions
fn run_simulate(args: &Args, model: Option<&Arc<ModelArtifact>>) {
    let Some(model) = model else {
        print_error("--simulate needs a loaded model (see --model)", args.json);
        std::process::exit(1);
    };

    let report = simulate(model.as_ref(), args.samples, args.seed);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&e.to_string(), true),
        }
        return;
    }

    print_header("Simulation");
    println!("model: {} | samples: {} | seed: {}", model.kind(), args.samples, args.seed);
    println!();
    print_summary("bot-like", &report.bot_like);
    print_summary("human-like", &report.human_like);
}

fn print_summary(label: &str, summary: &ScoreSummary) {
    println!(
        "{:<11} n={} mean={:.3} std={:.3} min={:.3} max={:.3}",
        label.bold(),
        summary.n,
        summary.mean,
        summary.std,
        summary.min,
        summary.max
    );
}

fn print_header(mode: &str) {
    println!("{}", "========================================".bold());
    println!("{}", format!("  SmartCAPTCHA v{} - {}", VERSION, mode).bold());
    println!("{}", "========================================".bold());
    println!();
}

/// Run HTTP API server
async fn run_serve(config: &AppConfig, service: Arc<VerificationService>) {
    print_header("API Server");

    if let Err(e) = run_server(
        &config.addr,
        service,
        &config.cors,
        config.tokens.sweep_interval_secs,
    )
    .await
    {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

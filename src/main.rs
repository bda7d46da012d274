//! ops-companion entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI arguments
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Build engine backend, model cache and runner
//!   7. Either serve HTTP until Ctrl-C, or run recipes on FILE / stdin and print

use std::io::Read;
use std::sync::Arc;

use tracing::info;

use ops_companion::bootstrap::logger;
use ops_companion::config;
use ops_companion::engine::cache::ModelCache;
use ops_companion::engine::providers;
use ops_companion::error::AppError;
use ops_companion::events::Event;
use ops_companion::runner::{RunError, RunRequest, Runner};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();
    logger::init(effective_log_level, force_cli_level)?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        engine = %config.engine.provider,
        log_level = %effective_log_level,
        "config loaded"
    );

    let backend = providers::build(&config.engine, config.engine_api_token.clone()).map_err(RunError::from)?;
    let cache = Arc::new(ModelCache::new(backend, config.engine.cache_capacity));
    let runner = Arc::new(Runner::from_config(&config, cache));

    if args.serve {
        let bind = args.bind.as_deref().unwrap_or(config.service.bind.as_str());
        return serve(runner, bind);
    }

    let text = read_input(args.input.as_deref())?;
    if text.trim().is_empty() {
        return Err(RunError::InvalidRequest("input text is empty".into()).into());
    }

    let recipes: Vec<String> = if args.all_recipes {
        runner.recipes().names().into_iter().map(str::to_string).collect()
    } else {
        vec![args.recipe.clone().unwrap_or_else(|| ops_companion::recipes::DEFAULT_RECIPE.to_string())]
    };

    let mut meta = serde_json::Map::new();
    meta.insert("source".into(), "cli".into());

    let mut events = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let request = RunRequest {
            text: text.clone(),
            recipe,
            model_name: args.model.clone(),
            safe_mode: config.safeguards.safe_mode && !args.unsafe_mode,
            max_chars: args.max_chars.unwrap_or(config.safeguards.max_chars),
            persist: !args.no_persist,
            meta: meta.clone(),
        };
        events.push(runner.run(&request)?);
    }

    print_events(&events, args.json)
}

fn read_input(path: Option<&str>) -> Result<String, AppError> {
    match path {
        Some(p) if p != "-" => Ok(std::fs::read_to_string(p)?),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_events(events: &[Event], json: bool) -> Result<(), AppError> {
    if json {
        let rendered = if let [event] = events {
            serde_json::to_string_pretty(event)
        } else {
            serde_json::to_string_pretty(events)
        };
        let rendered = rendered.map_err(|e| AppError::Io(std::io::Error::other(e)))?;
        println!("{rendered}");
        return Ok(());
    }

    let with_headers = events.len() > 1;
    for (i, event) in events.iter().enumerate() {
        if with_headers {
            if i > 0 {
                println!();
            }
            println!("## {} ({}, {} ms)", event.recipe, event.model, event.latency_ms);
        }
        println!("{}", event.output);
    }
    Ok(())
}

#[cfg(feature = "http-api")]
fn serve(runner: Arc<Runner>, bind: &str) -> Result<(), AppError> {
    use tokio_util::sync::CancellationToken;
    use tracing::warn;

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let shutdown = CancellationToken::new();

    // `runner` outlives the runtime: the blocking HTTP client must not be dropped inside it.
    let served = Arc::clone(&runner);
    let result = rt.block_on(async {
        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("ctrl-c received, shutting down");
                    signal.cancel();
                }
                Err(e) => warn!("failed to listen for ctrl-c: {e}"),
            }
        });
        ops_companion::service::serve(served, bind, shutdown).await
    });
    drop(rt);
    drop(runner);
    result
}

#[cfg(not(feature = "http-api"))]
fn serve(_runner: Arc<Runner>, _bind: &str) -> Result<(), AppError> {
    Err(AppError::Service("built without the http-api feature".into()))
}

// ── CLI ───────────────────────────────────────────────────────────────────────

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    recipe: Option<String>,
    model: Option<String>,
    all_recipes: bool,
    unsafe_mode: bool,
    max_chars: Option<usize>,
    no_persist: bool,
    json: bool,
    serve: bool,
    bind: Option<String>,
    input: Option<String>,
}

fn usage() {
    println!("Usage: ops-companion [OPTIONS] [FILE]");
    println!();
    println!("Reads FILE (or stdin when FILE is absent or '-') and prints the generated bullets.");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("  -r, --recipe <NAME>        Recipe to run: summary, action_items, brainstorm (default: summary)");
    println!("  -m, --model <ID>           Override the model chosen for the recipe");
    println!("      --all-recipes          Run every registered recipe on the input");
    println!("      --unsafe               Disable redaction and truncation");
    println!("      --max-chars <N>        Output length limit in safe mode (50-4000)");
    println!("      --no-persist           Do not append the event to the event log");
    println!("      --json                 Print the full event as JSON");
    println!("      --serve                Start the HTTP service instead of running once");
    println!("      --bind <ADDR>          Address for --serve (default: [service].bind)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
}

fn require_value(flag: &str, value: Option<String>) -> String {
    match value {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires an argument");
            std::process::exit(1);
        }
    }
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut args = CliArgs {
        log_level: None,
        config_path: None,
        recipe: None,
        model: None,
        all_recipes: false,
        unsafe_mode: false,
        max_chars: None,
        no_persist: false,
        json: false,
        serve: false,
        bind: None,
        input: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            args.input = iter.next();
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                usage();
                std::process::exit(0);
            }
            "-f" | "--config" => args.config_path = Some(require_value("-f/--config", iter.next())),
            "-r" | "--recipe" => args.recipe = Some(require_value("-r/--recipe", iter.next())),
            "-m" | "--model" => args.model = Some(require_value("-m/--model", iter.next())),
            "--all-recipes" => args.all_recipes = true,
            "--unsafe" => args.unsafe_mode = true,
            "--max-chars" => {
                let raw = require_value("--max-chars", iter.next());
                match raw.parse::<usize>() {
                    Ok(n) => args.max_chars = Some(n),
                    Err(_) => {
                        eprintln!("error: --max-chars expects a number, got '{raw}'");
                        std::process::exit(1);
                    }
                }
            }
            "--no-persist" => args.no_persist = true,
            "--json" => args.json = true,
            "--serve" => args.serve = true,
            "--bind" => args.bind = Some(require_value("--bind", iter.next())),
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            "-" => args.input = Some(arg),
            a if a.starts_with('-') => {
                eprintln!("error: unknown option '{a}' (see --help)");
                std::process::exit(1);
            }
            _ => {
                if args.input.is_some() {
                    eprintln!("error: only one input file may be given");
                    std::process::exit(1);
                }
                args.input = Some(arg);
            }
        }
    }

    // Each -v raises verbosity one tier:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug  (chunk plans, cache loads)
    //   -vvvv+  → trace  (full engine payloads)
    args.log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    args
}

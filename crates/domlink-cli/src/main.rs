//! Domlink Command-Line Interface
//!
//! This CLI provides tools for:
//! - Launching a module against a host page and scripting events into it
//! - Inspecting a module's bridge imports and exports

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use domlink_bridge::wasm::{Bridge, BridgeConfig, Session};
use domlink_core::{Document, LogWindow, PageTemplate};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "domlink")]
#[command(author, version, about = "Drive a host document from a WebAssembly module", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a module and run scripted steps against it
    Run {
        /// Module to load (.wasm or .wat)
        module: PathBuf,

        /// Page template (JSON) to seed the document body
        #[arg(short, long)]
        page: Option<PathBuf>,

        /// Bridge configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fuel limit, overrides the config file
        #[arg(long)]
        fuel: Option<u64>,

        /// Step to run after launch, repeatable:
        /// fire:<selector>:<event>, send:<export>:<text>, call:<export>
        #[arg(short, long = "step")]
        steps: Vec<Step>,

        /// Print the document when done
        #[arg(long)]
        dump: bool,
    },

    /// Show a module's imports and exports
    Inspect {
        /// Module to load (.wasm or .wat)
        module: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// One scripted action against a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Fire an event on the first element matching a selector
    Fire { selector: String, event: String },
    /// Copy text into the module and call `export(ptr, len)`
    Send { export: String, text: String },
    /// Call a no-argument export
    Call { export: String },
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("step '{}' has no kind (fire:, send:, call:)", s))?;
        match kind {
            "fire" => {
                // selectors may contain ':' in attribute values, event names never do
                let (selector, event) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| format!("expected fire:<selector>:<event>, got '{}'", s))?;
                if selector.is_empty() || event.is_empty() {
                    return Err(format!("expected fire:<selector>:<event>, got '{}'", s));
                }
                Ok(Step::Fire {
                    selector: selector.to_string(),
                    event: event.to_string(),
                })
            }
            "send" => {
                let (export, text) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("expected send:<export>:<text>, got '{}'", s))?;
                if export.is_empty() {
                    return Err(format!("expected send:<export>:<text>, got '{}'", s));
                }
                Ok(Step::Send {
                    export: export.to_string(),
                    text: text.to_string(),
                })
            }
            "call" if !rest.is_empty() => Ok(Step::Call {
                export: rest.to_string(),
            }),
            "call" => Err("expected call:<export>".to_string()),
            other => Err(format!("unknown step kind '{}' (fire, send, call)", other)),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Fire { selector, event } => write!(f, "fire:{}:{}", selector, event),
            Step::Send { export, text } => write!(f, "send:{}:{}", export, text),
            Step::Call { export } => write!(f, "call:{}", export),
        }
    }
}

#[derive(Serialize)]
struct ModuleSummary<'a> {
    name: &'a str,
    exports: Vec<&'a str>,
    imports: Vec<String>,
    bridge_ready: bool,
    problem: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            module,
            page,
            config,
            fuel,
            steps,
            dump,
        } => cmd_run(module, page, config, fuel, steps, dump),

        Commands::Inspect { module, json } => cmd_inspect(module, json),
    }
}

fn load_config(path: Option<&Path>, fuel: Option<u64>) -> Result<BridgeConfig> {
    let mut config = match path {
        Some(path) => BridgeConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    if let Some(fuel) = fuel {
        config = config.fuel_limit(fuel);
    }
    Ok(config)
}

fn load_page(path: Option<&Path>) -> Result<Document> {
    let Some(path) = path else {
        return Ok(Document::new());
    };
    let template = PageTemplate::from_file(path)
        .with_context(|| format!("failed to read page {}", path.display()))?;
    Document::from_template(&template).with_context(|| format!("failed to build page {}", path.display()))
}

fn cmd_run(
    module_path: PathBuf,
    page: Option<PathBuf>,
    config: Option<PathBuf>,
    fuel: Option<u64>,
    steps: Vec<Step>,
    dump: bool,
) -> Result<()> {
    let config = load_config(config.as_deref(), fuel)?;
    let document = load_page(page.as_deref())?;

    let bridge = Bridge::new(config).context("failed to create bridge")?;
    let module = bridge
        .load_module(&module_path)
        .with_context(|| format!("failed to load module {}", module_path.display()))?;
    module
        .check_exports(&bridge.config().exports)
        .with_context(|| format!("{} cannot be driven by the bridge", module.name()))?;

    let mut session = bridge
        .launch(&module, document, Box::new(LogWindow))
        .with_context(|| format!("failed to launch {}", module.name()))?;

    for (i, step) in steps.iter().enumerate() {
        info!("step {}: {}", i + 1, step);
        run_step(&mut session, step).with_context(|| format!("step {} ({}) failed", i + 1, step))?;
    }

    if dump {
        let doc = session.document();
        println!("{}", doc.render(doc.root()));
    }

    if let Some(remaining) = session.remaining_fuel() {
        info!("fuel remaining: {}", remaining);
    }
    info!(
        "{} handles issued, {} live, {} listeners",
        session.objects().len(),
        session.objects().live(),
        session.relay_table().len()
    );

    Ok(())
}

fn run_step(session: &mut Session, step: &Step) -> Result<()> {
    match step {
        Step::Fire { selector, event } => {
            let Some(node) = session.document().query_selector(selector)? else {
                bail!("no element matches '{}'", selector);
            };
            let delivered = session.dispatch_event(node, event)?;
            info!("{} listener(s) ran for '{}'", delivered, event);
        }
        Step::Send { export, text } => {
            if !session.send_text(export, text)? {
                info!("empty text, '{}' not called", export);
            }
        }
        Step::Call { export } => session.invoke(export)?,
    }
    Ok(())
}

fn cmd_inspect(module_path: PathBuf, json: bool) -> Result<()> {
    let bridge = Bridge::new(BridgeConfig::default()).context("failed to create bridge")?;
    let module = bridge
        .load_module(&module_path)
        .with_context(|| format!("failed to load module {}", module_path.display()))?;
    let problem = module
        .check_exports(&bridge.config().exports)
        .err()
        .map(|e| e.to_string());

    let summary = ModuleSummary {
        name: module.name(),
        exports: module.exports().collect(),
        imports: module
            .imports()
            .map(|(group, name)| format!("{}.{}", group, name))
            .collect(),
        bridge_ready: problem.is_none(),
        problem,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== Module: {} ===", summary.name);
    println!();
    println!("Exports:");
    for export in &summary.exports {
        println!("  {}", export);
    }
    println!();
    println!("Imports:");
    for import in &summary.imports {
        println!("  {}", import);
    }
    println!();
    match &summary.problem {
        None => println!("Bridge entry points: ok"),
        Some(problem) => println!("Bridge entry points: {}", problem),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fire() {
        assert_eq!(
            "fire:#run:click".parse::<Step>().unwrap(),
            Step::Fire {
                selector: "#run".into(),
                event: "click".into()
            }
        );
        assert_eq!(
            "fire:a[href=\"x:y\"]:click".parse::<Step>().unwrap(),
            Step::Fire {
                selector: "a[href=\"x:y\"]".into(),
                event: "click".into()
            }
        );
        assert!("fire:#run".parse::<Step>().is_err());
        assert!("fire::click".parse::<Step>().is_err());
    }

    #[test]
    fn test_parse_send_keeps_colons_in_text() {
        assert_eq!(
            "send:compile:mov r1: 5".parse::<Step>().unwrap(),
            Step::Send {
                export: "compile".into(),
                text: "mov r1: 5".into()
            }
        );
        assert_eq!(
            "send:compile:".parse::<Step>().unwrap(),
            Step::Send {
                export: "compile".into(),
                text: String::new()
            }
        );
        assert!("send:compile".parse::<Step>().is_err());
    }

    #[test]
    fn test_parse_call() {
        assert_eq!(
            "call:step".parse::<Step>().unwrap(),
            Step::Call { export: "step".into() }
        );
        assert!("call:".parse::<Step>().is_err());
        assert!("jump:step".parse::<Step>().is_err());
        assert!("step".parse::<Step>().is_err());
    }

    #[test]
    fn test_step_display_round_trips() {
        for text in ["fire:#run:click", "send:compile:mov r1, 5", "call:run"] {
            assert_eq!(text.parse::<Step>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_cli_parses_steps() {
        let cli = Cli::try_parse_from([
            "domlink", "-vv", "run", "app.wat", "--step", "fire:#run:click", "-s", "call:run", "--dump",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run { module, steps, dump, .. } => {
                assert_eq!(module, PathBuf::from("app.wat"));
                assert_eq!(steps.len(), 2);
                assert!(dump);
            }
            Commands::Inspect { .. } => panic!("expected run"),
        }
    }
}

//! simtree CLI - inspect and drive a demo component tree.
//!
//! This is the main binary entry point. See the `simtree` library for the
//! core functionality.

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simtree::component::variants;
use simtree::constants::TAG_BASIC;
use simtree::env::Environment;
use simtree::signal::ArgSpec;
use simtree::xml::Value;
use simtree::{
    BuilderRegistry, Component, Config, Map, OptionList, ServerRoot, ShadowTree, SignalFrame, Uri,
    ValueType,
};

// CLI
#[derive(Parser)]
#[command(name = "simtree")]
#[command(version)]
#[command(about = "Introspectable component tree with remote signals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the demo tree snapshot as XML
    Tree,
    /// Dispatch a signal frame against the demo tree and print the reply
    Call {
        /// Path to the frame XML file
        frame: PathBuf,
        /// Append journal entries to this JSON-lines file
        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Run one in-process server/client sync round and print the shadow tree
    Sync {
        /// Show advanced components
        #[arg(long)]
        advanced: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Type name of the demo solver component.
const SOLVER_TYPE: &str = "Solver";

fn declare_solver_options(options: &mut OptionList) -> simtree::Result<()> {
    options.add_option("cfl", 0.5_f64, "Courant number")?.mark_basic();
    options.add_option("steps", 100_u32, "Iterations per run")?;
    options.add_option("scheme", String::from("roe"), "Flux scheme")?;
    options.restrict_to(
        "scheme",
        vec![Value::String("roe".into()), Value::String("hllc".into())],
    )
}

fn solver(name: &str) -> Component {
    let mut c = Component::new(name, SOLVER_TYPE);
    c.add_tag(TAG_BASIC);
    if let Err(e) = declare_solver_options(c.options_mut()) {
        log::error!("Failed to declare solver options: {e}");
    }

    match c.signals_mut().regist_signal(
        "solve",
        |target, args, _| {
            let steps: u32 = args.get_value("steps")?;
            log::info!("Solving {} for {} step(s)", target.path(), steps);
            let mut reply = Map::new();
            reply.set_value("residual", 1.0e-6_f64 * f64::from(steps.max(1)).recip())?;
            Ok(Some(reply))
        },
        "Run the solver",
    ) {
        Ok(signal) => {
            signal.arg(
                ArgSpec::new("steps", ValueType::Unsigned, "Iterations")
                    .with_default(simtree::WireValue::Single(Value::Unsigned(1))),
            );
        }
        Err(e) => log::error!("Failed to register solve: {e}"),
    }
    c
}

fn demo_registry() -> BuilderRegistry {
    let mut registry = BuilderRegistry::new();
    variants::register_core_builders(&mut registry);
    registry.register_builder(SOLVER_TYPE, solver);
    registry
}

fn demo_server(config: Config) -> Result<ServerRoot> {
    let mut server = ServerRoot::new(config, demo_registry())?;
    server.with_root(|root| -> simtree::Result<()> {
        let mesh = root.add_child(variants::group("mesh"))?;
        mesh.add_tag(TAG_BASIC);
        mesh.add_child(variants::group("inlet"))?.add_tag(TAG_BASIC);
        mesh.add_child(variants::group("outlet"))?;
        root.add_child(solver("solver"))?;
        let link = variants::link_to("mesh_link", &Uri::parse("mesh"))?;
        root.add_child(link)?;
        Ok(())
    })?;
    server.flush_notifications();
    server.drain_outbound();
    Ok(server)
}

/// Deliver `request` and every follow-up it causes, in order.
fn exchange(server: &mut ServerRoot, shadow: &mut ShadowTree, request: SignalFrame) {
    let mut outbox = VecDeque::from([request]);
    while let Some(frame) = outbox.pop_front() {
        let mut inbound: Vec<SignalFrame> = server.process_now(&frame).into_iter().collect();
        inbound.extend(server.drain_outbound());
        for incoming in inbound {
            match shadow.handle_frame(&incoming) {
                Ok(Some(follow_up)) => outbox.push_back(follow_up),
                Ok(None) => {}
                Err(e) => log::warn!("Sync: {e}"),
            }
        }
    }
}

fn run_sync(config: Config, advanced: bool) -> Result<()> {
    let mut server = demo_server(Config { client_id: "server".to_string(), ..config.clone() })?;
    let mut shadow = ShadowTree::new(&config);
    shadow.set_advanced_mode(advanced || config.advanced_mode);

    let request = shadow.request_tree();
    exchange(&mut server, &mut shadow, request);

    let solver_path = Uri::root(&config.root_name).child("solver");
    if let Some(request) = shadow.modify_options(&solver_path, &[("cfl", "0.8")])? {
        exchange(&mut server, &mut shadow, request);
    }

    let mut args = Map::new();
    args.set_value("name", String::from("monitor"))?;
    args.set_value("atype", String::from("Group"))?;
    let create = SignalFrame::new("create_component", Uri::parse("/"), config.client_id.as_str())
        .with_args(args);
    exchange(&mut server, &mut shadow, create);

    for (depth, path) in shadow.visible_rows() {
        let node = shadow.node_by_path(&path).context("Visible row without node")?;
        println!(
            "{}{} ({}, {:?})",
            "  ".repeat(depth),
            node.name(),
            node.component().type_name(),
            node.kind()
        );
    }
    Ok(())
}

/// `RUST_LOG` fallback: verbose in development, quiet under test.
fn default_log_filter(environment: Environment) -> &'static str {
    if environment.is_development() {
        "debug"
    } else if environment.is_production() {
        "info"
    } else {
        "warn"
    }
}

fn init_logging() {
    // Use SIMTREE_LOG_FILE or <config dir>/simtree.log or the temp dir
    let log_path = if let Ok(path) = std::env::var("SIMTREE_LOG_FILE") {
        PathBuf::from(path)
    } else if let Ok(dir) = Config::config_dir() {
        dir.join("simtree.log")
    } else {
        std::env::temp_dir().join("simtree.log")
    };

    let filter = default_log_filter(Environment::current());
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter));
    builder.format_timestamp_secs();
    match std::fs::File::create(&log_path) {
        Ok(log_file) => {
            builder.target(env_logger::Target::Pipe(Box::new(log_file)));
        }
        Err(e) => eprintln!("Logging to stderr, cannot create {}: {e}", log_path.display()),
    }
    builder.init();
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    log::info!("simtree {} ({})", env!("CARGO_PKG_VERSION"), Environment::current());

    match cli.command {
        Commands::Tree => {
            let server = demo_server(config)?;
            let delimiter = server.config().array_delimiter.clone();
            let snapshot = server.with_root(|root| root.snapshot(&delimiter))?;
            println!("{}", snapshot.to_xml_string());
        }
        Commands::Call { frame, journal } => {
            let text = std::fs::read_to_string(&frame)
                .with_context(|| format!("Failed to read {}", frame.display()))?;
            let request = SignalFrame::parse(&text)
                .with_context(|| format!("Failed to parse {}", frame.display()))?;
            let mut server = demo_server(config)?;
            if let Some(path) = journal {
                server.set_journal_file(path);
            }
            match server.process_now(&request) {
                Some(reply) => println!("{}", reply.to_xml_string()),
                None => println!("Frame {} is a reply; nothing to do", request.frame_id),
            }
        }
        Commands::Sync { advanced } => run_sync(config, advanced)?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_per_environment() {
        assert_eq!(default_log_filter(Environment::Development), "debug");
        assert_eq!(default_log_filter(Environment::Production), "info");
        assert_eq!(default_log_filter(Environment::Test), "warn");
    }

    #[test]
    fn test_demo_sync_round() {
        let config = Config { client_id: "client".to_string(), ..Config::default() };
        run_sync(config, true).unwrap();
    }
}

use crate::cli::Commands;
use crate::config::Config;
use crate::graph::{Graph, Node};
use crate::probe::{Bundle, BundleAssembler, Context, HandlerRegistry, Platform};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn handle_command(command: Commands, config: Config, host: Option<String>) -> Result<()> {
    match command {
        Commands::Probes => handle_probes(),
        Commands::Check => handle_check(config, host).map(|_| ()),
        Commands::Run { dump_graph } => handle_run(config, host, dump_graph).await,
    }
}

fn handle_probes() -> Result<()> {
    let registry = HandlerRegistry::builtin();
    let platform = Platform::current();

    println!("Built-in probes:");
    for name in registry.names() {
        let mandatory = platform
            .mandatory_probes()
            .iter()
            .any(|probe| probe.as_str() == name);
        if mandatory {
            println!("  {} (always enabled)", name);
        } else {
            println!("  {}", name);
        }
    }
    println!(
        "Extensions are loaded from <extensions_dir>/<name>.{}",
        platform.shared_module_extension()
    );
    Ok(())
}

/// Build the shared context: the graph starts with the host node.
pub fn build_context(config: Config, host: Option<String>) -> Result<Context> {
    let host = match host {
        Some(host) => host,
        None => hostname::get()?.to_string_lossy().into_owned(),
    };

    let graph = Graph::new();
    let root = Node::host(&host);
    let root_id = root.id.clone();
    graph.add_node(root);

    Ok(Context::new(Arc::new(config), graph, root_id))
}

fn assemble(config: Config, host: Option<String>) -> Result<(Context, Bundle)> {
    let settings = config.topology()?;
    let ctx = build_context(config, host)?;
    let registry = HandlerRegistry::builtin();

    let bundle = BundleAssembler::new(&registry).assemble(&ctx, &settings)?;
    Ok((ctx, bundle))
}

fn handle_check(config: Config, host: Option<String>) -> Result<Bundle> {
    let (_, bundle) = assemble(config, host)?;

    println!("Topology bundle ({} probes):", bundle.len());
    for name in bundle.names() {
        let origin = if bundle.is_extension(name) {
            "extension"
        } else {
            "built-in"
        };
        println!("  {} [{}]", name, origin);
    }
    Ok(bundle)
}

async fn handle_run(config: Config, host: Option<String>, dump_graph: bool) -> Result<()> {
    let (ctx, mut bundle) = assemble(config, host)?;

    bundle.start()?;

    info!("Topology probes running. Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if dump_graph {
        let nodes = ctx.graph().nodes();
        match serde_json::to_string_pretty(&nodes) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Failed to encode graph: {}", e),
        }
    }

    bundle.stop();
    Ok(())
}

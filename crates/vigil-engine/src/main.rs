//! Vigil demo host.
//!
//! Loads `vigil.yaml` (or the path given as the first argument) with the
//! stock module available, then reads one command per line from stdin:
//! every line raises a `before_command` breakpoint and is authorized.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use vigil_core::{BreakpointKind, Signal};
use vigil_engine::module::ExtensionModule;
use vigil_engine::stock::stock_module;
use vigil_engine::{config, Engine};

#[tokio::main]
async fn main() -> vigil_core::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "vigil.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let modules: Vec<Arc<dyn ExtensionModule>> = vec![Arc::new(stock_module())];
    let engine = Engine::from_config(&cfg, modules)?;

    tracing::info!(config = %path, "vigil ready; reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| vigil_core::VigilError::Internal(format!("stdin: {e}")))?
    {
        let mut words = line.split_whitespace().map(str::to_string);
        let Some(command) = words.next() else { continue };
        let args: Vec<String> = words.collect();

        let signal = engine
            .notify(
                BreakpointKind::BeforeCommand,
                serde_json::json!({ "command": command, "args": args }),
            )
            .await;
        if signal != Signal::Continue {
            println!("{command}: trace signalled {}", signal.as_str());
            continue;
        }

        match engine.authorize(&command, &args).await {
            Ok(()) => println!("{command}: allowed"),
            Err(e) => println!("{command}: {e}"),
        }
    }

    tracing::debug!(metrics = %engine.render_metrics(), "shutting down");
    Ok(())
}

//! docent binary: HTTP server and one-shot CLI queries.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;

use docent::cli::{AskArgs, Cli, Commands};
use docent::config::DocentConfig;
use docent::error::DocentError;
use docent::provider::DefaultProviderFactory;
use docent::server::{self, logging, AppState};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DocentError> {
    let mut config = DocentConfig::load(cli.config.as_deref())?;
    if let Some(ref selector) = cli.model {
        config.model.set_selector(selector)?;
    }
    logging::init_logging(&config.server.log_level, &config.server.log_format);

    let state = AppState::from_config(&config, Arc::new(DefaultProviderFactory));

    match cli.command() {
        Commands::Serve(args) => {
            state.start(config.retrieval.eager).await;
            let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(state, &bind).await
        }
        Commands::Ask(args) => {
            let result = ask(&state, args).await;
            state.shutdown().await;
            result
        }
    }
}

async fn ask(state: &AppState, args: AskArgs) -> Result<(), DocentError> {
    let mut fragments = state
        .dispatcher
        .stream_query(&args.user, &args.question)
        .await?;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

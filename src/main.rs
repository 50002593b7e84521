use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alex_retirement::api::{self, SimulateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "alex-retirement",
    about = "Monte Carlo retirement projector (success rate, percentiles, what-if scenarios)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one projection and print the result as JSON.
    Simulate(SimulateArgs),
    /// Serve the projection HTTP API.
    Serve {
        #[arg(long, env = "ALEX_PORT", default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => {
            let request = api::build_request(args).map_err(anyhow::Error::msg)?;
            let response = api::simulate(&request).map_err(anyhow::Error::msg)?;
            let json = serde_json::to_string_pretty(&response)
                .context("failed to serialize simulation result")?;
            println!("{json}");
        }
        Command::Serve { port } => {
            api::run_http_server(port)
                .await
                .with_context(|| format!("server on port {port} failed"))?;
        }
    }

    Ok(())
}

#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "alex_retirement=info"
                    .parse()
                    .expect("static directive 'alex_retirement=info' is valid"),
            ),
        )
        .init();
}

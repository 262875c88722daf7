use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use vaultgraphs::{
    config::{Args, Config, setup_tracing},
    pipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    });
    setup_tracing(args.log_level);

    info!("Starting vaultgraphs");
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Mode: {}", config.mode);
    info!("Writing to {}", config.files.output.display());

    if let Err(e) = pipeline::run(&config).await {
        error!("Error running the pipeline: {:#}", e);
        return Err(e);
    }

    Ok(())
}

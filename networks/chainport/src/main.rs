#![forbid(unsafe_code)]

use chainport::Chainport;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
	let tracing_config = chainport_tracing::Config::from_env()?;
	chainport_tracing::init_tracing_subscriber(&tracing_config)?;

	let chainport = Chainport::parse();

	chainport.execute().await?;

	Ok(())
}

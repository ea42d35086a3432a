use crate::endpoint::Endpoint;
use chainport_converter::block::BlockConverter;
use chainport_converter::controller::{
	ConversionConfig, ConversionController, DEFAULT_RESUME_SEARCH_LIMIT, DEFAULT_RETRY_DELAY,
};
use chainport_converter::rewrite::SecondAuthorityKeySet;
use chainport_converter::tapos::DEFAULT_TAPOS_REFRESH_INTERVAL;
use chainport_signing::{MasterSecret, PrivateKey};
use chainport_types::ChainId;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser, Clone)]
#[clap(
	rename_all = "kebab-case",
	about = "Converts a chain history into a new chain identity with substituted keys"
)]
pub struct Convert {
	/// Source of the original history: a node URL or a block log path.
	pub input: Endpoint,
	/// Destination for the converted history: a node URL or a block log
	/// path.
	pub output: Endpoint,
	/// Chain id of the source history, hex encoded.
	#[clap(long)]
	pub old_chain_id: String,
	/// Chain id the converted history is signed under, hex encoded.
	#[clap(long)]
	pub new_chain_id: String,
	/// Master secret every substitute key derives from, hex encoded.
	#[clap(long)]
	pub private_key: String,
	/// Administrator owner key injected before the cutoff, hex encoded.
	#[clap(long)]
	pub owner_key: Option<String>,
	/// Administrator active key injected before the cutoff, hex encoded.
	#[clap(long)]
	pub active_key: Option<String>,
	/// Administrator posting key injected before the cutoff, hex encoded.
	#[clap(long)]
	pub posting_key: Option<String>,
	/// Source height at which administrator key injection stops.
	#[clap(long, default_value_t = 0)]
	pub injection_cutoff: u64,
	/// First source block to convert.
	#[clap(long, default_value_t = 1)]
	pub start_block: u64,
	/// Last source block to convert; defaults to the source head.
	#[clap(long)]
	pub stop_block: Option<u64>,
	/// Signing worker count; defaults to the available parallelism.
	#[clap(long)]
	pub jobs: Option<usize>,
	/// Blocks between progress log lines.
	#[clap(long, default_value_t = 10_000)]
	pub log_every: u64,
	/// Source blocks between destination-head queries.
	#[clap(long, default_value_t = DEFAULT_TAPOS_REFRESH_INTERVAL)]
	pub tapos_refresh: u64,
	/// Seconds between retries of missing blocks and transient failures.
	#[clap(long, default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
	pub retry_delay: u64,
	/// Derivation indices searched when validating a resumed
	/// destination.
	#[clap(long, default_value_t = DEFAULT_RESUME_SEARCH_LIMIT)]
	pub resume_search_limit: usize,
	/// Source heights at which a hardfork activates, repeatable.
	#[clap(long = "hardfork-at")]
	pub hardfork_activations: Vec<u64>,
}

impl Convert {
	pub async fn execute(&self) -> Result<(), anyhow::Error> {
		let old_chain_id = ChainId::from_hex(&self.old_chain_id)?;
		let new_chain_id = ChainId::from_hex(&self.new_chain_id)?;
		let secret = MasterSecret::from_hex(&self.private_key)?;
		let second = SecondAuthorityKeySet::new(
			self.owner_key.as_deref().map(PrivateKey::from_hex).transpose()?,
			self.active_key.as_deref().map(PrivateKey::from_hex).transpose()?,
			self.posting_key.as_deref().map(PrivateKey::from_hex).transpose()?,
			self.injection_cutoff,
		);
		let jobs = match self.jobs {
			Some(jobs) => jobs,
			None => std::thread::available_parallelism()?.get(),
		};

		let converter = BlockConverter::new(
			old_chain_id,
			new_chain_id,
			secret,
			second,
			jobs,
			self.tapos_refresh,
			self.hardfork_activations.clone(),
		);
		let config = ConversionConfig {
			start_block: self.start_block,
			stop_block: self.stop_block,
			log_every: self.log_every,
			retry_delay: Duration::from_secs(self.retry_delay),
			resume_search_limit: self.resume_search_limit,
		};

		let source = self.input.open_source().await?;
		let sink = self.output.open_sink().await?;

		let shutdown = CancellationToken::new();
		let signal_token = shutdown.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				info!("interrupt received, finishing the current block");
				signal_token.cancel();
			}
		});

		let controller = ConversionController::new(config, converter, source, sink);
		let report = controller.run(shutdown).await?;
		info!(
			converted = report.blocks_converted,
			transactions = report.transactions_processed,
			interrupted = report.interrupted,
			"conversion run complete"
		);
		Ok(())
	}
}

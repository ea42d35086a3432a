use crate::endpoint::Endpoint;
use chainport_converter::source::BlockSource;
use chainport_node_client::ChainRpcClient;
use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[clap(rename_all = "kebab-case", about = "Prints blocks and head state from a source")]
pub struct Inspect {
	/// A node URL or a block log path.
	pub input: Endpoint,
	/// Height of a block to print as JSON; without it only the head is
	/// reported.
	#[clap(long)]
	pub block: Option<u64>,
	/// Also print the witness schedule; node sources only.
	#[clap(long)]
	pub witnesses: bool,
}

impl Inspect {
	pub async fn execute(&self) -> Result<(), anyhow::Error> {
		let mut source = self.input.open_source().await?;
		match source.head().await? {
			Some(head) => println!("head: {head}"),
			None => println!("head: empty"),
		}
		if let Some(block_num) = self.block {
			match source.read_block(block_num).await? {
				Some(block) => println!("{}", serde_json::to_string_pretty(&block)?),
				None => println!("block {block_num}: not present"),
			}
		}
		if self.witnesses {
			let Endpoint::Remote(url) = &self.input else {
				anyhow::bail!("a witness schedule is only reported by a node source");
			};
			let schedule = ChainRpcClient::new(url).get_witness_schedule().await?;
			for witness in schedule.current_shuffled_witnesses {
				println!("witness: {witness}");
			}
		}
		Ok(())
	}
}

pub mod convert;
pub mod endpoint;
pub mod inspect;

use clap::Parser;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
pub enum Chainport {
	Convert(convert::Convert),
	Inspect(inspect::Inspect),
}

impl Chainport {
	pub async fn execute(&self) -> Result<(), anyhow::Error> {
		match self {
			Self::Convert(convert) => convert.execute().await,
			Self::Inspect(inspect) => inspect.execute().await,
		}
	}
}

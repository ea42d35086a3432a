//! Tracing setup for chainport binaries.

use anyhow::anyhow;
use std::env;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

const LOG_FILTER_ENV: &str = "CHAINPORT_LOG";

/// Options for tracing configuration.
#[derive(Debug, Default)]
pub struct Config {
	/// Log filter directives in `tracing_subscriber::EnvFilter` syntax.
	/// If the value is `None`, the default `info` level applies.
	pub filter_directives: Option<String>,
}

impl Config {
	/// Get the tracing configuration from well-known environment variables.
	pub fn from_env() -> Result<Self, anyhow::Error> {
		let filter_directives = match env::var(LOG_FILTER_ENV) {
			Ok(directives) => Some(directives),
			Err(env::VarError::NotPresent) => None,
			Err(env::VarError::NotUnicode(s)) => {
				return Err(anyhow!(
					"value of environment variable {LOG_FILTER_ENV} is not valid UTF-8: {}",
					s.to_string_lossy()
				));
			}
		};
		Ok(Self { filter_directives })
	}
}

/// Sets the global tracing subscriber for the process.
///
/// Must be called at the start of the binary before any threads able to
/// use tracing macros are spawned.
pub fn init_tracing_subscriber(config: &Config) -> Result<(), anyhow::Error> {
	let env_filter = match &config.filter_directives {
		Some(directives) => EnvFilter::try_new(directives)?,
		None => EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).parse("")?,
	};
	tracing_subscriber::fmt().with_env_filter(env_filter).try_init().map_err(|e| anyhow!(e))?;
	Ok(())
}

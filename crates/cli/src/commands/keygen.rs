use std::path::Path;

use anyhow::Context as _;
use forge_session::KeypairWallet;
use tracing::info;

use crate::error::{CliError, Result};
use crate::output::{KeygenData, OutputFormat, ResultBuilder, print_result};

pub fn execute(out: &Path, force: bool, format: OutputFormat) -> Result<()> {
	if out.exists() && !force {
		return Err(CliError::InvalidInput(format!(
			"{} already exists; pass --force to overwrite",
			out.display()
		)));
	}

	let wallet = KeypairWallet::generate()?;
	wallet
		.write_to_file(out)
		.with_context(|| format!("failed to write key to {}", out.display()))?;
	info!(target = "forge_session_cli", key = %wallet.public_key(), path = %out.display(), "generated wallet key");

	let result = ResultBuilder::new("keygen")
		.data(KeygenData {
			public_key: wallet.public_key().to_string(),
			path: out.to_path_buf(),
		})
		.build();
	print_result(&result, format);
	Ok(())
}

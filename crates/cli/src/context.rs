//! Per-invocation state shared by all commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use forge_session::config::MAX_EXPIRY_DAYS;
use forge_session::{
	FileStore, HttpRegistrar, KeypairWallet, PublicKey, SessionCache, SessionConfig, SessionManager, SessionOptions,
	SystemClock, TokenScope, WalletConnector,
};
use tracing::debug;

use crate::cli::{Cli, IntentArgs, OwnerArgs};
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

#[derive(Debug)]
pub struct CommandContext {
	pub config: SessionConfig,
	pub format: OutputFormat,
	store_path: PathBuf,
}

impl CommandContext {
	/// Layers `--registrar` and `--store` over the loaded config.
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		let mut config = SessionConfig::load(cli.config.as_deref())?;
		if let Some(url) = &cli.registrar {
			config.registrar_url = url.clone();
		}
		if let Some(store) = &cli.store {
			config.store_path = Some(store.clone());
		}
		config.validate()?;

		let store_path = config.resolved_store_path();
		debug!(target = "forge_session_cli", registrar = %config.registrar_url, store = %store_path.display(), "context ready");
		Ok(Self {
			config,
			format: cli.format,
			store_path,
		})
	}

	pub fn store_path(&self) -> &Path {
		&self.store_path
	}

	pub fn cache(&self) -> SessionCache {
		SessionCache::new(Arc::new(FileStore::new(&self.store_path)), Arc::new(SystemClock))
	}

	pub fn manager(&self, wallet: KeypairWallet) -> Result<SessionManager> {
		self.manager_with(self.config.clone(), wallet)
	}

	/// Like [`manager`](Self::manager) with a per-command config.
	pub fn manager_with(&self, config: SessionConfig, wallet: KeypairWallet) -> Result<SessionManager> {
		let cache = self.cache();
		let registrar = HttpRegistrar::from_config(&config, cache.clock().clone())?;
		Ok(SessionManager::new(
			config,
			WalletConnector::new(Arc::new(wallet)),
			Arc::new(registrar),
			cache,
		))
	}
}

pub fn load_wallet(path: &Path) -> Result<KeypairWallet> {
	if !path.is_file() {
		let err = anyhow::Error::new(forge_session::Error::WalletNotFound).context(format!("no key file at {}", path.display()));
		return Err(err.into());
	}
	let wallet = KeypairWallet::read_from_file(path).with_context(|| format!("failed to load key {}", path.display()))?;
	Ok(wallet)
}

pub fn resolve_owner(args: &OwnerArgs) -> Result<PublicKey> {
	match (&args.owner, &args.key) {
		(Some(owner), _) => Ok(*owner),
		(None, Some(path)) => Ok(load_wallet(path)?.public_key()),
		(None, None) => Err(CliError::InvalidInput("either --owner or --key is required".into())),
	}
}

pub fn session_options(args: &IntentArgs) -> Result<SessionOptions> {
	let expiry = match args.expires_in_days {
		Some(days) if !(1..=MAX_EXPIRY_DAYS).contains(&days) => {
			return Err(CliError::InvalidInput(format!(
				"--expires-in-days must be between 1 and {MAX_EXPIRY_DAYS}, got {days}"
			)));
		}
		Some(days) => Some(chrono::Duration::days(i64::from(days))),
		None => None,
	};
	let token_scope = if args.tokens.is_empty() {
		None
	} else {
		Some(TokenScope::new(args.tokens.iter().cloned()).map_err(forge_session::Error::from)?)
	};
	Ok(SessionOptions {
		domain: args.domain.clone(),
		expiry,
		token_scope,
	})
}

#[cfg(test)]
mod tests {
	use forge_session::TokenAllowance;

	use super::*;

	fn intent_args() -> IntentArgs {
		IntentArgs {
			key: PathBuf::from("wallet.key"),
			domain: None,
			expires_in_days: None,
			tokens: Vec::new(),
		}
	}

	#[test]
	fn empty_token_list_means_unrestricted() {
		let options = session_options(&intent_args()).unwrap();
		assert!(options.token_scope.is_none());
		assert!(options.expiry.is_none());
	}

	#[test]
	fn duplicate_tokens_are_invalid_input() {
		let args = IntentArgs {
			tokens: vec![TokenAllowance::unlimited("MintA"), TokenAllowance::limited("MintA", 3)],
			..intent_args()
		};
		let err = session_options(&args).unwrap_err();
		assert_eq!(err.to_command_error().code, crate::output::ErrorCode::InvalidInput);
	}

	#[test]
	fn zero_day_expiry_is_rejected() {
		let args = IntentArgs {
			expires_in_days: Some(0),
			..intent_args()
		};
		assert!(matches!(session_options(&args), Err(CliError::InvalidInput(_))));
	}

	#[test]
	fn oversized_expiry_is_rejected() {
		let args = IntentArgs {
			expires_in_days: Some(4_000_000_000),
			..intent_args()
		};
		assert!(matches!(session_options(&args), Err(CliError::InvalidInput(_))));

		let args = IntentArgs {
			expires_in_days: Some(MAX_EXPIRY_DAYS),
			..intent_args()
		};
		assert!(session_options(&args).unwrap().expiry.is_some());
	}

	#[test]
	fn missing_key_file_is_wallet_not_found() {
		let tmp = tempfile::TempDir::new().unwrap();
		let err = load_wallet(&tmp.path().join("absent.key")).unwrap_err();
		assert_eq!(err.to_command_error().code, crate::output::ErrorCode::WalletNotFound);
	}
}

use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};
use forge_session::{PublicKey, TokenAllowance};

use crate::output::OutputFormat;

fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.error(AnsiColor::Red.on_default().bold())
}

#[derive(Parser, Debug)]
#[command(name = "forge-session")]
#[command(about = "Establish and manage Forge wallet sessions from the command line")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// Config file (default: $XDG_CONFIG_HOME/forge-session/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Session store (default: $XDG_CACHE_HOME/forge-session/sessions.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub store: Option<PathBuf>,

	/// Registrar API base URL
	#[arg(long, global = true, value_name = "URL")]
	pub registrar: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Generate a local Ed25519 wallet key
	Keygen {
		/// Where to write the hex-encoded keypair
		#[arg(long, value_name = "FILE")]
		out: PathBuf,

		/// Overwrite an existing file
		#[arg(long)]
		force: bool,
	},

	/// Render and sign a session intent without registering it
	Intent(IntentArgs),

	/// Run the full handshake and cache the resulting session
	Create {
		#[command(flatten)]
		intent: IntentArgs,

		/// Cache a simulated session if the registrar fails (demo only)
		#[arg(long)]
		simulate_on_failure: bool,
	},

	/// Show the cached session of a wallet
	Show(OwnerArgs),

	/// List all unexpired cached sessions
	List,

	/// Drop the cached session of a wallet
	Revoke(OwnerArgs),

	/// Remove expired sessions from the store
	Prune,
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Keygen { .. } => "keygen",
			Commands::Intent(_) => "intent",
			Commands::Create { .. } => "create",
			Commands::Show(_) => "show",
			Commands::List => "list",
			Commands::Revoke(_) => "revoke",
			Commands::Prune => "prune",
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct IntentArgs {
	/// Wallet key file written by `keygen`
	#[arg(long, value_name = "FILE")]
	pub key: PathBuf,

	/// Domain shown in the intent (overrides config)
	#[arg(long)]
	pub domain: Option<String>,

	/// Session lifetime in days (overrides config)
	#[arg(long, value_name = "DAYS")]
	pub expires_in_days: Option<u32>,

	/// Restrict spending to a token; repeatable. Omit to allow every token.
	#[arg(long = "token", value_name = "MINT[:LIMIT]")]
	pub tokens: Vec<TokenAllowance>,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct OwnerArgs {
	/// Wallet public key (base58)
	#[arg(long)]
	pub owner: Option<PublicKey>,

	/// Wallet key file; its public key is used
	#[arg(long, value_name = "FILE")]
	pub key: Option<PathBuf>,
}

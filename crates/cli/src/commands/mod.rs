mod intent;
mod keygen;
mod session;

use crate::cli::{Cli, Commands};
use crate::context::CommandContext;
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	if let Commands::Keygen { ref out, force } = cli.command {
		// Needs neither config nor store.
		return keygen::execute(out, force, cli.format);
	}

	let ctx = CommandContext::from_cli(&cli)?;

	match cli.command {
		Commands::Keygen { .. } => unreachable!("handled above"),
		Commands::Intent(args) => intent::execute(&ctx, &args).await,
		Commands::Create {
			intent,
			simulate_on_failure,
		} => session::create(&ctx, &intent, simulate_on_failure).await,
		Commands::Show(owner) => session::show(&ctx, &owner),
		Commands::List => session::list(&ctx),
		Commands::Revoke(owner) => session::revoke(&ctx, &owner),
		Commands::Prune => session::prune(&ctx),
	}
}

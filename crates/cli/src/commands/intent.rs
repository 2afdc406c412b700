use forge_session::sign_intent;

use crate::cli::IntentArgs;
use crate::context::{CommandContext, load_wallet, session_options};
use crate::error::Result;
use crate::output::{ResultBuilder, print_result};

/// Prints the registrar request body for a freshly signed intent. Nothing is sent or cached.
pub async fn execute(ctx: &CommandContext, args: &IntentArgs) -> Result<()> {
	let manager = ctx.manager(load_wallet(&args.key)?)?;
	let options = session_options(args)?;

	manager.connect().await?;
	let intent = manager.compose_intent(&options)?;
	let payload = sign_intent(manager.connector(), intent).await?;
	let (request, _) = payload.into_request();

	let result = ResultBuilder::new("intent").data(request).build();
	print_result(&result, ctx.format);
	Ok(())
}

use forge_session::{Clock, Error, FallbackPolicy};
use tracing::warn;

use crate::cli::{IntentArgs, OwnerArgs};
use crate::context::{CommandContext, load_wallet, resolve_owner, session_options};
use crate::error::Result;
use crate::output::{
	DiagnosticLevel, PruneData, ResultBuilder, RevokeData, SessionData, SessionListData, print_result,
};

pub async fn create(ctx: &CommandContext, args: &IntentArgs, simulate_on_failure: bool) -> Result<()> {
	let mut config = ctx.config.clone();
	if simulate_on_failure {
		config.fallback = FallbackPolicy::Simulate;
	}

	let manager = ctx.manager_with(config, load_wallet(&args.key)?)?;
	let options = session_options(args)?;
	let established = manager.establish_or_simulate(&options).await?;
	let now = manager.cache().clock().now();

	let mut builder = ResultBuilder::new("create");
	if let Some(err) = &established.fallback {
		warn!(target = "forge_session_cli", error = %err, "using simulated session");
		builder = builder.diagnostic(
			DiagnosticLevel::Warning,
			format!("registrar failed, session is simulated: {err}"),
		);
	}
	let result = builder.data(SessionData::new(established.record, now)).build();
	print_result(&result, ctx.format);
	Ok(())
}

pub fn show(ctx: &CommandContext, owner: &OwnerArgs) -> Result<()> {
	let owner = resolve_owner(owner)?;
	let cache = ctx.cache();
	let record = match cache.lookup(&owner)? {
		forge_session::CacheLookup::Active(record) => record,
		forge_session::CacheLookup::Expired { expired_at } => return Err(Error::SessionExpired { expired_at }.into()),
		forge_session::CacheLookup::Missing => return Err(Error::NoActiveSession { owner }.into()),
	};

	let result = ResultBuilder::new("show")
		.data(SessionData::new(record, cache.clock().now()))
		.build();
	print_result(&result, ctx.format);
	Ok(())
}

pub fn list(ctx: &CommandContext) -> Result<()> {
	let cache = ctx.cache();
	let now = cache.clock().now();
	let sessions: Vec<SessionData> = cache.list()?.into_iter().map(|r| SessionData::new(r, now)).collect();

	let result = ResultBuilder::new("list")
		.data(SessionListData {
			count: sessions.len(),
			sessions,
		})
		.build();
	print_result(&result, ctx.format);
	Ok(())
}

pub fn revoke(ctx: &CommandContext, owner: &OwnerArgs) -> Result<()> {
	let owner = resolve_owner(owner)?;
	let removed = ctx.cache().clear(&owner)?;

	let result = ResultBuilder::new("revoke")
		.data(RevokeData {
			owner: owner.to_string(),
			revoked: removed.is_some(),
			session_id: removed.map(|r| r.session_id),
		})
		.build();
	print_result(&result, ctx.format);
	Ok(())
}

pub fn prune(ctx: &CommandContext) -> Result<()> {
	let cache = ctx.cache();
	let removed = cache.prune()?;
	let remaining = cache.list()?.len();

	let mut builder = ResultBuilder::new("prune");
	if removed > 0 {
		builder = builder.diagnostic(
			DiagnosticLevel::Info,
			format!("removed {removed} expired session(s) from {}", ctx.store_path().display()),
		);
	}
	let result = builder.data(PruneData { removed, remaining }).build();
	print_result(&result, ctx.format);
	Ok(())
}

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = errors, plus handshake warnings (e.g. simulated fallback)
	// 1 (-v) = info
	// 2+ (-vv) = debug for everything, including reqwest/hyper
	let filter = match verbosity {
		0 => "error,forge_session=warn",
		1 => "warn,forge_session=info,forge_session_cli=info",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(verbosity > 1)
		.with_level(true)
		.compact()
		.init();
}

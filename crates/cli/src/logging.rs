use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = warnings and failures only
	// 1 (-v) = session lifecycle (info)
	// 2+ (-vv) = debug, including debuggee output lines
	let filter = match verbosity {
		0 => "warn",
		1 => "info,hyper=warn,tungstenite=warn",
		_ => "debug,hyper=info",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	// try_init: tests and embedders may already have installed a subscriber.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init();
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use kdeploy::{
	commands::{self, util::BrokenPipeGuard},
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "kdeploy")]
#[command(about = "Resolve the Kubernetes manifests of a deploy action", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print the resolved manifests of a deploy action
	Render(commands::render::RenderArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let log_level = match &cli.command {
		Commands::Render(args) => args.log_level,
	};
	telemetry::init(log_level);

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Render(args) => commands::render::run(args, stdout),
	}
}

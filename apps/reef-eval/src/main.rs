// crates.io
use clap::Parser;
// self
use reef_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	reef_eval::run(args).await
}

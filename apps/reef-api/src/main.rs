use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = reef_api::Args::parse();

	reef_api::run(args).await
}

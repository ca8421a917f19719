use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = gauge_api::Args::parse();
	gauge_api::run(args).await
}

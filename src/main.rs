use anyhow::Result;
use clap::Parser;
use pandora_client::api_client::ApiClient;
use pandora_client::args::Args;
use pandora_client::runner::Runner;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::try_parse()?;
    let command = args.command()?;
    let client = ApiClient::new(
        &args.url,
        args.apikey.as_deref(),
        args.timeout.map(Duration::from_secs),
    )?;

    Runner::new(client).run(&command)
}

use clap::Parser;
use faultline::{CampaignError, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match faultline::controller::run(cli) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            report(&err);
            std::process::exit(1);
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

fn report(err: &CampaignError) {
    tracing::error!(%err, "campaign aborted");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        tracing::error!(%cause, "caused by");
        source = cause.source();
    }
}

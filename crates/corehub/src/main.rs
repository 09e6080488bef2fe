use clap::Parser;
use corehub::{
    app::{self, EXIT_BOOTSTRAP},
    cli::Cli,
    config::Config,
    logging,
};
use std::{io, process::ExitCode};
use tracing::error;

fn main() -> ExitCode {
    // clap exits with code 2 on usage errors.
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("corehub: {err}");
            return ExitCode::from(EXIT_BOOTSTRAP);
        }
    };

    if let Err(err) = logging::init(&config.logging) {
        eprintln!("corehub: {err}");
        return ExitCode::from(EXIT_BOOTSTRAP);
    }

    match app::execute(cli.subcommand(), &config, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            error!(exit_code = code, error = %err, "corehub halted");
            ExitCode::from(code)
        }
    }
}

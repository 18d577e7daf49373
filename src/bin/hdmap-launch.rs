// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{App, AppSettings, ArgMatches};
use tokio::runtime;
use tracing::error;
use tracing_subscriber::EnvFilter;

use hdmap_launch::procs::{Describe, Launcher, Process};
use hdmap_launch::Error;

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
}

impl<'a, 'b> SetupClapApp for App<'a, 'b> {
    fn setup_clap_app(self) -> Self {
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = App::new(env!("CARGO_PKG_NAME"))
        .setup_clap_app()
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(Describe::sub_command().setup_clap_app())
        .subcommand(Launcher::sub_command().setup_clap_app())
        .get_matches();

    init_logging();

    let runtime = match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to initialize the tokio runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        match args.subcommand() {
            (Describe::NAME, Some(args)) => run::<Describe>(args).await,
            (Launcher::NAME, Some(args)) => run::<Launcher>(args).await,
            (arg, _) => {
                eprintln!("unexpected argument: {}", arg);
                eprintln!("{}", args.usage());
                std::process::exit(2);
            }
        }
    });

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run<P: Process>(args: &ArgMatches<'_>) -> Result<(), Error> {
    P::from_args(args)?.run().await
}

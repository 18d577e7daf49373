// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod describe;
mod launcher;
mod logger;
pub mod supervisor;

pub use describe::Describe;
pub use launcher::Launcher;
pub use logger::{Logger, Stream};
pub use supervisor::{ExitReport, Supervisor};

use async_trait::async_trait;
use clap::{App, ArgMatches};

use crate::Error;

/// A trait to define common construction of a launcher subcommand
#[async_trait]
pub trait Process: Sized + Send + 'static {
    const NAME: &'static str;

    /// CLI SubCommand arguments
    fn sub_command() -> App<'static, 'static>;

    fn from_args(args: &ArgMatches<'_>) -> Result<Self, Error>;

    async fn run(self) -> Result<(), Error>;
}

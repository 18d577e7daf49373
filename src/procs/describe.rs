// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{self, Write};

use async_trait::async_trait;
use clap::{App, ArgMatches, SubCommand};

use crate::config::{self, LaunchConfig};
use crate::description::LaunchDescriptorBuilder;
use crate::launch::LaunchDescription;
use crate::procs::Process;
use crate::Error;

/// Print the launch description without starting anything
#[derive(Debug)]
pub struct Describe {
    config: LaunchConfig,
}

impl Describe {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn describe(&self) -> Result<LaunchDescription, Error> {
        LaunchDescriptorBuilder::new(self.config.ament_index()).build()
    }
}

#[async_trait]
impl Process for Describe {
    const NAME: &'static str = "describe";

    fn sub_command() -> App<'static, 'static> {
        SubCommand::with_name(Self::NAME)
            .about("Print the processes that would be launched as JSON")
            .arg(config::prefix_path_arg())
    }

    fn from_args(args: &ArgMatches<'_>) -> Result<Self, Error> {
        LaunchConfig::from_args(args).map(Self::new)
    }

    async fn run(self) -> Result<(), Error> {
        let description = self.describe()?;

        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        serde_json::to_writer_pretty(&mut stdout, &description)?;
        writeln!(stdout)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::install_package;

    #[test]
    fn test_describe_as_json() {
        let prefix = tempfile::tempdir().unwrap();
        install_package(prefix.path(), "hdmap_server");

        let config = LaunchConfig {
            prefix_paths: vec![prefix.path().to_path_buf()],
            ..LaunchConfig::default()
        };
        let description = Describe::new(config).describe().unwrap();
        let json = serde_json::to_value(&description).unwrap();

        let config_path = prefix.path().join("share/hdmap_server/config/hdmap_server.yaml");
        assert_eq!(
            json,
            serde_json::json!([
                {
                    "package": "hdmap_server",
                    "executable": "hdmap_server",
                    "parameters": [config_path],
                    "output": "screen"
                },
                {
                    "package": "rviz2",
                    "executable": "rviz2",
                    "name": "rviz2",
                    "parameters": [{ "rviz2": { "args": "-d hdmap_server.rviz" } }],
                    "output": "screen"
                }
            ])
        );
    }
}

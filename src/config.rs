// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Launcher settings collected from the command line and the environment

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgMatches};

use crate::package::AmentIndex;
use crate::procs::supervisor::{DEFAULT_SIGKILL_TIMEOUT, DEFAULT_SIGTERM_TIMEOUT};
use crate::Error;

pub const PREFIX_PATH: &str = "prefix-path";
pub const SIGTERM_TIMEOUT: &str = "sigterm-timeout";
pub const SIGKILL_TIMEOUT: &str = "sigkill-timeout";

#[derive(Clone, Debug, PartialEq)]
pub struct LaunchConfig {
    /// Install prefixes to search, `AMENT_PREFIX_PATH` when empty
    pub prefix_paths: Vec<PathBuf>,
    pub sigterm_timeout: Duration,
    pub sigkill_timeout: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            prefix_paths: Vec::new(),
            sigterm_timeout: DEFAULT_SIGTERM_TIMEOUT,
            sigkill_timeout: DEFAULT_SIGKILL_TIMEOUT,
        }
    }
}

impl LaunchConfig {
    pub fn from_args(args: &ArgMatches<'_>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(paths) = args.values_of_os(PREFIX_PATH) {
            config.prefix_paths = paths.map(PathBuf::from).collect();
        }

        if let Some(secs) = args.value_of(SIGTERM_TIMEOUT) {
            config.sigterm_timeout = parse_secs(secs)?;
        }

        if let Some(secs) = args.value_of(SIGKILL_TIMEOUT) {
            config.sigkill_timeout = parse_secs(secs)?;
        }

        Ok(config)
    }

    /// The package index to resolve packages against
    pub fn ament_index(&self) -> AmentIndex {
        if self.prefix_paths.is_empty() {
            AmentIndex::from_env()
        } else {
            AmentIndex::new(self.prefix_paths.iter().cloned())
        }
    }
}

fn parse_secs(secs: &str) -> Result<Duration, Error> {
    secs.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| Error::from(format!("not a number of seconds: {}", secs)))
}

pub fn prefix_path_arg() -> Arg<'static, 'static> {
    Arg::with_name(PREFIX_PATH)
        .short("p")
        .long(PREFIX_PATH)
        .value_name("DIR")
        .multiple(true)
        .number_of_values(1)
        .takes_value(true)
        .help("install prefix to search for packages, overrides AMENT_PREFIX_PATH")
}

pub fn timeout_args() -> Vec<Arg<'static, 'static>> {
    [
        (SIGTERM_TIMEOUT, "seconds to wait after SIGINT before sending SIGTERM"),
        (SIGKILL_TIMEOUT, "seconds to wait after SIGTERM before sending SIGKILL"),
    ]
    .iter()
    .map(|&(name, help)| {
        Arg::with_name(name)
            .long(name)
            .value_name("SECS")
            .takes_value(true)
            .validator_os(|secs| {
                parse_secs(&secs.to_string_lossy())
                    .map(|_| ())
                    .map_err(|_| OsString::from("a non-negative number of seconds was expected"))
            })
            .help(help)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use clap::{App, SubCommand};

    use super::*;

    fn matches(argv: &[&str]) -> LaunchConfig {
        let app = App::new("test").subcommand(
            SubCommand::with_name("launch")
                .arg(prefix_path_arg())
                .args(&timeout_args()),
        );
        let args = app.get_matches_from_safe(argv).unwrap();
        let (_, sub) = args.subcommand();

        LaunchConfig::from_args(sub.unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = matches(&["test", "launch"]);

        assert_eq!(config, LaunchConfig::default());
        assert_eq!(config.sigterm_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_prefix_paths_and_timeouts() {
        let config = matches(&[
            "test",
            "launch",
            "--prefix-path",
            "/opt/overlay",
            "-p",
            "/opt/ros/humble",
            "--sigterm-timeout",
            "1.5",
            "--sigkill-timeout",
            "0",
        ]);

        assert_eq!(
            config.prefix_paths,
            vec![PathBuf::from("/opt/overlay"), PathBuf::from("/opt/ros/humble")]
        );
        assert_eq!(config.sigterm_timeout, Duration::from_millis(1500));
        assert_eq!(config.sigkill_timeout, Duration::from_secs(0));
        assert_eq!(config.ament_index().prefixes(), &config.prefix_paths[..]);
    }

    #[test]
    fn test_bad_timeout() {
        assert!(parse_secs("-1").is_err());
        assert!(parse_secs("soon").is_err());
        assert!(parse_secs("inf").is_err());
    }
}

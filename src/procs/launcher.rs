// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use async_trait::async_trait;
use clap::{App, ArgMatches, SubCommand};
use futures::stream::{self, Stream};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::{self, LaunchConfig};
use crate::description::LaunchDescriptorBuilder;
use crate::fork::{new_process, Child, ResolvedProcess};
use crate::launch::LaunchDescription;
use crate::package::PackageRegistry;
use crate::procs::{ExitReport, Process, Supervisor};
use crate::Error;

/// Launch programs
///
/// Rules:
/// - resolves every process before starting any of them
/// - starts processes in the order of the launch description
/// - hands the running processes to the supervisor
#[derive(Debug)]
pub struct Launcher {
    config: LaunchConfig,
}

impl Launcher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    /// Launches `description` and waits for every process to exit
    ///
    /// Inline parameters are written to a temporary directory that lives as long as the launch.
    /// Every item of `shutdown` is a shutdown request for the supervisor.
    pub async fn launch<R, S>(
        &self,
        description: &LaunchDescription,
        registry: &R,
        shutdown: S,
    ) -> Result<Vec<ExitReport>, Error>
    where
        R: PackageRegistry,
        S: Stream<Item = ()>,
    {
        let params_dir = tempfile::Builder::new()
            .prefix("launch_params_")
            .tempdir()?;

        let resolved = Self::resolve(description, registry, &params_dir)?;
        let children = Self::spawn(&resolved)?;

        let supervisor = Supervisor::new(self.config.sigterm_timeout, self.config.sigkill_timeout);
        let reports = supervisor.supervise(children, shutdown).await;

        drop(params_dir);
        Ok(reports)
    }

    fn resolve<R: PackageRegistry>(
        description: &LaunchDescription,
        registry: &R,
        params_dir: &TempDir,
    ) -> Result<Vec<ResolvedProcess>, Error> {
        description
            .processes()
            .iter()
            .map(|spec| ResolvedProcess::resolve(spec, registry, params_dir.path()))
            .collect()
    }

    /// Already started children are killed on drop if a later one fails to start
    fn spawn(resolved: &[ResolvedProcess]) -> Result<Vec<Child>, Error> {
        resolved.iter().map(new_process).collect()
    }
}

#[async_trait]
impl Process for Launcher {
    const NAME: &'static str = "launch";

    fn sub_command() -> App<'static, 'static> {
        SubCommand::with_name(Self::NAME)
            .about("Launch the HD map server and rviz2")
            .arg(config::prefix_path_arg())
            .args(&config::timeout_args())
    }

    fn from_args(args: &ArgMatches<'_>) -> Result<Self, Error> {
        LaunchConfig::from_args(args).map(Self::new)
    }

    async fn run(self) -> Result<(), Error> {
        let registry = self.config.ament_index();
        let description = LaunchDescriptorBuilder::new(&registry).build()?;

        info!(processes = description.len(), "launching");

        // one shutdown request per ctrl-c
        let shutdown = stream::unfold((), |()| async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => Some(((), ())),
                Err(e) => {
                    warn!(error = %e, "failed to listen for ctrl-c");
                    None
                }
            }
        });

        let reports = self.launch(&description, &registry, shutdown).await?;

        let failed: Vec<&str> = reports
            .iter()
            .filter(|report| !report.success())
            .map(|report| report.name.as_str())
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(format!("processes exited with failure: {}", failed.join(", ")).into())
        }
    }
}

// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The HD map server launch: the map server and an rviz2 viewer

use std::path::PathBuf;

use tracing::debug;

use crate::launch::{LaunchDescription, OutputPolicy, ProcessLaunchSpec};
use crate::package::PackageRegistry;
use crate::param::{Parameter, ParameterValue};
use crate::Error;

pub const HDMAP_SERVER_PACKAGE: &str = "hdmap_server";
pub const HDMAP_SERVER_EXECUTABLE: &str = "hdmap_server";
/// Map server configuration, relative to the package share directory
pub const HDMAP_SERVER_CONFIG: &str = "config/hdmap_server.yaml";

pub const RVIZ_PACKAGE: &str = "rviz2";
pub const RVIZ_EXECUTABLE: &str = "rviz2";
pub const RVIZ_NAME: &str = "rviz2";
pub const RVIZ_ARGS: &str = "-d hdmap_server.rviz";

/// Builds the launch description for the HD map server
///
/// The only input is the package registry, used to locate the map server's
/// configuration. The configuration file is passed along without being read.
#[derive(Debug)]
pub struct LaunchDescriptorBuilder<R: PackageRegistry> {
    registry: R,
}

impl<R: PackageRegistry> LaunchDescriptorBuilder<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Path to the map server configuration inside its installed package
    pub fn config_path(&self) -> Result<PathBuf, Error> {
        Ok(self
            .registry
            .share_directory(HDMAP_SERVER_PACKAGE)?
            .join(HDMAP_SERVER_CONFIG))
    }

    /// Returns `[map server, rviz2]`, or the registry error if `hdmap_server` is not installed
    pub fn build(&self) -> Result<LaunchDescription, Error> {
        let config = self.config_path()?;
        debug!(config = %config.display(), "resolved map server configuration");

        let hdmap_server = ProcessLaunchSpec::new(HDMAP_SERVER_PACKAGE, HDMAP_SERVER_EXECUTABLE)
            .parameter(Parameter::File(config))
            .output(OutputPolicy::Screen);

        let rviz = ProcessLaunchSpec::new(RVIZ_PACKAGE, RVIZ_EXECUTABLE)
            .name(RVIZ_NAME)
            .parameter(Parameter::values(vec![(
                RVIZ_NAME,
                ParameterValue::map(vec![("args", RVIZ_ARGS)]),
            )]))
            .output(OutputPolicy::Screen);

        Ok(LaunchDescription::new(vec![hdmap_server, rviz]))
    }
}

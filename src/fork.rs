// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::error::ErrorKind;
use crate::launch::{OutputPolicy, ProcessLaunchSpec};
use crate::package::PackageRegistry;
use crate::param::{self, Parameter};
use crate::Error;

pub const ROS_ARGS: &str = "--ros-args";
pub const REMAP: &str = "-r";
pub const PARAMS_FILE: &str = "--params-file";

pub struct StdIoConf {
    pub stdin: Stdio,
    pub stderr: Stdio,
    pub stdout: Stdio,
}

impl From<OutputPolicy> for StdIoConf {
    fn from(output: OutputPolicy) -> Self {
        match output {
            OutputPolicy::Screen => StdIoConf {
                stdin: Stdio::null(),
                stderr: Stdio::inherit(),
                stdout: Stdio::inherit(),
            },
            // piped to the logger
            OutputPolicy::Log => StdIoConf {
                stdin: Stdio::null(),
                stderr: Stdio::piped(),
                stdout: Stdio::piped(),
            },
        }
    }
}

/// A launch spec with every path resolved, ready to be spawned
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedProcess {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub output: OutputPolicy,
}

impl ResolvedProcess {
    /// Locates the executable and writes inline parameters to files in `params_dir`
    pub fn resolve<R: PackageRegistry>(
        spec: &ProcessLaunchSpec,
        registry: &R,
        params_dir: &Path,
    ) -> Result<Self, Error> {
        let program = registry
            .libexec_directory(&spec.package)?
            .join(&spec.executable);

        if !is_executable(&program) {
            return Err(ErrorKind::ExecutableNotFound {
                package: spec.package.clone(),
                executable: spec.executable.clone(),
            }
            .into());
        }

        let mut args: Vec<OsString> = vec![ROS_ARGS.into()];

        if let Some(name) = &spec.name {
            args.push(REMAP.into());
            args.push(format!("__node:={}", name).into());
        }

        for (index, parameter) in spec.parameters.iter().enumerate() {
            let path = match parameter {
                Parameter::File(path) => path.clone(),
                Parameter::Values(values) => {
                    param::write_params_file(params_dir, spec.name.as_deref(), index, values)?
                }
            };

            args.push(PARAMS_FILE.into());
            args.push(path.into_os_string());
        }

        Ok(Self {
            name: spec.display_name().to_string(),
            program,
            args,
            output: spec.output,
        })
    }

    fn command(&self) -> Command {
        let stdio = StdIoConf::from(self.output);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .kill_on_drop(true)
            .stdin(stdio.stdin)
            .stdout(stdio.stdout)
            .stderr(stdio.stderr);

        command
    }
}

/// A regular file, after following links, with at least one execute bit set
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

pub struct Child {
    pub name: String,
    pub output: OutputPolicy,
    pub child: tokio::process::Child,
}

impl Child {
    /// None once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

pub fn new_process(process: &ResolvedProcess) -> Result<Child, Error> {
    let child = process.command().spawn().map_err(|e| {
        Error::from(format!(
            "failed to spawn {} ({}): {}",
            process.name,
            process.program.display(),
            e
        ))
    })?;

    info!(
        name = %process.name,
        pid = ?child.id(),
        output = %process.output,
        program = %process.program.display(),
        args = ?process.args,
        "started process"
    );

    Ok(Child {
        name: process.name.clone(),
        output: process.output,
        child,
    })
}

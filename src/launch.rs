// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Declarative descriptions of the processes to launch

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::param::Parameter;

/// Where a launched process' stdout and stderr go
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPolicy {
    /// Captured by the launcher and forwarded to its log
    Log,
    /// Passed through to the launcher's terminal
    Screen,
}

impl fmt::Display for OutputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPolicy::Log => f.write_str("log"),
            OutputPolicy::Screen => f.write_str("screen"),
        }
    }
}

/// How to start one node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessLaunchSpec {
    pub package: String,
    pub executable: String,
    /// Node name override, the executable's own default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub output: OutputPolicy,
}

impl ProcessLaunchSpec {
    pub fn new(package: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            executable: executable.into(),
            name: None,
            parameters: Vec::new(),
            output: OutputPolicy::Log,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn output(mut self, output: OutputPolicy) -> Self {
        self.output = output;
        self
    }

    /// Name used for this process in logs and reports
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.executable)
    }
}

/// The ordered set of processes making up one launch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchDescription {
    processes: Vec<ProcessLaunchSpec>,
}

impl LaunchDescription {
    pub fn new(processes: Vec<ProcessLaunchSpec>) -> Self {
        Self { processes }
    }

    pub fn processes(&self) -> &[ProcessLaunchSpec] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl IntoIterator for LaunchDescription {
    type Item = ProcessLaunchSpec;
    type IntoIter = std::vec::IntoIter<ProcessLaunchSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.processes.into_iter()
    }
}

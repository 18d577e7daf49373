// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Launch description and launcher for the HD map server and rviz2

pub mod config;
pub mod description;
mod error;
pub mod fork;
pub mod launch;
pub mod package;
pub mod param;
pub mod procs;

pub use description::LaunchDescriptorBuilder;
pub use error::{Error, ErrorKind};
pub use launch::{LaunchDescription, OutputPolicy, ProcessLaunchSpec};
pub use package::{AmentIndex, PackageRegistry};
pub use param::{Parameter, ParameterValue};

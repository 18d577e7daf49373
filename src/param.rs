// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Node parameters, either a path to a parameters file or a set of values

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::Error;

/// Key under which node parameters live in a parameters file
pub const ROS_PARAMETERS: &str = "ros__parameters";
/// Parameters file key matching every node
pub const ANY_NODE: &str = "/**";

/// A single parameter value, possibly nested
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    List(Vec<ParameterValue>),
    Map(BTreeMap<String, ParameterValue>),
}

impl ParameterValue {
    /// Convenience for building a nested map value
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<ParameterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        ParameterValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Double(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

/// One entry of a node's parameter list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    /// A parameters file, handed to the node as is
    File(PathBuf),
    /// Inline values, written to a parameters file at launch
    Values(BTreeMap<String, ParameterValue>),
}

impl Parameter {
    pub fn values<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<ParameterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Parameter::Values(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Collapses nested maps into dotted parameter names, `{a: {b: 1}}` becomes `{a.b: 1}`
///
/// Lists are leaves and are kept as they are. When two entries flatten to the same name,
/// `{"a.b": 1, "a": {"b": 2}}`, the first one in key order is kept and the other is logged and dropped.
pub fn flatten(values: &BTreeMap<String, ParameterValue>) -> BTreeMap<String, ParameterValue> {
    let mut flat = BTreeMap::new();
    let mut collisions = Vec::new();
    flatten_into(None, values, &mut flat, &mut collisions);

    for name in collisions {
        warn!(parameter = %name, "parameter defined more than once, keeping the first value");
    }
    flat
}

/// Names that were already present in `flat` are pushed to `collisions`
fn flatten_into(
    prefix: Option<&str>,
    values: &BTreeMap<String, ParameterValue>,
    flat: &mut BTreeMap<String, ParameterValue>,
    collisions: &mut Vec<String>,
) {
    for (key, value) in values {
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            ParameterValue::Map(nested) => flatten_into(Some(&name), nested, flat, collisions),
            leaf => {
                if flat.contains_key(&name) {
                    collisions.push(name);
                } else {
                    flat.insert(name, leaf.clone());
                }
            }
        }
    }
}

/// Writes inline values to a parameters file in `dir` and returns its path
///
/// The document is JSON, which the parameter parser reads as YAML flow style:
///
/// ```text
/// { "/rviz2": { "ros__parameters": { "rviz2.args": "-d hdmap_server.rviz" } } }
/// ```
///
/// `node` selects the node the values apply to, `None` applies them to every node.
/// `index` keeps file names unique when one node has several value sets.
pub fn write_params_file(
    dir: &Path,
    node: Option<&str>,
    index: usize,
    values: &BTreeMap<String, ParameterValue>,
) -> Result<PathBuf, Error> {
    let node_key = match node {
        Some(name) => format!("/{}", name.trim_start_matches('/')),
        None => ANY_NODE.to_string(),
    };

    let document = json!({ (node_key.clone()): { ROS_PARAMETERS: flatten(values) } });

    let stem = node.map(|n| n.trim_start_matches('/')).unwrap_or("params");
    let path = dir.join(format!("{}_{}.yaml", stem.replace('/', "_"), index));

    let mut file = File::create(&path)?;
    serde_json::to_writer_pretty(&mut file, &document)?;
    file.write_all(b"\n")?;

    debug!(path = %path.display(), node = %node_key, "wrote parameters file");
    Ok(path)
}

// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Lookup of installed packages in the ament resource index

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ErrorKind;
use crate::Error;

/// Colon separated list of install prefixes to search
pub const AMENT_PREFIX_PATH: &str = "AMENT_PREFIX_PATH";

/// Location of the package markers below each install prefix
pub const PACKAGES_RESOURCE_PATH: &str = "share/ament_index/resource_index/packages";

/// Resolves installed packages to their directories
pub trait PackageRegistry {
    /// The install prefix the package was found in
    fn prefix(&self, package: &str) -> Result<PathBuf, Error>;

    /// Runtime readable resources of the package, `<prefix>/share/<package>`
    fn share_directory(&self, package: &str) -> Result<PathBuf, Error> {
        Ok(self.prefix(package)?.join("share").join(package))
    }

    /// Executables of the package, `<prefix>/lib/<package>`
    fn libexec_directory(&self, package: &str) -> Result<PathBuf, Error> {
        Ok(self.prefix(package)?.join("lib").join(package))
    }
}

impl<'a, R: PackageRegistry + ?Sized> PackageRegistry for &'a R {
    fn prefix(&self, package: &str) -> Result<PathBuf, Error> {
        (**self).prefix(package)
    }
}

/// The ament resource index, spread over a list of install prefixes
///
/// Earlier prefixes shadow later ones, as with overlaid workspaces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AmentIndex {
    prefixes: Vec<PathBuf>,
}

impl AmentIndex {
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads the prefixes from `AMENT_PREFIX_PATH`, an unset variable is an empty index
    pub fn from_env() -> Self {
        match env::var_os(AMENT_PREFIX_PATH) {
            Some(paths) => Self::new(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty())),
            None => Self::default(),
        }
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    fn has_marker(prefix: &Path, package: &str) -> bool {
        prefix.join(PACKAGES_RESOURCE_PATH).join(package).is_file()
    }
}

impl PackageRegistry for AmentIndex {
    fn prefix(&self, package: &str) -> Result<PathBuf, Error> {
        // an empty name would resolve to the resource directory itself
        if !package.is_empty() && !package.contains('/') {
            if let Some(prefix) = self
                .prefixes
                .iter()
                .find(|prefix| Self::has_marker(prefix, package))
            {
                debug!(package, prefix = %prefix.display(), "found package");
                return Ok(prefix.clone());
            }
        }

        Err(ErrorKind::PackageNotFound {
            package: package.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;

    use super::*;

    /// Creates the ament marker for `package` below `prefix`
    pub(crate) fn install_package(prefix: &Path, package: &str) {
        let markers = prefix.join(PACKAGES_RESOURCE_PATH);
        fs::create_dir_all(&markers).unwrap();
        fs::write(markers.join(package), b"").unwrap();
        fs::create_dir_all(prefix.join("share").join(package)).unwrap();
    }

    #[test]
    fn test_share_directory() {
        let prefix = tempfile::tempdir().unwrap();
        install_package(prefix.path(), "hdmap_server");

        let index = AmentIndex::new(vec![prefix.path()]);

        assert_eq!(index.prefix("hdmap_server").unwrap(), prefix.path());
        assert_eq!(
            index.share_directory("hdmap_server").unwrap(),
            prefix.path().join("share/hdmap_server")
        );
        assert_eq!(
            index.libexec_directory("hdmap_server").unwrap(),
            prefix.path().join("lib/hdmap_server")
        );
    }

    #[test]
    fn test_package_not_found() {
        let prefix = tempfile::tempdir().unwrap();
        install_package(prefix.path(), "rviz2");

        let index = AmentIndex::new(vec![prefix.path()]);
        let err = index.share_directory("hdmap_server").unwrap_err();

        match err.kind() {
            ErrorKind::PackageNotFound { package } => assert_eq!(package, "hdmap_server"),
            kind => panic!("unexpected error: {:?}", kind),
        }
        assert_eq!(err.to_string(), "package 'hdmap_server' not found");
    }

    #[test]
    fn test_empty_index_and_names() {
        assert!(AmentIndex::default().prefix("rviz2").is_err());

        let prefix = tempfile::tempdir().unwrap();
        install_package(prefix.path(), "rviz2");
        let index = AmentIndex::new(vec![prefix.path()]);

        assert!(index.prefix("").is_err());
        assert!(index.prefix("../packages").is_err());
    }

    #[test]
    fn test_overlay_shadows_underlay() {
        let overlay = tempfile::tempdir().unwrap();
        let underlay = tempfile::tempdir().unwrap();
        install_package(overlay.path(), "hdmap_server");
        install_package(underlay.path(), "hdmap_server");
        install_package(underlay.path(), "rviz2");

        let index = AmentIndex::new(vec![overlay.path(), underlay.path()]);

        assert_eq!(index.prefix("hdmap_server").unwrap(), overlay.path());
        assert_eq!(index.prefix("rviz2").unwrap(), underlay.path());
    }

    #[test]
    fn test_from_env() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let joined = env::join_paths(vec![a.path(), b.path()]).unwrap();

        env::set_var(AMENT_PREFIX_PATH, &joined);
        let index = AmentIndex::from_env();
        env::remove_var(AMENT_PREFIX_PATH);

        assert_eq!(index.prefixes(), &[a.path().to_path_buf(), b.path().to_path_buf()][..]);
    }
}

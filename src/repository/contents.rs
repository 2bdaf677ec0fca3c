// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `Contents` index file handling. */

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

/// Width of the left-justified path column in `Contents` rows.
const PATH_COLUMN_WIDTH: usize = 56;

/// Represents a `Contents` file.
///
/// A `Contents` file maps paths to the packages shipping them. Rows are
/// emitted sorted by path (byte-wise ASCII order) with a fixed-width path
/// column and a comma-joined package list.
#[derive(Clone, Debug, Default)]
pub struct ContentsFile {
    /// Mapping of paths to qualified package names.
    paths: BTreeMap<String, BTreeSet<String>>,
}

impl ContentsFile {
    /// Register a path as belonging to a package.
    ///
    /// `package` is the qualified package name, `[<section>/]<name>`.
    pub fn add_package_path(&mut self, path: impl ToString, package: impl ToString) {
        self.paths
            .entry(path.to_string())
            .or_default()
            .insert(package.to_string());
    }

    /// Whether any paths have been registered.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Emit lines constituting this file.
    pub fn as_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.paths.iter().map(|(path, packages)| {
            let packages = packages.iter().map(|s| s.as_str()).collect::<Vec<_>>();

            format!(
                "{:<width$} {}\n",
                path,
                packages.join(","),
                width = PATH_COLUMN_WIDTH
            )
        })
    }

    /// Write the content of this file to a writer.
    ///
    /// Returns the total number of bytes written.
    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<u64> {
        let mut bytes_written = 0;

        for line in self.as_lines() {
            writer.write_all(line.as_bytes())?;
            bytes_written += line.len() as u64;
        }

        Ok(bytes_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_sorted_and_fixed_width() -> std::io::Result<()> {
        let mut contents = ContentsFile::default();
        contents.add_package_path("usr/bin/zebra", "utils/zebra");
        contents.add_package_path("usr/bin/alpha", "alpha");
        contents.add_package_path("usr/bin/alpha", "utils/other");

        let mut buf = Vec::new();
        let written = contents.write_to(&mut buf)?;
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(written as usize, text.len());
        assert_eq!(
            text,
            format!(
                "{:<56} alpha,utils/other\n{:<56} utils/zebra\n",
                "usr/bin/alpha", "usr/bin/zebra"
            )
        );

        Ok(())
    }

    #[test]
    fn long_paths_extend_past_the_column() {
        let mut contents = ContentsFile::default();
        let long_path = "usr/share/doc/some-package/with/a/rather/deep/path/README.gz";
        contents.add_package_path(long_path, "doc/some-package");

        let line = contents.as_lines().next().unwrap();
        assert_eq!(line, format!("{} doc/some-package\n", long_path));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `Release` file assembly.

A `Release` file is a control paragraph describing a distribution: its
metadata fields followed by one multiline digest field per checksum flavor,
enumerating every index file with its size and digest.
*/

use {
    crate::{
        control::ControlParagraph,
        io::{ChecksumType, MultiContentDigest},
    },
    chrono::{DateTime, Utc},
};

/// A file enumerated by a `Release` manifest.
#[derive(Clone, Debug)]
pub struct IndexFileEntry {
    /// Path relative to the dist root, e.g. `main/binary-amd64/Packages`.
    pub path: String,
    /// Byte length of the written file.
    pub size: u64,
    /// Digests over the written bytes.
    pub digests: MultiContentDigest,
}

/// Metadata fields of a `Release` file.
pub struct ReleaseFields {
    pub origin: Option<String>,
    pub suite: String,
    pub codename: String,
    pub date: DateTime<Utc>,
    pub components: Vec<String>,
    pub architectures: Vec<String>,
    pub description: String,
}

impl ReleaseFields {
    /// Assemble the `Release` control paragraph.
    ///
    /// Digest entries appear in `entries` order, which callers keep equal to
    /// the order index files were written.
    pub fn to_paragraph(&self, entries: &[IndexFileEntry]) -> ControlParagraph {
        let mut para = ControlParagraph::default();

        if let Some(origin) = &self.origin {
            para.set("Origin", origin.as_str());
        }
        para.set("Suite", self.suite.as_str());
        para.set("Codename", self.codename.as_str());
        para.set("Date", self.date.format("%a, %d %b %Y %H:%M:%S UTC").to_string());
        para.set("Components", self.components.join(" "));
        para.set("Architectures", self.architectures.join(" "));
        para.set("Description", self.description.as_str());

        for checksum in ChecksumType::all() {
            let mut value = String::new();
            for entry in entries {
                value.push('\n');
                value.push_str(&format!(
                    "{} {:>8} {}",
                    entry.digests.digest(checksum).digest_hex(),
                    entry.size,
                    entry.path
                ));
            }

            para.set(checksum.release_field_name(), value);
        }

        para
    }
}

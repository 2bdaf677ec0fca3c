// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Building signed APT repositories.

See <https://wiki.debian.org/DebianRepository/Format> for the format of
repositories.

A repository is a virtual filesystem of well-defined files: a `pool/`
holding the `.deb` packages, per-(component, architecture) `Packages`
indexes under `dists/<dist>/`, optional `Contents` indexes, and a signed
`Release` manifest enumerating everything with sizes and digests.

[builder::RepositoryBuilder] is the main type: it scans an input tree of
`<dist>/<component>/` plus `*.deb`, copies packages into the pool, generates the
indexes, and signs the per-dist `Release` files.
*/

pub mod builder;
pub mod contents;
pub mod release;

pub use builder::{PublishEvent, RepositoryBuilder};

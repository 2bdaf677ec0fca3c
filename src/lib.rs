// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signed APT repository generation.

This crate turns a directory tree of Debian binary packages into a signed,
APT-consumable package repository. Given input organized as
`<dist>/<component>/` plus `*.deb`, it produces the standard repository layout: a
`pool/` of packages addressed by package name, and `dists/<dist>/` holding
per-(component, architecture) `Packages` indexes, optional `Contents`
indexes, and a `Release` manifest signed both detached (`Release.gpg`) and
inline (`InRelease`).

# A Tour of Functionality

`.deb` files are ar archives; [ar::ArchiveReader] provides streaming access
to archive members. [deb::DebPackage] composes it with compression dispatch
([io::Compression]), tar walking, and the multi-digest sink
([io::MultiDigester]) to parse one package into a record holding its
control paragraph, size, digests, and optionally its file list.

Control paragraphs are the `Name: value` blocks used throughout Debian
metadata. [control::ControlParagraph] parses and serializes them with
byte-exact round-tripping, preserving field order across mutation.

[package_version::PackageVersion] implements Debian version string parsing
and the policy comparison algorithm.

[repository::RepositoryBuilder] is the orchestrator: it scans the input
tree, copies packages into the pool, generates indexes, and signs the
`Release` files with an OpenPGP key loaded by [signing_key::Signer].
Signature emission (detached and RFC 4880 cleartext) lives in [pgp].
[signing_key::create_self_signed_key] can mint a signing key pair.

The CLI driver, file watching, and repository serving are intentionally not
part of this crate; it is a library for tools to build on.
*/

pub mod ar;
pub mod control;
pub mod deb;
pub mod error;
pub mod io;
pub mod package_version;
pub mod pgp;
pub mod repository;
pub mod signing_key;

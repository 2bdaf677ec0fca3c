// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Build signed APT repositories from directories of `.deb` files.

The input tree has the layout `<in>/<dist>/<component>/` plus `*.deb`. Building
proceeds in four phases, each requiring the previous:

1. `scan` parses every `.deb` into the in-memory model.
2. `publish_pool` copies packages into `<out>/pool/`.
3. `publish_dists` writes `Packages` indexes, optional `Contents` indexes,
   and the signed `Release` files under `<out>/dists/`.
4. `publish_root` writes the armored public key as `<out>/key.asc`.
*/

use {
    crate::{
        deb::DebPackage,
        error::{RepositoryError, Result},
        io::{digest_data, gzip_encode, xz_encode, ChecksumType},
        repository::{
            contents::ContentsFile,
            release::{IndexFileEntry, ReleaseFields},
        },
        signing_key::Signer,
    },
    chrono::{DateTime, Utc},
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        collections::{BTreeMap, BTreeSet},
        ffi::OsStr,
        path::{Path, PathBuf},
    },
};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z-]+$").expect("static regex should compile"));

/// Represents a publishing event.
#[derive(Clone, Debug)]
pub enum PublishEvent {
    /// A `.deb` file was parsed during scanning.
    PackageScanned(String),

    /// A package was copied into the pool at the given path with size.
    PoolFileWritten(String, u64),

    /// An index file was written at the given path with size.
    IndexFileWritten(String, u64),

    /// The `Release` file for a dist was signed.
    ReleaseSigned(String),

    /// The armored public key was written at the given path.
    PublicKeyWritten(String),
}

impl std::fmt::Display for PublishEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PackageScanned(path) => write!(f, "scanned {}", path),
            Self::PoolFileWritten(path, size) => write!(f, "wrote {} bytes to {}", size, path),
            Self::IndexFileWritten(path, size) => write!(f, "wrote {} bytes to {}", size, path),
            Self::ReleaseSigned(dist) => write!(f, "signed Release for {}", dist),
            Self::PublicKeyWritten(path) => write!(f, "wrote public key to {}", path),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Phase {
    Constructed,
    Scanned,
    Pooled,
    Distributed,
    Rooted,
}

// dist -> component -> packages.
type DistMap = BTreeMap<String, BTreeMap<String, Vec<DebPackage>>>;

/// Build a signed APT repository from scratch.
///
/// Construction validates both roots and parses the signing key. Options
/// are applied through setters before [Self::scan] runs. [Self::publish]
/// drives all four phases in order.
pub struct RepositoryBuilder {
    in_root: PathBuf,
    out_root: PathBuf,
    generate_contents: bool,
    contents_plain: bool,
    maintainer_override: Option<String>,
    origin: Option<String>,
    description: String,
    date: DateTime<Utc>,
    signer: Signer,
    progress: Option<Box<dyn Fn(PublishEvent)>>,
    dists: DistMap,
    phase: Phase,
}

impl RepositoryBuilder {
    /// Construct a builder.
    ///
    /// `in_root` must exist; `out_root` must not, so a stale repository is
    /// never clobbered. `signing_key` is an ASCII armored
    /// `PGP PRIVATE KEY BLOCK`.
    pub fn new(
        in_root: impl AsRef<Path>,
        out_root: impl AsRef<Path>,
        signing_key: &str,
    ) -> Result<Self> {
        let in_root = in_root.as_ref();
        let in_root = in_root
            .canonicalize()
            .map_err(|e| RepositoryError::IoPath(in_root.display().to_string(), e))?;

        let out_root = absolute_path(out_root.as_ref())?;
        if out_root.exists() {
            return Err(RepositoryError::OutputExists(
                out_root.display().to_string(),
            ));
        }

        let signer = Signer::from_armored(signing_key)?;

        Ok(Self {
            in_root,
            out_root,
            generate_contents: false,
            contents_plain: false,
            maintainer_override: None,
            origin: None,
            description: String::new(),
            date: Utc::now(),
            signer,
            progress: None,
            dists: DistMap::default(),
            phase: Phase::Constructed,
        })
    }

    /// Enable generation of `Contents-<arch>` indexes.
    ///
    /// Slower, since every package's data archive must be decompressed and
    /// walked.
    pub fn set_generate_contents(&mut self, value: bool) {
        self.generate_contents = value;
    }

    /// Also write the uncompressed `Contents-<arch>` file.
    ///
    /// By default only the gzipped form is written and only its digests are
    /// recorded in `Release`. Enabling this writes the plain file as well
    /// and records its digests too.
    pub fn set_contents_plain(&mut self, value: bool) {
        self.contents_plain = value;
    }

    /// Replace the `Maintainer` field in every `Packages` index row.
    ///
    /// The packages in the pool are not modified.
    pub fn set_maintainer_override(&mut self, value: impl ToString) {
        self.maintainer_override = Some(value.to_string());
    }

    /// Set the `Origin` field of `Release` files.
    pub fn set_origin(&mut self, value: impl ToString) {
        self.origin = Some(value.to_string());
    }

    /// Set the `Description` field of `Release` files.
    pub fn set_description(&mut self, value: impl ToString) {
        self.description = value.to_string();
    }

    /// Set the time recorded in `Release` files.
    ///
    /// Defaults to the construction time. Setting an explicit value makes
    /// output reproducible.
    pub fn set_date(&mut self, value: DateTime<Utc>) {
        self.date = value;
    }

    /// Install a callback receiving [PublishEvent] progress updates.
    pub fn set_progress_callback(&mut self, cb: impl Fn(PublishEvent) + 'static) {
        self.progress = Some(Box::new(cb));
    }

    /// Scan the input tree and parse every package.
    ///
    /// Every direct child of the input root must be a dist directory whose
    /// name matches `[a-z-]+`, holding component directories under the same
    /// rule, holding only `.deb` files. Anything else is fatal.
    pub fn scan(&mut self) -> Result<()> {
        self.ensure_phase(Phase::Constructed, "scan", "construction")?;

        let mut dists = DistMap::default();

        for dist_entry in sorted_dir_entries(&self.in_root)? {
            let dist_path = dist_entry.path();
            if !dist_path.is_dir() {
                return Err(RepositoryError::UnexpectedEntry(format!(
                    "not a directory: {}",
                    dist_path.display()
                )));
            }
            let dist_name = validate_name("dist", &dist_entry.file_name())?;

            let mut components = BTreeMap::new();

            for comp_entry in sorted_dir_entries(&dist_path)? {
                let comp_path = comp_entry.path();
                if !comp_path.is_dir() {
                    return Err(RepositoryError::UnexpectedEntry(format!(
                        "not a directory: {}",
                        comp_path.display()
                    )));
                }
                let comp_name = validate_name("component", &comp_entry.file_name())?;

                let mut packages = Vec::new();
                let mut seen = BTreeSet::new();

                for deb_entry in sorted_dir_entries(&comp_path)? {
                    let deb_path = deb_entry.path();
                    if deb_path.is_dir() || deb_path.extension() != Some(OsStr::new("deb")) {
                        return Err(RepositoryError::UnexpectedEntry(format!(
                            "not a .deb file: {}",
                            deb_path.display()
                        )));
                    }

                    let deb = DebPackage::read(&deb_path, self.generate_contents)?;

                    // Pool paths embed the version string, which must parse.
                    deb.version()?;

                    let key = (
                        deb.package()?.to_string(),
                        deb.version_str()?.to_string(),
                        deb.architecture()?.to_string(),
                    );
                    if !seen.insert(key.clone()) {
                        return Err(RepositoryError::DuplicatePackage {
                            dist: dist_name.clone(),
                            component: comp_name.clone(),
                            package: key.0,
                            version: key.1,
                            architecture: key.2,
                        });
                    }

                    self.emit(|| PublishEvent::PackageScanned(deb_path.display().to_string()));
                    packages.push(deb);
                }

                components.insert(comp_name.clone(), packages);
            }

            dists.insert(dist_name, components);
        }

        self.dists = dists;
        self.phase = Phase::Scanned;

        Ok(())
    }

    /// Copy every scanned package into the pool.
    pub fn publish_pool(&mut self) -> Result<()> {
        self.ensure_phase(Phase::Scanned, "publish_pool", "scan")?;

        let pool_root = self.out_root.join("pool");
        create_dir_all(&pool_root)?;

        for components in self.dists.values() {
            for (comp_name, packages) in components {
                for deb in packages {
                    let rel_path = pool_path(comp_name, deb)?;
                    let dest = self.out_root.join(&rel_path);
                    if let Some(parent) = dest.parent() {
                        create_dir_all(parent)?;
                    }

                    let bytes = std::fs::copy(deb.path(), &dest)
                        .map_err(|e| RepositoryError::IoPath(dest.display().to_string(), e))?;

                    self.emit(|| PublishEvent::PoolFileWritten(rel_path.clone(), bytes));
                }
            }
        }

        self.phase = Phase::Pooled;

        Ok(())
    }

    /// Write per-dist indexes and the signed `Release` files.
    pub fn publish_dists(&mut self) -> Result<()> {
        self.ensure_phase(Phase::Pooled, "publish_dists", "publish_pool")?;

        let dists_root = self.out_root.join("dists");
        create_dir_all(&dists_root)?;

        for (dist_name, components) in &self.dists {
            let dist_root = dists_root.join(dist_name);
            create_dir_all(&dist_root)?;

            let mut entries: Vec<IndexFileEntry> = Vec::new();
            let mut architectures = BTreeSet::new();

            for (comp_name, packages) in components {
                let mut by_arch: BTreeMap<String, Vec<&DebPackage>> = BTreeMap::new();
                for deb in packages {
                    by_arch
                        .entry(deb.architecture()?.to_string())
                        .or_default()
                        .push(deb);
                }

                for (arch, debs) in &by_arch {
                    let body = self.packages_index(comp_name, debs)?;
                    let base = format!("{}/binary-{}/Packages", comp_name, arch);

                    self.write_index(&dist_root, &base, body.as_bytes(), &mut entries)?;
                    self.write_index(
                        &dist_root,
                        &format!("{}.gz", base),
                        &gzip_encode(body.as_bytes())?,
                        &mut entries,
                    )?;
                    self.write_index(
                        &dist_root,
                        &format!("{}.xz", base),
                        &xz_encode(body.as_bytes())?,
                        &mut entries,
                    )?;

                    architectures.insert(arch.clone());
                }

                if self.generate_contents {
                    for (arch, debs) in &by_arch {
                        let contents = contents_index(debs)?;
                        let mut body = Vec::new();
                        contents.write_to(&mut body)?;

                        let base = format!("{}/Contents-{}", comp_name, arch);
                        if self.contents_plain {
                            self.write_index(&dist_root, &base, &body, &mut entries)?;
                        }
                        self.write_index(
                            &dist_root,
                            &format!("{}.gz", base),
                            &gzip_encode(&body)?,
                            &mut entries,
                        )?;
                    }
                }
            }

            let fields = ReleaseFields {
                origin: self.origin.clone(),
                suite: dist_name.clone(),
                codename: dist_name.clone(),
                date: self.date,
                components: components.keys().cloned().collect(),
                architectures: architectures.into_iter().collect(),
                description: self.description.clone(),
            };

            let release_text = fields.to_paragraph(&entries).to_string();
            write_file(&dist_root.join("Release"), release_text.as_bytes())?;

            let signature = self.signer.detach_sign(release_text.as_bytes())?;
            write_file(&dist_root.join("Release.gpg"), signature.as_bytes())?;

            let inrelease = self.signer.clear_sign(&release_text)?;
            write_file(&dist_root.join("InRelease"), inrelease.as_bytes())?;

            self.emit(|| PublishEvent::ReleaseSigned(dist_name.clone()));
        }

        self.phase = Phase::Distributed;

        Ok(())
    }

    /// Write the repository root files.
    ///
    /// Currently the armored public key of the signing key as `key.asc`, so
    /// clients can fetch and trust it.
    pub fn publish_root(&mut self) -> Result<()> {
        self.ensure_phase(Phase::Distributed, "publish_root", "publish_dists")?;

        create_dir_all(&self.out_root)?;

        let key_path = self.out_root.join("key.asc");
        let public_key = self.signer.public_key_armored()?;
        write_file(&key_path, public_key.as_bytes())?;

        self.emit(|| PublishEvent::PublicKeyWritten(key_path.display().to_string()));
        self.phase = Phase::Rooted;

        Ok(())
    }

    /// Run all phases in order.
    pub fn publish(&mut self) -> Result<()> {
        self.scan()?;
        self.publish_pool()?;
        self.publish_dists()?;
        self.publish_root()
    }

    /// Build the `Packages` index body for one (component, architecture).
    fn packages_index(&self, component: &str, debs: &[&DebPackage]) -> Result<String> {
        let mut body = String::new();

        for deb in debs {
            let mut para = deb.control().clone();

            para.move_to_order_start("Package");

            if let Some(maintainer) = &self.maintainer_override {
                para.set("Maintainer", maintainer.as_str());
            }

            para.set("Size", deb.size().to_string());
            for checksum in ChecksumType::all() {
                para.set(
                    checksum.packages_field_name(),
                    deb.digests().digest(checksum).digest_hex(),
                );
            }
            para.set("Filename", pool_path(component, deb)?);

            body.push_str(&para.to_string());
            body.push('\n');
        }

        Ok(body)
    }

    /// Write one index file under the dist root and record its digests.
    fn write_index(
        &self,
        dist_root: &Path,
        rel_path: &str,
        data: &[u8],
        entries: &mut Vec<IndexFileEntry>,
    ) -> Result<()> {
        let dest = dist_root.join(rel_path);
        if let Some(parent) = dest.parent() {
            create_dir_all(parent)?;
        }
        write_file(&dest, data)?;

        entries.push(IndexFileEntry {
            path: rel_path.to_string(),
            size: data.len() as u64,
            digests: digest_data(data),
        });

        self.emit(|| PublishEvent::IndexFileWritten(rel_path.to_string(), data.len() as u64));

        Ok(())
    }

    fn ensure_phase(
        &self,
        expected: Phase,
        operation: &'static str,
        previous: &'static str,
    ) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RepositoryError::PhaseOrder(operation, previous))
        }
    }

    fn emit(&self, event: impl FnOnce() -> PublishEvent) {
        if let Some(cb) = &self.progress {
            cb(event());
        }
    }
}

/// Compute a package's pool path relative to the repository root.
fn pool_path(component: &str, deb: &DebPackage) -> Result<String> {
    let package = deb.package()?;

    Ok(format!(
        "pool/{}/{}/{}/{}_{}_{}.deb",
        component,
        package_prefix(package),
        package,
        package,
        deb.version_str()?,
        deb.architecture()?
    ))
}

/// The pool sharding directory for a package name.
///
/// `lib` packages shard on their first four characters, everything else on
/// the first character.
fn package_prefix(package: &str) -> &str {
    if package.starts_with("lib") && package.len() > 3 {
        &package[..4]
    } else {
        &package[..1]
    }
}

/// Build the `Contents` index for a set of packages of one architecture.
fn contents_index(debs: &[&DebPackage]) -> Result<ContentsFile> {
    let mut contents = ContentsFile::default();

    for deb in debs {
        // The qualified package name is [<section>/]<name>.
        let mut qualified = deb.package()?.to_string();
        if let Some(section) = deb.control().field_str("Section") {
            qualified = format!("{}/{}", section, qualified);
        }

        for path in deb.contents().unwrap_or_default() {
            contents.add_package_path(path, &qualified);
        }
    }

    Ok(contents)
}

fn validate_name(kind: &'static str, name: &OsStr) -> Result<String> {
    let name = name
        .to_str()
        .ok_or_else(|| RepositoryError::InvalidName(kind, name.to_string_lossy().into_owned()))?;

    if NAME_RE.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(RepositoryError::InvalidName(kind, name.to_string()))
    }
}

fn sorted_dir_entries(path: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let io_err = |e| RepositoryError::IoPath(path.display().to_string(), e);

    let mut entries = std::fs::read_dir(path)
        .map_err(io_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_err)?;

    entries.sort_by_key(|entry| entry.file_name());

    Ok(entries)
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| RepositoryError::IoPath(path.display().to_string(), e))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).map_err(|e| RepositoryError::IoPath(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_prefixes() {
        assert_eq!(package_prefix("python"), "p");
        assert_eq!(package_prefix("hello"), "h");
        assert_eq!(package_prefix("libzstd"), "libz");
        assert_eq!(package_prefix("libc"), "libc");
        assert_eq!(package_prefix("lib"), "l");
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("dist", OsStr::new("stable")).is_ok());
        assert!(validate_name("dist", OsStr::new("non-free")).is_ok());

        for bad in ["Stable", "stable1", "sta_ble", ""] {
            assert!(matches!(
                validate_name("dist", OsStr::new(bad)),
                Err(RepositoryError::InvalidName("dist", _))
            ));
        }
    }
}

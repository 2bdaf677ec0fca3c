// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading .deb package files.

A `.deb` binary package is an ar archive with 3 members:

1. `debian-binary` holding the version of the binary package format.
2. `control.tar[.<ext>]` holding package metadata.
3. `data.tar[.<ext>]` holding file content.

The .deb file specification lives at
<https://manpages.debian.org/unstable/dpkg-dev/deb.5.en.html>.
*/

use {
    crate::{
        ar::ArchiveReader,
        control::ControlParagraph,
        error::{RepositoryError, Result},
        io::{digest_reader, Compression, MultiContentDigest},
        package_version::PackageVersion,
    },
    std::{
        io::{BufReader, Read, Seek, SeekFrom},
        path::{Component, Path, PathBuf},
    },
};

/// Control fields every binary package must define.
const REQUIRED_FIELDS: &[&str] = &["Package", "Architecture", "Version"];

/// A parsed `.deb` package.
#[derive(Clone, Debug)]
pub struct DebPackage {
    control: ControlParagraph,
    size: u64,
    path: PathBuf,
    digests: MultiContentDigest,
    contents: Option<Vec<String>>,
}

impl DebPackage {
    /// Read a `.deb` file from the filesystem.
    ///
    /// The file is streamed through the digest sink once, then re-read as an
    /// ar archive to extract the control paragraph. When `read_contents` is
    /// set, the `data.tar` member is also walked and the contained file
    /// paths collected; this is slower since the whole data archive must be
    /// decompressed.
    pub fn read(path: impl AsRef<Path>, read_contents: bool) -> Result<Self> {
        let path = path.as_ref();
        let io_err = |e| RepositoryError::IoPath(path.display().to_string(), e);

        let metadata = std::fs::metadata(path).map_err(io_err)?;
        let size = metadata.len();
        let path = path.canonicalize().map_err(io_err)?;

        let mut file = std::fs::File::open(&path)
            .map_err(|e| RepositoryError::IoPath(path.display().to_string(), e))?;

        let digests = digest_reader(&mut file)
            .map_err(|e| RepositoryError::IoPath(path.display().to_string(), e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| RepositoryError::IoPath(path.display().to_string(), e))?;

        let mut archive = ArchiveReader::new(BufReader::new(file))?;

        let mut control = None;
        let mut contents = None;

        while let Some(member) = archive.next_member()? {
            let name = member.name.trim_end_matches('/');

            if name == "debian-binary" {
                let mut body = String::new();
                archive.read_to_string(&mut body)?;
                if !body.starts_with("2.0") {
                    return Err(RepositoryError::UnsupportedDebianBinary(
                        body.trim().to_string(),
                    ));
                }
            } else if name.starts_with("control.tar") {
                control = Some(read_control_archive(name, &mut archive)?);
            } else if name.starts_with("data.tar") && read_contents {
                contents = Some(read_data_archive(name, &mut archive)?);
            }
        }

        let control = control.ok_or(RepositoryError::MissingControl)?;

        for field in REQUIRED_FIELDS {
            if control.field_str(field).map_or(true, str::is_empty) {
                return Err(RepositoryError::MissingRequiredField(field));
            }
        }

        Ok(Self {
            control,
            size,
            path,
            digests,
            contents,
        })
    }

    /// The package's control paragraph.
    pub fn control(&self) -> &ControlParagraph {
        &self.control
    }

    /// Total size of the `.deb` file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Absolute path of the source `.deb` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digests computed over the raw `.deb` bytes.
    pub fn digests(&self) -> &MultiContentDigest {
        &self.digests
    }

    /// Paths contained in the package's data archive.
    ///
    /// Only populated when contents reading was requested.
    pub fn contents(&self) -> Option<&[String]> {
        self.contents.as_deref()
    }

    /// The `Package` control field.
    pub fn package(&self) -> Result<&str> {
        self.required_field("Package")
    }

    /// The `Version` control field.
    pub fn version_str(&self) -> Result<&str> {
        self.required_field("Version")
    }

    /// The parsed `Version` control field.
    pub fn version(&self) -> Result<PackageVersion> {
        Ok(PackageVersion::parse(self.version_str()?)?)
    }

    /// The `Architecture` control field.
    pub fn architecture(&self) -> Result<&str> {
        self.required_field("Architecture")
    }

    fn required_field(&self, name: &'static str) -> Result<&str> {
        self.control
            .field_str(name)
            .ok_or(RepositoryError::MissingRequiredField(name))
    }
}

fn read_control_archive(name: &str, reader: &mut impl Read) -> Result<ControlParagraph> {
    let decoder = Compression::from_member_name(name)?.decode(reader)?;
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().map_err(tar_err)? {
        let mut entry = entry.map_err(tar_err)?;
        let entry_path = entry.path().map_err(tar_err)?;

        if normalize_entry_path(&entry_path) == "control" {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(tar_err)?;
            return ControlParagraph::parse(&text);
        }
    }

    Err(RepositoryError::MissingControl)
}

fn read_data_archive(name: &str, reader: &mut impl Read) -> Result<Vec<String>> {
    let decoder = Compression::from_member_name(name)?.decode(reader)?;
    let mut archive = tar::Archive::new(decoder);
    let mut paths = Vec::new();

    for entry in archive.entries().map_err(tar_err)? {
        let entry = entry.map_err(tar_err)?;
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let entry_path = entry.path().map_err(tar_err)?;
        let normalized = normalize_entry_path(&entry_path);
        if !normalized.is_empty() {
            paths.push(normalized);
        }
    }

    Ok(paths)
}

fn tar_err(e: std::io::Error) -> RepositoryError {
    RepositoryError::ParseTar(e.to_string())
}

/// Lexically clean a tar entry path: drop `.` components, resolve `..`, and
/// join the rest with `/`.
fn normalize_entry_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }

    parts.join("/")
}

#[cfg(test)]
mod tests {
    use {super::*, crate::io::gzip_encode, std::io::Write};

    const CONTROL: &str = "Package: hello\nVersion: 1.0\nArchitecture: amd64\nMaintainer: Someone <someone@example.com>\nSection: utils\nDescription: a test package\n";

    fn tar_archive(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        for (path, data, is_dir) in entries {
            let mut header = tar::Header::new_ustar();
            if *is_dir {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
            } else {
                header.set_mode(0o644);
            }
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }

        builder.into_inner().unwrap()
    }

    fn ar_member(archive: &mut Vec<u8>, name: &str, data: &[u8]) {
        archive.extend_from_slice(format!("{:<16}", name).as_bytes());
        archive.extend_from_slice(format!("{:<12}", 0).as_bytes());
        archive.extend_from_slice(format!("{:<6}", 0).as_bytes());
        archive.extend_from_slice(format!("{:<6}", 0).as_bytes());
        archive.extend_from_slice(format!("{:<8}", "100644").as_bytes());
        archive.extend_from_slice(format!("{:<10}", data.len()).as_bytes());
        archive.extend_from_slice(b"`\n");
        archive.extend_from_slice(data);
        if data.len() % 2 == 1 {
            archive.push(b'\n');
        }
    }

    fn build_deb(control: &str, data_entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let control_tar = tar_archive(&[("control", control.as_bytes(), false)]);
        let control_tar_gz = gzip_encode(&control_tar).unwrap();
        let data_tar = tar_archive(data_entries);

        let mut deb = b"!<arch>\n".to_vec();
        ar_member(&mut deb, "debian-binary", b"2.0\n");
        ar_member(&mut deb, "control.tar.gz", &control_tar_gz);
        ar_member(&mut deb, "data.tar", &data_tar);
        deb
    }

    fn write_temp_deb(data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.deb");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_control_size_and_digests() -> Result<()> {
        let data = build_deb(CONTROL, &[("usr/", &[], true), ("usr/bin/hello", b"#!/bin/sh\n", false)]);
        let (_dir, path) = write_temp_deb(&data);

        let deb = DebPackage::read(&path, false)?;

        assert_eq!(deb.package()?, "hello");
        assert_eq!(deb.version_str()?, "1.0");
        assert_eq!(deb.architecture()?, "amd64");
        assert_eq!(deb.size(), data.len() as u64);
        assert_eq!(
            deb.digests().sha256.digest_hex(),
            crate::io::digest_data(&data).sha256.digest_hex()
        );
        assert!(deb.contents().is_none());

        Ok(())
    }

    #[test]
    fn collects_contents_when_requested() -> Result<()> {
        let data = build_deb(
            CONTROL,
            &[
                ("./", &[], true),
                ("./usr/", &[], true),
                ("./usr/bin/hello", b"x", false),
                ("./usr/share/doc/hello/copyright", b"y", false),
            ],
        );
        let (_dir, path) = write_temp_deb(&data);

        let deb = DebPackage::read(&path, true)?;

        assert_eq!(
            deb.contents().unwrap(),
            &[
                "usr/bin/hello".to_string(),
                "usr/share/doc/hello/copyright".to_string()
            ]
        );

        Ok(())
    }

    #[test]
    fn rejects_bad_debian_binary() {
        let control_tar = tar_archive(&[("control", CONTROL.as_bytes(), false)]);
        let mut deb = b"!<arch>\n".to_vec();
        ar_member(&mut deb, "debian-binary", b"3.0\n");
        ar_member(&mut deb, "control.tar", &control_tar);
        let (_dir, path) = write_temp_deb(&deb);

        assert!(matches!(
            DebPackage::read(&path, false),
            Err(RepositoryError::UnsupportedDebianBinary(v)) if v == "3.0"
        ));
    }

    #[test]
    fn rejects_missing_control_entry() {
        let control_tar = tar_archive(&[("not-control", b"x", false)]);
        let mut deb = b"!<arch>\n".to_vec();
        ar_member(&mut deb, "debian-binary", b"2.0\n");
        ar_member(&mut deb, "control.tar", &control_tar);
        let (_dir, path) = write_temp_deb(&deb);

        assert!(matches!(
            DebPackage::read(&path, false),
            Err(RepositoryError::MissingControl)
        ));
    }

    #[test]
    fn rejects_missing_required_field() {
        let control = "Package: hello\nArchitecture: amd64\n";
        let data = build_deb(control, &[]);
        let (_dir, path) = write_temp_deb(&data);

        assert!(matches!(
            DebPackage::read(&path, false),
            Err(RepositoryError::MissingRequiredField("Version"))
        ));
    }

    #[test]
    fn rejects_unknown_compression_extension() {
        let control_tar = tar_archive(&[("control", CONTROL.as_bytes(), false)]);
        let mut deb = b"!<arch>\n".to_vec();
        ar_member(&mut deb, "debian-binary", b"2.0\n");
        ar_member(&mut deb, "control.tar.zst", &control_tar);
        let (_dir, path) = write_temp_deb(&deb);

        assert!(matches!(
            DebPackage::read(&path, false),
            Err(RepositoryError::UnknownCompression(_))
        ));
    }

    #[test]
    fn member_name_trailing_slash_is_stripped() -> Result<()> {
        let control_tar = tar_archive(&[("control", CONTROL.as_bytes(), false)]);
        let mut deb = b"!<arch>\n".to_vec();
        ar_member(&mut deb, "debian-binary", b"2.0\n");
        ar_member(&mut deb, "control.tar/", &control_tar);
        let (_dir, path) = write_temp_deb(&deb);

        let deb = DebPackage::read(&path, false)?;
        assert_eq!(deb.package()?, "hello");

        Ok(())
    }

    #[test]
    fn normalizes_entry_paths() {
        assert_eq!(normalize_entry_path(Path::new("./control")), "control");
        assert_eq!(normalize_entry_path(Path::new("usr/bin/tool")), "usr/bin/tool");
        assert_eq!(normalize_entry_path(Path::new("./a/b/../c")), "a/c");
        assert_eq!(normalize_entry_path(Path::new("./")), "");
    }
}

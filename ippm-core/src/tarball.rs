use crate::content::{ROOT_NODE, TreeFile};
use crate::lockfile::PackageId;
use crate::registry::{ByteStream, RegistryDist};
use crate::{IppmError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use futures::StreamExt;
use sha1::{Digest, Sha1};
use sha2::Sha512;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Checksums published for a tarball.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Checksums {
    /// Hex SHA-1 of the compressed tarball.
    pub shasum: Option<String>,
    /// Subresource-integrity string, e.g. `sha512-<base64>`.
    pub integrity: Option<String>,
}

impl Checksums {
    pub fn is_empty(&self) -> bool {
        self.shasum.is_none() && self.sha512().is_none()
    }

    fn sha512(&self) -> Option<&str> {
        self.integrity
            .as_deref()?
            .split_whitespace()
            .find_map(|token| token.strip_prefix("sha512-"))
    }
}

impl From<&RegistryDist> for Checksums {
    fn from(dist: &RegistryDist) -> Self {
        Checksums {
            shasum: dist
                .shasum
                .as_deref()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
            integrity: dist.integrity.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Drains `stream` while digesting it, and only hands the bytes back once
/// every published checksum matched.
pub async fn read_verified(
    mut stream: ByteStream,
    url: &str,
    expected: &Checksums,
) -> Result<Vec<u8>> {
    let mut sha1 = Sha1::new();
    let mut sha512 = Sha512::new();
    let mut data = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sha1.update(&chunk);
        sha512.update(&chunk);
        data.extend_from_slice(&chunk);
    }

    if let Some(expected_hex) = expected.shasum.as_deref() {
        let actual = hex::encode(sha1.finalize());
        if actual != expected_hex {
            return Err(IppmError::Integrity {
                url: url.to_string(),
                algorithm: "shasum",
                expected: expected_hex.to_string(),
                actual,
            });
        }
    }

    if let Some(expected_b64) = expected.sha512() {
        let actual = STANDARD.encode(sha512.finalize());
        if actual != expected_b64 {
            return Err(IppmError::Integrity {
                url: url.to_string(),
                algorithm: "integrity",
                expected: expected_b64.to_string(),
                actual,
            });
        }
    }

    Ok(data)
}

/// Unpacks a package tarball into the file set inserted into the content
/// store. Only regular files survive; each path loses its leading archive
/// directory and is re-rooted at `root/<name>@<version>/`. Every
/// `index.js` below the package root also gets a `<dir>.js` forwarding
/// module one level up.
pub fn extract(data: &[u8], id: &PackageId, url: &str) -> Result<Vec<TreeFile>> {
    let archive_err = |source: std::io::Error| IppmError::Archive {
        url: url.to_string(),
        source,
    };

    let reader: Box<dyn Read + '_> = if data.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(Cursor::new(data)))
    } else {
        Box::new(Cursor::new(data))
    };

    let mut archive = Archive::new(reader);
    let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let Some(relative) = package_relative_path(&entry.path().map_err(archive_err)?) else {
            continue;
        };

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(archive_err)?;
        files.insert(relative, contents);
    }

    let shims: Vec<(String, Vec<u8>)> = files
        .keys()
        .filter_map(|relative| index_shim(relative))
        .filter(|(shim_path, _)| !files.contains_key(shim_path))
        .collect();
    files.extend(shims);

    let prefix = format!("{}/{}", ROOT_NODE, id.identity());
    Ok(files
        .into_iter()
        .map(|(relative, contents)| TreeFile {
            path: format!("{}/{}", prefix, relative),
            contents,
        })
        .collect())
}

/// Strips the archive's top-level directory (`package/` in npm tarballs)
/// and rejects anything that would escape the package.
fn package_relative_path(path: &Path) -> Option<String> {
    let mut parts = Vec::new();

    for component in path.components().skip(1) {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

fn index_shim(relative: &str) -> Option<(String, Vec<u8>)> {
    let dir = relative.strip_suffix("/index.js")?;
    let dir_name = dir.rsplit('/').next().unwrap_or(dir);
    let escaped = dir_name.replace('\\', "\\\\").replace('\'', "\\'");
    let contents = format!("module.exports = require('./{}/index.js');\n", escaped);

    Some((format!("{}.js", dir), contents.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sha1_hex, tarball};
    use futures::stream;

    fn byte_stream(data: Vec<u8>) -> ByteStream {
        let chunks: Vec<Result<Vec<u8>>> = data.chunks(7).map(|c| Ok(c.to_vec())).collect();
        stream::iter(chunks).boxed()
    }

    fn paths(files: &[TreeFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[tokio::test]
    async fn accepts_matching_shasum() {
        let data = tarball(&[("package/index.js", "module.exports = 1;")]);
        let expected = Checksums {
            shasum: Some(sha1_hex(&data)),
            integrity: None,
        };

        let read = read_verified(byte_stream(data.clone()), "https://r/a.tgz", &expected)
            .await
            .unwrap();
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn rejects_shasum_mismatch() {
        let data = tarball(&[("package/index.js", "module.exports = 1;")]);
        let expected = Checksums {
            shasum: Some("0000000000000000000000000000000000000000".into()),
            integrity: None,
        };

        let err = read_verified(byte_stream(data), "https://r/a.tgz", &expected)
            .await
            .unwrap_err();
        assert!(matches!(err, IppmError::Integrity { algorithm: "shasum", .. }));
    }

    #[tokio::test]
    async fn verifies_sha512_integrity() {
        let data = tarball(&[("package/index.js", "x")]);
        let good = Checksums {
            shasum: None,
            integrity: Some(format!("sha512-{}", STANDARD.encode(Sha512::digest(&data)))),
        };
        assert!(read_verified(byte_stream(data.clone()), "u", &good).await.is_ok());

        let bad = Checksums {
            shasum: None,
            integrity: Some(format!("sha512-{}", STANDARD.encode([0u8; 64]))),
        };
        let err = read_verified(byte_stream(data), "u", &bad).await.unwrap_err();
        assert!(matches!(err, IppmError::Integrity { algorithm: "integrity", .. }));
    }

    #[test]
    fn empty_checksums_are_detected() {
        let dist = RegistryDist {
            tarball: "u".into(),
            shasum: Some("  ".into()),
            integrity: Some("sha1-abc".into()),
        };
        assert!(Checksums::from(&dist).is_empty());
    }

    #[test]
    fn extracts_renames_and_shims() {
        let data = tarball(&[
            ("package/package.json", "{}"),
            ("package/index.js", "root"),
            ("package/lib/index.js", "lib"),
            ("package/lib/it's/index.js", "quoted"),
        ]);
        let id = PackageId::new("a", "1.0.0");

        let files = extract(&data, &id, "https://r/a.tgz").unwrap();
        assert_eq!(
            paths(&files),
            vec![
                "root/a@1.0.0/index.js",
                "root/a@1.0.0/lib.js",
                "root/a@1.0.0/lib/index.js",
                "root/a@1.0.0/lib/it's.js",
                "root/a@1.0.0/lib/it's/index.js",
                "root/a@1.0.0/package.json",
            ]
        );

        let shim = files.iter().find(|f| f.path == "root/a@1.0.0/lib.js").unwrap();
        assert_eq!(
            String::from_utf8_lossy(&shim.contents),
            "module.exports = require('./lib/index.js');\n"
        );
        let quoted = files
            .iter()
            .find(|f| f.path == "root/a@1.0.0/lib/it's.js")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&quoted.contents),
            "module.exports = require('./it\\'s/index.js');\n"
        );
    }

    #[test]
    fn real_files_win_over_shims() {
        let data = tarball(&[("package/lib.js", "real"), ("package/lib/index.js", "lib")]);
        let files = extract(&data, &PackageId::new("a", "1.0.0"), "u").unwrap();

        let lib = files.iter().find(|f| f.path == "root/a@1.0.0/lib.js").unwrap();
        assert_eq!(lib.contents, b"real");
    }

    #[test]
    fn drops_directories_and_accepts_plain_tar() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder
            .append_data(&mut dir, "package/lib/", std::io::empty())
            .unwrap();
        let mut file = tar::Header::new_gnu();
        file.set_size(2);
        file.set_mode(0o644);
        builder
            .append_data(&mut file, "package/lib/x.js", &b"ok"[..])
            .unwrap();
        let data = builder.into_inner().unwrap();

        let files = extract(&data, &PackageId::new("@s/b", "2.0.0"), "u").unwrap();
        assert_eq!(paths(&files), vec!["root/@s/b@2.0.0/lib/x.js"]);
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let data = b"\x1f\x8bnot really gzip".to_vec();
        let err = extract(&data, &PackageId::new("a", "1.0.0"), "u").unwrap_err();
        assert!(matches!(err, IppmError::Archive { .. }));
    }
}

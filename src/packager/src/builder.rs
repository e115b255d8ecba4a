//! Installer assembly (spec §4.10): stage a template directory tree, then
//! tar+gzip it into the returned archive bytes.
//!
//! Grounded on `resource_allocator.rs`'s allocate-then-assemble shape: that
//! module validates a request, pulls resources from a pool, and hands back
//! an assembled `ResourceAllocation`; here the "pool" is a fixed set of
//! template files and the "allocation" is the staged directory that gets
//! archived.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder as TarBuilder;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::PackagerError;
use crate::model::{BuildSpec, Manifest, Variant};

const AGENT_ENTRY_POINT: &str = "#!/bin/sh\nexec \"$(dirname \"$0\")/fleet-agent-bin\" \"$@\"\n";

/// Minimal systemd unit. Launchd/Windows-service equivalents would live
/// alongside this under the same `autostart/` prefix on a platform build.
const SYSTEMD_UNIT: &str = "\
[Unit]
Description=Fleet Agent

[Service]
ExecStart=/opt/fleet-agent/bin/agent
Restart=always

[Install]
WantedBy=multi-user.target
";

pub struct PackageBuilder;

impl PackageBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Validate `spec`, stage its files into a temp directory, and return
    /// the gzipped tar archive bytes (spec §4.10 `build(spec) -> bytes`).
    pub fn build(&self, spec: &BuildSpec) -> Result<Vec<u8>, PackagerError> {
        self.validate(spec)?;

        let staging = TempDir::new()?;
        self.stage(spec, staging.path())?;
        archive_directory(staging.path())
    }

    fn validate(&self, spec: &BuildSpec) -> Result<(), PackagerError> {
        match (spec.variant, &spec.credentials) {
            (Variant::FleetLinked, None) => Err(PackagerError::MissingCredentials),
            (Variant::Standalone, Some(_)) => Err(PackagerError::UnexpectedCredentials),
            _ => Ok(()),
        }
    }

    fn stage(&self, spec: &BuildSpec, root: &Path) -> Result<(), PackagerError> {
        let manifest = Manifest::from_spec(spec);
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        std::fs::write(root.join("manifest.json"), manifest_json)?;

        let bin_dir = root.join("bin");
        std::fs::create_dir_all(&bin_dir)?;
        write_executable(&bin_dir.join("agent"), AGENT_ENTRY_POINT)?;

        if spec.autostart {
            let autostart_dir = root.join("autostart");
            std::fs::create_dir_all(&autostart_dir)?;
            std::fs::write(autostart_dir.join("fleet-agent.service"), SYSTEMD_UNIT)?;
        }

        if let Some(credentials) = &spec.credentials {
            let config = toml::to_string_pretty(&PackagedConfig {
                server_url: credentials.server_url.clone(),
                api_key: credentials.api_key.clone(),
                encryption_key_b64: credentials.encryption_key_b64.clone(),
            })
            .map_err(|e| PackagerError::Template(e.to_string()))?;
            std::fs::write(root.join("agent.toml"), config)?;
        }

        Ok(())
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Serialize)]
struct PackagedConfig {
    server_url: String,
    api_key: String,
    encryption_key_b64: String,
}

#[cfg(unix)]
fn write_executable(path: &Path, content: &str) -> Result<(), PackagerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, content)?;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_executable(path: &Path, content: &str) -> Result<(), PackagerError> {
    std::fs::write(path, content)?;
    Ok(())
}


fn archive_directory(root: &Path) -> Result<Vec<u8>, PackagerError> {
    let mut entries: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    entries.sort();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    {
        let mut tar = TarBuilder::new(&mut encoder);
        for path in entries {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            tar.append_path_with_name(&path, relative)?;
        }
        tar.finish()?;
    }
    Ok(encoder.finish()?)
}

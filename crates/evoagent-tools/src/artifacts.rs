//! Artifact Store (spec §4.C).
//!
//! Persists the request/response/manifest for each tool invocation under
//! `<artifact_root>/threads/<thread>/lineages/<run>/tools/<tool>/<tool_use_id>/`,
//! plus a per-source content cache at `<source_cache_root>/<source>/`.

use std::path::{Path, PathBuf};

use evoagent_domain::envelope::{Lineage, ToolEnvelope};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Replace any character outside `[A-Za-z0-9._-]` with `_`, so thread/run/
/// tool identifiers can never escape the artifact tree.
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One entry in a tool invocation's `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
struct Manifest {
    files: Vec<ManifestEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extras: Vec<ManifestEntry>,
}

pub struct ArtifactStore {
    artifact_root: PathBuf,
    source_cache_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(artifact_root: PathBuf, source_cache_root: PathBuf) -> Self {
        Self {
            artifact_root,
            source_cache_root,
        }
    }

    /// The directory a tool invocation's artifacts live under, e.g.
    /// `<artifact_root>/threads/<thread>/lineages/<run>/tools/<tool>/<tool_use_id>/`.
    pub fn invocation_dir(&self, lineage: &Lineage, tool_name: &str) -> PathBuf {
        self.artifact_root
            .join("threads")
            .join(sanitize_segment(&lineage.thread_id.to_string()))
            .join("lineages")
            .join(sanitize_segment(&lineage.run_id.to_string()))
            .join("tools")
            .join(sanitize_segment(tool_name))
            .join(sanitize_segment(&lineage.tool_use_id))
    }

    /// The per-source content cache directory, e.g.
    /// `<source_cache_root>/<source>/`. Handlers may use this to avoid
    /// re-fetching unchanged upstream content.
    pub fn source_cache_dir(&self, source: &str) -> PathBuf {
        self.source_cache_root.join(sanitize_segment(source))
    }

    /// Write `request.json`. Best-effort: failures are logged by the
    /// caller and never abort dispatch.
    pub fn write_request(
        &self,
        lineage: &Lineage,
        tool_name: &str,
        payload: &serde_json::Value,
    ) -> std::io::Result<()> {
        let dir = self.invocation_dir(lineage, tool_name);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(payload)?;
        std::fs::write(dir.join("request.json"), json)
    }

    /// Write `response.json` and `manifest.json`. The manifest enumerates
    /// every file already present under `raw/` and `files/` (written by
    /// the handler itself, if any) with size + SHA-256, regardless of
    /// whether the call succeeded.
    pub fn write_response(
        &self,
        lineage: &Lineage,
        tool_name: &str,
        envelope: &ToolEnvelope,
    ) -> std::io::Result<()> {
        let dir = self.invocation_dir(lineage, tool_name);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(envelope)?;
        std::fs::write(dir.join("response.json"), json)?;

        let mut files = Vec::new();
        for sub in ["raw", "files"] {
            collect_manifest_entries(&dir, &dir.join(sub), &mut files)?;
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let manifest = Manifest {
            files,
            extras: Vec::new(),
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(dir.join("manifest.json"), manifest_json)
    }
}

fn collect_manifest_entries(
    invocation_dir: &Path,
    dir: &Path,
    out: &mut Vec<ManifestEntry>,
) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_manifest_entries(invocation_dir, &path, out)?;
            continue;
        }
        let bytes = std::fs::read(&path)?;
        let size = bytes.len() as u64;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = format!("{:x}", hasher.finalize());
        let rel = path
            .strip_prefix(invocation_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        out.push(ManifestEntry {
            path: rel,
            size,
            sha256,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "call/weird id".into(),
        }
    }

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_segment("call/weird id"), "call_weird_id");
        assert_eq!(sanitize_segment("nct-0123.v1"), "nct-0123.v1");
    }

    #[test]
    fn manifest_hashes_raw_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf(), dir.path().join("cache"));
        let lineage = lineage();

        let inv_dir = store.invocation_dir(&lineage, "search_pubmed");
        std::fs::create_dir_all(inv_dir.join("raw")).unwrap();
        std::fs::write(inv_dir.join("raw").join("page1.xml"), b"<xml/>").unwrap();

        let envelope = evoagent_domain::envelope::normalize(
            serde_json::json!({"ok": true}),
            "pubmed",
            lineage.clone(),
        );
        store
            .write_response(&lineage, "search_pubmed", &envelope)
            .unwrap();

        let manifest_raw = std::fs::read_to_string(inv_dir.join("manifest.json")).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest_raw).unwrap();
        let files = manifest["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["path"], "raw/page1.xml");
        assert!(files[0]["sha256"].as_str().unwrap().len() == 64);
    }
}

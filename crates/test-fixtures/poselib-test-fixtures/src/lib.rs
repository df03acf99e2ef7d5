//! Manifest-driven access to the on-disk fixture library under `fixtures/`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    /// Live rig scene files, loaded into a scene by the tests.
    rigs: HashMap<String, String>,
    /// Library item directories (`*.pose`, `*.anim`, `*.selection`, `*.constraint`).
    items: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_to_string(path)?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse JSON fixture {}", path.display()))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod rigs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.rigs.keys().cloned().collect()
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.rigs, "rig", name)?;
        Ok(resolve_path(rel))
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(&path(name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        load_json(&path(name)?)
    }
}

pub mod items {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.items.keys().cloned().collect()
    }

    /// Item directory.
    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.items, "library item", name)?;
        Ok(resolve_path(rel))
    }

    /// Copy an item directory into `dest`, for tests that write to the item.
    pub fn copy_to(name: &str, dest: &Path) -> Result<PathBuf> {
        let src = path(name)?;
        let dir_name = src
            .file_name()
            .ok_or_else(|| anyhow!("fixture item '{name}' has no directory name"))?;
        let target = dest.join(dir_name);
        fs::create_dir_all(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        for entry in fs::read_dir(&src).with_context(|| format!("failed to list {}", src.display()))? {
            let entry = entry?;
            fs::copy(entry.path(), target.join(entry.file_name())).with_context(|| {
                format!("failed to copy {}", entry.path().display())
            })?;
        }
        Ok(target)
    }
}

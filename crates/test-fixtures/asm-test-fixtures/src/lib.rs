//! Shared state-machine fixtures for tests and benches, indexed by `fixtures/manifest.json`.

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
    machines: HashMap<String, MachineEntry>,
}

#[derive(Debug, Deserialize)]
struct MachineEntry {
    document: String,
    /// `[[clip_name, duration_ms], ...]` in asset order.
    #[serde(default)]
    clips: Option<String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup(name: &str) -> Result<&'static MachineEntry> {
    MANIFEST
        .machines
        .get(name)
        .ok_or_else(|| anyhow!("unknown machine fixture '{name}'"))
}

pub mod machines {
    use super::*;

    /// Fixture names, sorted.
    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.machines.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(&lookup(name)?.document)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(&lookup(name)?.document)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(&lookup(name)?.document))
    }

    /// Clip names and lengths the machine expects from its host, if declared.
    pub fn clips(name: &str) -> Result<Option<Vec<(String, f32)>>> {
        match &lookup(name)?.clips {
            Some(rel) => super::load_json(rel).map(Some),
            None => Ok(None),
        }
    }
}

//! Compiled validators from an Aiken `plutus.json` blueprint.
use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use tracing::warn;

use crate::utils::{script_hash_to_address, Network};

/// Load a deserializable object from a JSON file.
pub fn load_from_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let file =
        File::open(path).map_err(|e| anyhow!("Failed to open manifest file {}: {}", path, e))?;
    let reader = BufReader::new(file);
    let data = serde_json::from_reader(reader)
        .map_err(|e| anyhow!("Failed to parse manifest file {}: {}", path, e))?;
    Ok(data)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub preamble: Option<Preamble>,
    pub validators: Vec<BlueprintValidator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preamble {
    pub title: String,
    #[serde(rename = "plutusVersion", default)]
    pub plutus_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlueprintValidator {
    pub title: String,
    #[serde(rename = "compiledCode")]
    pub compiled_code: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// A validator ready to be addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub title: String,
    pub compiled_code: String,
    pub hash: String,
}

impl Script {
    /// Script known only by its compiled code, hashed with [`local_script_hash`].
    pub fn from_compiled(title: &str, compiled_code: &str) -> Self {
        Self {
            title: title.to_string(),
            compiled_code: compiled_code.to_string(),
            hash: local_script_hash(compiled_code),
        }
    }

    pub fn address(&self, network: Network) -> Result<String> {
        script_hash_to_address(&self.hash, network)
    }
}

/// 28-byte identifier for scripts the blueprint does not hash for us.
///
/// SHA-256 of the plutus-v2 tag and code, truncated. Only the emulator
/// accepts addresses built from it.
pub fn local_script_hash(compiled_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update([0x02]);
    hasher.update(compiled_code.as_bytes());
    hex::encode(&hasher.finalize()[..28])
}

impl Blueprint {
    pub fn load(path: &str) -> Result<Self> {
        let blueprint: Blueprint = load_from_file(path)?;
        if blueprint.validators.is_empty() {
            return Err(anyhow!("manifest {} lists no validators", path));
        }
        Ok(blueprint)
    }

    pub fn validator(&self, title: &str) -> Option<&BlueprintValidator> {
        self.validators.iter().find(|v| v.title == title)
    }

    pub fn script(&self, title: &str) -> Result<Script> {
        let v = self
            .validator(title)
            .ok_or_else(|| anyhow!("validator {} not in manifest", title))?;
        Ok(match &v.hash {
            Some(hash) => Script {
                title: v.title.clone(),
                compiled_code: v.compiled_code.clone(),
                hash: hash.to_lowercase(),
            },
            None => Script::from_compiled(&v.title, &v.compiled_code),
        })
    }
}

/// Look `title` up in `blueprint`, or fall back to a locally hashed
/// stand-in so emulator scenarios still run without a manifest.
pub fn resolve_script(blueprint: Option<&Blueprint>, title: &str) -> Script {
    match blueprint.map(|b| b.script(title)) {
        Some(Ok(script)) => script,
        Some(Err(e)) => {
            warn!(title, "{}, using a local stand-in", e);
            Script::from_compiled(title, title)
        }
        None => {
            warn!(title, "no manifest loaded, using a local stand-in");
            Script::from_compiled(title, title)
        }
    }
}

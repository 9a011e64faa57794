//! Named effect profiles persisted as one JSON document per file.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::effect::EffectDoc;
use crate::error::Result;

/// Flat-directory profile storage: `<dir>/<name>.json` per profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Opens (creating if needed) the profile directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn save(&self, name: &str, doc: &EffectDoc) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(self.path_for(name), json)?;
        Ok(())
    }

    /// Loads a profile by name; absent profiles are `None`, not an error.
    pub fn load(&self, name: &str) -> Result<Option<EffectDoc>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn list(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::layers;
    use crate::param::ParamValue;


    #[test]
    fn save_load_list_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        let registry = layers::builtin_registry();

        let mut effect = Effect::new();
        let mut layer = registry.create("StrobeLayer").unwrap();
        layer.params_mut().set("frequency", ParamValue::Float(2.5));
        effect.add_layer(layer);

        store.save("party", &effect.to_doc()).unwrap();
        store.save("calm", &EffectDoc::default()).unwrap();

        let names = store.list().unwrap();
        assert!(names.contains("party"));
        assert!(names.contains("calm"));

        let doc = store.load("party").unwrap().expect("profile exists");
        let reloaded = Effect::from_doc(&doc, &registry);
        assert_eq!(reloaded.layers().len(), 1);
        assert_eq!(
            reloaded.layers()[0].params().float_or("frequency", 0.0),
            2.5
        );

        assert!(store.delete("party").unwrap());
        assert!(!store.delete("party").unwrap());
        assert!(store.load("party").unwrap().is_none());
    }

    #[test]
    fn missing_profile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        assert!(store.load("ghost").unwrap().is_none());
    }
}

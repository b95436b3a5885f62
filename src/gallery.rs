use crate::draw::composite::RgbaBuffer;
use crate::draw::decode::EncodedImage;
use crate::draw::save::composite_data_url;
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Key the saved creations live under.
pub const GALLERY_KEY: &str = "saved-creations";

/// Saved creations as encoded image strings, newest first, persisted in a
/// small JSON key/value file. Other keys in the file are kept as they are.
#[derive(Debug, Clone)]
pub struct GalleryStore {
    path: PathBuf,
    other: Map<String, Value>,
    creations: Vec<String>,
}

impl GalleryStore {
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            other: Map::new(),
            creations: Vec::new(),
        };
        if !path.exists() {
            return Ok(store);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read gallery file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(store);
        }
        let mut map: Map<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("deserialize gallery file {}", path.display()))?;
        if let Some(value) = map.remove(GALLERY_KEY) {
            store.creations = serde_json::from_value(value)
                .with_context(|| format!("read {GALLERY_KEY} from {}", path.display()))?;
        }
        store.other = map;
        tracing::debug!(path = %path.display(), count = store.creations.len(), "loaded gallery");
        Ok(store)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create gallery parent folder {}", parent.display()))?;
        }
        let mut map = self.other.clone();
        map.insert(
            GALLERY_KEY.to_string(),
            Value::from(self.creations.clone()),
        );
        let json = serde_json::to_string_pretty(&map).context("serialize gallery")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write gallery file {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[String] {
        &self.creations
    }

    pub fn len(&self) -> usize {
        self.creations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.creations.get(index).map(String::as_str)
    }

    /// Prepends an encoded creation and persists the gallery.
    pub fn add(&mut self, encoded: String) -> Result<()> {
        self.creations.insert(0, encoded);
        self.save()?;
        tracing::info!(count = self.creations.len(), "saved creation to gallery");
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<String> {
        if index >= self.creations.len() {
            bail!(
                "gallery index {index} out of range ({} creations)",
                self.creations.len()
            );
        }
        let removed = self.creations.remove(index);
        self.save()?;
        tracing::info!(index, "removed creation from gallery");
        Ok(removed)
    }

    /// Encodes the composite as a PNG data URL and adds it.
    pub fn save_creation(&mut self, composite: &RgbaBuffer) -> Result<String> {
        let encoded = composite_data_url(composite)?;
        self.add(encoded.clone())?;
        Ok(encoded)
    }

    /// Entry in the form the decode queue accepts.
    pub fn seed(&self, index: usize) -> Option<EncodedImage> {
        self.get(index)
            .map(|encoded| EncodedImage::DataUrl(encoded.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{GalleryStore, GALLERY_KEY};
    use crate::draw::composite::RgbaBuffer;
    use crate::draw::decode::EncodedImage;
    use crate::draw::model::Color;

    #[test]
    fn missing_file_is_an_empty_gallery() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = GalleryStore::load(&dir.path().join("gallery.json")).expect("load");
        assert!(store.is_empty());
        assert_eq!(store.get(0), None);
    }

    #[test]
    fn newest_creation_comes_first_and_persists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gallery.json");
        let mut store = GalleryStore::load(&path).expect("load");
        store.add("data:image/png;base64,AAAA".to_string()).expect("add");
        store.add("data:image/png;base64,BBBB".to_string()).expect("add");

        let reloaded = GalleryStore::load(&path).expect("reload");
        assert_eq!(
            reloaded.list(),
            &[
                "data:image/png;base64,BBBB".to_string(),
                "data:image/png;base64,AAAA".to_string()
            ]
        );
    }

    #[test]
    fn remove_checks_range_and_persists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gallery.json");
        let mut store = GalleryStore::load(&path).expect("load");
        store.add("a".to_string()).expect("add");
        store.add("b".to_string()).expect("add");

        assert!(store.remove(5).is_err());
        assert_eq!(store.remove(0).expect("remove"), "b");
        assert_eq!(GalleryStore::load(&path).expect("reload").list(), &["a".to_string()]);
    }

    #[test]
    fn unrelated_keys_survive_a_save() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, r#"{"theme":"dark","saved-creations":["x"]}"#).expect("write");

        let mut store = GalleryStore::load(&path).expect("load");
        store.add("y".to_string()).expect("add");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[GALLERY_KEY], serde_json::json!(["y", "x"]));
    }

    #[test]
    fn malformed_creation_list_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, r#"{"saved-creations":{"not":"a list"}}"#).expect("write");
        assert!(GalleryStore::load(&path).is_err());
    }

    #[test]
    fn saved_creation_is_a_png_data_url_seed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = GalleryStore::load(&dir.path().join("gallery.json")).expect("load");
        let encoded = store
            .save_creation(&RgbaBuffer::new(2, 2, Color::WHITE))
            .expect("save creation");
        assert!(encoded.starts_with("data:image/png;base64,"));
        assert_eq!(store.seed(0), Some(EncodedImage::DataUrl(encoded)));
        assert_eq!(store.seed(1), None);
    }
}

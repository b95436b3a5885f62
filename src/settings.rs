use crate::draw::layers::RecordingStrategy;
use crate::draw::model::{Color, Tool};
use crate::draw::scene::WanderSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "studio_settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// is never written to the settings file.
    pub api_key_env: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioSettings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// When enabled logging starts at debug level and honours `RUST_LOG`.
    pub debug_logging: bool,
    pub log_file: Option<PathBuf>,
    pub default_tool: Tool,
    pub default_color: Color,
    pub default_pen_width: u32,
    /// Fill of new layers: white for the single canvas, transparent for
    /// stacked studio layers.
    pub blank_fill: Color,
    pub recording_strategy: RecordingStrategy,
    /// Semantic history entries between stored checkpoints. 0 disables them.
    pub checkpoint_interval: usize,
    pub gallery_path: PathBuf,
    pub analysis: AnalysisSettings,
    pub wander: WanderSettings,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            debug_logging: false,
            log_file: None,
            default_tool: Tool::Pen,
            default_color: Color::BLACK,
            default_pen_width: 5,
            blank_fill: Color::WHITE,
            recording_strategy: RecordingStrategy::Replay,
            checkpoint_interval: 32,
            gallery_path: PathBuf::from("gallery.json"),
            analysis: AnalysisSettings::default(),
            wander: WanderSettings::default(),
        }
    }
}

impl StudioSettings {
    /// Missing or empty files yield the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut loaded: Self = serde_json::from_str(&content)
            .with_context(|| format!("deserialize settings file {}", path.display()))?;
        loaded.sanitize();
        Ok(loaded)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings parent folder {}", parent.display()))?;
        }
        let mut sanitized = self.clone();
        sanitized.sanitize();
        let json = serde_json::to_string_pretty(&sanitized).context("serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("write settings file {}", path.display()))
    }

    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.canvas_width == 0 {
            self.canvas_width = defaults.canvas_width;
        }
        if self.canvas_height == 0 {
            self.canvas_height = defaults.canvas_height;
        }
        self.default_pen_width = self.default_pen_width.max(1);
        if !(self.wander.multiplier.is_finite() && self.wander.multiplier > 0.0) {
            self.wander.multiplier = defaults.wander.multiplier;
        }
        if !(self.wander.max_step.is_finite() && self.wander.max_step >= 0.0) {
            self.wander.max_step = defaults.wander.max_step;
        }
    }

    /// Resolves a relative gallery path against the settings file's folder.
    pub fn resolved_gallery_path(&self, settings_path: &Path) -> PathBuf {
        if self.gallery_path.is_absolute() {
            return self.gallery_path.clone();
        }
        settings_path
            .parent()
            .map(|dir| dir.join(&self.gallery_path))
            .unwrap_or_else(|| self.gallery_path.clone())
    }
}

pub fn settings_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(SETTINGS_FILE_NAME))
}

pub fn resolve_settings_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    settings_path_from_exe_path(&exe_path)
}

#[cfg(test)]
mod tests {
    use super::{settings_path_from_exe_path, StudioSettings, SETTINGS_FILE_NAME};
    use crate::draw::layers::RecordingStrategy;
    use crate::draw::model::{Color, Tool};
    use std::path::Path;

    #[test]
    fn settings_path_is_resolved_next_to_executable() {
        let exe = Path::new("/tmp/studio/bin/layer_studio");
        let path = settings_path_from_exe_path(exe).expect("path");
        assert_eq!(path, Path::new("/tmp/studio/bin").join(SETTINGS_FILE_NAME));
    }

    #[test]
    fn missing_and_empty_files_load_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        assert_eq!(
            StudioSettings::load(&path).expect("missing"),
            StudioSettings::default()
        );

        std::fs::write(&path, "  \n").expect("write");
        assert_eq!(
            StudioSettings::load(&path).expect("empty"),
            StudioSettings::default()
        );
    }

    #[test]
    fn save_and_load_roundtrip_into_nested_folder() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let mut settings = StudioSettings::default();
        settings.default_tool = Tool::Eraser;
        settings.default_color = Color::rgb(1, 2, 3);
        settings.recording_strategy = RecordingStrategy::Snapshots;
        settings.checkpoint_interval = 0;
        settings.wander.multiplier = 2.5;

        settings.save(&path).expect("save");
        assert_eq!(StudioSettings::load(&path).expect("load"), settings);
    }

    #[test]
    fn partial_files_fill_in_defaults_and_sanitize() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"canvas_width":0,"default_pen_width":0,"recording_strategy":"snapshots","wander":{"multiplier":-1.0}}"#,
        )
        .expect("write");

        let loaded = StudioSettings::load(&path).expect("load");
        assert_eq!(loaded.canvas_width, 1920);
        assert_eq!(loaded.canvas_height, 1080);
        assert_eq!(loaded.default_pen_width, 1);
        assert_eq!(loaded.recording_strategy, RecordingStrategy::Snapshots);
        assert_eq!(loaded.wander.multiplier, 1.0);
        assert!(loaded.wander.enabled);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ nope").expect("write");
        assert!(StudioSettings::load(&path).is_err());
    }

    #[test]
    fn relative_gallery_path_resolves_beside_settings() {
        let settings = StudioSettings::default();
        assert_eq!(
            settings.resolved_gallery_path(Path::new("/data/studio/studio_settings.json")),
            Path::new("/data/studio/gallery.json")
        );
    }
}

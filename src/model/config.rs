use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub render: RenderConfig,
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Snippet home: a two-level folder/file tree plus the index at its root.
    pub home: String,
    pub index_file: String,
    /// Active folder; empty means the first folder in sorted order.
    pub folder: String,
    /// Pane focused at startup: "snippet", "section", or "content".
    pub default_pane: String,
    pub always_show_snippet_pane: bool,
    pub exit_after_copy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub tab_width: usize,
    pub border_length: usize,
    pub border_padding: String,
    /// Copy hint template; `{key}` is replaced by the upper-cased copy key.
    pub copy_hint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    /// Ordered copy keys; position selects which copyable block to copy.
    /// The upper-cased variant of each key copies and exits.
    pub copy: Vec<String>,
    pub edit: Vec<String>,
    pub next_pane: Vec<String>,
    pub prev_pane: Vec<String>,
    pub toggle_snippet_pane: Vec<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        let mut config: AppConfig = toml::from_str(defaults)?;

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "snipmark") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)?;
                let user_config: AppConfig = toml::from_str(&user_str)?;
                config = user_config; // TODO: deep merge instead of full replace
            }
        }

        // Expand ~ in home
        if config.general.home.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.general.home = config
                .general
                .home
                .replacen('~', &home.to_string_lossy(), 1);
        }

        config.normalize();
        Ok(config)
    }

    /// Clamp render settings so the border math stays sane whatever the user
    /// config says.
    pub fn normalize(&mut self) {
        if self.render.border_length == 0 {
            self.render.border_length = 39;
        }
        let padding: String = self.render.border_padding.chars().take(1).collect();
        self.render.border_padding = if padding.is_empty() {
            "-".to_string()
        } else {
            padding
        };
        if self.render.tab_width == 0 {
            self.render.tab_width = 4;
        }
    }

    pub fn home_path(&self) -> PathBuf {
        PathBuf::from(&self.general.home)
    }

    /// The plain code-block border: the padding character repeated to the
    /// configured length.
    pub fn default_border(&self) -> String {
        self.render.border_padding.repeat(self.render.border_length)
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
impl AppConfig {
    /// Baked-in defaults pointed at a caller-supplied home, for tests.
    pub fn for_test(home: &std::path::Path) -> Self {
        let defaults = include_str!("../../config/default.toml");
        let mut config: AppConfig = toml::from_str(defaults).expect("valid default config");
        config.general.home = home.to_string_lossy().to_string();
        config.normalize();
        config
    }
}

// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section and field has a default, so a missing file or a partial one
// still yields a complete configuration.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::PipelineConfig;
use crate::renderer::RendererConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan App".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
    /// none | front | back | front_and_back
    pub cull_mode: String,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            cull_mode: "back".to_string(),
            vertex_shader: PathBuf::from("shaders/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Validation layers plus verbose device/surface logging
    pub enabled: bool,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_fps: true,
        }
    }
}

impl Config {
    /// Load from `path` (or `config.toml`), falling back to defaults on any error
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
        Self::load_from_path(path).unwrap_or_else(|e| {
            log::warn!("Failed to load {:?}: {:#}. Using defaults.", path, e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get cull mode as Vulkan flags
    pub fn cull_mode(&self) -> vk::CullModeFlags {
        match self.graphics.cull_mode.to_lowercase().as_str() {
            "none" => vk::CullModeFlags::NONE,
            "front" => vk::CullModeFlags::FRONT,
            "back" => vk::CullModeFlags::BACK,
            "front_and_back" => vk::CullModeFlags::FRONT_AND_BACK,
            _ => {
                log::warn!(
                    "Unknown cull mode '{}', defaulting to BACK",
                    self.graphics.cull_mode
                );
                vk::CullModeFlags::BACK
            }
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            app_name: self.window.title.clone(),
            debug: self.debug.enabled,
            clear_color: self.graphics.clear_color,
            pipeline: PipelineConfig {
                vertex_shader: self.graphics.vertex_shader.clone(),
                fragment_shader: self.graphics.fragment_shader.clone(),
                cull_mode: self.cull_mode(),
            },
        }
    }
}

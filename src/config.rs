use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    16
}

/// Optional JSON catalogues loaded into empty tables on startup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FixturesConfig {
    pub products: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self { default_page_size: 6, max_page_size: 100 }
    }
}

/// Shopping list download settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub filename: String,
    pub title: String,
    pub footer: String,
    /// TrueType font used for the PDF instead of the bundled DejaVu Sans.
    pub font_path: Option<String>,
    /// Use the PDF base Helvetica font: no embedding, Latin-1 only.
    #[serde(default)]
    pub builtin_font: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: "recipe.pdf".to_string(),
            title: "Shopping list".to_string(),
            footer: "Foodgram".to_string(),
            font_path: None,
            builtin_font: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fixtures: FixturesConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: foodgram.toml (in CWD)
        .add_source(::config::File::with_name("foodgram").required(false));

    if let Ok(custom_path) = std::env::var("FOODGRAM_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("FOODGRAM").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    let p = &cfg.pagination;
    if p.default_page_size == 0 {
        return Err(anyhow::anyhow!("pagination.default_page_size must be > 0"));
    }
    if p.default_page_size > p.max_page_size {
        return Err(anyhow::anyhow!("pagination.default_page_size must be <= max_page_size"));
    }

    if cfg.export.filename.trim().is_empty() {
        return Err(anyhow::anyhow!("export.filename must not be empty"));
    }
    // Used verbatim inside Content-Disposition
    if cfg.export.filename.contains(['"', '\\', '\r', '\n']) {
        return Err(anyhow::anyhow!("export.filename contains invalid characters"));
    }
    if cfg.export.builtin_font && cfg.export.font_path.is_some() {
        return Err(anyhow::anyhow!("export.font_path and export.builtin_font are mutually exclusive"));
    }
    if let Some(font) = cfg.export.font_path.as_deref() {
        if !Path::new(font).is_file() {
            return Err(anyhow::anyhow!("export.font_path does not exist: {}", font));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // On Windows, handle URLs like sqlite:///C:/... by stripping the leading '/'
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

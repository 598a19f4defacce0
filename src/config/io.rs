use std::env::current_exe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use directories_next::ProjectDirs;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use serde_json;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::str;

use crate::config::types::Config;
use crate::discovery::types::SavedScreen;
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "device-discovery.json";
const SCREEN_FILE_NAME: &str = "discovery-screen.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "device-discovery", "device-discovery")
}

// creates a path next to the executable, with the extension swapped for json
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // F:\foo.exe => F:\foo.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to CONFIG_FILE_NAME in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        if let Ok(attr) = std::fs::metadata(&path) {
            if attr.is_file() {
                return Ok(path);
            }
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    /// Only one instance may drive the bluetooth adapter; the lock is held for the lifetime of
    /// the returned guard.
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        match self.rw_lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(source) => Err(ConfigError::CanNotLock { source }),
        }
    }
}

struct ConfigIOInner {
    file: std::fs::File,
}

#[derive(Clone)]
pub struct ConfigIO {
    inner: Arc<Mutex<ConfigIOInner>>,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        let path = get_config_path()?;
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .append(false)
            .create(true)
            .open(path)?;

        let inner = ConfigIOInner {
            file,
        };
        Ok(ConfigIO { inner: Arc::new(Mutex::new(inner)) })
    }

    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");

        Ok(ConfigIOLocker {
            rw_lock: RwLock::new(inner.file.try_clone()?),
        })
    }

    // The File returned from here should never be closed!
    fn get_file(&self) -> Result<File, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");
        let file = inner.file.try_clone()?; // std File
        Ok(File::from_std(file)) // tokio File
    }

    /// Reads the config. An empty file is a first start: the defaults are written to it so
    /// that they can be edited.
    pub async fn read(&self) -> Result<Config, ConfigError> {
        let mut file = self.get_file()?;
        info!("Reading config file");

        let mut content = vec![];
        file.rewind().await?;
        file.read_to_end(&mut content).await?;

        if content.iter().all(|byte| byte.is_ascii_whitespace()) {
            let config = Config::default();
            self.save(&config).await?;
            return Ok(config);
        }

        let content = str::from_utf8(&content)?;
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }

    pub async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let mut file = self.get_file()?;
        info!("Saving config");

        let content = serde_json::to_string_pretty(config)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Persists the discovery screen across runs, the way a mobile screen keeps its state across a
/// rotation.
#[derive(Debug, Clone)]
pub struct ScreenIO {
    path: PathBuf,
}

impl ScreenIO {
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::NoConfigPath)?;
        Ok(ScreenIO::at(dirs.cache_dir().join(SCREEN_FILE_NAME)))
    }

    pub fn at(path: PathBuf) -> Self {
        ScreenIO { path }
    }

    /// `None` when nothing was saved yet.
    pub async fn read(&self) -> Result<Option<SavedScreen>, ConfigError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let content = str::from_utf8(&content)?;
        let saved: SavedScreen = serde_json::from_str(content)?;
        Ok(Some(saved))
    }

    pub async fn save(&self, saved: &SavedScreen) -> Result<(), ConfigError> {
        if let Some(directory) = self.path.parent() {
            fs::create_dir_all(directory).await?;
        }

        info!("Saving {} candidate(s) to {}", saved.candidates.len(), self.path.to_string_lossy());
        let content = serde_json::to_string_pretty(saved)?;
        fs::write(&self.path, content.as_bytes()).await?;
        Ok(())
    }
}

/// Everything read from disk before the discovery screen is entered.
pub struct StartupState {
    pub config: Config,
    pub saved: Option<SavedScreen>,
    pub error_message: Option<String>,
}

/// Never fails: a broken config falls back to the defaults and is reported through
/// `error_message`, a broken screen file is ignored.
pub async fn load_startup_state(config_io: &ConfigIO, screen_io: &ScreenIO, restore: bool) -> StartupState {
    let (config, error_message) = match config_io.read().await {
        Ok(config) => (config, None),
        Err(err) => {
            error!("Failed to load config: {:?}", &err);
            (Config::default(), Some(format!("Failed to load config: {}", &err)))
        },
    };

    let saved = if restore {
        match screen_io.read().await {
            Ok(saved) => saved,
            Err(err) => {
                warn!("Ignoring saved discovery screen: {}", err);
                None
            },
        }
    } else {
        None
    };

    StartupState { config, saved, error_message }
}

use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Get the CLI's global home directory (`~/.hs` unless overridden by
/// `HS_HOME`). Holds the account config and session-persistent flags.
pub fn hs_home_dir() -> Result<PathBuf, std::io::Error> {
    if let Ok(v) = std::env::var("HS_HOME")
        && !v.trim().is_empty()
    {
        return Ok(PathBuf::from(v));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;

    Ok(home.join(".hs"))
}

/// Path of the global CLI config file.
pub fn global_config_path() -> Result<PathBuf, std::io::Error> {
    Ok(hs_home_dir()?.join("config.json"))
}

/// Name of the project config file expected at the project root.
pub const PROJECT_CONFIG_FILE: &str = "hsproject.json";

#[cfg(test)]
pub(crate) fn test_hs_home_env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .expect("HS_HOME test env lock poisoned")
}

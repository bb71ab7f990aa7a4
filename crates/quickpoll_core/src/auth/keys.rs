//! On-disk persistence of the token signing key.

use crate::error::AppError;
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Length of a freshly generated signing key.
pub const KEY_LEN: usize = 32;

/// Path of the key file for `name` under `dir`.
pub fn key_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.key", name))
}

fn key_error(action: &str, path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!(
        "Failed to {} signing key '{}': {}",
        action,
        path.display(),
        err
    ))
}

fn prepare_key_dir(dir: &Path) -> Result<(), AppError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|err| key_error("create directory for", dir, err))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .map_err(|err| key_error("restrict directory for", dir, err))?;
    }
    Ok(())
}

fn write_key(path: &Path, key: &[u8]) -> Result<(), AppError> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|err| key_error("open", path, err))?;
    file.write_all(key)
        .and_then(|()| file.sync_all())
        .map_err(|err| key_error("write", path, err))
}

fn generate_key() -> Vec<u8> {
    let mut key = vec![0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Load the signing key `<dir>/<name>.key`, generating it on first use.
///
/// Reusing the stored key keeps issued tokens valid across restarts.
///
/// # Returns
/// The raw key bytes.
///
/// # Errors
/// Returns [`AppError::Internal`] when the key path is a directory, the stored
/// key is shorter than [`KEY_LEN`], or the file cannot be read or written.
pub fn load_or_create_key(dir: &Path, name: &str) -> Result<Vec<u8>, AppError> {
    let path = key_file_path(dir, name);
    if path.is_dir() {
        return Err(key_error("load", &path, "path is a directory"));
    }
    if path.exists() {
        let key = fs::read(&path).map_err(|err| key_error("read", &path, err))?;
        if key.len() < KEY_LEN {
            return Err(key_error(
                "load",
                &path,
                format!("expected at least {} bytes, found {}", KEY_LEN, key.len()),
            ));
        }
        tracing::debug!("Loaded signing key from {}", path.display());
        return Ok(key);
    }

    prepare_key_dir(dir)?;
    let key = generate_key();
    write_key(&path, &key)?;
    tracing::info!("Generated new signing key at {}", path.display());
    Ok(key)
}

/// Replace the signing key with fresh random bytes.
///
/// Every token signed with the previous key stops verifying.
///
/// # Errors
/// Returns [`AppError::Internal`] when the key cannot be written.
pub fn rotate_key(dir: &Path, name: &str) -> Result<Vec<u8>, AppError> {
    let path = key_file_path(dir, name);
    if path.is_dir() {
        return Err(key_error("rotate", &path, "path is a directory"));
    }
    prepare_key_dir(dir)?;
    let key = generate_key();
    write_key(&path, &key)?;
    tracing::warn!(
        "Rotated signing key at {}; outstanding tokens are now invalid",
        path.display()
    );
    Ok(key)
}

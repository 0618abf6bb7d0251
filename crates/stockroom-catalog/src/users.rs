//! Users table: 32-byte username key, `i32` password hash value.

use crate::config::CatalogConfig;
use crate::entities::User;
use crate::{CatalogError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use stockroom_storage::DiskHashTable;
use stockroom_storage::codec::{FixedStringCodec, I32Codec};
use stockroom_storage::hash::PolyStringHash;
use tracing::debug;

/// Username width in bytes.
pub const USERNAME_BYTES: usize = 32;

/// Users table type.
pub type UserTable = DiskHashTable<FixedStringCodec, I32Codec, PolyStringHash>;

/// Disk-backed user repository.
#[derive(Debug)]
pub struct UsersRepository {
    path: PathBuf,
    initial_buckets: u32,
    lock: Mutex<()>,
}

impl UsersRepository {
    /// Repository over the table at `path`.
    pub fn new(path: impl AsRef<Path>, initial_buckets: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            initial_buckets,
            lock: Mutex::new(()),
        }
    }

    /// Repository over the users table of `config`.
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.users_path(), config.user_buckets)
    }

    /// Path of the users table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the users table, creating its directory if needed.
    pub fn open(&self) -> Result<UserTable> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(DiskHashTable::open(
            &self.path,
            self.initial_buckets,
            FixedStringCodec::new(USERNAME_BYTES),
            I32Codec,
            PolyStringHash,
        )?)
    }

    /// User named `username`, if any. Blank names are never found.
    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        if !is_storable(username) {
            return Ok(None);
        }

        let _guard = self.lock.lock();
        let table = self.open()?;
        let hash = table.get(&username.to_string())?;
        table.close()?;
        Ok(hash.map(|password_hash| User::new(username, password_hash)))
    }

    /// Create `user` unless the name is taken. Returns whether it was created.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidField`] for blank usernames and names
    /// that do not fit the 32-byte key.
    pub fn create_user(&self, user: &User) -> Result<bool> {
        validate_username(&user.username)?;

        let _guard = self.lock.lock();
        let mut table = self.open()?;
        let created = table.put_if_absent(user.username.clone(), user.password_hash)?;
        table.close()?;

        if created {
            debug!("Created user {} in {}", user.username, self.path.display());
        }
        Ok(created)
    }

    /// Delete `username`. Returns whether a user was removed.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        if !is_storable(username) {
            return Ok(false);
        }

        let _guard = self.lock.lock();
        let mut table = self.open()?;
        let removed = table.remove(&username.to_string())?;
        table.close()?;
        Ok(removed.is_some())
    }

    /// Replace the password hash of an existing user. Returns `false` if the
    /// user does not exist.
    pub fn update_password(&self, username: &str, password_hash: i32) -> Result<bool> {
        if !is_storable(username) {
            return Ok(false);
        }

        let _guard = self.lock.lock();
        let mut table = self.open()?;
        let key = username.to_string();
        let updated = if table.contains_key(&key)? {
            table.put(key, password_hash)?;
            true
        } else {
            false
        };
        table.close()?;
        Ok(updated)
    }
}

/// Non-blank and round-trips through the key codec unchanged.
fn is_storable(username: &str) -> bool {
    !username.trim().is_empty() && FixedStringCodec::new(USERNAME_BYTES).fits(username)
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(CatalogError::InvalidField {
            field: "username",
            reason: "must not be blank".to_string(),
        });
    }
    if !FixedStringCodec::new(USERNAME_BYTES).fits(username) {
        return Err(CatalogError::InvalidField {
            field: "username",
            reason: format!("must be at most {USERNAME_BYTES} bytes without NUL"),
        });
    }
    Ok(())
}

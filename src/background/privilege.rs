//! Temporary write access to root-owned files
//!
//! The GDM stylesheet belongs to root. To edit it, the file is made writable
//! and handed to the invoking user through the elevation command (`pkexec` by
//! default), then given back to its original owner with its original mode.

use std::fmt;
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{AccessFlags, Uid, User};

use crate::common::runner::CommandRunner;
use crate::common::shell::command_line;
use crate::ui::prelude::*;

use super::error::BackgroundError;

/// A user account, identified by uid
#[derive(Debug, Clone, Eq)]
pub struct Principal {
    pub uid: u32,
    pub name: Option<String>,
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Principal {
    pub fn from_uid(uid: u32) -> Self {
        let name = User::from_uid(Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|user| user.name);
        Self { uid, name }
    }

    /// The real user running this process
    pub fn current() -> Self {
        Self::from_uid(Uid::current().as_raw())
    }

    /// Argument for `chown`: the account name, or the numeric uid if unknown
    pub fn chown_spec(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.uid.to_string())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "uid {}", self.uid),
        }
    }
}

/// Ownership and permission queries on files
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
    /// Whether this process may write to `path` right now
    fn is_writable(&self, path: &Path) -> bool;
    fn owner(&self, path: &Path) -> io::Result<Principal>;
    /// Permission bits (`0o7777` mask)
    fn mode(&self, path: &Path) -> io::Result<u32>;
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileProbe;

impl FileProbe for SystemFileProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_writable(&self, path: &Path) -> bool {
        nix::unistd::access(path, AccessFlags::W_OK).is_ok()
    }

    fn owner(&self, path: &Path) -> io::Result<Principal> {
        Ok(Principal::from_uid(std::fs::metadata(path)?.uid()))
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        Ok(std::fs::metadata(path)?.permissions().mode() & 0o7777)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }
}

/// State captured before a file was made writable, needed to undo it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritableGrant {
    pub path: PathBuf,
    pub original_owner: Principal,
    pub original_mode: u32,
    /// The user the file was handed to
    pub holder: Principal,
    /// False when the file was writable already and nothing was changed
    pub escalated: bool,
}

pub struct PrivilegedAccess<'a> {
    runner: &'a dyn CommandRunner,
    probe: &'a dyn FileProbe,
    elevation_command: &'a str,
}

impl<'a> PrivilegedAccess<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        probe: &'a dyn FileProbe,
        elevation_command: &'a str,
    ) -> Self {
        Self {
            runner,
            probe,
            elevation_command,
        }
    }

    /// Make `path` writable by `invoking_user`.
    ///
    /// Returns the grant holding the original owner. Nothing is elevated when
    /// the file is writable already. If any step after `chmod` fails, the
    /// file's mode and owner are put back before the error is returned.
    pub fn ensure_writable(
        &self,
        path: &Path,
        invoking_user: &Principal,
    ) -> Result<WritableGrant, BackgroundError> {
        if !self.probe.exists(path) {
            return Err(BackgroundError::NotFound(path.to_path_buf()));
        }

        let original_owner = self
            .probe
            .owner(path)
            .map_err(|e| BackgroundError::io(format!("reading owner of {}", path.display()), e))?;
        let original_mode = self
            .probe
            .mode(path)
            .map_err(|e| BackgroundError::io(format!("reading mode of {}", path.display()), e))?;

        let mut grant = WritableGrant {
            path: path.to_path_buf(),
            original_owner,
            original_mode,
            holder: invoking_user.clone(),
            escalated: false,
        };

        if self.probe.is_writable(path) {
            emit(
                Level::Debug,
                "privilege.not_needed",
                &format!("{} is already writable", path.display()),
                None,
            );
            return Ok(grant);
        }

        let path_arg = path.to_string_lossy().to_string();
        if !self.elevated(&["chmod", "+w", path_arg.as_str()])? {
            return Err(BackgroundError::permission("chmod denied"));
        }
        grant.escalated = true;

        if let Err(err) = self.take_ownership(&grant, &path_arg) {
            self.rollback(&grant);
            return Err(err);
        }

        emit(
            Level::Debug,
            "privilege.granted",
            &format!(
                "{} temporarily owned by {} (was {}, mode {:o})",
                path.display(),
                grant.holder,
                grant.original_owner,
                grant.original_mode
            ),
            None,
        );
        Ok(grant)
    }

    fn take_ownership(&self, grant: &WritableGrant, path_arg: &str) -> Result<(), BackgroundError> {
        let holder = grant.holder.chown_spec();
        if !self.elevated(&["chown", holder.as_str(), path_arg])? {
            return Err(BackgroundError::permission("chown denied"));
        }

        let new_owner = self.probe.owner(&grant.path).map_err(|e| {
            BackgroundError::io(format!("reading owner of {}", grant.path.display()), e)
        })?;
        if new_owner != grant.holder {
            return Err(BackgroundError::permission("chown verification failed"));
        }

        if !self.probe.is_writable(&grant.path) {
            return Err(BackgroundError::permission("file remains read-only"));
        }
        Ok(())
    }

    /// Give the file back its original mode and owner.
    pub fn restore(&self, grant: &WritableGrant) -> Result<(), BackgroundError> {
        if !grant.escalated {
            return Ok(());
        }
        let path_arg = grant.path.to_string_lossy().to_string();

        let owner = self.probe.owner(&grant.path).map_err(|e| {
            BackgroundError::io(format!("reading owner of {}", grant.path.display()), e)
        })?;
        let mode = self.probe.mode(&grant.path).map_err(|e| {
            BackgroundError::io(format!("reading mode of {}", grant.path.display()), e)
        })?;

        if mode != grant.original_mode {
            // while we own the file no elevation is needed for chmod
            let direct = owner == grant.holder
                && self.probe.set_mode(&grant.path, grant.original_mode).is_ok();
            if !direct {
                let mode_arg = format!("{:o}", grant.original_mode);
                if !self.elevated(&["chmod", mode_arg.as_str(), path_arg.as_str()])? {
                    return Err(BackgroundError::permission("mode restore denied"));
                }
            }
        }

        if owner != grant.original_owner {
            let original = grant.original_owner.chown_spec();
            if !self.elevated(&["chown", original.as_str(), path_arg.as_str()])? {
                return Err(BackgroundError::permission("chown back denied"));
            }
            let restored = self.probe.owner(&grant.path).map_err(|e| {
                BackgroundError::io(format!("reading owner of {}", grant.path.display()), e)
            })?;
            if restored != grant.original_owner {
                return Err(BackgroundError::permission("ownership restore failed"));
            }
        }

        emit(
            Level::Debug,
            "privilege.restored",
            &format!(
                "{} returned to {} with mode {:o}",
                grant.path.display(),
                grant.original_owner,
                grant.original_mode
            ),
            None,
        );
        Ok(())
    }

    /// Make `path` writable and return a guard that undoes it.
    pub fn acquire<'g>(
        &'g self,
        path: &Path,
        invoking_user: &Principal,
    ) -> Result<AccessGuard<'g, 'a>, BackgroundError> {
        let grant = self.ensure_writable(path, invoking_user)?;
        Ok(AccessGuard {
            access: self,
            grant: Some(grant),
        })
    }

    fn rollback(&self, grant: &WritableGrant) {
        if let Err(err) = self.restore(grant) {
            emit(
                Level::Warn,
                "privilege.rollback_failed",
                &format!(
                    "{} Could not undo permission changes on {}: {err}",
                    char::from(NerdFont::Warning),
                    grant.path.display()
                ),
                None,
            );
        }
    }

    /// Run `args` through the elevation command. Ok(false) means it exited non-zero.
    fn elevated(&self, args: &[&str]) -> Result<bool, BackgroundError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = self
            .runner
            .run(self.elevation_command, &args)
            .map_err(|e| BackgroundError::ExternalCommand {
                command: command_line(self.elevation_command, &args),
                reason: e.to_string(),
            })?;

        if !output.succeeded() {
            emit(
                Level::Debug,
                "privilege.denied",
                &format!(
                    "`{}` failed: {}",
                    command_line(self.elevation_command, &args),
                    output.failure_reason()
                ),
                None,
            );
        }
        Ok(output.succeeded())
    }
}

/// Scoped write access. Dropping an unreleased guard restores the file.
pub struct AccessGuard<'g, 'a> {
    access: &'g PrivilegedAccess<'a>,
    grant: Option<WritableGrant>,
}

impl AccessGuard<'_, '_> {
    pub fn grant(&self) -> Option<&WritableGrant> {
        self.grant.as_ref()
    }

    /// Restore ownership now and report the outcome.
    pub fn release(mut self) -> Result<(), BackgroundError> {
        match self.grant.take() {
            Some(grant) => self.access.restore(&grant),
            None => Ok(()),
        }
    }
}

impl Drop for AccessGuard<'_, '_> {
    fn drop(&mut self) {
        if let Some(grant) = self.grant.take() {
            self.access.rollback(&grant);
        }
    }
}

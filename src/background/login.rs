//! GDM login screen background
//!
//! Setting the login background edits the `#lockDialogGroup` rule of the
//! gnome-shell GDM stylesheet. The sequence is strictly linear:
//!
//! `Start → Backup → Elevate → Read → Parse → Rewrite → Write → RestoreOwner → Done`
//!
//! A failure at any stage stops the sequence. Once elevation succeeded the
//! original owner is restored on every path out, including failures.

use std::fs;
use std::path::{Path, PathBuf};

use strum_macros::Display;
use thiserror::Error;

use crate::ui::prelude::*;

use super::backup;
use super::error::BackgroundError;
use super::options::LoginSizing;
use super::privilege::{Principal, PrivilegedAccess};
use super::selection::ImageSelection;
use super::stylesheet::{self, SerializeOptions, Stylesheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoginStage {
    Start,
    Backup,
    Elevate,
    Read,
    Parse,
    Rewrite,
    Write,
    RestoreOwner,
    Done,
}

/// A login background operation that stopped at `stage`
#[derive(Debug, Error)]
#[error("{error} (during {stage})")]
pub struct StageError {
    pub stage: LoginStage,
    #[source]
    pub error: BackgroundError,
    /// Set when giving the file back to its owner failed as well
    pub cleanup: Option<BackgroundError>,
}

/// What a completed login background change did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReport {
    pub backup: PathBuf,
    pub rule: String,
    pub escalated: bool,
}

pub struct LoginBackground<'a> {
    pub stylesheet: &'a Path,
    pub selector: &'a str,
    /// Directory receiving `<stylesheet>.bak`
    pub home: &'a Path,
    pub access: PrivilegedAccess<'a>,
    pub invoking_user: Principal,
    pub serialize: SerializeOptions,
}

struct Tracker {
    stage: LoginStage,
}

impl Tracker {
    fn new() -> Self {
        emit(Level::Debug, "login.stage", "login: Start", None);
        Self {
            stage: LoginStage::Start,
        }
    }

    fn enter(&mut self, stage: LoginStage) {
        emit(
            Level::Debug,
            "login.stage",
            &format!("login: {} → {}", self.stage, stage),
            None,
        );
        self.stage = stage;
    }

    fn fail(&self, error: BackgroundError) -> StageError {
        StageError {
            stage: self.stage,
            error,
            cleanup: None,
        }
    }
}

impl LoginBackground<'_> {
    /// Make `image` the login screen background.
    pub fn apply(
        &self,
        image: &ImageSelection,
        sizing: LoginSizing,
    ) -> Result<LoginReport, StageError> {
        let mut tracker = Tracker::new();

        tracker.enter(LoginStage::Backup);
        let backup = backup::backup(self.stylesheet, self.home).map_err(|e| tracker.fail(e))?;

        tracker.enter(LoginStage::Elevate);
        let guard = self
            .access
            .acquire(self.stylesheet, &self.invoking_user)
            .map_err(|e| tracker.fail(e))?;
        let escalated = guard.grant().is_some_and(|g| g.escalated);

        let declarations = stylesheet::login_declarations(image, sizing);
        let edited = self.edit(&mut tracker, &declarations);

        let failed_at = tracker.stage;
        if edited.is_ok() {
            tracker.enter(LoginStage::RestoreOwner);
        }
        let released = guard.release();

        let rule = match (edited, released) {
            (Ok(rule), Ok(())) => rule,
            (Ok(_), Err(e)) => return Err(tracker.fail(e)),
            (Err(e), restore) => {
                return Err(StageError {
                    stage: failed_at,
                    error: e,
                    cleanup: restore.err(),
                });
            }
        };

        tracker.enter(LoginStage::Done);
        Ok(LoginReport {
            backup,
            rule,
            escalated,
        })
    }

    fn edit(&self, tracker: &mut Tracker, declarations: &str) -> Result<String, BackgroundError> {
        tracker.enter(LoginStage::Read);
        let contents = read(self.stylesheet)?;

        tracker.enter(LoginStage::Parse);
        let mut sheet = Stylesheet::parse(&contents)?;

        tracker.enter(LoginStage::Rewrite);
        let rewrite = sheet.rewrite(self.selector, declarations, self.serialize)?;

        tracker.enter(LoginStage::Write);
        write(self.stylesheet, &rewrite.text)?;
        Ok(rewrite.rule)
    }

    /// Compute the rule `apply` would write, without touching any file.
    pub fn preview(
        &self,
        image: &ImageSelection,
        sizing: LoginSizing,
    ) -> Result<String, BackgroundError> {
        let contents = read(self.stylesheet)?;
        let declarations = stylesheet::login_declarations(image, sizing);
        Ok(stylesheet::rewrite_rule(&contents, self.selector, &declarations, self.serialize)?.rule)
    }

    /// Put the backed up stylesheet back in place.
    ///
    /// The backup file itself is left as it is.
    pub fn restore_from_backup(&self) -> Result<PathBuf, StageError> {
        let mut tracker = Tracker::new();

        tracker.enter(LoginStage::Read);
        let backup = backup::backup_path(self.stylesheet, self.home).map_err(|e| tracker.fail(e))?;
        if !backup.is_file() {
            return Err(tracker.fail(BackgroundError::NotFound(backup)));
        }
        let contents = read(&backup).map_err(|e| tracker.fail(e))?;

        tracker.enter(LoginStage::Elevate);
        let guard = self
            .access
            .acquire(self.stylesheet, &self.invoking_user)
            .map_err(|e| tracker.fail(e))?;

        tracker.enter(LoginStage::Write);
        let written = write(self.stylesheet, &contents);

        if let Err(e) = written {
            let cleanup = guard.release().err();
            return Err(StageError {
                stage: LoginStage::Write,
                error: e,
                cleanup,
            });
        }

        tracker.enter(LoginStage::RestoreOwner);
        guard.release().map_err(|e| tracker.fail(e))?;

        tracker.enter(LoginStage::Done);
        Ok(backup)
    }
}

fn read(path: &Path) -> Result<String, BackgroundError> {
    fs::read_to_string(path)
        .map_err(|e| BackgroundError::io(format!("reading {}", path.display()), e))
}

fn write(path: &Path, contents: &str) -> Result<(), BackgroundError> {
    fs::write(path, contents)
        .map_err(|e| BackgroundError::io(format!("writing {}", path.display()), e))
}

//! Application state shared by the front end and the three operations
//!
//! The front end only edits this state (selected image, chosen options) and
//! asks for an [`Operation`] to be dispatched; it never calls into the
//! settings or stylesheet code itself.

use std::path::PathBuf;

use strum_macros::Display;
use thiserror::Error;

use crate::common::runner::CommandRunner;

use super::config::BackgrounderConfig;
use super::error::BackgroundError;
use super::login::{LoginBackground, StageError};
use super::options::{LoginSizing, PictureOption};
use super::privilege::{FileProbe, Principal, PrivilegedAccess};
use super::selection::ImageSelection;
use super::settings::{self, SettingInvoker};
use super::stylesheet::SerializeOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operation {
    #[strum(serialize = "desktop wallpaper")]
    Wallpaper,
    #[strum(serialize = "lock screen background")]
    LockScreen,
    #[strum(serialize = "login screen background")]
    LoginBackground,
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Background(#[from] BackgroundError),
    #[error(transparent)]
    Login(#[from] StageError),
}

#[derive(Debug)]
pub struct OperationResult {
    pub operation: Operation,
    /// Summary of what changed, or why nothing did
    pub outcome: Result<String, OperationError>,
}

/// Everything an operation needs from the outside world
pub struct Services<'a> {
    pub runner: &'a dyn CommandRunner,
    pub probe: &'a dyn FileProbe,
    pub config: &'a BackgrounderConfig,
    pub home: PathBuf,
    pub user: Principal,
}

impl Services<'_> {
    pub fn settings(&self) -> SettingInvoker<'_> {
        SettingInvoker::new(self.runner)
    }

    pub fn login(&self) -> LoginBackground<'_> {
        LoginBackground {
            stylesheet: &self.config.stylesheet,
            selector: &self.config.selector,
            home: &self.home,
            access: PrivilegedAccess::new(
                self.runner,
                self.probe,
                &self.config.elevation_command,
            ),
            invoking_user: self.user.clone(),
            serialize: SerializeOptions {
                rgb_as_hex: self.config.normalize_colors,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub selection: Option<ImageSelection>,
    pub wallpaper_option: PictureOption,
    pub lock_screen_option: PictureOption,
    pub login_sizing: LoginSizing,
    in_flight: Option<Operation>,
    last_result: Option<OperationResult>,
}

impl AppState {
    pub fn from_config(config: &BackgrounderConfig) -> Self {
        Self {
            wallpaper_option: config.wallpaper_option,
            lock_screen_option: config.lock_screen_option,
            login_sizing: config.login_sizing,
            ..Self::default()
        }
    }

    pub fn select(&mut self, image: ImageSelection) {
        self.selection = Some(image);
    }

    /// Whether a new operation may start: an image is selected and nothing is running
    pub fn can_start(&self) -> bool {
        self.selection.is_some() && self.in_flight.is_none()
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    pub fn last_result(&self) -> Option<&OperationResult> {
        self.last_result.as_ref()
    }

    /// Mark `operation` as running. Only one operation may run at a time.
    pub fn begin(&mut self, operation: Operation) -> Result<ImageSelection, BackgroundError> {
        if let Some(running) = self.in_flight {
            return Err(BackgroundError::Busy(running));
        }
        let image = self.selection.clone().ok_or(BackgroundError::NoSelection)?;
        self.in_flight = Some(operation);
        Ok(image)
    }

    pub fn finish(&mut self, result: OperationResult) -> &OperationResult {
        self.in_flight = None;
        self.last_result.insert(result)
    }

    /// Run `operation` on the selected image and record its result.
    pub fn dispatch(&mut self, operation: Operation, services: &Services<'_>) -> &OperationResult {
        let outcome = match self.begin(operation) {
            Ok(image) => self.run(operation, &image, services),
            Err(e) => Err(e.into()),
        };
        self.finish(OperationResult { operation, outcome })
    }

    fn run(
        &self,
        operation: Operation,
        image: &ImageSelection,
        services: &Services<'_>,
    ) -> Result<String, OperationError> {
        match operation {
            Operation::Wallpaper => {
                let option = self.wallpaper_option;
                settings::set_wallpaper(&services.settings(), image, option)?;
                Ok(format!("Desktop wallpaper set to {image} ({option})"))
            }
            Operation::LockScreen => {
                let option = self.lock_screen_option;
                settings::set_lock_screen(&services.settings(), image, option)?;
                Ok(format!("Lock screen background set to {image} ({option})"))
            }
            Operation::LoginBackground => {
                let sizing = self.login_sizing;
                let report = services.login().apply(image, sizing)?;
                Ok(format!(
                    "Login screen background set to {image} ({sizing}); previous stylesheet saved to {}",
                    report.backup.display()
                ))
            }
        }
    }
}

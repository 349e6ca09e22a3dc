//! Desktop and lock screen pictures through `gsettings`

use crate::common::runner::CommandRunner;
use crate::common::shell::command_line;
use crate::ui::prelude::*;

use super::error::BackgroundError;
use super::options::PictureOption;
use super::selection::ImageSelection;

const GSETTINGS: &str = "gsettings";

/// A GSettings schema/key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingKey {
    pub schema: &'static str,
    pub key: &'static str,
}

pub const BACKGROUND_PICTURE_URI: SettingKey = SettingKey {
    schema: "org.gnome.desktop.background",
    key: "picture-uri",
};

pub const BACKGROUND_PICTURE_OPTIONS: SettingKey = SettingKey {
    schema: "org.gnome.desktop.background",
    key: "picture-options",
};

pub const SCREENSAVER_PICTURE_URI: SettingKey = SettingKey {
    schema: "org.gnome.desktop.screensaver",
    key: "picture-uri",
};

/// Issues `gsettings` invocations and turns their exit status into a result
pub struct SettingInvoker<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SettingInvoker<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Set `key` to `value`, blocking until gsettings exits.
    pub fn apply(&self, key: SettingKey, value: &str) -> Result<(), BackgroundError> {
        let args = vec![
            "set".to_string(),
            key.schema.to_string(),
            key.key.to_string(),
            value.to_string(),
        ];
        self.invoke(&args).map(|_| ())
    }

    /// Read the current value of `key`, with GVariant string quotes removed.
    pub fn get(&self, key: SettingKey) -> Result<String, BackgroundError> {
        let args = vec![
            "get".to_string(),
            key.schema.to_string(),
            key.key.to_string(),
        ];
        let stdout = self.invoke(&args)?;
        Ok(stdout
            .trim()
            .trim_matches('\'')
            .trim_matches('"')
            .to_string())
    }

    fn invoke(&self, args: &[String]) -> Result<String, BackgroundError> {
        let command = command_line(GSETTINGS, args);
        let output =
            self.runner
                .run(GSETTINGS, args)
                .map_err(|e| BackgroundError::ExternalCommand {
                    command: command.clone(),
                    reason: e.to_string(),
                })?;

        if !output.succeeded() {
            return Err(BackgroundError::ExternalCommand {
                command,
                reason: output.failure_reason(),
            });
        }
        Ok(output.stdout)
    }
}

/// Point the desktop background at `image`, then set its scaling.
///
/// The options are not touched if setting the picture fails. A failure of
/// the second call leaves the new picture in place.
pub fn set_wallpaper(
    invoker: &SettingInvoker<'_>,
    image: &ImageSelection,
    option: PictureOption,
) -> Result<(), BackgroundError> {
    invoker.apply(BACKGROUND_PICTURE_URI, &image.file_uri())?;
    invoker.apply(BACKGROUND_PICTURE_OPTIONS, &option.to_string())?;

    emit(
        Level::Debug,
        "wallpaper.applied",
        &format!("Desktop background set to {image} ({option})"),
        None,
    );
    Ok(())
}

/// Point the lock screen at `image`.
///
/// GNOME has no separate scaling key for the screensaver, so `option` is
/// written to the desktop background's `picture-options`.
pub fn set_lock_screen(
    invoker: &SettingInvoker<'_>,
    image: &ImageSelection,
    option: PictureOption,
) -> Result<(), BackgroundError> {
    invoker.apply(SCREENSAVER_PICTURE_URI, &image.file_uri())?;
    invoker.apply(BACKGROUND_PICTURE_OPTIONS, &option.to_string())?;

    emit(
        Level::Debug,
        "lockscreen.applied",
        &format!("Lock screen background set to {image} ({option})"),
        None,
    );
    Ok(())
}

//! Graphical image chooser backed by `zenity --file-selection`

use std::path::PathBuf;

use which::which;

use crate::common::runner::CommandRunner;
use crate::ui::prelude::*;

use super::error::BackgroundError;
use super::selection::ImageSelection;

const ZENITY: &str = "zenity";

const IMAGE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.webp", "*.gif", "*.bmp", "*.svg", "*.tif", "*.tiff",
];

#[derive(Debug)]
pub enum PickResult {
    Selected(ImageSelection),
    Cancelled,
}

pub struct ImagePicker {
    title: String,
    start_dir: Option<PathBuf>,
}

impl Default for ImagePicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePicker {
    pub fn new() -> Self {
        Self {
            title: "Choose a background image".to_string(),
            start_dir: None,
        }
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn start_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.start_dir = Some(dir.into());
        self
    }

    /// Fail early with an install hint when zenity is not on PATH
    pub fn ensure_available() -> Result<(), BackgroundError> {
        which(ZENITY).map(|_| ()).map_err(|_| BackgroundError::ExternalCommand {
            command: ZENITY.to_string(),
            reason: "`zenity` was not found; install it or pass an image path".to_string(),
        })
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--file-selection".to_string(),
            format!("--title={}", self.title),
            format!("--file-filter=Images | {}", IMAGE_PATTERNS.join(" ")),
            "--file-filter=All files | *".to_string(),
        ];
        if let Some(dir) = &self.start_dir {
            // trailing slash opens the directory instead of preselecting it
            args.push(format!("--filename={}/", dir.display()));
        }
        args
    }

    pub fn pick(&self, runner: &dyn CommandRunner) -> Result<PickResult, BackgroundError> {
        let args = self.args();
        let output = runner
            .run(ZENITY, &args)
            .map_err(|e| BackgroundError::ExternalCommand {
                command: ZENITY.to_string(),
                reason: e.to_string(),
            })?;

        match output.code {
            Some(0) => {}
            // closed or cancelled
            Some(1) => return Ok(PickResult::Cancelled),
            _ => {
                return Err(BackgroundError::ExternalCommand {
                    command: ZENITY.to_string(),
                    reason: output.failure_reason(),
                });
            }
        }

        let chosen = output.stdout.trim_end_matches(['\n', '\r']);
        if chosen.is_empty() {
            return Ok(PickResult::Cancelled);
        }

        emit(
            Level::Debug,
            "picker.selected",
            &format!("Picked {chosen}"),
            None,
        );
        ImageSelection::new(chosen).map(PickResult::Selected)
    }
}

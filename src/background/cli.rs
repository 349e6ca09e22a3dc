use std::path::PathBuf;

use clap::{Args, Subcommand};

use super::options::{LoginSizing, PictureOption};

#[derive(Subcommand, Debug, Clone)]
pub enum BackgroundCommands {
    /// Set the desktop wallpaper
    Wallpaper(SettingArgs),
    /// Set the lock screen background
    LockScreen(SettingArgs),
    /// Set the GDM login screen background (asks for administrator rights)
    Login(LoginArgs),
    /// Put the stylesheet backup from the home directory back in place
    RestoreLogin(RestoreArgs),
    /// Show the current backgrounds
    Status,
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Image to use; opens a file chooser when omitted
    pub image: Option<PathBuf>,
    /// Open the file chooser, starting next to IMAGE when one is given
    #[arg(long)]
    pub pick: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SettingArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// How the image is fitted to the screen
    #[arg(short, long, value_enum)]
    pub option: Option<PictureOption>,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[command(flatten)]
    pub image: ImageArgs,
    /// How the image is fitted to the login screen
    #[arg(short, long, value_enum)]
    pub sizing: Option<LoginSizing>,
    /// Stylesheet to edit instead of the configured one
    #[arg(long)]
    pub stylesheet: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Stylesheet to restore instead of the configured one
    #[arg(long)]
    pub stylesheet: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the location of the configuration file
    Path,
    /// Write the effective configuration to the configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

//! Display options understood by GNOME and by the GDM stylesheet

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Values of `org.gnome.desktop.background picture-options`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PictureOption {
    None,
    Wallpaper,
    Centered,
    Scaled,
    Stretched,
    #[default]
    Zoom,
    Spanned,
}

/// Values of the CSS `background-size` used for the login screen
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoginSizing {
    Contain,
    #[default]
    Cover,
}

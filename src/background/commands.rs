use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde_json::json;
use sudo::RunningAs;

use crate::common::paths;
use crate::common::runner::{CommandRunner, DryRunRunner, SystemCommandRunner};
use crate::common::shell::command_line;
use crate::ui::prelude::*;

use super::backup;
use super::cli::{BackgroundCommands, ConfigCommands, ImageArgs, LoginArgs, RestoreArgs, SettingArgs};
use super::config::BackgrounderConfig;
use super::login::StageError;
use super::picker::{ImagePicker, PickResult};
use super::privilege::{FileProbe, Principal, SystemFileProbe};
use super::selection::ImageSelection;
use super::settings::{
    BACKGROUND_PICTURE_OPTIONS, BACKGROUND_PICTURE_URI, SCREENSAVER_PICTURE_URI, SettingInvoker,
    SettingKey,
};
use super::state::{AppState, Operation, OperationError, OperationResult, Services};
use super::stylesheet::Stylesheet;

pub fn handle_background_command(command: BackgroundCommands, dry_run: bool) -> Result<()> {
    let config = BackgrounderConfig::load()?;

    match command {
        BackgroundCommands::Wallpaper(args) => {
            handle_setting(Operation::Wallpaper, args, config, dry_run)
        }
        BackgroundCommands::LockScreen(args) => {
            handle_setting(Operation::LockScreen, args, config, dry_run)
        }
        BackgroundCommands::Login(args) => handle_login(args, config, dry_run),
        BackgroundCommands::RestoreLogin(args) => handle_restore(args, config, dry_run),
        BackgroundCommands::Status => handle_status(&config),
        BackgroundCommands::Config { command } => handle_config(command, &config),
    }
}

fn ensure_not_root() -> Result<()> {
    if matches!(sudo::check(), RunningAs::Root) {
        bail!(
            "backgrounder changes the backgrounds of the user running it; run it as yourself, it asks for administrator rights when needed"
        );
    }
    Ok(())
}

fn runner_for(dry_run: bool) -> Box<dyn CommandRunner> {
    if dry_run {
        Box::new(DryRunRunner)
    } else {
        Box::new(SystemCommandRunner)
    }
}

fn services<'a>(
    runner: &'a dyn CommandRunner,
    probe: &'a dyn FileProbe,
    config: &'a BackgrounderConfig,
) -> Result<Services<'a>> {
    Ok(Services {
        runner,
        probe,
        config,
        home: paths::home_dir()?,
        user: Principal::current(),
    })
}

/// Resolve the image from the arguments, asking through the file chooser
/// when none was given. `None` means the chooser was cancelled.
fn choose_image(args: &ImageArgs, title: &str) -> Result<Option<ImageSelection>> {
    if let (Some(path), false) = (&args.image, args.pick) {
        return Ok(Some(ImageSelection::new(path)?));
    }

    ImagePicker::ensure_available()?;
    let start = args
        .image
        .as_deref()
        .map(chooser_start)
        .or_else(dirs::picture_dir)
        .or_else(dirs::home_dir);

    let mut picker = ImagePicker::new().title(title);
    if let Some(dir) = start {
        picker = picker.start_dir(dir);
    }

    match picker.pick(&SystemCommandRunner)? {
        PickResult::Selected(image) => Ok(Some(image)),
        PickResult::Cancelled => {
            emit(
                Level::Info,
                "picker.cancelled",
                &format!(
                    "{} No image selected, nothing changed.",
                    char::from(NerdFont::Info)
                ),
                None,
            );
            Ok(None)
        }
    }
}

fn chooser_start(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn event_prefix(operation: Operation) -> &'static str {
    match operation {
        Operation::Wallpaper => "wallpaper",
        Operation::LockScreen => "lock_screen",
        Operation::LoginBackground => "login",
    }
}

fn report(result: &OperationResult) -> Result<()> {
    let prefix = event_prefix(result.operation);
    match &result.outcome {
        Ok(message) => {
            let icon = match result.operation {
                Operation::Wallpaper => NerdFont::Desktop,
                Operation::LockScreen => NerdFont::Lock,
                Operation::LoginBackground => NerdFont::Check,
            };
            emit(
                Level::Success,
                &format!("{prefix}.applied"),
                &format!("{} {message}", char::from(icon)),
                None,
            );
            Ok(())
        }
        Err(OperationError::Login(err)) => {
            report_cleanup(err);
            Err(anyhow!("Failed to set the {}: {err}", result.operation))
        }
        Err(err) => Err(anyhow!("Failed to set the {}: {err}", result.operation)),
    }
}

fn report_cleanup(err: &StageError) {
    if let Some(cleanup) = &err.cleanup {
        emit(
            Level::Warn,
            "login.cleanup_failed",
            &format!(
                "{} The stylesheet's original owner could not be restored: {cleanup}",
                char::from(NerdFont::Warning)
            ),
            None,
        );
    }
}

fn handle_setting(
    operation: Operation,
    args: SettingArgs,
    config: BackgrounderConfig,
    dry_run: bool,
) -> Result<()> {
    if !dry_run {
        ensure_not_root()?;
    }
    let title = match operation {
        Operation::LockScreen => "Choose a lock screen background",
        _ => "Choose a desktop wallpaper",
    };
    let Some(image) = choose_image(&args.image, title)? else {
        return Ok(());
    };

    let mut state = AppState::from_config(&config);
    if let Some(option) = args.option {
        match operation {
            Operation::LockScreen => state.lock_screen_option = option,
            _ => state.wallpaper_option = option,
        }
    }
    state.select(image);

    let runner = runner_for(dry_run);
    let probe = SystemFileProbe;
    let services = services(runner.as_ref(), &probe, &config)?;
    report(state.dispatch(operation, &services))
}

fn handle_login(args: LoginArgs, mut config: BackgrounderConfig, dry_run: bool) -> Result<()> {
    if !dry_run {
        ensure_not_root()?;
    }
    if let Some(stylesheet) = args.stylesheet {
        config.stylesheet = stylesheet;
    }
    let Some(image) = choose_image(&args.image, "Choose a login screen background")? else {
        return Ok(());
    };

    let mut state = AppState::from_config(&config);
    if let Some(sizing) = args.sizing {
        state.login_sizing = sizing;
    }

    let runner = runner_for(dry_run);
    let probe = SystemFileProbe;
    let services = services(runner.as_ref(), &probe, &config)?;

    if dry_run {
        return preview_login(&services, &image, &state);
    }

    state.select(image);
    report(state.dispatch(Operation::LoginBackground, &services))
}

fn preview_login(services: &Services<'_>, image: &ImageSelection, state: &AppState) -> Result<()> {
    let config = services.config;
    let stylesheet = &config.stylesheet;
    let rule = services.login().preview(image, state.login_sizing)?;
    let backup = backup::backup_path(stylesheet, &services.home)?;

    let mut steps = vec![format!(
        "copy {} to {}",
        stylesheet.display(),
        backup.display()
    )];
    let writable = services.probe.is_writable(stylesheet);
    let path_arg = stylesheet.to_string_lossy().into_owned();
    if !writable {
        steps.push(command_line(
            &config.elevation_command,
            &["chmod", "+w", path_arg.as_str()],
        ));
        steps.push(command_line(
            &config.elevation_command,
            &["chown", services.user.chown_spec().as_str(), path_arg.as_str()],
        ));
    }
    steps.push(format!("rewrite the '{}' rule", config.selector));
    if !writable {
        steps.push("restore the stylesheet's original mode and owner".to_string());
    }

    emit(
        Level::Info,
        "login.preview",
        &format!(
            "{} [dry run] {} would become:\n  {rule}",
            char::from(NerdFont::Image),
            stylesheet.display()
        ),
        Some(json!({ "stylesheet": stylesheet, "rule": rule, "steps": steps })),
    );
    for (index, step) in steps.iter().enumerate() {
        emit(
            Level::Info,
            "login.preview.step",
            &format!("  {}. {step}", index + 1),
            None,
        );
    }
    Ok(())
}

fn handle_restore(args: RestoreArgs, mut config: BackgrounderConfig, dry_run: bool) -> Result<()> {
    if !dry_run {
        ensure_not_root()?;
    }
    if let Some(stylesheet) = args.stylesheet {
        config.stylesheet = stylesheet;
    }

    let runner = runner_for(dry_run);
    let probe = SystemFileProbe;
    let services = services(runner.as_ref(), &probe, &config)?;

    if dry_run {
        let backup = backup::backup_path(&config.stylesheet, &services.home)?;
        emit(
            Level::Info,
            "login.restore.preview",
            &format!(
                "{} [dry run] would copy {} over {}",
                char::from(NerdFont::Undo),
                backup.display(),
                config.stylesheet.display()
            ),
            None,
        );
        return Ok(());
    }

    match services.login().restore_from_backup() {
        Ok(backup) => {
            emit(
                Level::Success,
                "login.restored",
                &format!(
                    "{} Restored {} from {}",
                    char::from(NerdFont::Undo),
                    config.stylesheet.display(),
                    backup.display()
                ),
                None,
            );
            Ok(())
        }
        Err(err) => {
            report_cleanup(&err);
            Err(anyhow!("Failed to restore the login stylesheet: {err}"))
        }
    }
}

fn handle_status(config: &BackgrounderConfig) -> Result<()> {
    let runner = SystemCommandRunner;
    let invoker = SettingInvoker::new(&runner);

    let keys: [(&str, &str, SettingKey); 3] = [
        ("status.wallpaper", "Wallpaper", BACKGROUND_PICTURE_URI),
        ("status.picture_options", "Picture options", BACKGROUND_PICTURE_OPTIONS),
        ("status.lock_screen", "Lock screen", SCREENSAVER_PICTURE_URI),
    ];
    for (code, label, key) in keys {
        let data = |value: &str| {
            Some(json!({ "schema": key.schema, "key": key.key, "value": value }))
        };
        match invoker.get(key) {
            Ok(value) => emit(
                Level::Info,
                code,
                &format!("{} {label}: {value}", char::from(NerdFont::Desktop)),
                data(&value),
            ),
            Err(err) => emit(
                Level::Warn,
                code,
                &format!("{} {label}: {err}", char::from(NerdFont::Warning)),
                None,
            ),
        }
    }

    match login_rule(config) {
        Ok(rule) => emit(
            Level::Info,
            "status.login",
            &format!("{} Login screen: {rule}", char::from(NerdFont::Lock)),
            Some(json!({ "stylesheet": config.stylesheet, "rule": rule })),
        ),
        Err(err) => emit(
            Level::Warn,
            "status.login",
            &format!("{} Login screen: {err:#}", char::from(NerdFont::Warning)),
            None,
        ),
    }
    Ok(())
}

fn login_rule(config: &BackgrounderConfig) -> Result<String> {
    let contents = fs::read_to_string(&config.stylesheet)
        .with_context(|| format!("reading {}", config.stylesheet.display()))?;
    let sheet = Stylesheet::parse(&contents)?;
    let rule = sheet.find_rule(&config.selector).ok_or_else(|| {
        anyhow!(
            "no '{}' rule in {}",
            config.selector,
            config.stylesheet.display()
        )
    })?;
    Ok(rule.text().to_string())
}

fn handle_config(command: ConfigCommands, config: &BackgrounderConfig) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            if get_output_format() == OutputFormat::Json {
                emit(
                    Level::Info,
                    "config.show",
                    "Effective configuration",
                    Some(serde_json::to_value(config).context("serializing config")?),
                );
            } else {
                print!("{}", config.to_toml()?);
            }
        }
        ConfigCommands::Path => {
            let path = BackgrounderConfig::config_file_path()?;
            emit(
                Level::Info,
                "config.path",
                &format!("{} {}", char::from(NerdFont::Gear), path.display()),
                Some(json!({ "path": path, "exists": path.exists() })),
            );
        }
        ConfigCommands::Init { force } => {
            let path = BackgrounderConfig::config_file_path()?;
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            config.save()?;
            emit(
                Level::Success,
                "config.init",
                &format!(
                    "{} Wrote configuration to {}",
                    char::from(NerdFont::Check),
                    path.display()
                ),
                Some(json!({ "path": path })),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chooser_starts_next_to_a_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("sunset.png");
        fs::write(&image, b"png").unwrap();

        assert_eq!(chooser_start(&image), dir.path());
        assert_eq!(chooser_start(dir.path()), dir.path());
        assert_eq!(chooser_start(Path::new("sunset.png")), PathBuf::from("."));
    }

    #[test]
    fn explicit_image_skips_the_chooser() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("sunset.png");
        fs::write(&image, b"png").unwrap();
        let args = ImageArgs {
            image: Some(image.clone()),
            pick: false,
        };

        let chosen = choose_image(&args, "title").unwrap().unwrap();
        assert_eq!(chosen.path(), image.canonicalize().unwrap());
    }

    #[test]
    fn missing_explicit_image_is_an_error() {
        let args = ImageArgs {
            image: Some(PathBuf::from("/nonexistent/sunset.png")),
            pick: false,
        };
        let err = choose_image(&args, "title").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn login_rule_reports_missing_rule() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("gdm3.css");
        fs::write(&css, "#panel { color: red; }\n").unwrap();
        let config = BackgrounderConfig {
            stylesheet: css,
            ..BackgrounderConfig::default()
        };
        let err = login_rule(&config).unwrap_err();
        assert!(err.to_string().contains("no '#lockDialogGroup' rule"));
    }

    #[test]
    fn login_rule_returns_the_current_rule() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("gdm3.css");
        fs::write(
            &css,
            "#lockDialogGroup { background: #2e3436 url(resource:///noise.png); }\n",
        )
        .unwrap();
        let config = BackgrounderConfig {
            stylesheet: css,
            ..BackgrounderConfig::default()
        };
        assert_eq!(
            login_rule(&config).unwrap(),
            "#lockDialogGroup { background: #2e3436 url(resource:///noise.png); }"
        );
    }
}

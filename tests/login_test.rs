mod common;

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;

use backgrounder::background::login::{LoginBackground, LoginStage};
use backgrounder::background::options::LoginSizing;
use backgrounder::background::privilege::{Principal, PrivilegedAccess, SystemFileProbe};
use backgrounder::background::selection::ImageSelection;
use backgrounder::background::stylesheet::SerializeOptions;
use backgrounder::background::BackgroundError;
use common::{ElevationStub, TestEnvironment, mode, skip_as_root};

const GDM_CSS: &str = "/* GDM theme */
#panel { background-color: rgb(0, 0, 0); }
#lockDialogGroup {
  background: #2e3436 url(resource:///org/gnome/shell/theme/noise-texture.png);
  background-repeat: repeat; }
@media (max-width: 800px) { #lockDialogGroup { background: black; } }
";

fn login<'a>(
    env: &'a TestEnvironment,
    stylesheet: &'a std::path::Path,
    runner: &'a ElevationStub,
    probe: &'a SystemFileProbe,
) -> LoginBackground<'a> {
    LoginBackground {
        stylesheet,
        selector: "#lockDialogGroup",
        home: env.home(),
        access: PrivilegedAccess::new(runner, probe, "pkexec"),
        invoking_user: Principal::current(),
        serialize: SerializeOptions::default(),
    }
}

#[test]
fn writable_stylesheet_is_rewritten_without_elevation() -> Result<()> {
    let env = TestEnvironment::new()?;
    let css = env.stylesheet(GDM_CSS)?;
    let image = ImageSelection::new(env.image("my photo.png")?)?;
    let runner = ElevationStub::new();
    let probe = SystemFileProbe;

    let report = login(&env, &css, &runner, &probe).apply(&image, LoginSizing::Cover)?;

    assert!(!report.escalated);
    assert!(runner.calls().is_empty());
    assert!(report.rule.contains("my%20photo.png"));

    let written = fs::read_to_string(&css)?;
    assert!(written.starts_with("/* GDM theme */\n#panel { background-color: rgb(0, 0, 0); }\n"));
    assert!(written.contains(&report.rule));
    assert!(!written.contains("noise-texture"));
    assert!(written.ends_with(
        "@media (max-width: 800px) { #lockDialogGroup { background: black; } }\n"
    ));
    assert_eq!(fs::read_to_string(&report.backup)?, GDM_CSS);
    Ok(())
}

#[test]
fn read_only_stylesheet_is_unlocked_and_locked_again() -> Result<()> {
    if skip_as_root("read_only_stylesheet_is_unlocked_and_locked_again") {
        return Ok(());
    }
    let env = TestEnvironment::new()?;
    let css = env.stylesheet(GDM_CSS)?;
    fs::set_permissions(&css, fs::Permissions::from_mode(0o444))?;
    let image = ImageSelection::new(env.image("login.png")?)?;
    let runner = ElevationStub::new();
    let probe = SystemFileProbe;

    let report = login(&env, &css, &runner, &probe).apply(&image, LoginSizing::Contain)?;

    assert!(report.escalated);
    let calls = runner.calls();
    assert_eq!(calls[0], format!("pkexec chmod +w {}", css.display()));
    assert!(calls[1].starts_with("pkexec chown "));
    assert!(fs::read_to_string(&css)?.contains("background-size: contain"));
    assert_eq!(mode(&css), 0o444);
    Ok(())
}

#[test]
fn dismissed_elevation_leaves_stylesheet_alone() -> Result<()> {
    if skip_as_root("dismissed_elevation_leaves_stylesheet_alone") {
        return Ok(());
    }
    let env = TestEnvironment::new()?;
    let css = env.stylesheet(GDM_CSS)?;
    fs::set_permissions(&css, fs::Permissions::from_mode(0o444))?;
    let image = ImageSelection::new(env.image("login.png")?)?;
    let runner = ElevationStub::new();
    runner.deny("chmod");
    let probe = SystemFileProbe;

    let err = login(&env, &css, &runner, &probe)
        .apply(&image, LoginSizing::Cover)
        .unwrap_err();

    assert_eq!(err.stage, LoginStage::Elevate);
    assert!(matches!(err.error, BackgroundError::Permission(_)));
    assert_eq!(fs::read_to_string(&css)?, GDM_CSS);
    assert_eq!(mode(&css), 0o444);
    // the backup is taken before asking for rights
    assert!(env.home().join("gdm3.css.bak").is_file());
    Ok(())
}

#[test]
fn missing_rule_is_reported_at_rewrite() -> Result<()> {
    let env = TestEnvironment::new()?;
    let css = env.stylesheet("#panel { color: white; }\n")?;
    let image = ImageSelection::new(env.image("login.png")?)?;
    let runner = ElevationStub::new();
    let probe = SystemFileProbe;

    let err = login(&env, &css, &runner, &probe)
        .apply(&image, LoginSizing::Cover)
        .unwrap_err();

    assert_eq!(err.stage, LoginStage::Rewrite);
    assert!(matches!(err.error, BackgroundError::RuleNotFound(_)));
    assert!(err.cleanup.is_none());
    assert_eq!(fs::read_to_string(&css)?, "#panel { color: white; }\n");
    Ok(())
}

#[test]
fn backup_can_be_put_back() -> Result<()> {
    let env = TestEnvironment::new()?;
    let css = env.stylesheet(GDM_CSS)?;
    let image = ImageSelection::new(env.image("login.png")?)?;
    let runner = ElevationStub::new();
    let probe = SystemFileProbe;
    let login = login(&env, &css, &runner, &probe);

    login.apply(&image, LoginSizing::Cover)?;
    assert_ne!(fs::read_to_string(&css)?, GDM_CSS);

    let backup = login.restore_from_backup()?;
    assert_eq!(fs::read_to_string(&css)?, GDM_CSS);
    assert!(backup.is_file());
    Ok(())
}

#[test]
fn preview_matches_what_apply_writes() -> Result<()> {
    let env = TestEnvironment::new()?;
    let css = env.stylesheet(GDM_CSS)?;
    let image = ImageSelection::new(env.image("login.png")?)?;
    let runner = ElevationStub::new();
    let probe = SystemFileProbe;
    let login = login(&env, &css, &runner, &probe);

    let preview = login.preview(&image, LoginSizing::Cover)?;
    assert_eq!(fs::read_to_string(&css)?, GDM_CSS);
    assert!(!env.home().join("gdm3.css.bak").exists());

    let report = login.apply(&image, LoginSizing::Cover)?;
    assert_eq!(preview, report.rule);
    Ok(())
}

use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use backgrounder::common::runner::{CommandOutput, CommandRunner};
use backgrounder::common::shell::command_line;

/// Throwaway "system" and home directories for one test
pub struct TestEnvironment {
    system: TempDir,
    home: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            system: tempfile::tempdir()?,
            home: tempfile::tempdir()?,
        })
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Where the config file goes when XDG_CONFIG_HOME points at the home dir
    pub fn config_file(&self) -> PathBuf {
        self.home().join("backgrounder").join("config.toml")
    }

    pub fn stylesheet(&self, contents: &str) -> Result<PathBuf> {
        let path = self.system.path().join("gdm3.css");
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn image(&self, name: &str) -> Result<PathBuf> {
        let path = self.home().join(name);
        fs::write(&path, b"\x89PNG")?;
        Ok(path)
    }
}

pub fn mode(path: &Path) -> u32 {
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(0)
}

pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Root can write to any file, so tests of the elevation path have nothing
/// to exercise. Reports the skip on stderr and returns true when running as root.
pub fn skip_as_root(test: &str) -> bool {
    if is_root() {
        eprintln!("skipped {test}: running as root, the elevation path is not taken");
        return true;
    }
    false
}

/// Stands in for `pkexec`: records every command line and carries out
/// `chmod` on the real file. `chown` is accepted without doing anything,
/// since the files already belong to the test user.
#[derive(Default)]
pub struct ElevationStub {
    calls: RefCell<Vec<String>>,
    deny: RefCell<Option<String>>,
}

impl ElevationStub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elevated commands starting with `subcommand` exit with 126
    pub fn deny(&self, subcommand: &str) {
        *self.deny.borrow_mut() = Some(subcommand.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ElevationStub {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        self.calls.borrow_mut().push(command_line(program, args));

        let denied = self.deny.borrow().as_deref() == args.first().map(String::as_str);
        if denied {
            return Ok(CommandOutput::failure(126, "Request dismissed"));
        }

        if let [cmd, mode, path] = args {
            if cmd == "chmod" {
                let path = Path::new(path);
                let current = fs::metadata(path)?.permissions().mode() & 0o7777;
                let new_mode = if mode == "+w" {
                    current | 0o200
                } else {
                    u32::from_str_radix(mode, 8)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
                };
                fs::set_permissions(path, fs::Permissions::from_mode(new_mode))?;
            }
        }
        Ok(CommandOutput::success())
    }
}

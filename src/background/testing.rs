//! In-memory stand-in for the host: records commands and simulates the
//! ownership of a single root-owned file.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::Path;

use crate::common::runner::{CommandOutput, CommandRunner};
use crate::common::shell::command_line;

use super::privilege::{FileProbe, Principal};

pub struct FakeHost {
    calls: RefCell<Vec<String>>,
    responses: RefCell<Vec<(String, CommandOutput)>>,
    unlaunchable: RefCell<Vec<String>>,
    owner: RefCell<Principal>,
    mode: Cell<u32>,
    exists: Cell<bool>,
    ignore_chown: Cell<bool>,
    read_only_fs: Cell<bool>,
}

impl FakeHost {
    /// A 0644 file owned by root, seen by alice (uid 1000)
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responses: RefCell::new(Vec::new()),
            unlaunchable: RefCell::new(Vec::new()),
            owner: RefCell::new(Self::root()),
            mode: Cell::new(0o644),
            exists: Cell::new(true),
            ignore_chown: Cell::new(false),
            read_only_fs: Cell::new(false),
        }
    }

    pub fn root() -> Principal {
        Principal {
            uid: 0,
            name: Some("root".to_string()),
        }
    }

    pub fn user(&self) -> Principal {
        Principal {
            uid: 1000,
            name: Some("alice".to_string()),
        }
    }

    /// Commands whose command line starts with `prefix` return `output`
    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        self.responses
            .borrow_mut()
            .push((prefix.to_string(), output));
    }

    pub fn fail_to_launch(&self, program: &str) {
        self.unlaunchable.borrow_mut().push(program.to_string());
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn owner(&self) -> Principal {
        self.owner.borrow().clone()
    }

    pub fn set_owner(&self, owner: Principal) {
        *self.owner.borrow_mut() = owner;
    }

    pub fn mode(&self) -> u32 {
        self.mode.get()
    }

    pub fn set_mode(&self, mode: u32) {
        self.mode.set(mode);
    }

    pub fn set_exists(&self, exists: bool) {
        self.exists.set(exists);
    }

    /// chown reports success but leaves the owner alone
    pub fn ignore_chown(&self, ignore: bool) {
        self.ignore_chown.set(ignore);
    }

    pub fn set_read_only_filesystem(&self, read_only: bool) {
        self.read_only_fs.set(read_only);
    }

    fn lookup(&self, spec: &str) -> Principal {
        let user = self.user();
        if spec == "root" || spec == "0" {
            Self::root()
        } else if Some(spec) == user.name.as_deref() || spec == user.uid.to_string() {
            user
        } else {
            Principal {
                uid: spec.parse().unwrap_or(65534),
                name: None,
            }
        }
    }

    fn simulate(&self, args: &[String]) {
        match args.first().map(String::as_str) {
            Some("chmod") if args.len() == 3 => {
                if args[1] == "+w" {
                    self.mode.set(self.mode.get() | 0o200);
                } else if let Ok(mode) = u32::from_str_radix(&args[1], 8) {
                    self.mode.set(mode);
                }
            }
            Some("chown") if args.len() == 3 && !self.ignore_chown.get() => {
                let owner = self.lookup(&args[1]);
                self.set_owner(owner);
            }
            _ => {}
        }
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let line = command_line(program, args);
        self.calls.borrow_mut().push(line.clone());

        if self.unlaunchable.borrow().iter().any(|p| p == program) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"));
        }

        let canned = self
            .responses
            .borrow()
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone());
        if let Some(output) = canned {
            if output.succeeded() && program == "pkexec" {
                self.simulate(args);
            }
            return Ok(output);
        }

        if program == "pkexec" {
            self.simulate(args);
        }
        Ok(CommandOutput::success())
    }
}

impl FileProbe for FakeHost {
    fn exists(&self, _path: &Path) -> bool {
        self.exists.get()
    }

    fn is_writable(&self, _path: &Path) -> bool {
        self.exists.get()
            && !self.read_only_fs.get()
            && self.mode.get() & 0o200 != 0
            && *self.owner.borrow() == self.user()
    }

    fn owner(&self, _path: &Path) -> io::Result<Principal> {
        Ok(self.owner())
    }

    fn mode(&self, _path: &Path) -> io::Result<u32> {
        Ok(self.mode.get())
    }

    fn set_mode(&self, _path: &Path, mode: u32) -> io::Result<()> {
        self.mode.set(mode);
        Ok(())
    }
}

use crate::error::{DotupError, Result};
use crate::process::{CommandRunner, CommandSpec};
use std::cell::Cell;
use std::io::IsTerminal;

/// How privileged commands get their rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// Already running with effective uid 0.
    Root,
    /// Commands are prefixed with `sudo`.
    Sudo,
}

impl Elevation {
    pub fn apply(&self, spec: CommandSpec) -> CommandSpec {
        match self {
            Elevation::Root => spec,
            Elevation::Sudo => spec.wrapped_in("sudo"),
        }
    }
}

/// PrivilegeAgent decides whether privileged package managers can run.
///
/// The first answer is remembered for the rest of the run, granted or denied,
/// so the user is prompted at most once.
pub struct PrivilegeAgent<'a> {
    runner: &'a dyn CommandRunner,
    is_root: bool,
    allow_prompt: bool,
    granted: Cell<Option<Elevation>>,
    denied: Cell<bool>,
}

impl<'a> PrivilegeAgent<'a> {
    pub fn new(runner: &'a dyn CommandRunner, allow_prompt: bool) -> Self {
        let allow_prompt = allow_prompt && std::io::stdin().is_terminal();
        Self::with_identity(runner, nix::unistd::Uid::effective().is_root(), allow_prompt)
    }

    pub fn with_identity(runner: &'a dyn CommandRunner, is_root: bool, allow_prompt: bool) -> Self {
        Self {
            runner,
            is_root,
            allow_prompt,
            granted: Cell::new(None),
            denied: Cell::new(false),
        }
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Resolve elevation or fail with [`DotupError::PermissionDenied`].
    pub fn acquire(&self) -> Result<Elevation> {
        if self.is_root {
            return Ok(Elevation::Root);
        }
        if let Some(elevation) = self.granted.get() {
            return Ok(elevation);
        }
        if self.denied.get() {
            return Err(Self::denial());
        }

        if !self.runner.is_available("sudo") {
            return Err(DotupError::PermissionDenied(
                "sudo is not installed; rerun as root".to_string(),
            ));
        }

        let probe = CommandSpec::new("sudo").args(["-n", "true"]);
        if self.runner.capture(&probe)?.success() {
            self.granted.set(Some(Elevation::Sudo));
            return Ok(Elevation::Sudo);
        }

        if self.allow_prompt {
            tracing::debug!("cached sudo credentials missing, prompting once");
            let prompt = CommandSpec::new("sudo").arg("-v");
            if self.runner.stream(&prompt)?.success() {
                self.granted.set(Some(Elevation::Sudo));
                return Ok(Elevation::Sudo);
            }
        }

        self.denied.set(true);
        Err(Self::denial())
    }

    fn denial() -> DotupError {
        DotupError::PermissionDenied(
            "sudo needs a password; run `sudo -v` first or rerun as root".to_string(),
        )
    }
}

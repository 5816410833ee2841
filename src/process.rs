use crate::error::{DotupError, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// A fully described external command: program, arguments, working directory
/// and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// `shell -c script`.
    pub fn shell_script(shell: &str, script: impl Into<String>) -> Self {
        Self::new(shell).arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Prefix this command with another program, e.g. `sudo`.
    pub fn wrapped_in(self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: wrapper.to_string(),
            args,
            current_dir: self.current_dir,
            envs: self.envs,
        }
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

/// Quote `value` for a POSIX shell. Plain words pass through untouched.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./@:=+,%".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Result of a finished external command. A non-zero exit is a value here,
/// not an error; callers decide what is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Turn a non-zero exit into [`DotupError::CommandFailed`].
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        Err(DotupError::CommandFailed {
            command: spec.display(),
            code: self.code.unwrap_or(-1),
            stderr: self.stderr,
        })
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Seam between the update logic and the host's processes.
pub trait CommandRunner {
    /// Run to completion with stdout and stderr captured.
    fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run to completion with the terminal attached, so prompts and progress
    /// reach the user. Only the exit code is reported back.
    fn stream(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether `program` resolves on the search path.
    fn is_available(&self, program: &str) -> bool;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), "capturing");
        spec.to_command()
            .stdin(Stdio::null())
            .output()
            .map(CommandOutput::from)
            .map_err(|source| DotupError::CommandSpawn {
                command: spec.display(),
                source,
            })
    }

    fn stream(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        println!("{}", format!("   > {}", spec.display()).cyan());
        tracing::debug!(command = %spec.display(), "streaming");

        let status = spec
            .to_command()
            .status()
            .map_err(|source| DotupError::CommandSpawn {
                command: spec.display(),
                source,
            })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted runner for exercising stage handlers and git flows without
    //! touching the host.

    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Rule {
        pattern: String,
        outputs: Vec<CommandOutput>,
    }

    /// Matches each command's display string against registered patterns
    /// (substring match, first rule wins). A rule with several outputs hands
    /// them out in order and then keeps repeating the last one. Unmatched
    /// commands succeed with empty output.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        available: HashSet<String>,
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_tool(mut self, program: &str) -> Self {
            self.available.insert(program.to_string());
            self
        }

        pub fn with_tools(mut self, programs: &[&str]) -> Self {
            for program in programs {
                self.available.insert(program.to_string());
            }
            self
        }

        pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
            self.respond_seq(pattern, vec![output])
        }

        pub fn respond_seq(self, pattern: &str, outputs: Vec<CommandOutput>) -> Self {
            self.rules.lock().unwrap().push(Rule {
                pattern: pattern.to_string(),
                outputs,
            });
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn called(&self, pattern: &str) -> bool {
            self.calls().iter().any(|c| c.contains(pattern))
        }

        fn answer(&self, spec: &CommandSpec) -> CommandOutput {
            let display = spec.display();
            self.calls.lock().unwrap().push(display.clone());

            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| display.contains(&r.pattern)) {
                Some(rule) if rule.outputs.len() > 1 => rule.outputs.remove(0),
                Some(rule) => rule.outputs.first().cloned().unwrap_or_default(),
                None => CommandOutput::ok(""),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            Ok(self.answer(spec))
        }

        fn stream(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            Ok(self.answer(spec))
        }

        fn is_available(&self, program: &str) -> bool {
            self.available.contains(program)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_moves_program_into_args() {
        let spec = CommandSpec::new("apt-get").args(["upgrade", "-y"]);
        let wrapped = spec.wrapped_in("sudo");
        assert_eq!(wrapped.program, "sudo");
        assert_eq!(wrapped.display(), "sudo apt-get upgrade -y");
    }

    #[test]
    fn shell_quote_escapes_only_when_needed() {
        assert_eq!(shell_quote("@angular/cli"), "@angular/cli");
        assert_eq!(shell_quote("/home/me/.nvm/nvm.sh"), "/home/me/.nvm/nvm.sh");
        assert_eq!(shell_quote("my dir"), "'my dir'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn ensure_success_reports_command_and_code() {
        let spec = CommandSpec::new("brew").arg("upgrade");
        let err = CommandOutput::failed(2, "boom")
            .ensure_success(&spec)
            .unwrap_err();
        match err {
            DotupError::CommandFailed { command, code, .. } => {
                assert_eq!(command, "brew upgrade");
                assert_eq!(code, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn system_runner_captures_stdout() {
        let runner = SystemRunner;
        if !runner.is_available("echo") {
            return;
        }
        let output = runner
            .capture(&CommandSpec::new("echo").arg("hello"))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_trimmed(), "hello");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .capture(&CommandSpec::new("dotup-definitely-not-a-real-binary"))
            .unwrap_err();
        assert!(matches!(err, DotupError::CommandSpawn { .. }));
    }
}

//! Typed command values built by stages and executed by the process runner.

use crate::config::ContainerConfig;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// A program invocation with its arguments.
///
/// Nothing here passes through a shell on the host. Redirecting stdout into a
/// file is expressed with [`CommandSpec::stdout_file`] and carried out by the
/// runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// The executable.
    pub program: PathBuf,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Working directory for the process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// File receiving stdout instead of the pipe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_file: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a command without arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stdout_file: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sends stdout to `file`.
    #[must_use]
    pub fn stdout_to(mut self, file: impl Into<PathBuf>) -> Self {
        self.stdout_file = Some(file.into());
        self
    }

    /// Wraps `script` into a throwaway container run with the project mounted.
    ///
    /// `subdir` is resolved against the mount point before the script runs.
    #[must_use]
    pub fn containerized(
        container: &ContainerConfig,
        project_root: &Path,
        subdir: Option<&str>,
        script: &ShellScript,
    ) -> Self {
        let workdir = match subdir {
            Some(sub) => format!("{}/{sub}", container.mount_point.trim_end_matches('/')),
            None => container.mount_point.clone(),
        };

        Self::new(&container.docker)
            .arg("run")
            .arg("--volume")
            .arg(format!(
                "{}:{}",
                project_root.display(),
                container.mount_point
            ))
            .arg("--rm")
            .arg(&container.image)
            .arg("sh")
            .arg("-c")
            .arg(format!("cd {} && {}", quote(&workdir), script.render()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        if let Some(ref file) = self.stdout_file {
            write!(f, " > {}", quote(&file.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// A shell command line run inside the toolchain container.
///
/// Every word is quoted on insertion, so paths with spaces survive the
/// `sh -c` round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellScript {
    env: Vec<String>,
    words: Vec<String>,
    redirect: Option<String>,
}

impl ShellScript {
    /// Starts a script running `program`.
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            env: Vec::new(),
            words: vec![quote(program).into_owned()],
            redirect: None,
        }
    }

    /// Prefixes an environment assignment.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={}", quote(value)));
        self
    }

    /// Appends one word.
    #[must_use]
    pub fn arg(mut self, word: impl AsRef<str>) -> Self {
        self.words.push(quote(word.as_ref()).into_owned());
        self
    }

    /// Appends a relative path.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Appends several words.
    #[must_use]
    pub fn args<I, S>(self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        words.into_iter().fold(self, Self::arg)
    }

    /// Redirects stdout of the script into `target`.
    #[must_use]
    pub fn redirect_stdout(mut self, target: &str) -> Self {
        self.redirect = Some(quote(target).into_owned());
        self
    }

    /// Renders the script as a single line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts: Vec<&str> = self.env.iter().map(String::as_str).collect();
        parts.extend(self.words.iter().map(String::as_str));
        let mut line = parts.join(" ");
        if let Some(ref target) = self.redirect {
            line.push_str(" > ");
            line.push_str(target);
        }
        line
    }
}

fn quote(word: &str) -> Cow<'_, str> {
    shlex::try_quote(word).unwrap_or(Cow::Borrowed(word))
}

//! GitHub and git access through the `gh` and `git` command line tools.
//!
//! Every subprocess goes through a [`CommandRunner`] so the tool layer can be
//! exercised with a scripted runner. [`SystemRunner`] is the real one: it
//! enforces the per-command timeout and kills the child when it expires.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use wait_timeout::ChildExt;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    /// Non-zero exit; `message` is the trimmed stderr
    #[error("{message}")]
    Failed { command: String, code: Option<i32>, message: String },
    #[error("Unexpected output from {command}: {message}")]
    InvalidOutput { command: String, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A command line to run, with its working directory and time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// `program arg arg ...`, for matching in logs and tests.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Output of a command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. A non-zero exit is reported as [`CommandError::Failed`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle.and_then(|h| h.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let command = spec.command_line();
        tracing::debug!(%command, cwd = ?spec.cwd, "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        let mut child =
            cmd.spawn().map_err(|source| CommandError::Spawn { command: command.clone(), source })?;

        // drain both pipes while waiting so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = match child.wait_timeout(spec.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(%command, secs = spec.timeout.as_secs(), "command timed out");
                return Err(CommandError::Timeout { command, secs: spec.timeout.as_secs() });
            }
        };

        let output = CommandOutput { stdout: collect(stdout), stderr: collect(stderr) };
        if status.success() {
            Ok(output)
        } else {
            let message = if output.stderr.is_empty() {
                format!("Command failed: {}", command)
            } else {
                output.stderr
            };
            Err(CommandError::Failed { command, code: status.code(), message })
        }
    }
}

/// `gh` and `git` operations for one organisation.
pub struct GitHub<'a> {
    runner: &'a dyn CommandRunner,
    org: &'a str,
    command_timeout: Duration,
    api_timeout: Duration,
}

impl<'a> GitHub<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        org: &'a str,
        command_timeout: Duration,
        api_timeout: Duration,
    ) -> Self {
        Self { runner, org, command_timeout, api_timeout }
    }

    /// `{org}/{slug}`
    pub fn repo(&self, slug: &str) -> String {
        format!("{}/{}", self.org, slug)
    }

    fn gh<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("gh", args, self.command_timeout)
    }

    fn git<I, S>(&self, dir: &Path, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git", args, self.command_timeout).in_dir(dir)
    }

    fn run(&self, spec: CommandSpec) -> Result<String, CommandError> {
        self.runner.run(&spec).map(|out| out.stdout)
    }

    /// Create `{org}/{slug}` from a template repo and clone it into `parent`.
    pub fn create_from_template(
        &self,
        slug: &str,
        template_repo: &str,
        parent: &Path,
    ) -> Result<String, CommandError> {
        let repo = self.repo(slug);
        self.run(
            self.gh(["repo", "create", repo.as_str(), "--template", template_repo, "--public", "--clone"])
                .in_dir(parent),
        )
    }

    pub fn set_description(&self, slug: &str, description: &str) -> Result<String, CommandError> {
        let repo = self.repo(slug);
        self.run(self.gh(["repo", "edit", repo.as_str(), "--description", description]))
    }

    pub fn add_topics(&self, slug: &str, topics: &[&str]) -> Result<String, CommandError> {
        let mut args = vec!["repo".to_string(), "edit".to_string(), self.repo(slug)];
        for topic in topics {
            args.push("--add-topic".to_string());
            args.push(topic.to_string());
        }
        self.run(self.gh(args))
    }

    /// Enable GitHub Pages from the root of `main`.
    pub fn enable_pages(&self, slug: &str) -> Result<String, CommandError> {
        let endpoint = format!("repos/{}/pages", self.repo(slug));
        self.run(self.gh([
            "api",
            endpoint.as_str(),
            "-X",
            "POST",
            "-f",
            "build_type=legacy",
            "-f",
            "source[branch]=main",
            "-f",
            "source[path]=/",
        ]))
    }

    /// GET a REST endpoint and parse the JSON body.
    pub fn api_json(&self, endpoint: &str) -> Result<Value, CommandError> {
        let spec = CommandSpec::new("gh", ["api", endpoint], self.api_timeout);
        let command = spec.command_line();
        let body = self.run(spec)?;
        serde_json::from_str(&body)
            .map_err(|e| CommandError::InvalidOutput { command, message: e.to_string() })
    }

    /// Open issues of `{org}/{slug}` carrying `label`.
    pub fn list_issues(&self, slug: &str, label: &str) -> Result<Value, CommandError> {
        let repo = self.repo(slug);
        let spec = CommandSpec::new(
            "gh",
            [
                "issue",
                "list",
                "--repo",
                repo.as_str(),
                "--label",
                label,
                "--state",
                "open",
                "--json",
                "number,title,body,url,createdAt,labels",
            ],
            self.api_timeout,
        );
        let command = spec.command_line();
        let body = self.run(spec)?;
        serde_json::from_str(&body)
            .map_err(|e| CommandError::InvalidOutput { command, message: e.to_string() })
    }

    pub fn delete_repo(&self, slug: &str) -> Result<String, CommandError> {
        let repo = self.repo(slug);
        self.run(self.gh(["repo", "delete", repo.as_str(), "--yes"]))
    }

    /// Stage everything and commit. Fails when there is nothing to commit.
    pub fn commit_all(&self, dir: &Path, message: &str) -> Result<String, CommandError> {
        self.run(self.git(dir, ["add", "-A"]))?;
        self.run(self.git(dir, ["commit", "-m", message]))
    }

    /// Stage `paths` and commit them.
    pub fn commit_paths(&self, dir: &Path, paths: &[&str], message: &str) -> Result<String, CommandError> {
        let mut add = vec!["add"];
        add.extend_from_slice(paths);
        self.run(self.git(dir, add))?;
        self.run(self.git(dir, ["commit", "-m", message]))
    }

    pub fn push(&self, dir: &Path) -> Result<String, CommandError> {
        self.run(self.git(dir, ["push"]))
    }

    /// Push `main` and set its upstream to `origin`.
    pub fn push_main(&self, dir: &Path) -> Result<String, CommandError> {
        self.run(self.git(dir, ["push", "-u", "origin", "main"]))
    }
}

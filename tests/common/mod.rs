//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use magma_packager::config::Config;
use magma_packager::exec::runner::{CommandOutput, CommandRunner, CommandSpec, ExecError};

enum Reply {
    Output(CommandOutput),
    SpawnFailure,
}

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    reply: Reply,
}

/// A [`CommandRunner`] that answers from a script and records every call.
///
/// Commands without a matching rule fail to spawn, like a missing binary.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program args_prefix...` with `code` and `stdout`.
    pub fn respond(mut self, program: &str, args_prefix: &[&str], code: i32, stdout: &str) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            reply: Reply::Output(CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: if code == 0 { String::new() } else { format!("{program} failed") },
            }),
        });
        self
    }

    /// Make `program args_prefix...` fail to spawn.
    pub fn missing(mut self, program: &str, args_prefix: &[&str]) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            reply: Reply::SpawnFailure,
        });
        self
    }

    /// Standard git answers for a release branch checkout.
    pub fn with_git(self, branch: &str, sha: &str) -> Self {
        self.respond("git", &["rev-parse", "--abbrev-ref", "HEAD"], 0, &format!("{branch}\n"))
            .respond("git", &["rev-parse", "HEAD"], 0, &format!("{sha}\n"))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Program names of recorded calls, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.program_name()).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());

        let rule = self.rules.iter().find(|r| {
            r.program == spec.program_name()
                && spec.args.len() >= r.args_prefix.len()
                && spec.args.iter().zip(&r.args_prefix).all(|(a, p)| a == p)
        });

        match rule.map(|r| &r.reply) {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::SpawnFailure) | None => Err(ExecError::Spawn {
                command: spec.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}

/// A fake MAGMA checkout with a prebuilt library, headers and the ROCm make.inc template.
pub struct Checkout {
    pub dir: TempDir,
}

impl Checkout {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("lib/libmagma.so"), b"\x7fELF fake").unwrap();

        std::fs::create_dir_all(root.join("include/magmablas")).unwrap();
        std::fs::write(root.join("include/magma.h"), "#include \"magma_v2.h\"\n").unwrap();
        std::fs::write(root.join("include/magma_v2.h"), "/* v2 */\n").unwrap();
        std::fs::write(root.join("include/magmablas/magma_z.h"), "/* z */\n").unwrap();

        std::fs::create_dir_all(root.join("make.inc-examples")).unwrap();
        std::fs::write(
            root.join("make.inc-examples/make.inc.hip-gcc-mkl"),
            "BACKEND = hip\nFORT = true",
        )
        .unwrap();

        std::fs::write(root.join("README"), "# MAGMA\n").unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> Config {
        let mut config = Config {
            root_dir: self.root().to_path_buf(),
            ..Default::default()
        };
        config.build.jobs = Some(4);
        config
    }

    pub fn staging(&self) -> PathBuf {
        self.root().join("build/lib")
    }
}

/// A toolkit install containing `bin/<compiler>`.
pub fn fake_toolkit(compiler: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("bin")).unwrap();
    std::fs::write(dir.path().join("bin").join(compiler), "#!/bin/sh\n").unwrap();
    dir
}

/// A ROCm install with `hipcc` and, optionally, a `.info/version` file.
pub fn fake_rocm(version_file: Option<&str>) -> TempDir {
    let dir = fake_toolkit("hipcc");
    if let Some(contents) = version_file {
        std::fs::create_dir_all(dir.path().join(".info")).unwrap();
        std::fs::write(dir.path().join(".info/version"), contents).unwrap();
    }
    dir
}

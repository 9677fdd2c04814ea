// Shared helpers for integration tests.
//
// Provides a temporary systemd configuration root and a fluent builder so
// each integration test can lay out the files it needs, plus a fake
// executor that answers `systemd-analyze` calls with canned results.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use netrepair_cli::exec::{ExecResult, Executor};
use netrepair_cli::systemd::model::ConfigTree;
use netrepair_cli::systemd::parser::parse_dump;

/// Realistic `resolved.conf` as shipped, with one override.
pub const RESOLVED_CONF: &str = "\
#  This file is part of systemd.
#
# See resolved.conf(5) for details.

[Resolve]
DNS=1.1.1.1 2606:4700:4700::1111#cloudflare-dns.com
#FallbackDNS=
#Domains=
#DNSSEC=no
DNSOverTLS=opportunistic
#MulticastDNS=yes
#LLMNR=yes
#Cache=yes
";

/// An isolated configuration root backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory standing in for `/etc/systemd`.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create an empty root.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Path to the configuration root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Absolute path of `rel` under the root, as a string.
    pub fn path_str(&self, rel: &str) -> String {
        self.root.path().join(rel).to_string_lossy().into_owned()
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building an empty root.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `content` to `rel` under the root, creating parents.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        let path = self.ctx.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        self
    }

    /// Write a minimal unit file at `rel`.
    pub fn with_unit(self, rel: &str) -> Self {
        self.with_file(rel, "[Unit]\nDescription=test\n")
    }

    /// Write the stock [`RESOLVED_CONF`].
    pub fn with_resolved_conf(self) -> Self {
        self.with_file("resolved.conf", RESOLVED_CONF)
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

/// Parse `text`, panicking with the parse error on failure.
pub fn tree(text: &str) -> ConfigTree {
    parse_dump(text).expect("parse dump")
}

/// Executor that fakes `systemd-analyze` and `systemctl`.
///
/// `verify` answers come from `outcomes` keyed by file name (default:
/// success); every call is recorded.
#[derive(Debug, Default)]
pub struct FakeSystemd {
    pub missing: Vec<String>,
    pub outcomes: HashMap<String, ExecResult>,
    pub calls: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
}

impl FakeSystemd {
    /// All tools present, every file passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `tool` is not installed.
    pub fn without(mut self, tool: &str) -> Self {
        self.missing.push(tool.to_string());
        self
    }

    /// Make verification of `file_name` fail with `stderr`.
    pub fn failing(mut self, file_name: &str, stderr: &str) -> Self {
        self.outcomes.insert(
            file_name.to_string(),
            ExecResult {
                stderr: stderr.to_string(),
                code: Some(1),
                ..ExecResult::default()
            },
        );
        self
    }

    /// Make verification of `file_name` time out.
    pub fn hanging(mut self, file_name: &str) -> Self {
        self.outcomes.insert(
            file_name.to_string(),
            ExecResult {
                timed_out: true,
                ..ExecResult::default()
            },
        );
        self
    }

    /// Sleep this long in every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// File names verified so far, in call order.
    pub fn verified(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

impl Executor for FakeSystemd {
    fn run_with_timeout(&self, _program: &str, args: &[&str], _timeout: Duration) -> anyhow::Result<ExecResult> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let name = args
            .get(1)
            .and_then(|p| PathBuf::from(p).file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();
        self.calls.lock().expect("calls poisoned").push(name.clone());
        Ok(self.outcomes.get(&name).cloned().unwrap_or_else(|| ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }))
    }

    fn which(&self, program: &str) -> bool {
        !self.missing.iter().any(|m| m == program)
    }
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl netrepair_cli::systemd::resolver::NameserverProbe for StaticProbe {
    fn can_resolve(&self, _host: &str) -> bool {
        self.0
    }
}

//! Lint rules for `systemd-resolved` configuration.
//!
//! Pure validation over an already-parsed [`ConfigTree`]: the only outside
//! input is the injected [`NameserverProbe`], consulted when no nameserver is
//! configured at all.
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::path::Path;

use crate::error::ParseError;
use crate::settings::{EmptyDnsPolicy, LintSettings};

use super::model::{ConfigFile, ConfigOption, ConfigTree};

/// Section holding resolver options.
pub const RESOLVE_SECTION: &str = "Resolve";

/// Keys holding whitespace-separated nameserver lists.
const ADDRESS_KEYS: &[&str] = &["DNS", "FallbackDNS"];

/// Keys restricted to a fixed set of values.
const CHOICE_KEYS: &[(&str, &[&str])] = &[
    ("DNSSEC", &["yes", "no", "allow-downgrade"]),
    ("DNSOverTLS", &["yes", "no", "opportunistic"]),
    ("LLMNR", &["yes", "no", "resolve"]),
    ("MulticastDNS", &["yes", "no"]),
    ("DNSStubListener", &["yes", "no", "udp", "tcp", "both"]),
    ("ReadEtcHosts", &["yes", "no"]),
];

/// Keys known to `systemd-resolved` that carry no lint rule.
const UNCHECKED_KEYS: &[&str] = &[
    "Domains",
    "Cache",
    "CacheFromLocalhost",
    "DNSStubListenerExtra",
    "ResolveUnicastSingleLabel",
    "StaleRetentionSec",
];

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The option was checked and is fine.
    Ok,
    /// Worth knowing, never fatal.
    Info,
    /// Likely misconfiguration.
    Warning,
    /// Invalid configuration.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A single option.
    Key,
    /// A file as a whole.
    File,
}

/// One lint result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Severity.
    pub severity: Severity,
    /// Whether the finding concerns one option or a whole file.
    pub subject: Subject,
    /// Option key, when there is one.
    pub key: Option<String>,
    /// Offending value or token.
    pub value: Option<String>,
    /// Self-contained description including path and line.
    pub message: String,
    /// File the finding refers to.
    pub path: String,
    /// Source line, for key findings.
    pub line: Option<usize>,
}

impl Finding {
    fn for_option(severity: Severity, option: &ConfigOption, value: Option<&str>, detail: &str) -> Self {
        Self {
            severity,
            subject: Subject::Key,
            key: Some(option.key.clone()),
            value: value.map(String::from),
            message: format!(
                "{}:{}: {} {detail}",
                option.source_file, option.line_number, option.key
            ),
            path: option.source_file.clone(),
            line: Some(option.line_number),
        }
    }

    /// An error finding for a resolver file that could not be parsed.
    #[must_use]
    pub fn parse_failure(path: &str, err: &ParseError) -> Self {
        Self {
            severity: Severity::Error,
            subject: Subject::File,
            key: None,
            value: None,
            message: format!("{path}:{}: {}: {:?}", err.line, err.reason, err.raw),
            path: path.to_string(),
            line: Some(err.line),
        }
    }

    fn for_file(severity: Severity, path: &str, key: Option<&str>, detail: &str) -> Self {
        Self {
            severity,
            subject: Subject::File,
            key: key.map(String::from),
            value: None,
            message: format!("{path}: {detail}"),
            path: path.to_string(),
            line: None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Count of findings per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintSummary {
    /// `ok` findings.
    pub ok: usize,
    /// `info` findings.
    pub info: usize,
    /// `warning` findings.
    pub warning: usize,
    /// `error` findings.
    pub error: usize,
}

/// Ordered findings for every resolver file of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    /// Resolver files that were linted, in tree order.
    pub files: Vec<String>,
    /// Findings in file, then line order.
    pub findings: Vec<Finding>,
}

impl LintReport {
    /// Per-severity counts.
    #[must_use]
    pub fn summary(&self) -> LintSummary {
        self.findings
            .iter()
            .fold(LintSummary::default(), |mut acc, f| {
                match f.severity {
                    Severity::Ok => acc.ok += 1,
                    Severity::Info => acc.info += 1,
                    Severity::Warning => acc.warning += 1,
                    Severity::Error => acc.error += 1,
                }
                acc
            })
    }

    /// `true` when no finding has `error` severity.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    /// `true` when any finding is a warning or an error.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.findings.iter().any(|f| f.severity >= Severity::Warning)
    }
}

/// Capability to check whether name resolution works on this host.
#[cfg_attr(test, mockall::automock)]
pub trait NameserverProbe: Send + Sync {
    /// `true` if `host` resolves to at least one address.
    fn can_resolve(&self, host: &str) -> bool;
}

/// [`NameserverProbe`] using the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl NameserverProbe for SystemProbe {
    fn can_resolve(&self, host: &str) -> bool {
        (host, 0)
            .to_socket_addrs()
            .is_ok_and(|mut addrs| addrs.next().is_some())
    }
}

/// Lints the resolver files of a tree.
pub struct ResolverLinter<'a> {
    settings: &'a LintSettings,
    probe: &'a dyn NameserverProbe,
}

impl fmt::Debug for ResolverLinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverLinter")
            .field("settings", self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> ResolverLinter<'a> {
    /// Create a linter.
    #[must_use]
    pub const fn new(settings: &'a LintSettings, probe: &'a dyn NameserverProbe) -> Self {
        Self { settings, probe }
    }

    /// `true` for the main resolver file and `.conf` drop-ins in its `.d`
    /// directory.
    #[must_use]
    pub fn is_resolver_path(&self, path: &Path) -> bool {
        let resolver_file = self.settings.resolver_file.as_str();
        let name = path.file_name().and_then(|n| n.to_str());
        let parent = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str());
        name == Some(resolver_file)
            || (parent.and_then(|p| p.strip_suffix(".d")) == Some(resolver_file)
                && name.is_some_and(|n| n.ends_with(".conf")))
    }

    /// The main resolver file and its `.d` drop-ins, in tree order.
    #[must_use]
    pub fn resolver_files<'t>(&self, tree: &'t ConfigTree) -> Vec<&'t ConfigFile> {
        tree.files
            .iter()
            .filter(|file| self.is_resolver_path(Path::new(&file.path)))
            .collect()
    }

    /// Lint every resolver file in `tree`.
    ///
    /// A tree without resolver files yields an empty report.
    #[must_use]
    pub fn lint(&self, tree: &ConfigTree) -> LintReport {
        let files = self.resolver_files(tree);
        let mut report = LintReport {
            files: files.iter().map(|f| f.path.clone()).collect(),
            findings: Vec::new(),
        };
        let Some(first) = files.first() else {
            tracing::debug!(resolver_file = %self.settings.resolver_file, "no resolver configuration in tree");
            return report;
        };

        let mut nameservers = Nameservers::default();
        for file in &files {
            if !file.has_section(RESOLVE_SECTION) {
                report.findings.push(Finding::for_file(
                    Severity::Warning,
                    &file.path,
                    None,
                    "missing [Resolve] section",
                ));
                continue;
            }
            for option in file
                .sections_named(RESOLVE_SECTION)
                .flat_map(|s| s.active_options())
            {
                nameservers.apply(option);
                report.findings.extend(lint_option(option));
            }
        }

        if nameservers.is_empty()
            && let Some(finding) = self.empty_nameservers(&first.path)
        {
            report.findings.push(finding);
        }

        tracing::debug!(
            files = report.files.len(),
            findings = report.findings.len(),
            "linted resolver configuration"
        );
        report
    }

    fn empty_nameservers(&self, path: &str) -> Option<Finding> {
        let detail = match self.settings.empty_dns_policy {
            EmptyDnsPolicy::Ignore => return None,
            EmptyDnsPolicy::Warn => "DNS and FallbackDNS are empty".to_string(),
            EmptyDnsPolicy::Probe => {
                let host = &self.settings.probe_host;
                if self.probe.can_resolve(host) {
                    return None;
                }
                format!("DNS and FallbackDNS are empty and failed to resolve {host}")
            }
        };
        Some(Finding::for_file(Severity::Warning, path, Some("DNS"), &detail))
    }
}

/// Effective `DNS=` and `FallbackDNS=` lists after stacking: an empty
/// assignment resets the list, anything else appends.
#[derive(Debug, Default)]
struct Nameservers {
    dns: usize,
    fallback: usize,
}

impl Nameservers {
    fn apply(&mut self, option: &ConfigOption) {
        let slot = match option.key.as_str() {
            "DNS" => &mut self.dns,
            "FallbackDNS" => &mut self.fallback,
            _ => return,
        };
        let tokens = option.value.split_whitespace().count();
        if tokens == 0 {
            *slot = 0;
        } else {
            *slot += tokens;
        }
    }

    const fn is_empty(&self) -> bool {
        self.dns == 0 && self.fallback == 0
    }
}

fn lint_option(option: &ConfigOption) -> Vec<Finding> {
    let key = option.key.as_str();

    if ADDRESS_KEYS.contains(&key) {
        let invalid: Vec<Finding> = option
            .value
            .split_whitespace()
            .filter(|token| parse_nameserver(token).is_none())
            .map(|token| {
                Finding::for_option(
                    Severity::Error,
                    option,
                    Some(token),
                    &format!("has invalid address '{token}'"),
                )
            })
            .collect();
        if !invalid.is_empty() {
            return invalid;
        }
        let detail = if option.value.is_empty() {
            "list reset".to_string()
        } else {
            format!("lists {} valid address(es)", option.value.split_whitespace().count())
        };
        return vec![Finding::for_option(Severity::Ok, option, None, &detail)];
    }

    if let Some((_, allowed)) = CHOICE_KEYS.iter().find(|(k, _)| *k == key) {
        let value = option.value.as_str();
        if value.is_empty() || allowed.contains(&value) {
            return vec![Finding::for_option(Severity::Ok, option, None, &format!("= '{value}'"))];
        }
        return vec![Finding::for_option(
            Severity::Error,
            option,
            Some(value),
            &format!("should be one of [{}], got '{value}'", allowed.join(", ")),
        )];
    }

    if UNCHECKED_KEYS.contains(&key) {
        return vec![Finding::for_option(Severity::Ok, option, None, "recognised, not checked")];
    }

    vec![Finding::for_option(
        Severity::Info,
        option,
        Some(option.value.as_str()),
        "is not a known resolver option",
    )]
}

/// Parse one nameserver token, returning its address.
///
/// Accepts `ADDRESS[:PORT][%IFACE][#NAME]`, with IPv6 addresses bracketed
/// when a port is given (`[2001:db8::1]:53`). Interface and server name
/// suffixes are not validated further.
#[must_use]
pub fn parse_nameserver(token: &str) -> Option<IpAddr> {
    let token = token.split_once('#').map_or(token, |(addr, _)| addr);
    let token = token.split_once('%').map_or(token, |(addr, _)| addr);
    if token.is_empty() {
        return None;
    }

    if let Some(rest) = token.strip_prefix('[') {
        let (inner, after) = rest.split_once(']')?;
        let addr: IpAddr = inner.parse().ok()?;
        return match after.strip_prefix(':') {
            None if after.is_empty() => Some(addr),
            Some(port) if port.parse::<u16>().is_ok() => Some(addr),
            _ => None,
        };
    }

    if let Ok(addr) = token.parse::<IpAddr>() {
        return Some(addr);
    }
    let (host, port) = token.split_once(':')?;
    port.parse::<u16>().ok()?;
    host.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

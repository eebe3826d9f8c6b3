//! Compile a [`SandboxConfig`] into a `sandbox-exec` (SBPL) profile.
//!
//! The profile is default-deny. A fixed baseline keeps a shell usable
//! (fork/exec, metadata and sysctl reads, service lookups, signals, iokit,
//! pseudo terminals); every configured path adds one allow rule for its
//! subtree. Rules are purely additive, so path order does not matter.

use std::fmt;

use crate::io::config::SandboxConfig;

const HEADER: &str = "(version 1)\n(deny default)\n";

const PROCESS_RULES: &str = "(allow process-fork)\n(allow process-exec)\n";

const SYSTEM_ESSENTIALS: &str = "\
(allow file-read-metadata)
(allow sysctl-read)
(allow mach-lookup)
(allow signal)
(allow iokit-open)
(allow file-read* file-write* (regex #\"^/dev/\"))
(allow file-ioctl (regex #\"^/dev/\"))
";

/// Rendered SBPL profile text. A pure function of its [`SandboxConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProfile(String);

impl CompiledProfile {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompiledProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the profile for `config`.
pub fn compile_profile(config: &SandboxConfig) -> CompiledProfile {
    let mut out = String::with_capacity(1024);
    out.push_str(HEADER);
    out.push_str(PROCESS_RULES);

    for path in &config.read_paths {
        push_subpath_rule(&mut out, "file-read*", path);
    }
    for path in &config.write_paths {
        push_subpath_rule(&mut out, "file-write*", path);
    }
    for path in &config.exec_paths {
        push_subpath_rule(&mut out, "process-exec", path);
    }

    out.push_str(SYSTEM_ESSENTIALS);

    if config.allow_network {
        out.push_str("(allow network*)\n");
    } else {
        out.push_str("(deny network*)\n");
    }

    CompiledProfile(out)
}

fn push_subpath_rule(out: &mut String, operation: &str, path: &str) {
    out.push_str("(allow ");
    out.push_str(operation);
    out.push_str(" (subpath \"");
    push_escaped(out, path);
    out.push_str("\"))\n");
}

/// Escape a path for use inside an SBPL string literal.
fn push_escaped(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(read: &[&str], write: &[&str], exec: &[&str], network: bool) -> SandboxConfig {
        SandboxConfig {
            enabled: true,
            allow_network: network,
            read_paths: read.iter().map(|p| p.to_string()).collect(),
            write_paths: write.iter().map(|p| p.to_string()).collect(),
            exec_paths: exec.iter().map(|p| p.to_string()).collect(),
            fallback_outside_sandbox: true,
        }
    }

    fn count_lines(profile: &CompiledProfile, prefix: &str) -> usize {
        profile
            .as_str()
            .lines()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    #[test]
    fn one_rule_per_path_per_category() {
        let profile = compile_profile(&config(
            &["/", "/Users/me"],
            &["/tmp", "/work", "/var/folders"],
            &["/bin"],
            false,
        ));

        assert_eq!(count_lines(&profile, "(allow file-read* (subpath"), 2);
        assert_eq!(count_lines(&profile, "(allow file-write* (subpath"), 3);
        assert_eq!(count_lines(&profile, "(allow process-exec (subpath"), 1);
        assert_eq!(count_lines(&profile, "(deny default)"), 1);
        assert!(profile.as_str().contains("(allow file-write* (subpath \"/work\"))\n"));
    }

    #[test]
    fn network_rule_follows_config() {
        let denied = compile_profile(&config(&[], &[], &[], false));
        assert_eq!(count_lines(&denied, "(deny network*)"), 1);
        assert_eq!(count_lines(&denied, "(allow network*)"), 0);

        let allowed = compile_profile(&config(&[], &[], &[], true));
        assert_eq!(count_lines(&allowed, "(allow network*)"), 1);
        assert_eq!(count_lines(&allowed, "(deny network*)"), 0);
    }

    #[test]
    fn empty_lists_keep_only_baseline() {
        let profile = compile_profile(&config(&[], &[], &[], false));
        assert_eq!(count_lines(&profile, "(allow file-read* (subpath"), 0);
        assert_eq!(count_lines(&profile, "(allow file-write* (subpath"), 0);
        assert!(profile.as_str().starts_with("(version 1)\n(deny default)\n"));
        for essential in [
            "(allow process-fork)",
            "(allow process-exec)",
            "(allow file-read-metadata)",
            "(allow sysctl-read)",
            "(allow mach-lookup)",
            "(allow signal)",
            "(allow iokit-open)",
            "(allow file-ioctl (regex #\"^/dev/\"))",
        ] {
            assert_eq!(count_lines(&profile, essential), 1, "{essential}");
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let cfg = config(&["/"], &["/tmp"], &["/usr/bin"], true);
        assert_eq!(compile_profile(&cfg), compile_profile(&cfg));
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        let profile = compile_profile(&config(&[], &["/tmp/a\"b\\c"], &[], false));
        assert!(
            profile
                .as_str()
                .contains("(allow file-write* (subpath \"/tmp/a\\\"b\\\\c\"))")
        );
    }
}

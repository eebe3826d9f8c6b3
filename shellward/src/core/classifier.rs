//! Deterministic classification of failed shell executions.
//!
//! Decides whether a failure under confinement was a policy denial or an
//! ordinary command failure, and derives a short reason for denials.

const REASON_PREVIEW_CHARS: usize = 100;

/// Classification of a failed confined execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The command failed on its own.
    Ordinary,
    /// The confinement policy blocked the command.
    Denied { reason: String },
}

impl Classification {
    pub fn is_denial(&self) -> bool {
        matches!(self, Classification::Denied { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Classification::Ordinary => None,
            Classification::Denied { reason } => Some(reason),
        }
    }
}

/// Classify combined output and exit code. First matching rule wins:
///
/// - output mentions both `sandbox` and `deny`
/// - output mentions `operation not permitted`
/// - exit code 1 and output mentions `permission denied` or `not permitted`
///
/// Matching ignores case.
pub fn classify_failure(output: &str, exit_code: Option<i32>) -> Classification {
    let lower = output.to_lowercase();
    if is_denial(&lower, exit_code) {
        Classification::Denied {
            reason: denial_reason(output, &lower),
        }
    } else {
        Classification::Ordinary
    }
}

fn is_denial(lower: &str, exit_code: Option<i32>) -> bool {
    if lower.contains("sandbox") && lower.contains("deny") {
        return true;
    }
    if lower.contains("operation not permitted") {
        return true;
    }
    exit_code == Some(1)
        && (lower.contains("permission denied") || lower.contains("not permitted"))
}

fn denial_reason(output: &str, lower: &str) -> String {
    if lower.contains("network") {
        return "network access denied".to_string();
    }
    if lower.contains("write") || lower.contains("permission denied") {
        return "write access denied".to_string();
    }
    if lower.contains("exec") {
        return "execution denied".to_string();
    }
    if lower.contains("read") {
        return "read access denied".to_string();
    }

    if output.chars().count() > REASON_PREVIEW_CHARS {
        let preview: String = output.chars().take(REASON_PREVIEW_CHARS).collect();
        return format!("{preview}...");
    }
    if !output.is_empty() {
        return output.to_string();
    }
    "sandbox policy violation".to_string()
}

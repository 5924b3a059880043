//! Verdict expressions of the form `Kind(Action)`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The closed set of verdict kinds a rule may conclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VerdictKind {
    Obligated,
    Allowed,
    Disallowed,
    Rejected,
}

impl VerdictKind {
    /// All kinds, in declaration order.
    pub const ALL: [VerdictKind; 4] = [
        VerdictKind::Obligated,
        VerdictKind::Allowed,
        VerdictKind::Disallowed,
        VerdictKind::Rejected,
    ];

    /// Returns the kind name as written in outcome strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Obligated => "Obligated",
            VerdictKind::Allowed => "Allowed",
            VerdictKind::Disallowed => "Disallowed",
            VerdictKind::Rejected => "Rejected",
        }
    }

    /// Parses a kind name. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Returns true if two kinds contradict each other on the same action.
    ///
    /// Only `{Obligated, Rejected}` and `{Allowed, Rejected}` are contradictory.
    /// `Disallowed` never participates in a contradiction.
    pub fn contradicts(self, other: VerdictKind) -> bool {
        matches!(
            (self, other),
            (VerdictKind::Obligated, VerdictKind::Rejected)
                | (VerdictKind::Rejected, VerdictKind::Obligated)
                | (VerdictKind::Allowed, VerdictKind::Rejected)
                | (VerdictKind::Rejected, VerdictKind::Allowed)
        )
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed view of a rule outcome.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub action: String,
}

fn verdict_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(Obligated|Allowed|Disallowed|Rejected)\((.+)\)$")
            .expect("verdict pattern is a valid constant regex")
    })
}

impl Verdict {
    pub fn new(kind: VerdictKind, action: impl Into<String>) -> Self {
        Self {
            kind,
            action: action.into(),
        }
    }

    /// Parses `Kind(Action)`.
    ///
    /// Surrounding whitespace on the whole outcome and on the action is
    /// ignored. Returns `None` (never an error) when the outcome does not
    /// have that shape or the action is blank; such rules are inert for
    /// conflict screening and certificate generation.
    pub fn parse(outcome: &str) -> Option<Verdict> {
        let caps = verdict_pattern().captures(outcome.trim())?;
        let kind = VerdictKind::from_name(caps.get(1)?.as_str())?;
        let action = caps.get(2)?.as_str().trim();
        if action.is_empty() {
            return None;
        }
        Some(Verdict::new(kind, action))
    }

    /// Returns true if both verdicts target the same action with contradictory kinds.
    pub fn conflicts_with(&self, other: &Verdict) -> bool {
        self.action == other.action && self.kind.contradicts(other.kind)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let v = Verdict::parse("Obligated(Action.ImmediateDelivery)").unwrap();
        assert_eq!(v.kind, VerdictKind::Obligated);
        assert_eq!(v.action, "Action.ImmediateDelivery");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let v = Verdict::parse("  Rejected( Action.X )  ").unwrap();
        assert_eq!(v, Verdict::new(VerdictKind::Rejected, "Action.X"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Verdict::parse("").is_none());
        assert!(Verdict::parse("Obligated").is_none());
        assert!(Verdict::parse("Obligated()").is_none());
        assert!(Verdict::parse("Obligated(  )").is_none());
        assert!(Verdict::parse("obligated(Action.X)").is_none());
        assert!(Verdict::parse("Required(Action.X)").is_none());
        assert!(Verdict::parse("Obligated(Action.X) extra").is_none());
    }

    #[test]
    fn test_display_round_trips_for_every_kind() {
        for kind in VerdictKind::ALL {
            let v = Verdict::new(kind, "Action.ExpectantManagement");
            assert_eq!(Verdict::parse(&v.to_string()), Some(v));
        }
    }

    #[test]
    fn test_contradiction_table() {
        use VerdictKind::*;
        assert!(Obligated.contradicts(Rejected));
        assert!(Rejected.contradicts(Allowed));
        assert!(!Obligated.contradicts(Allowed));
        assert!(!Disallowed.contradicts(Rejected));
        assert!(!Disallowed.contradicts(Obligated));
        assert!(!Rejected.contradicts(Rejected));
    }

    #[test]
    fn test_conflicts_require_same_action() {
        let a = Verdict::new(VerdictKind::Obligated, "Action.X");
        let b = Verdict::new(VerdictKind::Rejected, "Action.Y");
        assert!(!a.conflicts_with(&b));
        let c = Verdict::new(VerdictKind::Rejected, "Action.X");
        assert!(a.conflicts_with(&c));
    }
}

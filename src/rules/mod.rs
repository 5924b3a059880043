//! Rule model
//!
//! A rule is a hyperedge from a premise set of fact tokens to a verdict
//! expression `Kind(Action)`. Verdicts are parsed strictly at the boundary;
//! rules whose outcome does not parse are kept but treated as inert by the
//! conflict detector and the certificate compiler.

mod rule;
mod verdict;

pub use rule::{Rule, RuleMatch};
pub use verdict::{Verdict, VerdictKind};

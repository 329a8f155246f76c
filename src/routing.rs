//! Routing decisions.
//!
//! Which backend serves a request depends on its method and path and on the
//! [`MigrationPolicy`]. Nothing else: no body, no headers, no client identity.
//! Every call is an independent trial, so the same client may land on either
//! backend from one request to the next.
//!
//! The rules live in an ordered table. The first rule whose method and path
//! both match wins; a request no rule matches stays on the legacy backend.
//!
//! ```text
//! GET /api/movies, migration on   → roll 1..=100, roll <= percent → new
//! GET /api/movies, migration off  → legacy
//! anything else                   → legacy
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;
use rand::Rng;

use crate::backend::{Backends, Side, Target};
use crate::policy::MigrationPolicy;

/// The one route that takes part in the migration.
pub const MIGRATION_PATH: &str = "/api/movies";

// ── Random source ─────────────────────────────────────────────────────────────

/// A uniform draw over `1..=100`, safe to share between request tasks.
pub trait Dice: Send + Sync + 'static {
    fn roll(&self) -> u8;
}

/// Production dice: the calling thread's own generator, so concurrent
/// requests never contend on a shared one.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadDice;

impl Dice for ThreadDice {
    fn roll(&self) -> u8 {
        rand::thread_rng().gen_range(1..=100)
    }
}

// ── Rule table ────────────────────────────────────────────────────────────────

/// What a matching rule does with the request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Split between legacy and new according to the policy.
    Split,
}

/// One entry of the routing table. `path` is compared exactly: no trailing
/// slash folding, no query string.
#[derive(Clone, Debug)]
pub struct Rule {
    pub method: Method,
    pub path: String,
    pub action: Action,
}

impl Rule {
    pub fn split(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), action: Action::Split }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.path == path
    }
}

/// Why a request went where it did. Carried into the access log.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reason {
    /// A split rule matched and migration is on; the roll picked the side.
    SplitMigration,
    /// No rule covers this method and path.
    PathExcluded,
    /// A split rule matched but migration is off.
    LegacyDefault,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SplitMigration => "split-migration",
            Self::PathExcluded   => "path-excluded",
            Self::LegacyDefault  => "legacy-default",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-request outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decision {
    pub side: Side,
    pub reason: Reason,
}

/// Applies `rules` to one request. Pure apart from the dice roll, which
/// only happens for a split rule under an enabled policy.
pub fn decide(
    rules: &[Rule],
    method: &Method,
    path: &str,
    policy: &MigrationPolicy,
    dice: &dyn Dice,
) -> Decision {
    let Some(rule) = rules.iter().find(|r| r.matches(method, path)) else {
        return Decision { side: Side::Legacy, reason: Reason::PathExcluded };
    };

    match rule.action {
        Action::Split if policy.is_enabled() => {
            let side = if dice.roll() <= policy.percent() { Side::New } else { Side::Legacy };
            Decision { side, reason: Reason::SplitMigration }
        }
        Action::Split => Decision { side: Side::Legacy, reason: Reason::LegacyDefault },
    }
}

// ── Splitter ──────────────────────────────────────────────────────────────────

/// The routing table bound to its backends, policy and dice.
///
/// Immutable once built; share it behind an `Arc` across every request task.
pub struct Splitter {
    rules: Vec<Rule>,
    backends: Backends,
    policy: MigrationPolicy,
    dice: Arc<dyn Dice>,
}

impl Splitter {
    /// The standard table: only `GET /api/movies` is split.
    pub fn new(backends: Backends, policy: MigrationPolicy) -> Self {
        Self::with_rules(vec![Rule::split(Method::GET, MIGRATION_PATH)], backends, policy)
    }

    pub fn with_rules(rules: Vec<Rule>, backends: Backends, policy: MigrationPolicy) -> Self {
        Self { rules, backends, policy, dice: Arc::new(ThreadDice) }
    }

    /// Replaces the random source. Used to pin outcomes in tests.
    pub fn with_dice(mut self, dice: impl Dice) -> Self {
        self.dice = Arc::new(dice);
        self
    }

    pub fn decide(&self, method: &Method, path: &str) -> Decision {
        decide(&self.rules, method, path, &self.policy, self.dice.as_ref())
    }

    pub fn target(&self, side: Side) -> &Target {
        self.backends.get(side)
    }
}

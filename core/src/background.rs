//! Heuristic classifier deciding whether a named script should run detached.
//!
//! Exclusions dominate: a cleanup/build/test script left running detached
//! silently hangs the caller with no output drained, so any exclusion match
//! wins over a background indicator present in the same name. An explicit
//! caller override bypasses this function entirely.

/// Script-name keywords that must never run detached.
const EXCLUSION_KEYWORDS: &[&str] = &[
    // maintenance
    "cleanup", "clean", "reset",
    // build family
    "build", "compile", "bundle",
    // quality
    "lint", "format", "test",
    // release
    "deploy", "publish", "release", "prepare",
    // lifecycle hooks
    "preinstall", "postinstall", "prebuild", "postbuild",
    // verification
    "verify", "check", "validate", "audit",
    // upgrades
    "update", "upgrade", "migration", "migrate",
    // bootstrap
    "seed", "init", "setup", "config", "configure",
];

/// Substrings that suggest a long-running script (dev servers, watchers).
const BACKGROUND_INDICATORS: &[&str] = &["dev", "start", "serve", "watch"];

/// Separators that join an indicator to an exclusion in combined names like
/// `dev-cleanup` or `watch_lint`.
const PAIR_SEPARATORS: &[char] = &['-', '_', ':'];

/// Pure, case-insensitive decision: should `script_name` run detached by
/// default? Exclusion keywords are matched as whole-name prefixes, so
/// `test-watch`, `test:dev`, and `testdev` are all foreground before any
/// indicator logic runs.
pub fn should_auto_detect_background(script_name: &str) -> bool {
    let name = script_name.to_lowercase();

    if EXCLUSION_KEYWORDS.iter().any(|kw| name.starts_with(kw)) {
        return false;
    }

    BACKGROUND_INDICATORS
        .iter()
        .filter(|indicator| name.contains(*indicator))
        .any(|indicator| !has_exclusion_pairing(&name, indicator))
}

/// True when the indicator appears adjacent to an exclusion keyword through
/// a separator, in either order (`dev-cleanup`, `cleanup-dev`, ...). Such
/// names are disguised exclusion variants.
fn has_exclusion_pairing(name: &str, indicator: &str) -> bool {
    EXCLUSION_KEYWORDS.iter().any(|kw| {
        PAIR_SEPARATORS.iter().any(|sep| {
            name.contains(&format!("{indicator}{sep}{kw}"))
                || name.contains(&format!("{kw}{sep}{indicator}"))
        })
    })
}

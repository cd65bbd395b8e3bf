// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! One-time logging setup for hosts.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset and no level is given.
pub const DEFAULT_DIRECTIVE: &str = "info,get_money_agent=debug";

/// Install a stderr fmt subscriber. `RUST_LOG` takes precedence over
/// `level` (e.g. `"debug"` or `"warn,get_money_agent=trace"`). Returns
/// `false` if a global subscriber was already installed.
pub fn init(level: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = level.unwrap_or(DEFAULT_DIRECTIVE);
        EnvFilter::try_new(directive).unwrap_or_else(|e| {
            eprintln!("invalid log directive {directive:?}: {e}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_noop() {
        init(Some("warn"));
        assert!(!init(Some("debug")));
    }
}

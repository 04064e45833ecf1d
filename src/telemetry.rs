// src/telemetry.rs
//! Tracing setup and log-safe identifiers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global subscriber. `RUST_LOG` wins; otherwise crate info + warn.
/// `RANKER_LOG_FORMAT=json` switches to JSON lines.
/// A second call (or a host runtime that already installed one) is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resume_ranker=info,ranker=info,store=info,evaluator=info,api=info,warn"));

    let json = std::env::var("RANKER_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Short SHA-256 prefix so identities (e-mail addresses) never hit the logs verbatim.
pub fn anon_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_id_is_stable_and_short() {
        let a = anon_id("jane@doe.dev");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_id("jane@doe.dev"));
        assert_ne!(a, anon_id("john@doe.dev"));
    }
}

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Relay pool crates log every socket event at info; keep them at warn.
const QUIET_TARGETS: &[&str] = &["nostr_relay_pool", "nostr_sdk", "nostr"];

fn default_directives(component: &str) -> String {
    let mut directives = format!("info,remindme=debug,{component}=debug");
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// Logs go to stderr so the admin CLI can keep stdout for JSON.
pub fn init_tracing(component: &str) {
    let filter = std::env::var("REMINDME_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(component)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .compact()
        .try_init();
}

//! Device identity string mixed into the rate-limit checksum

/// Host-bound identity: hostname, OS, architecture, locale, timezone.
pub fn device_identity() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-device".into());
    let locale = std::env::var("LANG").unwrap_or_default();
    let tz = std::env::var("TZ").unwrap_or_default();

    format!(
        "{host}|{}|{}|{locale}|{tz}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

use std::time::Duration;

use crate::timeshift::TimeshiftConfig;

/// Upper bound on how long a single live read may stall before giving up.
const MAX_STALL: Duration = Duration::from_secs(10);

/// Internal validation, called automatically during `TimeshiftConfig::from_str` / `load`.
pub(crate) fn validate(config: &TimeshiftConfig) -> anyhow::Result<()> {
    let reader = &config.reader;

    if !reader.index_suffix.starts_with('.') || reader.index_suffix.len() < 2 {
        anyhow::bail!(
            "reader.index_suffix must start with \".\" and name an extension, got {:?}",
            reader.index_suffix,
        );
    }

    if reader.segment_extension.is_empty() {
        anyhow::bail!("reader.segment_extension must not be empty");
    }

    if reader.segment_size.as_bytes() == 0 {
        anyhow::bail!("reader.segment_size must be > 0");
    }

    if reader.index_read_attempts == 0 {
        anyhow::bail!("reader.index_read_attempts must be > 0");
    }

    let live = &config.live;

    if live.max_retries == 0 {
        anyhow::bail!("live.max_retries must be > 0");
    }

    if live.backoff.is_zero() {
        anyhow::bail!("live.backoff must be > 0");
    }

    // The retry ceiling times the backoff is the longest a read can block.
    match live.worst_case_stall() {
        Some(stall) if stall <= MAX_STALL => {}
        stall => anyhow::bail!(
            "live.backoff ({}) x live.max_retries ({}) stalls reads for {}, limit is {:?}",
            live.backoff,
            live.max_retries,
            stall.map_or_else(|| "longer than representable".to_string(), |d| format!("{d:?}")),
            MAX_STALL,
        ),
    }

    Ok(())
}

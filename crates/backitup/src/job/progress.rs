//! Parsing of rsync `--info=progress2` output.
//!
//! A progress2 line looks like
//! `      1,234,567  10%   10.00MB/s    0:00:10 (xfr#1, to-chk=10/20)`;
//! anything else (file names, warnings) carries no percentage.

use std::sync::LazyLock;

use regex::Regex;

static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+(\d+)%\s+").unwrap());

/// Extracts the overall percentage from one line of rsync output.
///
/// Returns `None` for lines without a whitespace-delimited `<digits>%` token
/// and for values above 100.
pub fn parse_progress_percent(line: &str) -> Option<u8> {
    let captures = RE_PERCENT.captures(line)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    u8::try_from(value).ok().filter(|pct| *pct <= 100)
}

/// Keeps reported progress monotonic within one job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressTracker {
    highest: Option<u8>,
}

impl ProgressTracker {
    /// Returns the percentage to report, or `None` if it would move the
    /// progress backwards.
    pub fn observe(&mut self, percentage: u8) -> Option<u8> {
        match self.highest {
            Some(highest) if percentage < highest => None,
            _ => {
                self.highest = Some(percentage);
                Some(percentage)
            }
        }
    }
}

//! Default logging setup for the robin_map workload tools
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Instant,
};

/// Environment variable holding the `env_logger` filter, defaults to `info`.
pub const FILTER_ENV: &str = "ROBIN_MAP_LOG";
/// Environment variable holding the `env_logger` write style.
pub const STYLE_ENV: &str = "ROBIN_MAP_LOG_STYLE";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Bytes(usize);

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 1000 {
            return write!(f, "{:5}B", self.0);
        }
        let (unit, shift) = if self.0 < 1000 << 10 {
            ('K', 10)
        } else if self.0 < 1000 << 20 {
            ('M', 20)
        } else {
            ('G', 30)
        };
        write!(f, "{:5.1}{unit}", self.0 as f64 / (1u64 << shift) as f64)
    }
}

/// Resident set size of the current process, zero where it can't be determined.
#[cfg(all(target_os = "linux", not(miri)))]
fn resident_memory() -> Bytes {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return Bytes(0);
    };
    let pages = statm
        .split_ascii_whitespace()
        .nth(1)
        .and_then(|pages| pages.parse::<usize>().ok())
        .unwrap_or(0);
    // SAFETY: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    Bytes(pages * usize::try_from(page_size).unwrap_or(4096))
}

#[cfg(not(all(target_os = "linux", not(miri))))]
fn resident_memory() -> Bytes {
    Bytes(0)
}

const ELAPSED_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));
const MEMORY_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Blue)));
const MEMORY_PEAK_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));
const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

/// Perform the default logging setup used by the workload tools.
///
/// Every record is prefixed with the time since setup and the resident memory, which is
/// highlighted whenever it reaches a new peak. A header line naming the target is printed
/// whenever it changes from one record to the next.
pub fn setup() {
    let start_time = Instant::now();
    let peak = AtomicUsize::new(0);
    let last_target = Mutex::new(String::new());

    env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or(FILTER_ENV, "info")
            .write_style(STYLE_ENV),
    )
    .format(move |buf, record| {
        let elapsed = start_time.elapsed();
        let memory = resident_memory();
        let new_peak = peak.fetch_max(memory.0, Ordering::Relaxed) < memory.0;
        let memory_style = if new_peak {
            MEMORY_PEAK_STYLE
        } else {
            MEMORY_STYLE
        };
        let prefix = format!(
            "{ELAPSED_STYLE}{elapsed:>9.2?}{ELAPSED_STYLE:#} {memory_style}{memory}{memory_style:#}"
        );

        let target = record.target();
        let mut last_target = last_target.lock().unwrap_or_else(|err| err.into_inner());
        if *last_target != target {
            last_target.clear();
            last_target.push_str(target);
            writeln!(buf, "{prefix} {TARGET_STYLE}{target}{TARGET_STYLE:#}")?;
        }

        let level_style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{prefix} {level_style}{:5}{level_style:#} {}",
            record.level(),
            record.args()
        )
    })
    .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_units() {
        assert_eq!(Bytes(999).to_string(), "  999B");
        assert_eq!(Bytes(2048).to_string(), "  2.0K");
        assert_eq!(Bytes(3 << 20).to_string(), "  3.0M");
        assert_eq!(Bytes(5 << 30).to_string(), "  5.0G");
    }
}

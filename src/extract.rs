//! Tolerant metric extraction from an ApacheBench summary report.
//!
//! Each metric is pulled out by an ordered list of rules tried in sequence:
//! an anchored regex first, then looser line scans. The first rule that
//! yields a number wins; if none do, the metric defaults to zero. Reports in
//! the wild vary (ab versions, wrapper scripts reformatting the output), so
//! extraction never fails on content, only on I/O.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// First numeric token on a line (integer or decimal, possibly negative).
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+(\.\d+)?").unwrap());

/// Lines worth echoing back to the user verbatim.
static DIAGNOSTIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)failed|non-2xx|errors").unwrap());

static TOTAL_REQUESTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Total Requests:\s*(\d+)").unwrap());
static REQUESTS_PER_SECOND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Requests per Second:\s*([\d.]+)").unwrap());
static AVG_LATENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Average Latency \(Total\):\s*([\d.]+)").unwrap());
static TIME_PER_REQUEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Time per request:\s*([\d.]+)").unwrap());
static P90_SERVED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)90%.*?served in[:\s]*([\d.]+)").unwrap());
static TRANSFER_RATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Transfer rate:\s*([\d.]+)").unwrap());

/// All metrics extracted from one summary report.
///
/// Every field is always present; anything the report doesn't mention stays
/// at its zero default. Counts are clamped non-negative at coercion time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,
    /// "Average Latency (Total)" or, failing that, ab's "Time per request".
    pub avg_latency_ms: f64,
    pub p90_ms: f64,
    pub mean_connect_ms: f64,
    pub mean_processing_ms: f64,
    pub mean_waiting_ms: f64,
    pub transfer_rate: f64,
    /// Raw report lines mentioning failed/non-2xx/errors, for display only.
    pub diagnostic_lines: Vec<String>,
}

impl MetricSet {
    /// Display-name/value rows for the console echo, diagnostics excluded.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Requests", self.total_requests.to_string()),
            ("Requests per Second", self.requests_per_second.to_string()),
            ("Average Latency (Total)", self.avg_latency_ms.to_string()),
            ("90% of requests served in", self.p90_ms.to_string()),
            ("Mean Connection Time", self.mean_connect_ms.to_string()),
            ("Mean Processing Time", self.mean_processing_ms.to_string()),
            ("Mean Waiting Time", self.mean_waiting_ms.to_string()),
            ("Failed Requests", self.failed_requests.to_string()),
            ("Transfer Rate", self.transfer_rate.to_string()),
        ]
    }
}

/// One step in a metric's extraction cascade.
enum Rule {
    /// Case-insensitive regex with one numeric capture group, run against
    /// the whole report.
    Anchored(&'static Regex),
    /// First numeric token on the first line containing this substring
    /// (case-insensitive) that has one.
    FirstOnLine(&'static str),
    /// ab prints connection times as `min mean[+/-sd] median max` columns;
    /// on a line containing this token, the second numeric token is the
    /// mean. A line with a single number yields that number as-is.
    MeanColumn(&'static str),
}

/// A summary report loaded into memory, lines plus joined content.
struct Report {
    lines: Vec<String>,
    content: String,
}

impl Report {
    /// Read the file permissively: undecodable bytes are replaced, never fatal.
    fn load(path: &Path) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractError::NotFound(path.to_path_buf())
            } else {
                ExtractError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let lines = content.lines().map(|ln| ln.to_string()).collect();
        Ok(Report { lines, content })
    }

    fn number_by_regex(&self, re: &Regex) -> Option<f64> {
        re.captures(&self.content)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn first_number_on_line_with(&self, token: &str) -> Option<f64> {
        let token = token.to_lowercase();
        for ln in &self.lines {
            if !ln.to_lowercase().contains(&token) {
                continue;
            }
            if let Some(m) = NUMBER_RE.find(ln) {
                return m.as_str().parse().ok();
            }
        }
        None
    }

    fn mean_column(&self, token: &str) -> Option<f64> {
        let token = token.to_lowercase();
        for ln in &self.lines {
            if !ln.to_lowercase().contains(&token) {
                continue;
            }
            let nums: Vec<f64> = NUMBER_RE
                .find_iter(ln)
                .filter_map(|m| m.as_str().parse().ok())
                .collect();
            match nums.len() {
                0 => continue,
                1 => return Some(nums[0]),
                _ => return Some(nums[1]),
            }
        }
        None
    }

    /// Run a rule cascade to its first hit; zero if nothing matches.
    fn extract(&self, name: &str, rules: &[Rule]) -> f64 {
        for (idx, rule) in rules.iter().enumerate() {
            let hit = match rule {
                Rule::Anchored(re) => self.number_by_regex(re),
                Rule::FirstOnLine(token) => self.first_number_on_line_with(token),
                Rule::MeanColumn(token) => self.mean_column(token),
            };
            if let Some(value) = hit {
                tracing::debug!(metric = name, rule = idx, value, "extraction rule matched");
                return value;
            }
        }
        tracing::debug!(metric = name, "no extraction rule matched, defaulting to 0");
        0.0
    }
}

/// Clamp a parsed value into a count. Negative numbers on a matched line
/// must not produce a bogus huge count.
fn as_count(value: f64) -> u64 {
    if value <= 0.0 {
        0
    } else {
        value as u64
    }
}

/// Parse a summary report into a [`MetricSet`].
pub fn parse_summary(path: &Path) -> Result<MetricSet, ExtractError> {
    let report = Report::load(path)?;

    let total_requests = as_count(report.extract(
        "total_requests",
        &[
            Rule::Anchored(&TOTAL_REQUESTS_RE),
            Rule::FirstOnLine("Complete requests"),
        ],
    ));
    let requests_per_second = report.extract(
        "requests_per_second",
        &[
            Rule::Anchored(&REQUESTS_PER_SECOND_RE),
            Rule::FirstOnLine("Requests per second"),
        ],
    );
    let avg_latency_ms = report.extract(
        "avg_latency_ms",
        &[
            Rule::Anchored(&AVG_LATENCY_RE),
            Rule::Anchored(&TIME_PER_REQUEST_RE),
        ],
    );
    let p90_ms = report.extract(
        "p90_ms",
        &[Rule::Anchored(&P90_SERVED_RE), Rule::FirstOnLine("90%")],
    );

    let mean_connect_ms = report.extract("mean_connect_ms", &[Rule::MeanColumn("Connect")]);
    let mean_processing_ms =
        report.extract("mean_processing_ms", &[Rule::MeanColumn("Processing")]);
    let mean_waiting_ms = report.extract("mean_waiting_ms", &[Rule::MeanColumn("Waiting")]);

    // Fallback token order matters on reports carrying more than one of
    // these labels; kept as Failed -> Non-2xx -> Errors.
    let failed_requests = as_count(report.extract(
        "failed_requests",
        &[
            Rule::FirstOnLine("Failed"),
            Rule::FirstOnLine("Non-2xx"),
            Rule::FirstOnLine("Errors"),
        ],
    ));
    let transfer_rate = report.extract(
        "transfer_rate",
        &[
            Rule::Anchored(&TRANSFER_RATE_RE),
            Rule::FirstOnLine("Transfer rate"),
        ],
    );

    let diagnostic_lines: Vec<String> = report
        .lines
        .iter()
        .filter(|ln| DIAGNOSTIC_RE.is_match(ln))
        .cloned()
        .collect();

    Ok(MetricSet {
        total_requests,
        failed_requests,
        requests_per_second,
        avg_latency_ms,
        p90_ms,
        mean_connect_ms,
        mean_processing_ms,
        mean_waiting_ms,
        transfer_rate,
        diagnostic_lines,
    })
}

#[derive(Debug)]
pub enum ExtractError {
    NotFound(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotFound(path) => {
                write!(f, "summary file not found: {}", path.display())
            }
            ExtractError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::NotFound(_) => None,
            ExtractError::Io { source, .. } => Some(source),
        }
    }
}

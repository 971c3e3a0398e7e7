//! Chart rendering: one PNG with a latency-breakdown stacked bar on the
//! left and a request-outcome donut on the right.
//!
//! All numeric decisions (segment collapse, axis headroom, success floor)
//! live in [`LatencyBreakdown`] and [`Outcome`] so they can be tested
//! without a drawing backend.

use crate::extract::MetricSet;
use chrono::{DateTime, Local};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

const CONNECT_COLOR: RGBColor = RGBColor(0x4E, 0x88, 0xC3);
const WAITING_COLOR: RGBColor = RGBColor(0xF1, 0x7E, 0x7E);
const PROCESSING_COLOR: RGBColor = RGBColor(0x8B, 0xC4, 0x8A);
const SUCCESS_COLOR: RGBColor = RGBColor(0x6C, 0xC0, 0x70);
const FAILED_COLOR: RGBColor = RGBColor(0xF1, 0x5B, 0x5B);
const NEUTRAL_COLOR: RGBColor = RGBColor(0x7D, 0x7D, 0x7D);

const FIGURE_SIZE: (u32, u32) = (1680, 840);

/// One segment of the stacked latency bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: &'static str,
    pub value_ms: f64,
    pub color: RGBColor,
}

/// The latency bar's contents, derived from the timing metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyBreakdown {
    pub segments: Vec<Segment>,
    pub sum_ms: f64,
    /// Separately reported average total latency, shown in the annotation
    /// and used as the percentage denominator.
    pub display_total_ms: f64,
}

impl LatencyBreakdown {
    pub fn from_metrics(m: &MetricSet) -> Self {
        let sum_ms = m.mean_connect_ms + m.mean_waiting_ms + m.mean_processing_ms;
        let display_total_ms = m.avg_latency_ms;

        // Three zero-width segments make an empty-looking chart; if the
        // report still carries a total latency, show that as one segment.
        let segments = if sum_ms == 0.0 && display_total_ms > 0.0 {
            vec![Segment {
                label: "Total Latency",
                value_ms: display_total_ms,
                color: NEUTRAL_COLOR,
            }]
        } else {
            vec![
                Segment {
                    label: "Connect",
                    value_ms: m.mean_connect_ms,
                    color: CONNECT_COLOR,
                },
                Segment {
                    label: "Waiting",
                    value_ms: m.mean_waiting_ms,
                    color: WAITING_COLOR,
                },
                Segment {
                    label: "Processing",
                    value_ms: m.mean_processing_ms,
                    color: PROCESSING_COLOR,
                },
            ]
        };

        Self {
            segments,
            sum_ms,
            display_total_ms,
        }
    }

    /// X-axis upper bound: 15% headroom over the larger of the displayed
    /// total and the component sum, never below 1 ms wide.
    pub fn axis_max(&self) -> f64 {
        self.display_total_ms.max(self.sum_ms).max(1.0) * 1.15
    }

    /// A segment's share of the displayed total, in percent.
    pub fn percent_of_total(&self, value_ms: f64) -> f64 {
        let denom = if self.display_total_ms > 0.0 {
            self.display_total_ms
        } else {
            1.0
        };
        value_ms / denom * 100.0
    }
}

/// Successful/failed request split for the outcome donut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub total: u64,
    pub failed: u64,
    pub successful: u64,
}

impl Outcome {
    pub fn from_metrics(m: &MetricSet) -> Self {
        Self {
            total: m.total_requests,
            failed: m.failed_requests,
            // Floor at zero: a failed count above the total must not
            // underflow into a giant success slice.
            successful: m.total_requests.saturating_sub(m.failed_requests),
        }
    }

    pub fn failed_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Output filename for a run at the given instant.
///
/// Second-level granularity; two renders within the same second overwrite
/// each other, which is fine for a single-shot tool.
pub fn output_name(now: DateTime<Local>) -> String {
    format!("ab_results_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// Render both charts for `metrics` into a PNG at `out_path`.
pub fn render_charts(
    metrics: &MetricSet,
    input_name: &str,
    out_path: &Path,
) -> Result<(), RenderError> {
    let breakdown = LatencyBreakdown::from_metrics(metrics);
    let outcome = Outcome::from_metrics(metrics);

    let root = BitMapBackend::new(out_path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let title = format!(
        "Apache Bench Results — {input_name}  •  Generated: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let root = root.titled(&title, ("sans-serif", 30).into_font().color(&BLACK))?;

    let half = root.dim_in_pixel().0 as i32 / 2;
    let (left, right) = root.split_horizontally(half);

    draw_latency_bar(&left, &breakdown)?;
    draw_outcome_donut(&right, &outcome)?;

    root.present()?;
    tracing::debug!(path = %out_path.display(), "charts written");
    Ok(())
}

fn draw_latency_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    breakdown: &LatencyBreakdown,
) -> Result<(), RenderError> {
    let axis_max = breakdown.axis_max();

    let mut chart = ChartBuilder::on(area)
        .caption("Mean Latency Breakdown (ms)", ("sans-serif", 26))
        .margin(24)
        .x_label_area_size(36)
        .build_cartesian_2d(0.0..axis_max, -1.0..1.0_f64)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .draw()?;

    let mut edge = 0.0;
    let mut bars = Vec::new();
    for seg in &breakdown.segments {
        bars.push(Rectangle::new(
            [(edge, -0.3), (edge + seg.value_ms, 0.3)],
            seg.color.filled(),
        ));
        edge += seg.value_ms;
    }
    chart.draw_series(bars)?;

    let label_style = ("sans-serif", 18)
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));

    let mut edge = 0.0;
    for seg in &breakdown.segments {
        if seg.value_ms <= 0.0 {
            continue;
        }
        let x = edge + seg.value_ms / 2.0;
        let pct = breakdown.percent_of_total(seg.value_ms);
        let lines = [
            (seg.label.to_string(), 0.11),
            (format!("{:.1} ms", seg.value_ms), 0.0),
            (format!("{pct:.1}%"), -0.11),
        ];
        for (text, y) in lines {
            chart
                .plotting_area()
                .draw(&Text::new(text, (x, y), label_style.clone()))?;
        }
        edge += seg.value_ms;
    }

    let annotation = format!("Total (avg): {:.1} ms", breakdown.display_total_ms);
    chart.plotting_area().draw(&Text::new(
        annotation,
        (axis_max * 0.02, 0.75),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))?;

    Ok(())
}

fn draw_outcome_donut<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    outcome: &Outcome,
) -> Result<(), RenderError> {
    let area = area.titled(
        "Request Outcome",
        ("sans-serif", 26).into_font().color(&BLACK),
    )?;

    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let centered = |size: u32| {
        ("sans-serif", size)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center))
    };

    if outcome.total == 0 {
        area.draw(&Text::new("No requests", center, centered(24)))?;
        return Ok(());
    }

    // Zero-sized slices are dropped up front so empty categories get
    // neither a wedge label nor a percentage.
    let mut sizes = Vec::new();
    let mut colors = Vec::new();
    let mut labels = Vec::new();
    if outcome.successful > 0 {
        sizes.push(outcome.successful as f64);
        colors.push(SUCCESS_COLOR);
        labels.push(format!("Successful ({})", outcome.successful));
    }
    if outcome.failed > 0 {
        sizes.push(outcome.failed as f64);
        colors.push(FAILED_COLOR);
        labels.push(format!("Failed ({})", outcome.failed));
    }

    let radius = (w.min(h) as f64) * 0.35;
    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(90.0);
    pie.label_style(("sans-serif", 20).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 18).into_font().color(&BLACK));
    area.draw(&pie)?;

    // Punch the donut hole by painting over the middle.
    let hole = (radius * 0.45) as i32;
    area.draw(&Circle::new(center, hole, WHITE.filled()))?;

    let hub = [
        (outcome.total.to_string(), -22),
        ("requests".to_string(), 0),
        (format!("{:.1}% failed", outcome.failed_percent()), 22),
    ];
    for (text, dy) in hub {
        area.draw(&Text::new(text, (center.0, center.1 + dy), centered(18)))?;
    }

    Ok(())
}

#[derive(Debug)]
pub enum RenderError {
    Draw(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Draw(msg) => write!(f, "chart rendering failed: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

// Plotters errors are generic over the backend; collapse them to their
// message at the module boundary.
impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Draw(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn metrics() -> MetricSet {
        MetricSet {
            total_requests: 100,
            failed_requests: 8,
            requests_per_second: 820.0,
            avg_latency_ms: 12.0,
            p90_ms: 18.0,
            mean_connect_ms: 2.0,
            mean_processing_ms: 6.0,
            mean_waiting_ms: 4.0,
            transfer_rate: 400.0,
            diagnostic_lines: Vec::new(),
        }
    }

    #[test]
    fn breakdown_has_three_segments() {
        let b = LatencyBreakdown::from_metrics(&metrics());
        assert_eq!(b.segments.len(), 3);
        assert_eq!(b.segments[0].label, "Connect");
        assert_eq!(b.segments[1].label, "Waiting");
        assert_eq!(b.segments[2].label, "Processing");
        assert_eq!(b.sum_ms, 12.0);
    }

    #[test]
    fn breakdown_collapses_to_total_latency() {
        let m = MetricSet {
            mean_connect_ms: 0.0,
            mean_processing_ms: 0.0,
            mean_waiting_ms: 0.0,
            avg_latency_ms: 42.0,
            ..metrics()
        };
        let b = LatencyBreakdown::from_metrics(&m);
        assert_eq!(b.segments.len(), 1);
        assert_eq!(b.segments[0].label, "Total Latency");
        assert_eq!(b.segments[0].value_ms, 42.0);
    }

    #[test]
    fn breakdown_all_zero_stays_componentwise() {
        let b = LatencyBreakdown::from_metrics(&MetricSet::default());
        assert_eq!(b.segments.len(), 3);
        assert!(b.segments.iter().all(|s| s.value_ms == 0.0));
    }

    #[test]
    fn axis_max_has_headroom() {
        let b = LatencyBreakdown::from_metrics(&metrics());
        assert!((b.axis_max() - 12.0 * 1.15).abs() < 1e-9);
    }

    #[test]
    fn axis_max_floors_at_one_ms() {
        let b = LatencyBreakdown::from_metrics(&MetricSet::default());
        assert!((b.axis_max() - 1.15).abs() < 1e-9);
    }

    #[test]
    fn percent_uses_display_total() {
        let b = LatencyBreakdown::from_metrics(&metrics());
        assert!((b.percent_of_total(6.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn percent_denominator_floor_when_no_display_total() {
        let m = MetricSet {
            avg_latency_ms: 0.0,
            ..metrics()
        };
        let b = LatencyBreakdown::from_metrics(&m);
        assert!((b.percent_of_total(2.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn outcome_splits_requests() {
        let o = Outcome::from_metrics(&metrics());
        assert_eq!(o.total, 100);
        assert_eq!(o.failed, 8);
        assert_eq!(o.successful, 92);
        assert!((o.failed_percent() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn outcome_all_successful() {
        let m = MetricSet {
            failed_requests: 0,
            ..metrics()
        };
        let o = Outcome::from_metrics(&m);
        assert_eq!(o.successful, 100);
        assert_eq!(o.failed_percent(), 0.0);
    }

    #[test]
    fn outcome_success_floors_at_zero() {
        let m = MetricSet {
            total_requests: 10,
            failed_requests: 25,
            ..metrics()
        };
        let o = Outcome::from_metrics(&m);
        assert_eq!(o.successful, 0);
    }

    #[test]
    fn outcome_no_requests() {
        let o = Outcome::from_metrics(&MetricSet::default());
        assert_eq!(o.total, 0);
        assert_eq!(o.failed_percent(), 0.0);
    }

    #[test]
    fn output_name_format() {
        let now = Local.with_ymd_and_hms(2026, 8, 30, 14, 25, 30).unwrap();
        assert_eq!(output_name(now), "ab_results_20260830_142530.png");
    }

    #[test]
    fn render_writes_png() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("charts.png");
        render_charts(&metrics(), "summary.txt", &out).unwrap();
        let len = std::fs::metadata(&out).unwrap().len();
        assert!(len > 0);
    }

    #[test]
    fn render_no_requests_placeholder() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("charts.png");
        render_charts(&MetricSet::default(), "summary.txt", &out).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn render_all_failed() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("charts.png");
        let m = MetricSet {
            total_requests: 10,
            failed_requests: 10,
            ..metrics()
        };
        render_charts(&m, "summary.txt", &out).unwrap();
        assert!(out.exists());
    }
}

//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined. Charts are
//! plain inline SVG.

use anyhow::{Context, Result};
use std::path::Path;

use examtally_core::report::AggregationReport;
use examtally_core::statistics::{
    accuracy_histogram, format_clock_ms, AccuracyTally, UserScore, ACCURACY_BUCKETS,
    NOT_APPLICABLE,
};

/// Users shown in the ranking chart. Labels are anonymised as `User N`.
const TOP_USERS: usize = 15;

const GREEN: &str = "#22c55e";
const RED: &str = "#ef4444";
const BLUE: &str = "#3b82f6";
const AMBER: &str = "#eab308";

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

struct Bar {
    label: String,
    value: f64,
    caption: String,
    color: &'static str,
}

/// Generate an HTML report from an aggregation report.
pub fn generate_html(report: &AggregationReport) -> String {
    let summary = &report.summary;
    let scores = report.user_scores();
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>examtally report: {}</title>\n",
        html_escape(&report.source)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>examtally report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Export: <strong>{}</strong> | {} users ({} submitted) | {} catalog questions | {} manual grades | {}</p>\n",
        html_escape(&report.source),
        summary.total_users,
        summary.submitted_users,
        report.catalog_size,
        report.grades_applied,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Accuracy</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Slice</th><th>Correct</th><th>Incorrect</th><th>Accuracy</th><th>Answers</th><th>Avg Time</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for (label, slice) in summary.labelled_slices() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            label,
            slice.accuracy.correct,
            slice.accuracy.incorrect,
            percent_text(&slice.accuracy),
            slice.timing.answers,
            slice
                .timing
                .mean_ms()
                .map_or_else(|| NOT_APPLICABLE.to_string(), format_clock_ms),
        ));
    }
    html.push_str("</tbody></table>\n");

    html.push_str("<div class=\"charts\">\n");
    html.push_str(&chart(
        "Overall Correct vs Incorrect",
        &[
            Bar {
                label: "Correct".into(),
                value: summary.overall.accuracy.correct as f64,
                caption: summary.overall.accuracy.correct.to_string(),
                color: GREEN,
            },
            Bar {
                label: "Incorrect".into(),
                value: summary.overall.accuracy.incorrect as f64,
                caption: summary.overall.accuracy.incorrect.to_string(),
                color: RED,
            },
        ],
        None,
    ));
    html.push_str(&chart(
        "Text vs Audio Accuracy",
        &[
            accuracy_bar("Text", &summary.text.accuracy, BLUE),
            accuracy_bar("Audio", &summary.audio.accuracy, AMBER),
        ],
        Some(100.0),
    ));
    html.push_str(&chart(
        "Accuracy by Question Category",
        &[
            accuracy_bar("Standard", &summary.standard.accuracy, BLUE),
            accuracy_bar("Control", &summary.control.accuracy, AMBER),
        ],
        Some(100.0),
    ));
    html.push_str("</div>\n");

    html.push_str(&summary_table_section(report));
    html.push_str("</section>\n");

    // Per-user ranking
    html.push_str("<section class=\"users\">\n");
    html.push_str("<h2>Users</h2>\n");
    html.push_str("<div class=\"charts\">\n");
    html.push_str(&top_users_chart(&scores));
    html.push_str(&distribution_chart(&scores));
    html.push_str("</div>\n");
    html.push_str(&users_table(report));
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(&report.summary).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &AggregationReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn percent_text(tally: &AccuracyTally) -> String {
    tally
        .accuracy()
        .map_or_else(|| NOT_APPLICABLE.to_string(), |a| format!("{:.1}%", a * 100.0))
}

fn accuracy_bar(label: &str, tally: &AccuracyTally, color: &'static str) -> Bar {
    Bar {
        label: label.to_string(),
        value: tally.accuracy().unwrap_or(0.0) * 100.0,
        caption: percent_text(tally),
        color,
    }
}

fn summary_table_section(report: &AggregationReport) -> String {
    let mut html = String::from("<details>\n<summary>All metrics</summary>\n<table class=\"metrics\">\n");
    html.push_str("<thead><tr><th>Metric</th><th>Value</th></tr></thead>\n<tbody>\n");
    for (metric, value) in report.summary.to_table().iter() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            html_escape(metric),
            html_escape(value)
        ));
    }
    html.push_str("</tbody></table>\n</details>\n");
    html
}

fn users_table(report: &AggregationReport) -> String {
    let mut html = String::new();
    html.push_str("<table class=\"results-table\" id=\"users\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">User</th><th onclick=\"sortTable(1)\">Email</th><th onclick=\"sortTable(2)\">Status</th><th onclick=\"sortTable(3)\">Answers</th><th onclick=\"sortTable(4)\">Tab Changes</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for user in report.users.values() {
        let class = if user.is_submitted() { "pass" } else { "fail" };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&user.user_id),
            html_escape(user.email.as_deref().unwrap_or(NOT_APPLICABLE)),
            class,
            user.submission_status,
            user.answers.len(),
            user.tab_change_count,
        ));
    }
    html.push_str("</tbody></table>\n");
    html
}

fn top_users_chart(scores: &[UserScore]) -> String {
    let bars: Vec<Bar> = scores
        .iter()
        .take(TOP_USERS)
        .enumerate()
        .map(|(i, score)| {
            let percent = score.accuracy_percent().unwrap_or(0.0);
            Bar {
                label: format!("User {}", i + 1),
                value: percent,
                caption: format!("{percent:.1}%"),
                color: grade_color(percent),
            }
        })
        .collect();
    chart(&format!("Top {TOP_USERS} Users by Accuracy"), &bars, Some(100.0))
}

fn distribution_chart(scores: &[UserScore]) -> String {
    let counts = accuracy_histogram(scores);
    let bars: Vec<Bar> = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let lower = ACCURACY_BUCKETS[i];
            let label = match ACCURACY_BUCKETS.get(i + 1) {
                Some(upper) => format!("{lower:.0}-{upper:.0}%"),
                None => format!("{lower:.0}-100%"),
            };
            Bar {
                label,
                value: count as f64,
                caption: count.to_string(),
                color: grade_color(lower),
            }
        })
        .collect();
    chart("User Accuracy Distribution", &bars, None)
}

fn grade_color(percent: f64) -> &'static str {
    if percent >= 80.0 {
        GREEN
    } else if percent >= 50.0 {
        AMBER
    } else {
        RED
    }
}

/// Horizontal bar chart. Bars are scaled against `scale`, or against the
/// largest value when `scale` is `None`.
fn chart(title: &str, bars: &[Bar], scale: Option<f64>) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 120;
    let title_height = 30;

    let max = scale
        .unwrap_or_else(|| bars.iter().map(|b| b.value).fold(0.0, f64::max))
        .max(f64::EPSILON);
    let total_height = title_height + bars.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\" role=\"img\">\n",
        label_width + max_width + 220,
        total_height
    );
    svg.push_str(&format!(
        "  <text x=\"0\" y=\"20\" font-size=\"16\" font-weight=\"bold\" fill=\"currentColor\">{}</text>\n",
        html_escape(title)
    ));

    for (i, bar) in bars.iter().enumerate() {
        let y = title_height + i * (bar_height + padding) + padding;
        let width = ((bar.value / max).clamp(0.0, 1.0) * max_width as f64) as usize;

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&bar.label)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, bar.color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            html_escape(&bar.caption)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fef9c3; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #713f12; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.charts { display: flex; flex-wrap: wrap; gap: 2rem; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('users');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

//! Markdown rendering of dashboard views.
//!
//! Stat cards and tables are printed as Markdown so the output reads well in
//! a terminal and can be pasted into a report unchanged.

use crate::render::{BatchPredictionView, HistoryView, SinglePredictionView, SummaryView};
use crate::models::{JobPopulation, PredictionResult, YearlyAggregate};

/// Width of the longest bar in text charts.
const BAR_WIDTH: usize = 30;

/// Generate the dataset summary cards and charts.
pub fn generate_summary_section(view: &SummaryView) -> String {
    let mut section = String::new();

    section.push_str("## Dataset Summary\n\n");
    section.push_str("| Records | Population | Job Types | Years |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        format_count(view.total_records as f64),
        format_count(view.total_population as f64),
        view.job_count,
        view.year_range
    ));

    if !view.yearly_totals.is_empty() {
        section.push_str("### Population by Year\n\n");
        section.push_str(&generate_yearly_chart(&view.yearly_totals));
        section.push('\n');
    }

    if !view.top_jobs.is_empty() {
        section.push_str("### Top Jobs\n\n");
        section.push_str(&generate_job_chart(&view.top_jobs));
        section.push('\n');
    }

    section
}

/// Generate the historical trend section.
pub fn generate_history_section(view: &HistoryView) -> String {
    let mut section = String::new();

    section.push_str(&format!("## Historical Data: {}\n\n", view.filter));

    if view.yearly.is_empty() {
        section.push_str("No historical records match this filter.\n\n");
        return section;
    }

    section.push_str(&format!("*{} records*\n\n", view.record_count));
    section.push_str("| Year | Population | Growth |\n");
    section.push_str("|:---|---:|---:|\n");

    for (i, point) in view.yearly.iter().enumerate() {
        // Growth starts at the second year
        let growth = match i.checked_sub(1).and_then(|g| view.growth.get(g)) {
            Some(rate) => format_percent(*rate),
            None => "-".to_string(),
        };
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            point.year,
            format_count(point.population as f64),
            growth
        ));
    }
    section.push('\n');

    section.push_str(&generate_yearly_chart(&view.yearly));
    section.push('\n');

    if let (Some(latest), false) = (view.yearly.last(), view.latest_year_jobs.is_empty()) {
        section.push_str(&format!("### Top Jobs in {}\n\n", latest.year));
        section.push_str("| Job Type | Population | Share |\n");
        section.push_str("|:---|---:|---:|\n");
        for job in &view.latest_year_jobs {
            section.push_str(&format!(
                "| {} | {} | {:.1}% |\n",
                job.job_type,
                format_count(job.population as f64),
                job.share
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the result card of a single prediction.
pub fn generate_prediction_section(view: &SinglePredictionView) -> String {
    let p = &view.prediction;
    let mut section = String::new();

    section.push_str(&format!("## Prediction: {}\n\n", p.job_type));
    section.push_str(&format!(
        "| Current ({}) | Predicted ({}) | CAGR | Confidence Interval |\n",
        p.current_year, p.target_year
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        format_count(p.current_population),
        format_count(p.mean_prediction),
        format_percent(p.cagr),
        format_interval(p)
    ));

    section.push_str(&format!(
        "- **Change:** {}\n",
        format_signed_count(p.absolute_change())
    ));
    section.push_str(&format!(
        "- **Interval width:** {}\n",
        format_count(p.ci_width())
    ));
    if let Some(median) = p.median_prediction {
        section.push_str(&format!("- **Median:** {}\n", format_count(median)));
    }
    if let (Some(min), Some(max)) = (p.min_prediction, p.max_prediction) {
        section.push_str(&format!(
            "- **Simulated range:** {} - {}\n",
            format_count(min),
            format_count(max)
        ));
    }
    if let Some(n) = p.n_simulations {
        section.push_str(&format!("- **Simulations:** {}\n", n));
    }
    section.push('\n');

    if !view.history.is_empty() {
        section.push_str("### History\n\n");
        section.push_str(&generate_yearly_chart(&view.history));
        section.push('\n');
    }

    section
}

/// Generate the batch result table.
pub fn generate_batch_section(view: &BatchPredictionView) -> String {
    let mut section = String::new();

    section.push_str("## Batch Prediction\n\n");

    if view.results.is_empty() {
        section.push_str("The server returned no predictions.\n\n");
        return section;
    }

    if let Some(summary) = view.summary {
        section.push_str("| Average CAGR | Current Total | Predicted Total |\n");
        section.push_str("|:---:|:---:|:---:|\n");
        section.push_str(&format!(
            "| {} | {} | {} |\n\n",
            format_percent(summary.avg_cagr),
            format_count(summary.total_current),
            format_count(summary.total_predicted)
        ));
    }

    section.push_str("| # | Job Type | Current | Predicted | CAGR | Confidence Interval |\n");
    section.push_str("|:---:|:---|---:|---:|---:|:---:|\n");

    for (i, result) in view.results.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            result.job_type,
            format_count(result.current_population),
            format_count(result.mean_prediction),
            format_percent(result.cagr),
            format_interval(result)
        ));
    }
    section.push('\n');

    if let Some(target) = view.parameters.target_year {
        section.push_str(&format!("*Target year: {}", target));
        if let Some(n) = view.parameters.n_simulations {
            section.push_str(&format!(" | Simulations: {}", n));
        }
        section.push_str("*\n\n");
    }

    section
}

/// Horizontal bar chart of a yearly series.
fn generate_yearly_chart(series: &[YearlyAggregate]) -> String {
    let max = series.iter().map(|p| p.population).max().unwrap_or(0);

    let mut chart = String::from("```\n");
    for point in series {
        chart.push_str(&format!(
            "{} {} {}\n",
            point.year,
            bar(point.population as f64, max as f64),
            format_count(point.population as f64)
        ));
    }
    chart.push_str("```\n");
    chart
}

/// Horizontal bar chart of job populations, in the given order.
fn generate_job_chart(jobs: &[JobPopulation]) -> String {
    let max = jobs.iter().map(|j| j.population).max().unwrap_or(0);
    let label_width = jobs.iter().map(|j| j.job_type.chars().count()).max().unwrap_or(0);

    let mut chart = String::from("```\n");
    for job in jobs {
        chart.push_str(&format!(
            "{:<width$} {} {}\n",
            job.job_type,
            bar(job.population as f64, max as f64),
            format_count(job.population as f64),
            width = label_width
        ));
    }
    chart.push_str("```\n");
    chart
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.clamp(1, BAR_WIDTH))
}

/// Format a head count with thousands separators, rounded to a whole number.
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }

    let rounded = value.round().abs() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value.round() < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn format_signed_count(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", format_count(value))
    } else {
        format_count(value)
    }
}

/// Format a percentage with two decimals. Infinite and NaN rates are kept
/// visible rather than hidden.
pub fn format_percent(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "+" } else { "-" };
        format!("{}∞%", sign)
    } else {
        format!("{:.2}%", value)
    }
}

fn format_interval(result: &PredictionResult) -> String {
    format!(
        "{} - {}",
        format_count(result.ci_lower),
        format_count(result.ci_upper)
    )
}

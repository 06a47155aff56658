//! Prometheus text exposition format.
//!
//! Renders a recorder snapshot for scraping by a Prometheus server or
//! compatible agent.

use std::fmt::Write;

use crate::recorder::RecorderSnapshot;

/// Render a recorder snapshot into Prometheus text format.
///
/// Tick outcomes are one COUNTER family with an `outcome` label; the last
/// sampled values are GAUGEs. All series carry `queue` and `application`.
pub fn render_prometheus(snapshot: &RecorderSnapshot) -> String {
    let labels = format!(
        "queue=\"{}\",application=\"{}\"",
        escape_label(&snapshot.queue_name),
        escape_label(&snapshot.application_name)
    );
    let mut out = String::new();

    out.push_str("# HELP qscale_ticks_total Controller ticks completed.\n");
    out.push_str("# TYPE qscale_ticks_total counter\n");
    let _ = writeln!(out, "qscale_ticks_total{{{labels}}} {}", snapshot.ticks);

    out.push_str("# HELP qscale_tick_outcomes_total Controller ticks by outcome.\n");
    out.push_str("# TYPE qscale_tick_outcomes_total counter\n");
    for (outcome, value) in [
        ("below_threshold", snapshot.below_threshold),
        ("scaled", snapshot.scale_outs),
        ("sample_unavailable", snapshot.sample_failures),
        ("platform_read_failure", snapshot.platform_read_failures),
        ("platform_write_failure", snapshot.platform_write_failures),
    ] {
        let _ = writeln!(
            out,
            "qscale_tick_outcomes_total{{{labels},outcome=\"{outcome}\"}} {value}"
        );
    }

    for (name, help, value) in [
        ("qscale_queue_size", "Ready messages at the last successful sample.", snapshot.last_size),
        ("qscale_queue_consumers", "Consumers at the last successful sample.", snapshot.last_consumers),
        ("qscale_load_metric", "Messages per consumer at the last successful sample.", snapshot.last_metric),
        (
            "qscale_requested_instances",
            "Instance count requested by the most recent scale-out.",
            snapshot.last_requested_instances,
        ),
    ] {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name}{{{labels}}} {value}");
    }

    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::TickRecorder;
    use crate::sink::TickSink;
    use qscale_core::{QueueSample, TickRecord};

    #[test]
    fn render_empty() {
        let output = render_prometheus(&TickRecorder::new("work", "consumer").snapshot());

        assert!(output.contains("# TYPE qscale_ticks_total counter"));
        assert!(output.contains("qscale_ticks_total{queue=\"work\",application=\"consumer\"} 0"));
    }

    #[test]
    fn render_after_scale_out() {
        let recorder = TickRecorder::new("work", "consumer");
        let sample = QueueSample::new("work", 30, 5);
        recorder.record(&TickRecord::scaled(&sample, sample.load(), "consumer", 2, 3));

        let output = render_prometheus(&recorder.snapshot());
        assert!(output.contains(
            "qscale_tick_outcomes_total{queue=\"work\",application=\"consumer\",outcome=\"scaled\"} 1"
        ));
        assert!(output.contains("qscale_queue_size{queue=\"work\",application=\"consumer\"} 30"));
        assert!(output.contains("qscale_load_metric{queue=\"work\",application=\"consumer\"} 6"));
        assert!(output.contains(
            "qscale_requested_instances{queue=\"work\",application=\"consumer\"} 3"
        ));
    }

    #[test]
    fn labels_are_escaped() {
        let output = render_prometheus(&TickRecorder::new("we\"ird", "app").snapshot());
        assert!(output.contains("queue=\"we\\\"ird\""));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let output = render_prometheus(&TickRecorder::new("work", "consumer").snapshot());

        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            assert!(
                line.contains('{') && line.contains('}'),
                "line should have labels: {line}"
            );
        }
    }
}

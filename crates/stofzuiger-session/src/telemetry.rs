//! Metric declarations for the configuration link.
//!
//! Metrics go through the `metrics` facade; nothing is recorded unless the
//! host application installs a recorder.

use metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "stofzuiger.lines.sent").
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Unit,
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: Unit::Count,
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: Unit::Count,
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => describe_counter!(self.name, self.unit, self.description),
            MetricKind::Gauge => describe_gauge!(self.name, self.unit, self.description),
        }
    }
}

/// All metric definitions for the link.
pub mod metric_defs {
    use super::Metric;

    /// Command lines written to the transport.
    pub const LINES_SENT: Metric =
        Metric::counter("stofzuiger.lines.sent").with_description("Command lines sent to the robot");

    /// Lines received from the robot.
    pub const LINES_RECEIVED: Metric = Metric::counter("stofzuiger.lines.received")
        .with_description("Lines received from the robot");

    /// Received lines that could not be decoded.
    pub const LINES_MALFORMED: Metric = Metric::counter("stofzuiger.lines.malformed")
        .with_description("Received lines discarded as malformed");

    /// Schedule reports for entries that do not exist.
    pub const EVENTS_OUT_OF_RANGE: Metric = Metric::counter("stofzuiger.events.out_of_range")
        .with_description("Schedule reports for entries that do not exist");

    /// Current number of schedule entries.
    pub const SCHEDULE_ENTRIES: Metric = Metric::gauge("stofzuiger.schedule.entries")
        .with_description("Schedule entries announced by the robot");

    /// All metrics, for registration.
    pub const ALL: &[Metric] = &[
        LINES_SENT,
        LINES_RECEIVED,
        LINES_MALFORMED,
        EVENTS_OUT_OF_RANGE,
        SCHEDULE_ENTRIES,
    ];
}

/// Register descriptions for all metrics with the installed recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}

//! View data printer

use perfscope_core::stats::{
    AggregationData, CountData, DistributionData, LastValueData, SumData, Tag, ViewData,
    ViewExporter,
};

/// Width the view name is padded to in the header line
pub const NAME_WIDTH: usize = 45;

/// Logs every row of every view snapshot it receives
///
/// Each row becomes a header line with the snapshot time and view name, a
/// summary line for the aggregated value and one line per tag.
///
/// # Examples
///
/// ```
/// use perfscope_console::PrintExporter;
/// use perfscope_core::stats::CountData;
///
/// let count = CountData { value: 3 };
/// assert_eq!(PrintExporter::summary(&count), "count:        value=3");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintExporter;

impl PrintExporter {
    pub fn new() -> Self {
        Self
    }

    /// Header line: `HH:MM:SS <view name padded to 45>`
    pub fn header(data: &ViewData) -> String {
        format!(
            "{} {:<width$}",
            data.end.format("%H:%M:%S"),
            data.view.name,
            width = NAME_WIDTH
        )
    }

    /// Summary line for an aggregated value; empty for unknown variants
    pub fn summary(data: &dyn AggregationData) -> String {
        let any = data.as_any();

        if let Some(d) = any.downcast_ref::<DistributionData>() {
            format!(
                "distribution: min={:.1} max={:.1} mean={:.1}",
                d.min, d.max, d.mean
            )
        } else if let Some(c) = any.downcast_ref::<CountData>() {
            format!("count:        value={}", c.value)
        } else if let Some(s) = any.downcast_ref::<SumData>() {
            format!("sum:          value={}", format_value(s.value))
        } else if let Some(l) = any.downcast_ref::<LastValueData>() {
            format!("last:         value={}", format_value(l.value))
        } else {
            String::new()
        }
    }

    /// Indented tag line
    pub fn tag_line(tag: &Tag) -> String {
        format!("  - {}={}", tag.key, tag.value)
    }

    /// Every line logged for one snapshot, in order
    pub fn format(data: &ViewData) -> Vec<String> {
        let mut lines = Vec::new();

        for row in &data.rows {
            lines.push(Self::header(data));
            lines.push(Self::summary(row.data.as_ref()));
            lines.extend(row.tags.iter().map(Self::tag_line));
        }

        lines
    }
}

/// Shortest decimal form, in exponent notation (`1e+06`, `2.5e-07`) when the
/// decimal exponent is below -4 or at least 6.
pub fn format_value(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return value.to_string();
    }

    let scientific = format!("{:e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exp) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (-4..6).contains(&exp) {
        return value.to_string();
    }

    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.unsigned_abs())
}

impl ViewExporter for PrintExporter {
    fn export_view(&self, data: &ViewData) {
        for line in Self::format(data) {
            tracing::info!(target: "perfscope::console", "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use perfscope_core::stats::{Aggregation, Measure, Row, TagKey, UNIT_MILLISECONDS, View};
    use std::any::Any;

    fn snapshot(rows: Vec<Row>) -> ViewData {
        let measure = Measure::float64("latency", "latency", UNIT_MILLISECONDS);
        ViewData {
            view: View::new("app/latency", measure, Aggregation::Count),
            start: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap(),
            rows,
        }
    }

    #[derive(Debug, Clone)]
    struct Unknown;

    impl AggregationData for Unknown {
        fn add_sample(&mut self, _value: f64) {}

        fn clone_data(&self) -> Box<dyn AggregationData> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_header_is_padded() {
        let header = PrintExporter::header(&snapshot(vec![]));
        assert!(header.starts_with("09:05:07 app/latency"));
        assert_eq!(header.len(), "09:05:07 ".len() + NAME_WIDTH);
    }

    #[test]
    fn test_summary_per_variant() {
        let mut dist = DistributionData::new(vec![10.0]);
        for v in [2.0, 4.0, 9.0] {
            dist.add_sample(v);
        }
        assert_eq!(
            PrintExporter::summary(&dist),
            "distribution: min=2.0 max=9.0 mean=5.0"
        );
        assert_eq!(
            PrintExporter::summary(&CountData { value: 12 }),
            "count:        value=12"
        );
        assert_eq!(
            PrintExporter::summary(&SumData { value: 1.5 }),
            "sum:          value=1.5"
        );
        assert_eq!(
            PrintExporter::summary(&LastValueData { value: 7.25 }),
            "last:         value=7.25"
        );
    }

    #[test]
    fn test_value_formatting_uses_exponent_at_extremes() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(123456.5), "123456.5");
        assert_eq!(format_value(0.0001), "0.0001");
        assert_eq!(format_value(1e6), "1e+06");
        assert_eq!(format_value(1234567.0), "1.234567e+06");
        assert_eq!(format_value(1e21), "1e+21");
        assert_eq!(format_value(2.5e-7), "2.5e-07");
        assert_eq!(format_value(-1.25e30), "-1.25e+30");
        assert_eq!(
            PrintExporter::summary(&SumData { value: 1e21 }),
            "sum:          value=1e+21"
        );
    }

    #[test]
    fn test_unknown_variant_has_empty_summary() {
        assert_eq!(PrintExporter::summary(&Unknown), "");

        let data = snapshot(vec![Row {
            tags: vec![],
            data: Box::new(Unknown),
        }]);
        let lines = PrintExporter::format(&data);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "");
        PrintExporter.export_view(&data);
    }

    #[test]
    fn test_format_rows_and_tags() {
        let method = TagKey::new("method");
        let status = TagKey::new("status");
        let data = snapshot(vec![
            Row {
                tags: vec![Tag::new(method.clone(), "GET"), Tag::new(status, "200")],
                data: Box::new(CountData { value: 2 }),
            },
            Row {
                tags: vec![Tag::new(method, "POST")],
                data: Box::new(CountData { value: 1 }),
            },
        ]);

        let lines = PrintExporter::format(&data);
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[2], "  - method=GET");
        assert_eq!(lines[3], "  - status=200");
        assert_eq!(lines[5], "count:        value=1");
        assert_eq!(lines[6], "  - method=POST");
    }
}

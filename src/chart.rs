use crate::models::TestRecord;

/// Map each value linearly onto `[bottom, top]`: the series minimum lands on
/// `bottom` and the maximum on `top`.
///
/// For screen pixels with y growing downwards pass `bottom = height` and
/// `top = 0.0`. A flat series (including a single point) uses a range of 1,
/// so every value lands on `bottom`.
pub fn scale(values: &[f64], bottom: f64, top: f64) -> Vec<f64> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().reduce(f64::max).unwrap_or(min);
    let range = if max - min == 0.0 { 1.0 } else { max - min };

    values
        .iter()
        .map(|v| bottom + (v - min) / range * (top - bottom))
        .collect()
}

/// `(index, scaled)` pairs ready for a line chart whose y axis runs 0..=100.
pub fn line_points(values: &[f64]) -> Vec<(f64, f64)> {
    scale(values, 0.0, 100.0)
        .into_iter()
        .enumerate()
        .map(|(i, y)| (i as f64, y))
        .collect()
}

/// Filled share of a donut or progress bar, clamped to `0.0..=1.0`.
pub fn fraction(value: f64, max: f64) -> f64 {
    if !max.is_finite() || max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub tests: usize,
    pub avg_total: f64,
    pub avg_spelling: f64,
    pub avg_handwriting: f64,
    pub avg_speaking: f64,
    pub avg_stutter: f64,
}

fn average(records: &[TestRecord], field: impl Fn(&TestRecord) -> Option<f64>) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records.iter().filter_map(&field).sum();
    sum / records.len() as f64
}

impl Summary {
    /// Averages divide the sum of the present values by the number of tests,
    /// so a missing metric pulls the average down.
    pub fn from_records(records: &[TestRecord]) -> Self {
        Self {
            tests: records.len(),
            avg_total: average(records, |r| r.total_score),
            avg_spelling: average(records, |r| r.spelling_accuracy),
            avg_handwriting: average(records, |r| r.handwriting_metric),
            avg_speaking: average(records, |r| r.speaking_accuracy),
            avg_stutter: average(records, |r| r.stutter_metric),
        }
    }
}

/// Total scores in the order the tests were returned; missing scores plot as 0.
pub fn total_scores(records: &[TestRecord]) -> Vec<f64> {
    records
        .iter()
        .map(|r| r.total_score.unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(total: Option<f64>, spelling: Option<f64>) -> TestRecord {
        TestRecord {
            test_id: 1,
            username: "amy".into(),
            class_name: "3B".into(),
            question1: None,
            question2: None,
            question3: None,
            question4: None,
            question5: None,
            spelling_accuracy: spelling,
            handwriting_metric: None,
            stutter_metric: None,
            speaking_accuracy: None,
            total_score: total,
            difficulty_level: None,
        }
    }

    #[test]
    fn scale_maps_min_to_bottom_and_max_to_top() {
        let ys = scale(&[1.0, 2.0, 3.0], 200.0, 0.0);
        assert_eq!(ys, vec![200.0, 100.0, 0.0]);

        let ys = scale(&[1.0, 2.0, 3.0], 0.0, 100.0);
        assert_eq!(ys, vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn single_point_does_not_divide_by_zero() {
        let ys = scale(&[42.0], 150.0, 0.0);
        assert_eq!(ys, vec![150.0]);
        assert!(ys.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn flat_series_stays_on_bottom() {
        let ys = scale(&[5.0, 5.0, 5.0], 10.0, 0.0);
        assert_eq!(ys, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn empty_series() {
        assert!(scale(&[], 0.0, 1.0).is_empty());
        assert!(line_points(&[]).is_empty());
    }

    #[test]
    fn line_points_are_indexed() {
        let pts = line_points(&[10.0, 30.0]);
        assert_eq!(pts, vec![(0.0, 0.0), (1.0, 100.0)]);
    }

    #[test]
    fn fraction_clamps() {
        assert_eq!(fraction(78.0, 100.0), 0.78);
        assert_eq!(fraction(150.0, 100.0), 1.0);
        assert_eq!(fraction(-3.0, 100.0), 0.0);
        assert_eq!(fraction(3.0, 0.0), 0.0);
        assert_eq!(fraction(f64::NAN, 100.0), 0.0);
    }

    #[test]
    fn summary_divides_by_record_count() {
        let records = vec![
            record(Some(80.0), Some(100.0)),
            record(Some(60.0), None),
        ];
        let summary = Summary::from_records(&records);
        assert_eq!(summary.tests, 2);
        assert_eq!(summary.avg_total, 70.0);
        assert_eq!(summary.avg_spelling, 50.0);
        assert_eq!(summary.avg_handwriting, 0.0);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        assert_eq!(Summary::from_records(&[]), Summary::default());
    }

    #[test]
    fn missing_totals_plot_as_zero() {
        let records = vec![record(None, None), record(Some(55.0), None)];
        assert_eq!(total_scores(&records), vec![0.0, 55.0]);
    }
}

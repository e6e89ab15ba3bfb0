// tests/aggregator_tests.rs
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;

use field_features::model::{Band, BandMeans, DateRange, Field, Polygon, Satellite};
use field_features::processing::indices::{BandMath, IndexEvaluator, IndexKind};
use field_features::processing::{
    get_features, process_dates, FailurePolicy, FeatureAggregator, WorkerBudget,
};
use field_features::source::{Collection, ImageSource};
use field_features::{FeatureError, Result};

/// In-memory image source that records its calls and how many overlap.
#[derive(Default)]
struct MockSource {
    dates: HashMap<String, Vec<NaiveDate>>,
    failing: HashSet<(String, NaiveDate)>,
    drop_vh: bool,
    delay: Duration,
    calls: Mutex<Vec<(String, NaiveDate)>>,
    listed: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockSource {
    fn with_fields(fields: &[(&str, usize)]) -> Self {
        let dates = fields
            .iter()
            .map(|(id, n)| {
                let dates = (0..*n as u64)
                    .map(|i| day(1).checked_add_days(Days::new(i * 6)).unwrap())
                    .collect();
                (id.to_string(), dates)
            })
            .collect();
        Self {
            dates,
            ..Self::default()
        }
    }

    fn reported_pairs(&self) -> HashSet<(String, NaiveDate)> {
        self.dates
            .iter()
            .flat_map(|(id, dates)| dates.iter().map(move |d| (id.clone(), *d)))
            .collect()
    }
}

impl ImageSource for MockSource {
    fn list_acquisition_dates(
        &self,
        field: &Field,
        _range: &DateRange,
        _collection: &Collection,
    ) -> Result<Vec<NaiveDate>> {
        self.listed.lock().push(field.id.clone());
        Ok(self.dates.get(&field.id).cloned().unwrap_or_default())
    }

    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        _collection: &Collection,
    ) -> Result<BandMeans> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.calls.lock().push((field.id.clone(), date));
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&(field.id.clone(), date)) {
            return Err(FeatureError::Upstream(format!("{} {} unavailable", field.id, date)));
        }

        let vv = 0.1 + f64::from(date.ordinal()) / 1000.0;
        let mut means = BandMeans::from([(Band::VV, vv)]);
        if !self.drop_vh {
            means.insert(Band::VH, vv / 4.0 + field.id.len() as f64 / 100.0);
        }
        Ok(means)
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 4, d).unwrap()
}

fn range() -> DateRange {
    DateRange::new(day(1), NaiveDate::from_ymd_opt(2023, 10, 1).unwrap()).unwrap()
}

fn field(id: &str) -> Field {
    Field::new(
        id,
        Polygon::new(vec![(11.0, 45.0), (11.1, 45.0), (11.1, 45.1), (11.0, 45.1)]).unwrap(),
    )
}

fn assert_sorted(table: &field_features::ResultTable) {
    for pair in table.rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.field_id.as_str(), a.date) <= (b.field_id.as_str(), b.date),
            "{} {} before {} {}",
            a.field_id,
            a.date,
            b.field_id,
            b.date
        );
    }
}

#[test]
fn test_two_radar_fields_three_dates_each() {
    let source = MockSource::with_fields(&[("west", 3), ("east", 3)]);
    let fields = vec![field("west"), field("east")];

    let table = get_features(&source, &fields, &range(), Satellite::Radar, 1, 2).unwrap();

    assert_eq!(table.len(), 6);
    assert_eq!(
        table.columns(),
        vec![
            "crop_field_name",
            "s1_acquisition_date",
            "VV",
            "VH",
            "AVE",
            "DIF",
            "RAT1",
            "RAT2",
            "NDI",
            "RVI"
        ]
    );
    assert_eq!(table.rows[0].field_id, "east");
    assert_eq!(table.rows[5].field_id, "west");
    assert_sorted(&table);
    assert!(table.failures.is_empty());

    for row in &table.rows {
        assert_eq!(row.bands.len(), 2);
        assert_eq!(row.indices.len(), 6);
        let vv = row.band(Band::VV).unwrap();
        let vh = row.band(Band::VH).unwrap();
        assert!((row.index(IndexKind::Ave).unwrap() - (vv + vh) / 2.0).abs() < 1e-12);
    }
}

#[test]
fn test_rows_match_reported_pairs_exactly() {
    let source = MockSource::with_fields(&[
        ("f1", 7),
        ("f2", 1),
        ("f3", 4),
        ("f4", 0),
        ("f5", 11),
        ("f6", 2),
    ]);
    let fields: Vec<Field> = ["f3", "f1", "f6", "f2", "f5", "f4"].iter().map(|id| field(id)).collect();

    let table = get_features(&source, &fields, &range(), Satellite::Radar, 2, 5).unwrap();

    let produced: Vec<(String, NaiveDate)> =
        table.rows.iter().map(|r| (r.field_id.clone(), r.date)).collect();
    let unique: HashSet<(String, NaiveDate)> = produced.iter().cloned().collect();
    assert_eq!(produced.len(), unique.len(), "duplicate rows");
    assert_eq!(unique, source.reported_pairs());
    assert_sorted(&table);

    // Every field was listed exactly once, including the one without dates.
    let mut listed = source.listed.lock().clone();
    listed.sort();
    assert_eq!(listed, vec!["f1", "f2", "f3", "f4", "f5", "f6"]);
}

#[test]
fn test_field_without_acquisitions_contributes_no_rows() {
    let source = MockSource::with_fields(&[("empty", 0), ("full", 3)]);
    let fields = vec![field("empty"), field("full")];

    let table = get_features(&source, &fields, &range(), Satellite::Radar, 1, 3).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.rows_for("empty").count(), 0);
    assert!(table.failures.is_empty());
}

#[test]
fn test_budget_leaving_no_date_workers_is_rejected() {
    let source = MockSource::with_fields(&[("only", 3)]);
    let fields = vec![field("only")];

    let err = get_features(&source, &fields, &range(), Satellite::Radar, 4, 4).unwrap_err();
    assert!(matches!(
        err,
        FeatureError::InvalidBudget {
            total: 4,
            field_workers: 4
        }
    ));
    assert!(source.listed.lock().is_empty());
}

#[test]
fn test_empty_field_set_is_rejected() {
    let source = MockSource::default();
    let err = get_features(&source, &[], &range(), Satellite::Radar, 1, 2).unwrap_err();
    assert!(matches!(err, FeatureError::EmptyFieldSet));
}

#[test]
fn test_duplicate_field_ids_are_rejected() {
    let source = MockSource::with_fields(&[("twin", 2)]);
    let fields = vec![field("twin"), field("twin")];
    let err = get_features(&source, &fields, &range(), Satellite::Radar, 1, 2).unwrap_err();
    assert!(matches!(err, FeatureError::DuplicateField(id) if id == "twin"));
}

#[test]
fn test_failing_field_aborts_job_but_not_other_fields() {
    let mut source = MockSource::with_fields(&[("a", 3), ("b", 4), ("c", 3)]);
    let bad_date = source.dates["b"][2];
    source.failing.insert(("b".to_string(), bad_date));
    let fields = vec![field("a"), field("b"), field("c")];

    let budget = WorkerBudget::new(2, 1).unwrap();
    let err = FeatureAggregator::new(&source, budget)
        .get_features(&fields, &range(), Satellite::Radar)
        .unwrap_err();

    match err {
        FeatureError::Field { field, source } => {
            assert_eq!(field, "b");
            assert!(source.is_transient());
        }
        other => panic!("unexpected error: {other}"),
    }

    // Field c still ran to completion after b failed.
    let calls = source.calls.lock();
    assert_eq!(calls.iter().filter(|(id, _)| id == "c").count(), 3);
    assert_eq!(calls.iter().filter(|(id, _)| id == "a").count(), 3);
}

#[test]
fn test_partial_policy_keeps_successful_fields() {
    let mut source = MockSource::with_fields(&[("a", 3), ("b", 4), ("c", 5)]);
    let bad_date = source.dates["b"][0];
    source.failing.insert(("b".to_string(), bad_date));
    let fields = vec![field("a"), field("b"), field("c")];

    let budget = WorkerBudget::new(4, 2).unwrap();
    let table = FeatureAggregator::new(&source, budget)
        .failure_policy(FailurePolicy::Partial)
        .id_column("parcel")
        .get_features(&fields, &range(), Satellite::Radar)
        .unwrap();

    assert_eq!(table.len(), 8);
    assert_eq!(table.rows_for("b").count(), 0);
    assert_eq!(table.failures.len(), 1);
    assert_eq!(table.failures[0].field_id, "b");
    assert_eq!(table.columns()[0], "parcel");
    assert_sorted(&table);
}

#[test]
fn test_missing_band_fails_the_field() {
    let mut source = MockSource::with_fields(&[("a", 2)]);
    source.drop_vh = true;
    let fields = vec![field("a")];

    let err = get_features(&source, &fields, &range(), Satellite::Radar, 1, 2).unwrap_err();
    match err {
        FeatureError::Field { source, .. } => {
            assert!(matches!(*source, FeatureError::MissingBand(Band::VH)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_repeated_runs_give_identical_tables() {
    let source = MockSource::with_fields(&[("x", 5), ("y", 6), ("z", 2)]);
    let fields = vec![field("z"), field("x"), field("y")];

    let first = get_features(&source, &fields, &range(), Satellite::Radar, 2, 4).unwrap();
    let second = get_features(&source, &fields, &range(), Satellite::Radar, 2, 4).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.rows.iter().zip(&second.rows) {
        assert_eq!((&a.field_id, a.date), (&b.field_id, b.date));
        for (index, value) in &a.indices {
            assert!((value - b.indices[index]).abs() < 1e-9);
        }
    }
}

#[test]
fn test_date_level_concurrency_stays_within_budget() {
    let mut source = MockSource::with_fields(&[
        ("a", 6),
        ("b", 6),
        ("c", 6),
        ("d", 6),
        ("e", 6),
    ]);
    source.delay = Duration::from_millis(5);
    let fields: Vec<Field> = ["a", "b", "c", "d", "e"].iter().map(|id| field(id)).collect();

    let table = get_features(&source, &fields, &range(), Satellite::Radar, 3, 5).unwrap();

    assert_eq!(table.len(), 30);
    let peak = source.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak date-level concurrency {peak}");
}

/// Counts evaluations to check the evaluator seam is used once per index per row.
struct CountingEvaluator {
    calls: AtomicUsize,
}

impl IndexEvaluator for CountingEvaluator {
    fn evaluate(&self, index: IndexKind, means: &BandMeans) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        BandMath.evaluate(index, means)
    }
}

#[test]
fn test_custom_evaluator_is_called_per_index() {
    let source = MockSource::with_fields(&[("a", 4), ("b", 3)]);
    let fields = vec![field("a"), field("b")];
    let evaluator = CountingEvaluator {
        calls: AtomicUsize::new(0),
    };

    let budget = WorkerBudget::new(3, 1).unwrap();
    let aggregator = FeatureAggregator::with_evaluator(&source, &evaluator, budget);
    let table = aggregator
        .get_features(&fields, &range(), Satellite::Radar)
        .unwrap();

    assert_eq!(table.len(), 7);
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 7 * 6);
}

#[test]
fn test_process_dates_covers_every_date_once() {
    let source = MockSource::with_fields(&[("a", 7)]);
    let dates = source.dates["a"].clone();
    let pool = ThreadPoolBuilder::new().num_threads(3).build().unwrap();

    let rows = process_dates(&source, &BandMath, &field("a"), &dates, Satellite::Radar, 3, &pool)
        .unwrap();

    let mut produced: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    produced.sort();
    assert_eq!(produced, dates);
}

#[test]
fn test_process_dates_rejects_zero_date_workers() {
    let source = MockSource::with_fields(&[("a", 3)]);
    let dates = source.dates["a"].clone();
    let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();

    let err = process_dates(&source, &BandMath, &field("a"), &dates, Satellite::Radar, 0, &pool)
        .unwrap_err();

    assert!(matches!(err, FeatureError::InvalidBudget { .. }));
    assert!(source.calls.lock().is_empty());
}

#[test]
fn test_single_field_uses_every_date_worker() {
    let mut source = MockSource::with_fields(&[("solo", 6)]);
    source.delay = Duration::from_millis(40);
    let fields = vec![field("solo")];

    // 5 total, 2 field workers: the lone field gets the 3 date workers, not 4.
    let table = get_features(&source, &fields, &range(), Satellite::Radar, 2, 5).unwrap();

    assert_eq!(table.len(), 6);
    assert_eq!(table.rows_for("solo").count(), 6);
    assert_eq!(source.peak.load(Ordering::SeqCst), 3);
}

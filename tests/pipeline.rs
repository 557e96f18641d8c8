//! Whole-pipeline tests against the scripted browser in `common`.
//!
//! Every test writes into its own `TempDir` and uses real (tiny) PDFs, so
//! merge order and on-disk idempotence are checked end to end.

mod common;

use common::*;
use futures::StreamExt;
use guide2pdf::{
    bind_catalog, bind_catalog_stream, BindProgressCallback, BinderError, Browser, ExhaustionPolicy,
    GapPolicy, GuideOutcome, SectionError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn outcome_of<'a>(report: &'a guide2pdf::CatalogReport, title: &str) -> &'a GuideOutcome {
    &report
        .guides
        .iter()
        .find(|g| g.title == title)
        .unwrap_or_else(|| panic!("no report for {title}"))
        .outcome
}

// ── Catalog scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn two_guides_become_two_documents() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[
        ("alpha", "Alpha Guide", 2),
        ("beta", "Beta!!Guide", 2),
    ]));
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(browser.clone(), &test_inputs(), &config).await.unwrap();

    assert_eq!(report.built(), 2);
    for (slug, title) in [("alpha", "Alpha Guide"), ("beta", "BetaGuide")] {
        let doc = dir.path().join(format!("{title}.pdf"));
        assert!(doc.exists(), "missing {}", doc.display());
        let pages = page_contents(&doc);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains(&section_url(slug, 1)));
        assert!(pages[1].contains(&section_url(slug, 2)));
        assert!(!dir.path().join(title).exists(), "snapshots of {title} not removed");
    }
    assert_eq!(Stats::get(&browser.stats.active), 0);
}

#[tokio::test]
async fn sections_merge_in_table_of_contents_order() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[("long", "Long Guide", 6)]));
    let config = test_config(dir.path()).keep_temp(true).build().unwrap();

    bind_catalog(browser, &test_inputs(), &config).await.unwrap();

    let pages = page_contents(&dir.path().join("Long Guide.pdf"));
    assert_eq!(pages.len(), 6);
    for (i, page) in pages.iter().enumerate() {
        assert!(page.contains(&section_url("long", i + 1)), "page {i}: {page}");
    }
    for i in 1..=6 {
        assert!(dir.path().join("Long Guide").join(format!("{i}.pdf")).exists());
    }
}

#[tokio::test]
async fn second_run_does_no_guide_work() {
    let dir = TempDir::new().unwrap();
    let site = || Site::with_guides(&[("alpha", "Alpha Guide", 2), ("beta", "Beta Guide", 3)]);
    let config = test_config(dir.path()).build().unwrap();

    bind_catalog(MockBrowser::new(site()), &test_inputs(), &config)
        .await
        .unwrap();
    let first = std::fs::read(dir.path().join("Beta Guide.pdf")).unwrap();

    let browser = MockBrowser::new(site());
    let report = bind_catalog(browser.clone(), &test_inputs(), &config).await.unwrap();

    assert_eq!(report.skipped(), 2);
    assert_eq!(Stats::get(&browser.stats.renders), 0);
    // Only the catalog page itself is visited.
    assert_eq!(Stats::get(&browser.stats.navigations), 1);
    assert_eq!(std::fs::read(dir.path().join("Beta Guide.pdf")).unwrap(), first);
}

#[tokio::test]
async fn existing_snapshots_are_reused() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[("alpha", "Alpha", 3)]));
    std::fs::create_dir_all(dir.path().join("Alpha")).unwrap();
    write_marker_pdf(&dir.path().join("Alpha/2.pdf"), "from an earlier run", FULL_PAD).unwrap();
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(browser.clone(), &test_inputs(), &config).await.unwrap();

    assert_eq!(Stats::get(&browser.stats.renders), 2);
    let sections = &report.guides[0].sections;
    assert!(sections[1].reused);
    let pages = page_contents(&dir.path().join("Alpha.pdf"));
    assert!(pages[1].contains("from an earlier run"));
}

#[tokio::test]
async fn overwrite_rebuilds_existing_document() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Alpha.pdf"), b"stale").unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[("alpha", "Alpha", 1)]));
    let config = test_config(dir.path()).overwrite(true).build().unwrap();

    let report = bind_catalog(browser, &test_inputs(), &config).await.unwrap();

    assert_eq!(report.built(), 1);
    assert_eq!(page_contents(&dir.path().join("Alpha.pdf")).len(), 1);
}

#[tokio::test]
async fn unreachable_catalog_is_fatal() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 1)]);
    site.fail_status(CATALOG_URL, 503, 10);
    let browser = MockBrowser::new(site);
    let config = test_config(dir.path()).build().unwrap();

    let err = bind_catalog(browser.clone(), &test_inputs(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, BinderError::CatalogUnavailable { retries: 3, .. }), "got: {err}");
    assert_eq!(Stats::get(&browser.stats.active), 0);
    assert!(!dir.path().join("Alpha.pdf").exists());
}

#[tokio::test]
async fn unreadable_output_aborts_the_guide() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("output");
    std::fs::write(&not_a_dir, b"occupied").unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[("alpha", "Alpha", 1)]));
    let config = test_config(&not_a_dir).build().unwrap();

    let err = bind_catalog(browser.clone(), &test_inputs(), &config)
        .await
        .unwrap_err();

    match err {
        BinderError::GuideAborted { ref source, .. } => {
            assert!(matches!(**source, BinderError::Io { .. }), "got: {source}");
        }
        other => panic!("unexpected error {other}"),
    }
    // The existence check failed before any guide work started.
    assert_eq!(Stats::get(&browser.stats.renders), 0);
}

#[tokio::test]
async fn colliding_titles_get_distinct_documents() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[
        ("one", "Saga: Part I", 1),
        ("two", "Saga Part I", 1),
    ]));
    let config = test_config(dir.path()).build().unwrap();

    bind_catalog(browser, &test_inputs(), &config).await.unwrap();

    assert!(dir.path().join("Saga Part I.pdf").exists());
    assert!(dir.path().join("Saga Part I 2.pdf").exists());
}

#[tokio::test]
async fn renamed_title_never_lands_on_a_listed_one() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[
        ("a1", "Alpha", 1),
        ("a2", "Alpha 2", 1),
        ("a3", "Alpha", 1),
    ]));
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(browser, &test_inputs(), &config).await.unwrap();

    assert_eq!(report.built(), 3);
    for (slug, title) in [("a1", "Alpha"), ("a2", "Alpha 2"), ("a3", "Alpha 3")] {
        let pages = page_contents(&dir.path().join(format!("{title}.pdf")));
        assert_eq!(pages.len(), 1, "{title}");
        assert!(pages[0].contains(&section_url(slug, 1)), "{title} holds another guide");
    }
}

// ── Guide-level outcomes ─────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_guide_is_skipped() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 2), ("beta", "Beta", 2)]);
    site.fail_status(&guide_url("alpha"), 500, 10);
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    assert_eq!(*outcome_of(&report, "Alpha"), GuideOutcome::NavigationFailed);
    assert!(!dir.path().join("Alpha.pdf").exists());
    assert!(dir.path().join("Beta.pdf").exists());
}

#[tokio::test]
async fn empty_table_of_contents_yields_no_document() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[("empty", "Empty", 0)]));
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(browser, &test_inputs(), &config).await.unwrap();

    assert_eq!(*outcome_of(&report, "Empty"), GuideOutcome::NoSections);
    assert!(!dir.path().join("Empty.pdf").exists());
}

#[tokio::test]
async fn every_section_failing_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 2)]);
    site.fail_status(&section_url("alpha", 1), 404, 10);
    site.fail_status(&section_url("alpha", 2), 404, 10);
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    assert_eq!(
        *outcome_of(&report, "Alpha"),
        GuideOutcome::NothingMerged { failed: vec![1, 2] }
    );
    assert!(!dir.path().join("Alpha.pdf").exists());
}

// ── Section-level failures ───────────────────────────────────────────────────

#[tokio::test]
async fn failed_section_leaves_a_gap() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 3)]);
    site.fail_status(&section_url("alpha", 2), 502, 10);
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    match outcome_of(&report, "Alpha") {
        GuideOutcome::Built { merged, failed, .. } => {
            assert_eq!(*merged, 2);
            assert_eq!(failed, &vec![2]);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let section = &report.guides[0].sections[1];
    assert!(matches!(
        section.error,
        Some(SectionError::NavigationFailed { index: 2, retries: 3, .. })
    ));
    let pages = page_contents(&dir.path().join("Alpha.pdf"));
    assert_eq!(pages.len(), 2);
    assert!(pages[0].contains(&section_url("alpha", 1)));
    assert!(pages[1].contains(&section_url("alpha", 3)));
}

#[tokio::test]
async fn placeholder_policy_marks_the_gap() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 3)]);
    site.fail_status(&section_url("alpha", 2), 502, 10);
    let config = test_config(dir.path())
        .gap_policy(GapPolicy::Placeholder)
        .build()
        .unwrap();

    bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    let pages = page_contents(&dir.path().join("Alpha.pdf"));
    assert_eq!(pages.len(), 3);
    assert!(pages[1].contains("Section 2 unavailable"), "got: {}", pages[1]);
}

#[tokio::test]
async fn transient_errors_within_budget_are_invisible() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 2)]);
    site.fail_status(&section_url("alpha", 1), 503, 2);
    site.set_pads(&section_url("alpha", 2), &[0, 0, FULL_PAD]);
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    let sections = &report.guides[0].sections;
    assert!(sections.iter().all(|s| s.is_ok()));
    assert_eq!(sections[0].render_attempts, 1);
    assert_eq!(sections[1].render_attempts, 3);
    assert!(!sections[1].undersized);
}

#[tokio::test]
async fn undersized_snapshot_is_accepted_by_default() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 2)]);
    site.set_pads(&section_url("alpha", 1), &[0]);
    let config = test_config(dir.path()).build().unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    let first = &report.guides[0].sections[0];
    assert!(first.is_ok());
    assert!(first.undersized);
    assert_eq!(first.render_attempts, 4);
    assert!(first.bytes < TEST_MIN_BYTES);
    assert_eq!(page_contents(&dir.path().join("Alpha.pdf")).len(), 2);
}

#[tokio::test]
async fn undersized_snapshot_fails_under_fail_policy() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 2)]);
    site.set_pads(&section_url("alpha", 1), &[0]);
    let config = test_config(dir.path())
        .exhaustion_policy(ExhaustionPolicy::Fail)
        .keep_temp(true)
        .build()
        .unwrap();

    let report = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    let first = &report.guides[0].sections[0];
    assert!(matches!(first.error, Some(SectionError::Undersized { index: 1, attempts: 4, .. })));
    assert!(!dir.path().join("Alpha/1.pdf").exists());
    let pages = page_contents(&dir.path().join("Alpha.pdf"));
    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains(&section_url("alpha", 2)));
}

// ── Scheduling ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn at_most_max_in_progress_guides_run_at_once() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut site = Site::with_guides(&[
        ("g1", "G1", 2),
        ("g2", "G2", 1),
        ("g3", "G3", 3),
        ("g4", "G4", 1),
        ("g5", "G5", 2),
    ]);
    for (slug, ms) in [("g1", 60), ("g2", 10), ("g3", 40), ("g4", 80), ("g5", 20)] {
        site.latency.insert(guide_url(slug), Duration::from_millis(ms));
    }
    site.fail_status(&guide_url("g3"), 500, 100);
    let browser = MockBrowser::new(site);
    let config = test_config(dir.path()).max_in_progress(2).build().unwrap();

    let report = bind_catalog(browser.clone(), &test_inputs(), &config).await.unwrap();

    assert_eq!(report.guides.len(), 5);
    assert_eq!(report.built(), 4);
    assert_eq!(*outcome_of(&report, "G3"), GuideOutcome::NavigationFailed);
    assert!(Stats::get(&browser.stats.peak) <= 2, "peak {}", Stats::get(&browser.stats.peak));
    assert_eq!(Stats::get(&browser.stats.active), 0);
    // One discovery session plus one per guide.
    assert_eq!(Stats::get(&browser.stats.opened), 6);
}

#[tokio::test]
async fn fatal_guide_error_does_not_cancel_siblings() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut site = Site::with_guides(&[("bad", "Bad", 1), ("good", "Good", 2)]);
    site.broken_renders.insert(section_url("bad", 1));
    site.latency.insert(guide_url("good"), Duration::from_millis(50));
    let config = test_config(dir.path()).build().unwrap();

    let err = bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap_err();

    match err {
        BinderError::GuideAborted { ref title, ref source } => {
            assert_eq!(title, "Bad");
            assert!(matches!(**source, BinderError::Render { .. }), "got: {source}");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(dir.path().join("Good.pdf").exists());
}

#[tokio::test]
async fn hung_guide_is_abandoned_at_deadline() {
    let dir = TempDir::new().unwrap();
    let mut site = Site::with_guides(&[("slow", "Slow", 1), ("fast", "Fast", 1)]);
    site.latency.insert(guide_url("slow"), Duration::from_secs(30));
    let browser = MockBrowser::new(site);
    let config = test_config(dir.path())
        .guide_timeout_secs(Some(1))
        .build()
        .unwrap();

    let report = bind_catalog(browser.clone(), &test_inputs(), &config).await.unwrap();

    assert_eq!(*outcome_of(&report, "Slow"), GuideOutcome::TimedOut { after_secs: 1 });
    assert!(dir.path().join("Fast.pdf").exists());
    assert_eq!(Stats::get(&browser.stats.active), 0);
}

#[tokio::test]
async fn stream_yields_every_guide() {
    let dir = TempDir::new().unwrap();
    let browser = MockBrowser::new(Site::with_guides(&[
        ("a", "A", 1),
        ("b", "B", 1),
        ("c", "C", 1),
    ]));
    let config = test_config(dir.path()).max_in_progress(3).build().unwrap();

    let stream = bind_catalog_stream(browser as Arc<dyn Browser>, &test_inputs(), &config)
        .await
        .unwrap();
    let mut titles: Vec<String> = stream.map(|r| r.unwrap().title).collect().await;
    titles.sort();

    assert_eq!(titles, ["A", "B", "C"]);
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    catalog_total: AtomicUsize,
    sections_ok: AtomicUsize,
    sections_failed: AtomicUsize,
    guides: Mutex<Vec<String>>,
    finished: Mutex<Option<(usize, usize)>>,
}

impl BindProgressCallback for Recorder {
    fn on_catalog_start(&self, total_guides: usize) {
        self.catalog_total.store(total_guides, Ordering::SeqCst);
    }
    fn on_section_complete(&self, _guide: &str, _index: usize, _total: usize, _bytes: u64) {
        self.sections_ok.fetch_add(1, Ordering::SeqCst);
    }
    fn on_section_error(&self, _guide: &str, _index: usize, _total: usize, _error: &str) {
        self.sections_failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_guide_complete(&self, guide: &str, outcome: &GuideOutcome) {
        self.guides
            .lock()
            .unwrap()
            .push(format!("{guide}:{}", outcome.label()));
    }
    fn on_catalog_complete(&self, total_guides: usize, built: usize) {
        *self.finished.lock().unwrap() = Some((total_guides, built));
    }
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let dir = TempDir::new().unwrap();
    let site = Site::with_guides(&[("alpha", "Alpha", 3), ("beta", "Beta", 0)]);
    site.fail_status(&section_url("alpha", 3), 500, 10);
    let recorder = Arc::new(Recorder::default());
    let config = test_config(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    bind_catalog(MockBrowser::new(site), &test_inputs(), &config)
        .await
        .unwrap();

    assert_eq!(recorder.catalog_total.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.sections_ok.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.sections_failed.load(Ordering::SeqCst), 1);
    let mut guides = recorder.guides.lock().unwrap().clone();
    guides.sort();
    assert_eq!(guides, ["Alpha:built", "Beta:no-sections"]);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((2, 1)));
}

// tests/ranking_pipeline.rs
//
// End-to-end ranking over an in-memory store: upload → rank → records.
// Plain-text résumés go through the real `CommandExtractor` (no external
// binaries needed for .txt); the evaluator is the deterministic mock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use resume_ranker::dedup::DedupPolicy;
use resume_ranker::evaluation::EvaluationResult;
use resume_ranker::evaluator::{DynEvaluator, Evaluator, MockEvaluator};
use resume_ranker::extract::{CommandExtractor, DEFAULT_IDENTITY};
use resume_ranker::store::{RankingStore, SqliteStore};
use resume_ranker::upload::{ingest_candidate_batch, ingest_job_description, JdUpload, UploadedFile};
use resume_ranker::{CandidateOutcome, RankError, RankRequest, Ranker};

const SUBMITTER: &str = "recruiter@acme.test";
const TITLE: &str = "Backend Engineer";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn resume(name: &str, body: &str) -> UploadedFile {
    UploadedFile::new(name, body.as_bytes().to_vec())
}

fn fixture_evaluator() -> MockEvaluator {
    MockEvaluator::default()
        .with_score("Communication", 80)
        .with_score("Python", 100)
}

fn request() -> RankRequest {
    RankRequest::new(vec!["Communication", "Python"], SUBMITTER, TITLE)
}

struct Harness {
    store: Arc<SqliteStore>,
    ranker: Ranker,
    extractor: CommandExtractor,
}

impl Harness {
    fn new(evaluator: MockEvaluator) -> Self {
        Self::with_evaluator(Arc::new(evaluator))
    }

    fn with_evaluator(evaluator: DynEvaluator) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
        let ranker = Ranker::new(store.clone(), evaluator, DedupPolicy::default(), 4);
        Self {
            store,
            ranker,
            extractor: CommandExtractor::default(),
        }
    }

    async fn job_description(&self, title: &str) -> JdUpload {
        ingest_job_description(
            &self.extractor,
            &self.store,
            SUBMITTER,
            title,
            resume("jd.txt", "We need a backend engineer fluent in Python."),
            t0(),
        )
        .await
        .expect("jd upload")
    }

    async fn batch(&self, files: Vec<UploadedFile>, at: DateTime<Utc>) -> resume_ranker::upload::BatchUpload {
        ingest_candidate_batch(&self.extractor, &self.store, SUBMITTER, files, DEFAULT_IDENTITY, at)
            .await
            .expect("batch upload")
    }
}

fn processed_score(o: &CandidateOutcome) -> Option<f64> {
    match o {
        CandidateOutcome::Processed { weighted_score, .. } => Some(*weighted_score),
        _ => None,
    }
}

#[tokio::test]
async fn fixture_candidate_scores_8_67_and_is_recorded() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.batch(vec![resume("jane.txt", "Jane Doe\njane@doe.dev\nPython, talks well.")], t0())
        .await;

    let resp = h.ranker.rank_at(&request(), t0()).await.expect("rank");
    assert_eq!(resp.ranked_resumes.len(), 1);

    match &resp.ranked_resumes[0] {
        CandidateOutcome::Processed {
            filename,
            email,
            weighted_score,
            section_scores,
            missing_criteria,
            evaluation_summary,
            job_title,
        } => {
            assert_eq!(filename, "jane.txt");
            assert_eq!(email, "jane@doe.dev");
            assert_eq!(*weighted_score, 8.67);
            assert_eq!(section_scores.len(), 2);
            assert_eq!(section_scores[0].criterion, "Communication");
            assert_eq!(section_scores[0].score, Some(80));
            assert!(missing_criteria.is_empty());
            assert!(!evaluation_summary.is_empty());
            assert_eq!(job_title, TITLE);
        }
        other => panic!("expected processed, got {other:?}"),
    }

    let records = h.store.rankings_for_title("backend engineer").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity, "jane@doe.dev");
    assert_eq!(records[0].final_score, 8.67);
    assert_eq!(records[0].submitter, SUBMITTER);
}

#[tokio::test]
async fn rescoring_is_skipped_inside_window_and_appended_after() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.batch(vec![resume("jane.txt", "jane@doe.dev")], t0()).await;

    let first = h.ranker.rank_at(&request(), t0()).await.unwrap();
    assert!(first.ranked_resumes[0].is_processed());

    let ten_days = h.ranker.rank_at(&request(), t0() + Duration::days(10)).await.unwrap();
    match &ten_days.ranked_resumes[0] {
        CandidateOutcome::Skipped { last_scored_at, message, .. } => {
            assert_eq!(*last_scored_at, t0());
            assert!(message.contains("jane@doe.dev"));
        }
        other => panic!("expected skipped at t+10d, got {other:?}"),
    }
    assert_eq!(h.store.rankings_for_title("backend engineer").unwrap().len(), 1);

    let later = h.ranker.rank_at(&request(), t0() + Duration::days(31)).await.unwrap();
    assert!(later.ranked_resumes[0].is_processed());

    let latest = h
        .store
        .latest_ranking("jane@doe.dev", "backend engineer")
        .unwrap()
        .expect("record");
    assert_eq!(latest.created_at, t0() + Duration::days(31));
    assert_eq!(h.store.rankings_for_title("backend engineer").unwrap().len(), 2);
}

#[tokio::test]
async fn dedup_is_per_job_title() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.job_description("Data Engineer").await;
    h.batch(vec![resume("jane.txt", "jane@doe.dev")], t0()).await;

    h.ranker.rank_at(&request(), t0()).await.unwrap();
    let other = RankRequest::new(vec!["Python"], SUBMITTER, "data engineer");
    let resp = h.ranker.rank_at(&other, t0() + Duration::days(1)).await.unwrap();
    assert!(resp.ranked_resumes[0].is_processed());
}

#[tokio::test]
async fn unreadable_file_is_reported_and_batch_continues() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    let upload = h
        .batch(
            vec![
                resume("a.txt", "alice@x.dev"),
                resume("photo.png", "\u{89}PNG"),
                resume("b.txt", "bob@x.dev"),
            ],
            t0(),
        )
        .await;
    assert_eq!(upload.received, 3);
    assert_eq!(upload.stored, 2);
    assert_eq!(upload.bad_files.len(), 1);
    assert_eq!(upload.bad_files[0].filename, "photo.png");

    let resp = h.ranker.rank_at(&request(), t0()).await.unwrap();
    assert_eq!(resp.ranked_resumes.len(), 2);
    assert!(resp.ranked_resumes.iter().all(|o| o.is_processed()));
}

#[tokio::test]
async fn evaluator_failure_only_fails_its_candidate() {
    let h = Harness::new(fixture_evaluator().failing_on("EXPLODE"));
    h.job_description(TITLE).await;
    h.batch(
        vec![
            resume("bad.txt", "EXPLODE carol@x.dev"),
            resume("good.txt", "dave@x.dev"),
        ],
        t0(),
    )
    .await;

    let resp = h.ranker.rank_at(&request(), t0()).await.unwrap();
    assert_eq!(resp.ranked_resumes.len(), 2);
    assert_eq!(processed_score(&resp.ranked_resumes[0]), Some(8.67));
    match &resp.ranked_resumes[1] {
        CandidateOutcome::Failed { filename, message, .. } => {
            assert_eq!(filename, "bad.txt");
            assert!(message.contains("evaluation failed"));
        }
        other => panic!("expected failed, got {other:?}"),
    }
    assert!(h
        .store
        .latest_ranking("carol@x.dev", "backend engineer")
        .unwrap()
        .is_none());
}

/// Panics on résumés containing `marker`, otherwise defers to the mock.
struct PanicsOn {
    marker: &'static str,
    inner: MockEvaluator,
}

#[async_trait]
impl Evaluator for PanicsOn {
    async fn evaluate(
        &self,
        candidate_text: &str,
        job_description: &str,
        criteria: &[String],
    ) -> anyhow::Result<EvaluationResult> {
        if candidate_text.contains(self.marker) {
            panic!("evaluator crashed");
        }
        self.inner.evaluate(candidate_text, job_description, criteria).await
    }

    fn provider_name(&self) -> &'static str {
        "panics-on"
    }
}

#[tokio::test]
async fn panicking_candidate_task_is_reported_as_failed() {
    let h = Harness::with_evaluator(Arc::new(PanicsOn {
        marker: "CRASH",
        inner: fixture_evaluator(),
    }));
    h.job_description(TITLE).await;
    h.batch(
        vec![
            resume("crash.txt", "CRASH erin@x.dev"),
            resume("fine.txt", "frank@x.dev"),
        ],
        t0(),
    )
    .await;

    let resp = h.ranker.rank_at(&request(), t0()).await.unwrap();
    assert_eq!(resp.ranked_resumes.len(), 2, "no candidate may vanish");
    assert_eq!(processed_score(&resp.ranked_resumes[0]), Some(8.67));
    match &resp.ranked_resumes[1] {
        CandidateOutcome::Failed { filename, email, message } => {
            assert_eq!(filename, "crash.txt");
            assert_eq!(email, "erin@x.dev");
            assert!(message.contains("aborted"));
        }
        other => panic!("expected failed, got {other:?}"),
    }

    // nothing is recorded for the crashed candidate
    assert!(h
        .store
        .latest_ranking("erin@x.dev", "backend engineer")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn results_are_sorted_by_score_descending() {
    let h = Harness::new(fixture_evaluator().omitting("Python"));
    h.job_description(TITLE).await;
    h.batch(vec![resume("a.txt", "alice@x.dev")], t0()).await;
    let partial = h.ranker.rank_at(&request(), t0()).await.unwrap();
    match &partial.ranked_resumes[0] {
        CandidateOutcome::Processed {
            weighted_score,
            missing_criteria,
            ..
        } => {
            assert_eq!(*weighted_score, 5.33);
            assert_eq!(missing_criteria, &vec!["Python".to_string()]);
        }
        other => panic!("expected processed, got {other:?}"),
    }

    let h = Harness::new(MockEvaluator::default().failing_on("EXPLODE"));
    h.job_description(TITLE).await;
    h.batch(
        vec![
            resume("x.txt", "EXPLODE x@x.dev"),
            resume("y.txt", "y@x.dev"),
            resume("z.txt", "z@x.dev"),
        ],
        t0(),
    )
    .await;
    let resp = h.ranker.rank_at(&request(), t0()).await.unwrap();
    let scores: Vec<f64> = resp.ranked_resumes.iter().map(|o| o.sort_score()).collect();
    assert_eq!(scores, vec![7.0, 7.0, 0.0]);
}

#[tokio::test]
async fn only_latest_session_is_ranked() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.batch(vec![resume("old.txt", "old@x.dev")], t0()).await;
    h.batch(vec![resume("new.txt", "new@x.dev")], t0() + Duration::minutes(5))
        .await;

    let resp = h.ranker.rank_at(&request(), t0() + Duration::hours(1)).await.unwrap();
    let files: Vec<&str> = resp.ranked_resumes.iter().map(|o| o.filename()).collect();
    assert_eq!(files, vec!["new.txt"]);
}

#[tokio::test]
async fn candidates_without_email_share_the_sentinel_identity() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.batch(
        vec![resume("anon1.txt", "no contact here"), resume("anon2.txt", "nor here")],
        t0(),
    )
    .await;

    let resp = h.ranker.rank_at(&request(), t0()).await.unwrap();
    let processed = resp.ranked_resumes.iter().filter(|o| o.is_processed()).count();
    let skipped = resp
        .ranked_resumes
        .iter()
        .filter(|o| matches!(o, CandidateOutcome::Skipped { .. }))
        .count();
    assert_eq!((processed, skipped), (1, 1));
    assert_eq!(
        h.store.rankings_for_title("backend engineer").unwrap()[0].identity,
        DEFAULT_IDENTITY
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_record_one_evaluation() {
    let h = Harness::new(fixture_evaluator());
    h.job_description(TITLE).await;
    h.batch(vec![resume("jane.txt", "jane@doe.dev")], t0()).await;

    let req = request();
    let (a, b) = tokio::join!(h.ranker.rank_at(&req, t0()), h.ranker.rank_at(&req, t0()));
    let processed = [a.unwrap(), b.unwrap()]
        .iter()
        .flat_map(|r| r.ranked_resumes.iter())
        .filter(|o| o.is_processed())
        .count();
    assert_eq!(processed, 1);
    assert_eq!(h.store.rankings_for_title("backend engineer").unwrap().len(), 1);
}

#[tokio::test]
async fn request_preconditions_fail_before_scoring() {
    let h = Harness::new(fixture_evaluator());

    let empty = RankRequest::new(Vec::<String>::new(), SUBMITTER, TITLE);
    assert!(matches!(
        h.ranker.rank_at(&empty, t0()).await,
        Err(RankError::EmptyCriteria)
    ));

    assert!(matches!(
        h.ranker.rank_at(&request(), t0()).await,
        Err(RankError::NoJobDescription { .. })
    ));

    h.job_description(TITLE).await;
    assert!(matches!(
        h.ranker.rank_at(&request(), t0()).await,
        Err(RankError::NoCandidateBatch { .. })
    ));

    h.batch(vec![resume("only.png", "binary")], t0()).await;
    assert!(matches!(
        h.ranker.rank_at(&request(), t0()).await,
        Err(RankError::EmptyCandidateBatch { .. })
    ));
    assert!(h.store.rankings_for_title("backend engineer").unwrap().is_empty());
}

#[tokio::test]
async fn job_title_is_matched_trimmed_and_case_insensitive() {
    let h = Harness::new(fixture_evaluator());
    assert!(matches!(
        h.job_description("  BACKEND engineer ").await,
        JdUpload::Success { .. }
    ));
    assert!(matches!(h.job_description(TITLE).await, JdUpload::Exists { .. }));
    h.batch(vec![resume("jane.txt", "jane@doe.dev")], t0()).await;

    let req = RankRequest::new(vec!["Python"], SUBMITTER, "backend ENGINEER  ");
    let resp = h.ranker.rank_at(&req, t0()).await.unwrap();
    assert!(resp.ranked_resumes[0].is_processed());
}

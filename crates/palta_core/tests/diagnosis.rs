use approx::assert_relative_eq;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use palta_core::{
    BatchRunner, Classifier, ClassifierService, ConfidenceTier, DiagnosisConfig, DiagnosisError,
    ImageError, ImageStore, ImageUpload, LabelSet, Language, MemoryImageStore, diagnose,
};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const LABELS: [&str; 5] = ["Eggs", "Unrelated", "Damaged Fruit", "Healthy Fruit", "Pest"];

/// Answers by the red channel of the top-left pixel: each test image is a
/// solid colour whose red value keys into `script`.
struct Scripted {
    script: HashMap<u8, (usize, f32)>,
    slow_tag: Option<u8>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(script: &[(u8, usize, f32)]) -> Self {
        Self {
            script: script.iter().map(|&(tag, idx, p)| (tag, (idx, p))).collect(),
            slow_tag: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for Scripted {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = (input[[0, 0, 0, 0]] * 255.0).round() as u8;
        if Some(tag) == self.slow_tag {
            thread::sleep(Duration::from_millis(1500));
        }
        let &(idx, p) = self
            .script
            .get(&tag)
            .ok_or_else(|| ImageError::Inference(format!("no script for tag {tag}")))?;
        let rest = (1.0 - p) / (LABELS.len() - 1) as f32;
        let mut probs = vec![rest; LABELS.len()];
        probs[idx] = p;
        Ok(probs)
    }
}

struct FailingStore;

impl ImageStore for FailingStore {
    fn store(&self, _filename: &str, _bytes: &[u8]) -> io::Result<String> {
        Err(io::Error::other("disk full"))
    }
}

fn png(tag: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb([tag, 30, 60])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn config() -> DiagnosisConfig {
    DiagnosisConfig {
        labels: LabelSet::new(LABELS).unwrap(),
        input_size: 8,
        ..DiagnosisConfig::default()
    }
}

fn runner_with(
    classifier: Arc<Scripted>,
    store: Arc<dyn ImageStore>,
    cfg: &DiagnosisConfig,
) -> BatchRunner {
    let service = ClassifierService::new(classifier, cfg.labels.clone());
    BatchRunner::new(&service, store, cfg).unwrap()
}

#[test]
fn majority_of_pests_with_one_healthy_fruit() {
    let classifier = Arc::new(Scripted::new(&[
        (10, 4, 0.90),
        (20, 4, 0.92),
        (30, 4, 0.88),
        (40, 4, 0.95),
        (50, 3, 0.60),
    ]));
    let store = Arc::new(MemoryImageStore::new());
    let runner = runner_with(classifier, store.clone(), &config());
    let uploads: Vec<ImageUpload> = [10, 20, 30, 40, 50]
        .iter()
        .map(|&t| ImageUpload::new(format!("leaf{t}.png"), png(t)))
        .collect();

    let diagnosis = diagnose(&runner, &uploads, Language::English).unwrap();
    let c = &diagnosis.consensus;
    assert_eq!(c.label, "Pest");
    assert_eq!(c.votes, 4);
    assert_eq!(c.total_images, 5);
    assert_relative_eq!(c.majority_percentage, 80.0);
    assert_eq!(c.tier, ConfidenceTier::VeryHigh);
    assert_eq!(c.confidence_final, 95.0);
    assert_relative_eq!(c.raw_probability, 91.25, epsilon = 1e-4);
    assert!(c.has_contradiction);
    assert_eq!(diagnosis.guide.severity, "HIGH - Act immediately");
    assert!(diagnosis.skipped.is_empty());
    assert_eq!(store.len(), 5);

    let first = &diagnosis.results[0];
    assert!(first.source.ends_with("_leaf10.png"));
    let sum: f32 = first.probabilities.iter().sum();
    assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
}

#[test]
fn single_unrelated_image() {
    let classifier = Arc::new(Scripted::new(&[(10, 1, 0.70)]));
    let runner = runner_with(classifier, Arc::new(MemoryImageStore::new()), &config());
    let diagnosis = diagnose(
        &runner,
        &[ImageUpload::new("selfie.png", png(10))],
        Language::Spanish,
    )
    .unwrap();
    let c = &diagnosis.consensus;
    assert_eq!(c.label, "Unrelated");
    assert_eq!(c.votes, 1);
    assert_relative_eq!(c.majority_percentage, 100.0);
    assert_eq!(c.tier, ConfidenceTier::VeryHigh);
    assert!(!c.has_contradiction);
    assert_eq!(diagnosis.guide.severity, "N/A - Imagen no válida");
}

#[test]
fn corrupt_and_unnamed_uploads_are_skipped() {
    let classifier = Arc::new(Scripted::new(&[(10, 0, 0.8), (20, 0, 0.7)]));
    let runner = runner_with(classifier, Arc::new(MemoryImageStore::new()), &config());
    let uploads = vec![
        ImageUpload::new("a.png", png(10)),
        ImageUpload::new("broken.jpg", b"\xff\xd8 truncated".to_vec()),
        ImageUpload::new("", png(20)),
        ImageUpload::new("b.png", png(20)),
    ];
    let outcome = runner.run(&uploads).unwrap();
    assert_eq!(outcome.results.len(), 2);
    let skipped: Vec<&str> = outcome.failures.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(skipped, vec!["broken.jpg", ""]);
    assert!(matches!(outcome.failures[0].error, ImageError::Decode(_)));
    assert!(matches!(outcome.failures[1].error, ImageError::Unnamed));
}

#[test]
fn every_image_failing_is_an_empty_result_set() {
    let classifier = Arc::new(Scripted::new(&[]));
    let runner = runner_with(classifier.clone(), Arc::new(MemoryImageStore::new()), &config());
    let uploads = vec![
        ImageUpload::new("x.jpg", b"nope".to_vec()),
        ImageUpload::new("y.jpg", b"still nope".to_vec()),
    ];
    let err = diagnose(&runner, &uploads, Language::Spanish).unwrap_err();
    assert!(matches!(err, DiagnosisError::EmptyResultSet { submitted: 2 }));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn storage_failure_is_per_image() {
    let classifier = Arc::new(Scripted::new(&[(10, 4, 0.9)]));
    let runner = runner_with(classifier, Arc::new(FailingStore), &config());
    let err = runner
        .run(&[ImageUpload::new("a.png", png(10))])
        .unwrap_err();
    assert!(matches!(err, DiagnosisError::EmptyResultSet { submitted: 1 }));
}

#[test]
fn eleven_images_rejected_before_inference() {
    let classifier = Arc::new(Scripted::new(&[(10, 4, 0.9)]));
    let runner = runner_with(classifier.clone(), Arc::new(MemoryImageStore::new()), &config());
    let uploads: Vec<ImageUpload> = (0..11)
        .map(|i| ImageUpload::new(format!("{i}.png"), png(10)))
        .collect();
    let err = runner.run(&uploads).unwrap_err();
    assert!(matches!(
        err,
        DiagnosisError::InvalidBatchSize {
            submitted: 11,
            max: 10
        }
    ));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unreadable_uploads_count_toward_the_limit() {
    let classifier = Arc::new(Scripted::new(&[(10, 4, 0.9)]));
    let runner = runner_with(classifier.clone(), Arc::new(MemoryImageStore::new()), &config());
    let mut uploads: Vec<ImageUpload> = (0..10)
        .map(|i| ImageUpload::new(format!("{i}.png"), png(10)))
        .collect();
    uploads.push(ImageUpload::unreadable("locked.png", "permission denied"));
    let err = runner.run(&uploads).unwrap_err();
    assert!(matches!(
        err,
        DiagnosisError::InvalidBatchSize {
            submitted: 11,
            max: 10
        }
    ));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unreadable_uploads_fail_per_image() {
    let classifier = Arc::new(Scripted::new(&[(10, 4, 0.9)]));
    let store = Arc::new(MemoryImageStore::new());
    let runner = runner_with(classifier, store.clone(), &config());

    let outcome = runner
        .run(&[
            ImageUpload::unreadable("gone.png", "not found"),
            ImageUpload::new("a.png", png(10)),
        ])
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.failures[0].filename, "gone.png");
    assert!(matches!(outcome.failures[0].error, ImageError::Unreadable(_)));

    let err = runner
        .run(&[
            ImageUpload::unreadable("x.png", "not found"),
            ImageUpload::unreadable("y.png", "not found"),
        ])
        .unwrap_err();
    assert!(matches!(err, DiagnosisError::EmptyResultSet { submitted: 2 }));
    assert_eq!(store.len(), 1);
}

#[test]
fn parallel_mode_keeps_submission_order_for_tie_break() {
    let classifier = Arc::new(Scripted::new(&[(10, 2, 0.8), (20, 3, 0.8)]));
    let cfg = DiagnosisConfig {
        parallel: true,
        ..config()
    };
    let runner = runner_with(classifier, Arc::new(MemoryImageStore::new()), &cfg);
    let tags = [20, 10, 10, 20];
    let uploads: Vec<ImageUpload> = tags
        .iter()
        .enumerate()
        .map(|(i, &t)| ImageUpload::new(format!("{i}.png"), png(t)))
        .collect();

    let diagnosis = diagnose(&runner, &uploads, Language::English).unwrap();
    let labels: Vec<&str> = diagnosis.results.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["Healthy Fruit", "Damaged Fruit", "Damaged Fruit", "Healthy Fruit"]
    );
    assert_eq!(diagnosis.consensus.label, "Healthy Fruit");
    assert_eq!(diagnosis.consensus.tier, ConfidenceTier::LowTie);
}

#[test]
fn hung_image_times_out_without_sinking_the_batch() {
    let mut scripted = Scripted::new(&[(10, 4, 0.9), (20, 0, 0.9)]);
    scripted.slow_tag = Some(20);
    let cfg = DiagnosisConfig {
        image_timeout_secs: 1,
        ..config()
    };
    let runner = runner_with(Arc::new(scripted), Arc::new(MemoryImageStore::new()), &cfg);
    let outcome = runner
        .run(&[
            ImageUpload::new("fast.png", png(10)),
            ImageUpload::new("slow.png", png(20)),
        ])
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].label, "Pest");
    assert_eq!(outcome.failures[0].filename, "slow.png");
    assert!(matches!(outcome.failures[0].error, ImageError::Timeout(_)));
}

#[test]
fn unavailable_model_refuses_runner() {
    let service = ClassifierService::unavailable(LabelSet::default());
    let err = BatchRunner::new(
        &service,
        Arc::new(MemoryImageStore::new()),
        &DiagnosisConfig::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, DiagnosisError::ModelUnavailable));
}

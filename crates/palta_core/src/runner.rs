//! Batch inference: store, decode, normalize and classify every upload.

use crate::classifier::{Classifier, ClassifierService, ImageResult};
use crate::config::DiagnosisConfig;
use crate::error::{DiagnosisError, ImageError, Result};
use crate::labels::LabelSet;
use crate::preprocess::{TensorLayout, prepare_input};
use crate::storage::ImageStore;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// One raw upload as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Set when the client could not read the file. The upload still counts
    /// toward the batch size and fails with [`ImageError::Unreadable`].
    pub read_error: Option<String>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            read_error: None,
        }
    }

    pub fn unreadable(filename: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            bytes: Vec::new(),
            read_error: Some(reason.to_string()),
        }
    }

    fn is_named(&self) -> bool {
        !self.filename.trim().is_empty()
    }
}

/// An upload that was skipped, with the reason.
#[derive(Debug)]
pub struct ImageFailure {
    pub filename: String,
    pub error: ImageError,
}

/// Everything the runner produced for a batch. `results` is never empty and
/// follows submission order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<ImageResult>,
    pub failures: Vec<ImageFailure>,
}

/// Rejects a batch before any work is done: it must contain at least one
/// named upload and no more than `max_images` uploads.
pub fn validate_batch(uploads: &[ImageUpload], max_images: usize) -> Result<()> {
    let submitted = uploads.len();
    if submitted == 0 || !uploads.iter().any(ImageUpload::is_named) || submitted > max_images {
        return Err(DiagnosisError::InvalidBatchSize {
            submitted,
            max: max_images,
        });
    }
    Ok(())
}

pub struct BatchRunner {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ImageStore>,
    labels: LabelSet,
    max_images: usize,
    input_size: u32,
    layout: TensorLayout,
    timeout: Option<Duration>,
    parallel: bool,
}

impl BatchRunner {
    /// Builds a runner from the shared classifier service. Fails with
    /// [`DiagnosisError::ModelUnavailable`] when no model is loaded.
    pub fn new(
        service: &ClassifierService,
        store: Arc<dyn ImageStore>,
        cfg: &DiagnosisConfig,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            classifier: service.require()?,
            store,
            labels: service.labels().clone(),
            max_images: cfg.max_images,
            input_size: cfg.input_size,
            layout: cfg.layout,
            timeout: cfg.image_timeout(),
            parallel: cfg.parallel,
        })
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn run(&self, uploads: &[ImageUpload]) -> Result<BatchOutcome> {
        validate_batch(uploads, self.max_images)?;
        tracing::info!(
            "classifying {} image(s){}",
            uploads.len(),
            if self.parallel { " in parallel" } else { "" }
        );

        let outcomes: Vec<std::result::Result<ImageResult, ImageError>> = if self.parallel {
            uploads.par_iter().map(|u| self.process(u)).collect()
        } else {
            uploads.iter().map(|u| self.process(u)).collect()
        };

        let mut results = Vec::with_capacity(uploads.len());
        let mut failures = Vec::new();
        for (upload, outcome) in uploads.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    tracing::info!(
                        "{}: {} ({:.2}%)",
                        result.source,
                        result.label,
                        result.confidence
                    );
                    results.push(result);
                }
                Err(error) => {
                    tracing::warn!("skipping {}: {error}", upload.filename);
                    failures.push(ImageFailure {
                        filename: upload.filename.clone(),
                        error,
                    });
                }
            }
        }

        if results.is_empty() {
            return Err(DiagnosisError::EmptyResultSet {
                submitted: uploads.len(),
            });
        }
        Ok(BatchOutcome { results, failures })
    }

    fn process(&self, upload: &ImageUpload) -> std::result::Result<ImageResult, ImageError> {
        if !upload.is_named() {
            return Err(ImageError::Unnamed);
        }
        if let Some(reason) = &upload.read_error {
            return Err(ImageError::Unreadable(reason.clone()));
        }
        let job = ImageJob {
            upload: upload.clone(),
            classifier: Arc::clone(&self.classifier),
            store: Arc::clone(&self.store),
            labels: self.labels.clone(),
            input_size: self.input_size,
            layout: self.layout,
        };
        match self.timeout {
            Some(limit) => run_with_timeout(limit, move || job.run()),
            None => job.run(),
        }
    }
}

/// Owned copy of everything one image needs, so it can move to a worker.
struct ImageJob {
    upload: ImageUpload,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ImageStore>,
    labels: LabelSet,
    input_size: u32,
    layout: TensorLayout,
}

impl ImageJob {
    fn run(self) -> std::result::Result<ImageResult, ImageError> {
        let source = self.store.store(&self.upload.filename, &self.upload.bytes)?;
        let tensor = prepare_input(&self.upload.bytes, self.input_size, self.layout)?;
        let probabilities = self.classifier.classify(&tensor)?;
        ImageResult::from_probabilities(source, probabilities, &self.labels)
    }
}

/// Runs `job` on its own thread and waits at most `limit`. A job that
/// overruns keeps its thread until it finishes; its result is dropped.
fn run_with_timeout<T, F>(limit: Duration, job: F) -> std::result::Result<T, ImageError>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, ImageError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("palta-image".into())
        .spawn(move || {
            let _ = tx.send(job());
        })
        .map_err(|e| ImageError::Worker(e.to_string()))?;
    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Err(ImageError::Timeout(limit)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(ImageError::Worker("worker exited without a result".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryImageStore;
    use ndarray::Array4;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl Classifier for Counting {
        fn classify(&self, _input: &Array4<f32>) -> std::result::Result<Vec<f32>, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.0, 0.0, 0.0, 0.0, 1.0])
        }
    }

    fn uploads(n: usize) -> Vec<ImageUpload> {
        (0..n)
            .map(|i| ImageUpload::new(format!("img{i}.png"), vec![0u8; 4]))
            .collect()
    }

    #[test]
    fn validate_rejects_empty_and_unnamed() {
        assert!(matches!(
            validate_batch(&[], 10),
            Err(DiagnosisError::InvalidBatchSize { submitted: 0, .. })
        ));
        let unnamed = vec![ImageUpload::new("", vec![1]), ImageUpload::new("  ", vec![2])];
        assert!(validate_batch(&unnamed, 10).is_err());
    }

    #[test]
    fn validate_accepts_bounds() {
        assert!(validate_batch(&uploads(1), 10).is_ok());
        assert!(validate_batch(&uploads(10), 10).is_ok());
        assert!(matches!(
            validate_batch(&uploads(11), 10),
            Err(DiagnosisError::InvalidBatchSize {
                submitted: 11,
                max: 10
            })
        ));
    }

    #[test]
    fn oversize_batch_never_reaches_classifier() {
        let classifier = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let service = ClassifierService::new(classifier.clone(), LabelSet::default());
        let store = Arc::new(MemoryImageStore::new());
        let runner = BatchRunner::new(&service, store.clone(), &DiagnosisConfig::default()).unwrap();
        let err = runner.run(&uploads(11)).unwrap_err();
        assert!(matches!(err, DiagnosisError::InvalidBatchSize { .. }));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn runner_requires_loaded_model() {
        let service = ClassifierService::unavailable(LabelSet::default());
        let result = BatchRunner::new(
            &service,
            Arc::new(MemoryImageStore::new()),
            &DiagnosisConfig::default(),
        );
        assert!(matches!(result, Err(DiagnosisError::ModelUnavailable)));
    }

    #[test]
    fn timeout_reports_overrun() {
        let out: std::result::Result<(), ImageError> =
            run_with_timeout(Duration::from_millis(20), || {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            });
        assert!(matches!(out, Err(ImageError::Timeout(_))));
    }

    #[test]
    fn timeout_passes_through_fast_results() {
        let out = run_with_timeout(Duration::from_secs(5), || Ok(7));
        assert_eq!(out.unwrap(), 7);
    }
}

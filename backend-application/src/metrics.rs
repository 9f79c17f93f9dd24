use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    uploads: AtomicU64,
    upload_errors: AtomicU64,
    normalized_events: AtomicU64,
    rejected_batches: AtomicU64,
    findings: AtomicU64,
    anomalies: AtomicU64,
    analyses: AtomicU64,
    trainings: AtomicU64,
}

impl Metrics {
    pub fn record_upload(&self, event_count: usize) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        self.normalized_events
            .fetch_add(event_count as u64, Ordering::Relaxed);
    }

    pub fn record_upload_error(&self) {
        self.upload_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_batch(&self) {
        self.rejected_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_findings(&self, count: usize) {
        self.findings.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_anomalies(&self, count: usize) {
        self.anomalies.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_analysis(&self) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_training(&self) {
        self.trainings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        let uploads = self.uploads.load(Ordering::Relaxed);
        let upload_errors = self.upload_errors.load(Ordering::Relaxed);
        let normalized_events = self.normalized_events.load(Ordering::Relaxed);
        let rejected_batches = self.rejected_batches.load(Ordering::Relaxed);
        let findings = self.findings.load(Ordering::Relaxed);
        let anomalies = self.anomalies.load(Ordering::Relaxed);
        let analyses = self.analyses.load(Ordering::Relaxed);
        let trainings = self.trainings.load(Ordering::Relaxed);

        format!(
            "# TYPE caseline_uploads_total counter\n\
caseline_uploads_total {}\n\
# TYPE caseline_upload_errors_total counter\n\
caseline_upload_errors_total {}\n\
# TYPE caseline_normalized_events_total counter\n\
caseline_normalized_events_total {}\n\
# TYPE caseline_rejected_batches_total counter\n\
caseline_rejected_batches_total {}\n\
# TYPE caseline_findings_total counter\n\
caseline_findings_total {}\n\
# TYPE caseline_anomalies_total counter\n\
caseline_anomalies_total {}\n\
# TYPE caseline_analyses_total counter\n\
caseline_analyses_total {}\n\
# TYPE caseline_trainings_total counter\n\
caseline_trainings_total {}\n",
            uploads,
            upload_errors,
            normalized_events,
            rejected_batches,
            findings,
            anomalies,
            analyses,
            trainings
        )
    }
}

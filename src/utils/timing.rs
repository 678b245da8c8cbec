use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::catalog::GenerationConfig;

#[derive(Debug)]
pub struct GenerationTimer {
    session_id: u64,
    background: String,
    clothing: String,
    size_id: String,
    face_ratio: u32,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl GenerationTimer {
    pub fn from_config(session_id: u64, config: &GenerationConfig) -> Self {
        GenerationTimer {
            session_id,
            background: config.bg_color.id().to_string(),
            clothing: config.clothing.id().to_string(),
            size_id: config.target_size_id.clone(),
            face_ratio: config.face_ratio,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: "studio.timing",
            "event=generation_received session_id={} background={} clothing={} size={} face_ratio={} received_at={}",
            self.session_id,
            self.background,
            self.clothing,
            self.size_id,
            self.face_ratio,
            self.started_at.to_rfc3339()
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    #[allow(dead_code)]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[allow(dead_code)]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: "studio.timing",
            "event=generation_completed session_id={} size={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.session_id,
            self.size_id,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for GenerationTimer {
    fn drop(&mut self) {
        if !self.completed {
            self.mark_status("aborted", None);
            self.log_completed();
        }
    }
}

pub fn start_generation_timer(session_id: u64, config: &GenerationConfig) -> GenerationTimer {
    let timer = GenerationTimer::from_config(session_id, config);
    timer.log_received();
    timer
}

pub fn complete_generation_timer(timer: &mut GenerationTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_llm_timing<T, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "studio.timing",
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = if result.is_ok() { "success" } else { "error" };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "studio.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn completion_is_logged_once() {
        let mut timer = start_generation_timer(7, &GenerationConfig::default());
        complete_generation_timer(&mut timer, "empty", None);
        complete_generation_timer(&mut timer, "error", Some("late".into()));
        assert!(timer.is_completed());
        // The second completion only updates the recorded status.
        assert_eq!(timer.status(), "error");
    }

    #[tokio::test]
    async fn llm_timing_passes_results_through() {
        let ok = log_llm_timing("fake", "model", "op", None, || async { Ok(5) }).await;
        assert_eq!(ok.expect("ok result"), 5);

        let err: Result<(), _> = log_llm_timing("fake", "model", "op", None, || async {
            Err(anyhow!("quota exceeded"))
        })
        .await;
        assert_eq!(err.expect_err("error result").to_string(), "quota exceeded");
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::catalog::GenerationConfig;
use crate::generation::{generate_id_photo, GenerationError};
use crate::llm::ImageModel;
use crate::utils::data_uri::DataUri;
use crate::utils::timing::{complete_generation_timer, start_generation_timer};

pub const NO_RESULT_MESSAGE: &str =
    "Could not produce a result. Please try again with a different photo.";
pub const PROCESSING_ERROR_MESSAGE: &str = "Something went wrong while processing the photo.";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no source photo has been loaded")]
    NoSourceImage,
    #[error("a generation is already in progress for this session")]
    GenerationInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed(DataUri),
    NoUsableOutput,
    Failed(String),
}

impl GenerationOutcome {
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Completed(_) => None,
            Self::NoUsableOutput => Some(NO_RESULT_MESSAGE),
            Self::Failed(_) => Some(PROCESSING_ERROR_MESSAGE),
        }
    }
}

#[derive(Debug, Default)]
struct SessionSlots {
    config: GenerationConfig,
    source: Option<DataUri>,
    result: Option<DataUri>,
    last_error: Option<String>,
}

/// Clears the in-flight flag on every exit path of a generation.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// State owned by one user session: the current options, the uploaded photo
/// and the latest result. At most one generation runs at a time.
#[derive(Debug, Clone)]
pub struct PhotoSession {
    id: u64,
    slots: Arc<Mutex<SessionSlots>>,
    in_flight: Arc<AtomicBool>,
}

impl Default for PhotoSession {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl PhotoSession {
    pub fn new() -> Self {
        Self::with_config(GenerationConfig::default())
    }

    pub fn with_config(config: GenerationConfig) -> Self {
        PhotoSession {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            slots: Arc::new(Mutex::new(SessionSlots {
                config,
                ..SessionSlots::default()
            })),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> GenerationConfig {
        self.slots.lock().config.clone()
    }

    pub fn update_config<F>(&self, update: F)
    where
        F: FnOnce(&mut GenerationConfig),
    {
        update(&mut self.slots.lock().config);
    }

    pub fn load_source(&self, source: DataUri) {
        info!(
            "Session {} loaded a {} source photo",
            self.id,
            source.mime_type()
        );
        self.slots.lock().source = Some(source);
    }

    pub fn source(&self) -> Option<DataUri> {
        self.slots.lock().source.clone()
    }

    pub fn result(&self) -> Option<DataUri> {
        self.slots.lock().result.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.slots.lock().last_error.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn generate<M>(&self, model: &M) -> Result<GenerationOutcome, SessionError>
    where
        M: ImageModel + ?Sized,
    {
        let (source, config) = {
            let slots = self.slots.lock();
            let source = slots.source.clone().ok_or(SessionError::NoSourceImage)?;
            (source, slots.config.clone())
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Session {} rejected an overlapping generation", self.id);
            return Err(SessionError::GenerationInProgress);
        };
        self.slots.lock().last_error = None;

        let mut timer = start_generation_timer(self.id, &config);
        let outcome = match generate_id_photo(model, &source, &config).await {
            Ok(Some(image)) => {
                complete_generation_timer(&mut timer, "success", None);
                self.slots.lock().result = Some(image.clone());
                GenerationOutcome::Completed(image)
            }
            Ok(None) => {
                complete_generation_timer(&mut timer, "empty", None);
                self.slots.lock().last_error = Some(NO_RESULT_MESSAGE.to_string());
                GenerationOutcome::NoUsableOutput
            }
            Err(GenerationError::Model(err)) => {
                let detail = format!("{err:#}");
                error!("Session {} generation failed: {}", self.id, detail);
                complete_generation_timer(&mut timer, "error", Some(detail.clone()));
                self.slots.lock().last_error = Some(PROCESSING_ERROR_MESSAGE.to_string());
                GenerationOutcome::Failed(detail)
            }
        };

        Ok(outcome)
    }
}

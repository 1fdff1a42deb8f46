//! Record/replay transport

use crate::anonymize::anonymize_interaction;
use crate::cassette::{Cassette, Interaction, cassette_path};
use crate::error::{RecorderError, Result};
use crate::matcher::Matcher;
use async_trait::async_trait;
use scwtf_cloud::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Selects record or replay
pub const MODE_ENV: &str = "SCW_RECORDER_MODE";

/// Command-line flag forcing record mode
pub const RECORD_FLAG: &str = "--record";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderMode {
    Record,
    #[default]
    Replay,
}

impl RecorderMode {
    /// `SCW_RECORDER_MODE=record|replay`, or `--record` on the command line.
    /// Replay otherwise.
    pub fn from_env() -> Self {
        if std::env::args().any(|a| a == RECORD_FLAG) {
            return RecorderMode::Record;
        }
        match std::env::var(MODE_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("record") => RecorderMode::Record,
            Ok(v) if !v.is_empty() && !v.eq_ignore_ascii_case("replay") => {
                warn!(mode = %v, "Unknown recorder mode, replaying");
                RecorderMode::Replay
            }
            _ => RecorderMode::Replay,
        }
    }
}

#[derive(Debug, Default)]
struct Tape {
    interactions: Vec<Interaction>,
    used: Vec<bool>,
}

/// HTTP transport that records live traffic to a cassette or replays one.
///
/// In replay mode each request is answered by the first unused recorded
/// interaction the [`Matcher`] accepts. In record mode requests go to the
/// live transport and are kept until [`Recorder::save`].
#[derive(Debug)]
pub struct Recorder {
    mode: RecorderMode,
    path: Option<PathBuf>,
    live: Option<Arc<dyn HttpTransport>>,
    matcher: Matcher,
    tape: Mutex<Tape>,
}

impl Recorder {
    /// Replay a cassette held in memory
    pub fn from_cassette(cassette: Cassette) -> Self {
        let used = vec![false; cassette.interactions.len()];
        Self {
            mode: RecorderMode::Replay,
            path: None,
            live: None,
            matcher: Matcher::default(),
            tape: Mutex::new(Tape {
                interactions: cassette.interactions,
                used,
            }),
        }
    }

    /// Replay the cassette stored at `path`
    pub fn replay(path: &Path) -> Result<Self> {
        let cassette = Cassette::load(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::from_cassette(cassette)
        })
    }

    /// Record through `live`; [`Recorder::save`] writes to `path`
    pub fn record(path: &Path, live: Arc<dyn HttpTransport>) -> Self {
        Self {
            mode: RecorderMode::Record,
            path: Some(path.to_path_buf()),
            live: Some(live),
            matcher: Matcher::default(),
            tape: Mutex::new(Tape::default()),
        }
    }

    /// Recorder for a named test, in the mode the environment selects
    pub fn for_test(test_name: &str) -> Result<Self> {
        let path = cassette_path(test_name);
        match RecorderMode::from_env() {
            RecorderMode::Replay => Self::replay(&path),
            RecorderMode::Record => {
                let live = ReqwestTransport::new()?;
                info!(path = %path.display(), "Recording cassette");
                Ok(Self::record(&path, Arc::new(live)))
            }
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    fn tape(&self) -> MutexGuard<'_, Tape> {
        self.tape.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interactions not consumed by replay
    pub fn unused(&self) -> usize {
        self.tape().used.iter().filter(|u| !**u).count()
    }

    /// Recorded interactions, anonymized
    pub fn cassette(&self) -> Cassette {
        Cassette::new(self.tape().interactions.clone())
    }

    /// Write recorded interactions to the cassette file. No-op in replay mode.
    pub fn save(&self) -> Result<()> {
        if self.mode == RecorderMode::Replay {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.cassette().save(path)
    }

    fn replay_one(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut tape = self.tape();
        let Tape { interactions, used } = &mut *tape;
        let found = interactions
            .iter()
            .zip(used.iter_mut())
            .find(|(i, used)| !**used && self.matcher.matches(&i.request, request));
        match found {
            Some((interaction, used)) => {
                *used = true;
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = interaction.response.status,
                    "Replayed"
                );
                Ok(interaction.response.clone())
            }
            None => Err(RecorderError::NoMatch {
                method: request.method.clone(),
                url: request.url.clone(),
            }),
        }
    }

    async fn record_one(&self, request: HttpRequest) -> Result<HttpResponse> {
        let live = self.live.as_ref().ok_or(RecorderError::NoLiveTransport)?;
        let response = live.send(request.clone()).await?;
        let mut interaction = Interaction {
            request,
            response: response.clone(),
        };
        anonymize_interaction(&mut interaction);
        self.tape().interactions.push(interaction);
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for Recorder {
    async fn send(&self, request: HttpRequest) -> scwtf_cloud::Result<HttpResponse> {
        let result = match self.mode {
            RecorderMode::Replay => self.replay_one(&request),
            RecorderMode::Record => self.record_one(request).await,
        };
        result.map_err(Into::into)
    }
}

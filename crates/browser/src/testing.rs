//! Scripted in-process sessions.
//!
//! A [`ScriptedSession`] replays a timed list of paused requests and reports
//! DOMContentLoaded after a configurable delay, while recording every
//! decision the interceptor makes. Pair with `#[tokio::test(start_paused =
//! true)]` so the delays cost nothing.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{StreamExt, stream::BoxStream},
};

use crate::{
    error::BrowserError,
    session::{BrowserSession, SessionLauncher},
    types::{PausedRequest, Verdict},
};

/// One request the page will issue, `delay` after the previous one.
#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub resource_type: String,
    pub url: String,
}

impl Step {
    pub fn request(resource_type: &str, url: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            resource_type: resource_type.to_string(),
            url: url.to_string(),
        }
    }

    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[derive(Debug, Clone)]
struct Script {
    steps: Vec<Step>,
    /// `None` never fires.
    dom_ready: Option<Duration>,
    fail_interception: bool,
    fail_navigation: Option<String>,
    fail_settle: bool,
}

/// Interceptor decisions as seen by the browser.
#[derive(Debug, Clone, Default)]
pub struct Decisions {
    pub continued: u64,
    pub continued_by_type: HashMap<String, u64>,
    pub aborted_by_type: HashMap<String, u64>,
}

impl Decisions {
    pub fn aborted(&self) -> u64 {
        self.aborted_by_type.values().sum()
    }
}

#[derive(Debug, Default)]
struct Record {
    decisions: Decisions,
    navigations: Vec<String>,
}

pub struct ScriptedSession {
    script: Script,
    record: Mutex<Record>,
    closes: AtomicUsize,
}

impl ScriptedSession {
    pub fn new(steps: Vec<Step>) -> Self {
        Self::from_script(Script {
            steps,
            dom_ready: Some(Duration::ZERO),
            fail_interception: false,
            fail_navigation: None,
            fail_settle: false,
        })
    }

    fn from_script(script: Script) -> Self {
        Self {
            script,
            record: Mutex::new(Record::default()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn dom_ready_after_ms(mut self, ms: u64) -> Self {
        self.script.dom_ready = Some(Duration::from_millis(ms));
        self
    }

    pub fn never_dom_ready(mut self) -> Self {
        self.script.dom_ready = None;
        self
    }

    pub fn fail_interception(mut self) -> Self {
        self.script.fail_interception = true;
        self
    }

    pub fn fail_navigation(mut self, reason: &str) -> Self {
        self.script.fail_navigation = Some(reason.to_string());
        self
    }

    pub fn fail_settle(mut self) -> Self {
        self.script.fail_settle = true;
        self
    }

    pub fn decisions(&self) -> Decisions {
        self.lock().decisions.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resource_type_of(&self, request_id: &str) -> String {
        request_id
            .strip_prefix("req-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| self.script.steps.get(n))
            .map(|s| s.resource_type.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn paused_requests(
        &self,
    ) -> Result<BoxStream<'static, PausedRequest>, BrowserError> {
        if self.script.fail_interception {
            return Err(BrowserError::InterceptionSetup(
                "Fetch.enable rejected".into(),
            ));
        }
        let steps = self.script.steps.clone();
        let stream = futures::stream::iter(steps.into_iter().enumerate())
            .then(|(n, step)| async move {
                tokio::time::sleep(step.delay).await;
                PausedRequest {
                    request_id: format!("req-{n}"),
                    url: step.url,
                    resource_type: step.resource_type,
                }
            })
            // A live page keeps the stream open until teardown.
            .chain(futures::stream::pending());
        Ok(stream.boxed())
    }

    async fn settle(&self, request_id: &str, verdict: Verdict) -> Result<(), BrowserError> {
        if self.script.fail_settle {
            return Err(BrowserError::Cdp(format!("request {request_id} is gone")));
        }
        let ty = self.resource_type_of(request_id);
        let mut record = self.lock();
        match verdict {
            Verdict::Continue => {
                record.decisions.continued += 1;
                *record.decisions.continued_by_type.entry(ty).or_default() += 1;
            },
            Verdict::Abort => {
                *record.decisions.aborted_by_type.entry(ty).or_default() += 1;
            },
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.lock().navigations.push(url.to_string());
        if let Some(reason) = &self.script.fail_navigation {
            return Err(BrowserError::NavigationFailed(reason.clone()));
        }
        match self.script.dom_ready {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            },
            None => futures::future::pending().await,
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a fresh copy of a template session per launch.
pub struct ScriptedLauncher {
    template: Script,
    fail_launch: Option<String>,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
}

impl ScriptedLauncher {
    pub fn new(template: ScriptedSession) -> Self {
        Self {
            template: template.script,
            fail_launch: None,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// A launcher whose every launch fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_launch: Some(reason.to_string()),
            ..Self::new(ScriptedSession::new(Vec::new()))
        }
    }

    pub fn launches(&self) -> usize {
        self.sessions().len()
    }

    pub fn sessions(&self) -> Vec<Arc<ScriptedSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_session(&self) -> Option<Arc<ScriptedSession>> {
        self.sessions().last().cloned()
    }

    /// Total closes across every launched session.
    pub fn closes(&self) -> usize {
        self.sessions().iter().map(|s| s.closes()).sum()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        if let Some(reason) = &self.fail_launch {
            return Err(BrowserError::LaunchFailed(reason.clone()));
        }
        let session = Arc::new(ScriptedSession::from_script(self.template.clone()));
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&session));
        Ok(session)
    }
}

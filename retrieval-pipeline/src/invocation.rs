//! Single chokepoint for every external completion call. Bounds in-flight
//! dispatches with a semaphore, throughput with a token bucket, and
//! recovers throttling and transient failures with cooldown plus
//! exponential backoff. No other component talks to the backend directly.

use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use common::{
    config::QueueConfig,
    error::{AppError, InvocationError},
};
use tokio::{
    sync::{Mutex, Semaphore},
    time::Instant,
};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::{debug, warn};

/// Seam for the external text-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, InvocationError>;
}

/// Production backend wrapping the OpenAI-compatible chat endpoint.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, InvocationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessage::from(prompt.to_owned()).into()])
            .build()
            .map_err(|e| InvocationError::Fatal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_openai_error(&e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                InvocationError::Transient("completion response had no content".to_string())
            })
    }
}

fn classify_openai_error(err: &OpenAIError) -> InvocationError {
    match err {
        OpenAIError::Reqwest(inner) => InvocationError::Transient(inner.to_string()),
        OpenAIError::ApiError(api) => {
            let lowered = api.message.to_lowercase();
            if lowered.contains("rate limit")
                || lowered.contains("overloaded")
                || lowered.contains("quota")
            {
                InvocationError::Throttled(api.message.clone())
            } else if lowered.contains("timeout")
                || lowered.contains("temporar")
                || lowered.contains("unavailable")
            {
                InvocationError::Transient(api.message.clone())
            } else {
                InvocationError::Fatal(api.message.clone())
            }
        }
        other => InvocationError::Fatal(other.to_string()),
    }
}

/// Observable lifecycle of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Dispatching,
    Cooldown,
}

struct QueueState {
    tokens: f64,
    last_refill: Instant,
    cooldown_until: Option<Instant>,
    phase: QueuePhase,
}

pub struct InvocationQueue {
    backend: Arc<dyn CompletionBackend>,
    semaphore: Semaphore,
    state: Mutex<QueueState>,
    config: QueueConfig,
}

impl InvocationQueue {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: QueueConfig) -> Self {
        Self {
            semaphore: Semaphore::new(config.max_in_flight),
            state: Mutex::new(QueueState {
                tokens: config.burst,
                last_refill: Instant::now(),
                cooldown_until: None,
                phase: QueuePhase::Idle,
            }),
            backend,
            config,
        }
    }

    pub async fn phase(&self) -> QueuePhase {
        self.state.lock().await.phase
    }

    /// Issue one completion request. The in-flight permit is held for the
    /// dispatch's full duration; the state mutex is never held across it.
    /// Throttling triggers a cooldown window, then retries follow
    /// `min(retry_base^attempt, retry_max_sleep)` with jitter. Fatal
    /// failures propagate immediately without retry.
    ///
    /// Cancellation-safe at every await point: dropping the future while a
    /// backend call is in flight lets that call run to completion on the
    /// backend's side and discards the result, rather than tearing it down.
    pub async fn invoke(&self, prompt: &str) -> Result<String, AppError> {
        let mut backoff = ExponentialBackoff::from_millis(self.config.retry_base)
            .factor(self.config.retry_factor_ms)
            .max_delay(Duration::from_secs(self.config.retry_max_sleep_sec))
            .map(jitter);
        let mut attempts = 0usize;

        loop {
            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| AppError::InternalError("invocation queue closed".to_string()))?;
            self.wait_for_slot().await;

            debug!(attempt = attempts, "dispatching completion request");
            let result = self.backend.complete(prompt).await;
            drop(permit);
            attempts += 1;

            match result {
                Ok(text) => {
                    self.set_phase(QueuePhase::Idle).await;
                    return Ok(text);
                }
                Err(InvocationError::Fatal(message)) => {
                    self.set_phase(QueuePhase::Idle).await;
                    return Err(InvocationError::Fatal(message).into());
                }
                Err(recoverable) => {
                    if matches!(recoverable, InvocationError::Throttled(_)) {
                        self.begin_cooldown().await;
                    }
                    if attempts > self.config.max_retries {
                        self.set_phase(QueuePhase::Idle).await;
                        return Err(InvocationError::RetriesExhausted {
                            attempts,
                            last: recoverable.to_string(),
                        }
                        .into());
                    }
                    let delay = backoff
                        .next()
                        .unwrap_or_else(|| Duration::from_secs(self.config.retry_max_sleep_sec));
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %recoverable,
                        "recoverable invocation failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Block until the cooldown window has passed and a rate token is
    /// available, then claim the token.
    async fn wait_for_slot(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                match state.cooldown_until {
                    Some(deadline) if now < deadline => {
                        Some(deadline.saturating_duration_since(now))
                    }
                    _ => {
                        state.cooldown_until = None;
                        let elapsed = now.saturating_duration_since(state.last_refill);
                        state.tokens = (state.tokens
                            + elapsed.as_secs_f64() * self.config.max_rps)
                            .min(self.config.burst);
                        state.last_refill = now;
                        if state.tokens >= 1.0 {
                            state.tokens -= 1.0;
                            state.phase = QueuePhase::Dispatching;
                            None
                        } else {
                            let deficit = 1.0 - state.tokens;
                            Some(Duration::from_secs_f64(deficit / self.config.max_rps))
                        }
                    }
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    async fn begin_cooldown(&self) {
        let mut state = self.state.lock().await;
        let deadline = Instant::now() + Duration::from_secs(self.config.cooldown_sec);
        state.cooldown_until = Some(match state.cooldown_until {
            Some(current) => current.max(deadline),
            None => deadline,
        });
        state.phase = QueuePhase::Cooldown;
    }

    async fn set_phase(&self, phase: QueuePhase) {
        self.state.lock().await.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    fn test_config() -> QueueConfig {
        QueueConfig {
            max_in_flight: 1,
            max_rps: 1000.0,
            burst: 8.0,
            cooldown_sec: 8,
            retry_base: 2,
            retry_factor_ms: 100,
            retry_max_sleep_sec: 1,
            max_retries: 3,
        }
    }

    struct CountingBackend {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        hold: Duration,
    }

    impl CountingBackend {
        fn new(hold: Duration) -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                hold,
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for CountingBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, InvocationError> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    enum Script {
        Succeed,
        Throttle,
        Stumble,
        Fail,
    }

    struct ScriptedBackend {
        script: Mutex<VecDeque<Script>>,
        stamps: Mutex<Vec<Instant>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                stamps: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stamps.lock().await.push(Instant::now());
            let next = self.script.lock().await.pop_front();
            match next {
                Some(Script::Succeed) | None => Ok("done".to_string()),
                Some(Script::Throttle) => {
                    Err(InvocationError::Throttled("rate limited".to_string()))
                }
                Some(Script::Stumble) => {
                    Err(InvocationError::Transient("blip".to_string()))
                }
                Some(Script::Fail) => Err(InvocationError::Fatal("bad request".to_string())),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_max_in_flight() {
        let backend = Arc::new(CountingBackend::new(Duration::from_millis(50)));
        let queue = Arc::new(InvocationQueue::new(backend.clone(), test_config()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.invoke("hello").await }));
        }
        for handle in handles {
            handle.await.expect("join").expect("invoke");
        }

        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
        assert_eq!(queue.phase().await, QueuePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn realized_rate_stays_within_sliding_window() {
        let mut config = test_config();
        config.max_in_flight = 4;
        config.max_rps = 2.0;
        config.burst = 1.0;
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let queue = Arc::new(InvocationQueue::new(backend.clone(), config));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.invoke("tick").await }));
        }
        for handle in handles {
            handle.await.expect("join").expect("invoke");
        }

        let stamps = backend.stamps.lock().await.clone();
        assert_eq!(stamps.len(), 6);
        for (i, start) in stamps.iter().enumerate() {
            let in_window = stamps
                .iter()
                .skip(i)
                .filter(|stamp| stamp.saturating_duration_since(*start) < Duration::from_secs(1))
                .count();
            assert!(
                in_window <= 2,
                "window starting at dispatch {i} saw {in_window} calls"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_opens_a_cooldown_window() {
        let backend = Arc::new(ScriptedBackend::new(vec![Script::Throttle, Script::Succeed]));
        let queue = InvocationQueue::new(backend.clone(), test_config());

        let answer = queue.invoke("hello").await.expect("recovers after cooldown");
        assert_eq!(answer, "done");

        let stamps = backend.stamps.lock().await.clone();
        assert_eq!(stamps.len(), 2);
        let gap = stamps[1].saturating_duration_since(stamps[0]);
        assert!(
            gap >= Duration::from_secs(8),
            "second dispatch after {gap:?}, expected the full cooldown"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_propagate_without_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![Script::Fail]));
        let queue = InvocationQueue::new(backend.clone(), test_config());

        let err = queue.invoke("hello").await.expect_err("fatal must surface");
        assert!(matches!(
            err,
            AppError::Invocation(InvocationError::Fatal(_))
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_retries() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Script::Stumble,
            Script::Stumble,
            Script::Stumble,
            Script::Stumble,
        ]));
        let mut config = test_config();
        config.max_retries = 3;
        let queue = InvocationQueue::new(backend.clone(), config);

        let err = queue.invoke("hello").await.expect_err("must give up");
        assert!(matches!(
            err,
            AppError::Invocation(InvocationError::RetriesExhausted { attempts: 4, .. })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }
}

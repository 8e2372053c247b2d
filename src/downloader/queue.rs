use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use crate::downloader::status::{JobIcon, StatusSurface, StatusWriter};
use crate::utils::generate_job_id;

/// How a job ended. The queue treats all three the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    Ok,
    Canceled,
    Failed(String),
}

/// Everything a running job is handed by the queue.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: String,
    pub status: StatusWriter,
    pub cancel: CancellationToken,
}

type Work = Box<dyn FnOnce(JobContext) -> BoxFuture<'static, Settled> + Send>;

struct QueuedJob {
    id: String,
    label: String,
    icon: JobIcon,
    enqueued_at: chrono::DateTime<chrono::Utc>,
    work: Work,
    done: oneshot::Sender<Settled>,
}

/// Resolves once its job has settled.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    rx: oneshot::Receiver<Settled>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for JobHandle {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Settled> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Settled::Failed("job queue stopped".to_string())))
    }
}

/// Serial FIFO executor that owns the status surface.
///
/// Jobs run one at a time on a single worker task; a job is only handed a
/// writer for the surface once it becomes the active one.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
    surface: Arc<watch::Sender<StatusSurface>>,
}

impl JobQueue {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (surface, _) = watch::channel(StatusSurface::default());
        let surface = Arc::new(surface);

        tokio::spawn(Self::run(rx, surface.clone()));

        Self { tx, surface }
    }

    pub fn enqueue<F, Fut>(&self, label: impl Into<String>, icon: JobIcon, work: F) -> JobHandle
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Settled> + Send + 'static,
    {
        let id = generate_job_id();
        let label = label.into();
        let (done, rx) = oneshot::channel();

        let job = QueuedJob {
            id: id.clone(),
            label,
            icon,
            enqueued_at: chrono::Utc::now(),
            work: Box::new(move |ctx| work(ctx).boxed()),
            done,
        };

        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            log::error!("Job queue is not running, dropping '{}'", job.label);
            let _ = job.done.send(Settled::Failed("job queue stopped".to_string()));
        }

        JobHandle { id, rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSurface> {
        self.surface.subscribe()
    }

    pub fn snapshot(&self) -> StatusSurface {
        self.surface.borrow().clone()
    }

    /// Fires the cancel handler the active job installed, if any.
    pub fn cancel_active(&self) -> bool {
        let token = self.surface.borrow().on_cancel.clone();
        match token {
            Some(token) => {
                log::info!("Canceling active job");
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<QueuedJob>, surface: Arc<watch::Sender<StatusSurface>>) {
        while let Some(job) = rx.recv().await {
            let QueuedJob { id, label, icon, enqueued_at, work, done } = job;
            let waited = chrono::Utc::now() - enqueued_at;
            log::info!("Starting job '{}' after {}ms in queue", label, waited.num_milliseconds());

            surface.send_replace(StatusSurface::started(&id, &label, icon));

            let cancel = CancellationToken::new();
            let ctx = JobContext {
                id: id.clone(),
                status: StatusWriter::new(id.clone(), surface.clone(), cancel.clone()),
                cancel: cancel.clone(),
            };

            let settled = match std::panic::catch_unwind(AssertUnwindSafe(move || work(ctx))) {
                Ok(running) => match AssertUnwindSafe(running).catch_unwind().await {
                    Ok(settled) => settled,
                    Err(_) => {
                        log::error!("Job '{}' panicked", label);
                        Settled::Failed("job panicked".to_string())
                    }
                },
                Err(_) => {
                    log::error!("Job '{}' panicked before it started", label);
                    Settled::Failed("job panicked".to_string())
                }
            };

            // Late writes from this job are rejected from here on.
            cancel.cancel();
            surface.send_modify(|s| {
                s.processing = false;
                s.on_cancel = None;
            });
            log::info!("Job '{}' settled: {:?}", label, settled);

            let _ = done.send(settled);
        }
        log::debug!("Job queue worker stopped");
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;
use super::repositories::write_samples;
use crate::models::TelemetrySample;

type Task = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

struct TelemetryJob {
    samples: Vec<TelemetrySample>,
    reply: oneshot::Sender<Result<()>>,
}

enum Job {
    Run(Task),
    /// Telemetry batches queued back to back share one transaction.
    Telemetry(TelemetryJob),
}

/// Owns the connection on the worker thread. Exits when every sender is gone.
struct Worker {
    conn: Connection,
    jobs: Receiver<Job>,
}

impl Worker {
    fn open(path: &Path) -> Result<Connection> {
        let mut conn = Connection::open(path).context("failed to open SQLite database")?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        run_migrations(&mut conn).context("failed to run database migrations")?;
        Ok(conn)
    }

    fn run(mut self) {
        let mut next = self.jobs.recv().ok();
        while let Some(job) = next.take() {
            next = match job {
                Job::Run(task) => {
                    task(&mut self.conn);
                    self.jobs.recv().ok()
                }
                Job::Telemetry(first) => self.append_telemetry(first),
            };
        }
        info!("Survey database worker stopped");
    }

    /// Writes `first` plus any telemetry already waiting behind it, then
    /// returns the next job to run.
    fn append_telemetry(&mut self, first: TelemetryJob) -> Option<Job> {
        let mut jobs = vec![first];
        let mut carried = None;
        let mut closed = false;
        loop {
            match self.jobs.try_recv() {
                Ok(Job::Telemetry(job)) => jobs.push(job),
                Ok(other) => {
                    carried = Some(other);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        let batches: Vec<&[TelemetrySample]> =
            jobs.iter().map(|job| job.samples.as_slice()).collect();
        match self.write_telemetry(&batches) {
            Ok(count) => {
                debug!("Wrote {count} telemetry samples in {} batches", jobs.len());
                for job in jobs {
                    let _ = job.reply.send(Ok(()));
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                for job in jobs {
                    let _ = job.reply.send(Err(anyhow!("telemetry write failed: {message}")));
                }
            }
        }

        if carried.is_some() || closed {
            carried
        } else {
            self.jobs.recv().ok()
        }
    }

    fn write_telemetry(&mut self, batches: &[&[TelemetrySample]]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for samples in batches {
            write_samples(&tx, samples)?;
            count += samples.len();
        }
        tx.commit()?;
        Ok(count)
    }
}

struct DatabaseInner {
    jobs: Option<Sender<Job>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        // closing the channel stops the worker
        self.jobs.take();
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Survey database worker panicked");
            }
        }
    }
}

/// SQLite survey store. The connection lives on one worker thread; async
/// callers queue jobs and await the reply, so storage I/O never runs on the
/// runtime.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path = db_path.clone();

        let worker = thread::Builder::new()
            .name("pavewatch-db".into())
            .spawn(move || match Worker::open(&path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        Worker { conn, jobs: jobs_rx }.run();
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before it was ready")??;
        info!("Survey database ready at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                jobs: Some(jobs_tx),
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    fn submit(&self, job: Job) -> Result<()> {
        let jobs = self
            .inner
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("survey database is closed"))?;
        jobs.send(job)
            .map_err(|_| anyhow!("survey database worker is gone"))
    }

    /// Runs `task` against the connection on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(Job::Run(Box::new(move |conn| {
            let _ = reply_tx.send(task(conn));
        })))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("survey database worker dropped the request"))?
    }

    /// Queues a telemetry batch. Batches that pile up behind each other are
    /// committed together; a failed commit fails every batch in it.
    pub async fn append_telemetry(&self, samples: Vec<TelemetrySample>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let (reply, reply_rx) = oneshot::channel();
        self.submit(Job::Telemetry(TelemetryJob { samples, reply }))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("survey database worker dropped the request"))?
    }
}

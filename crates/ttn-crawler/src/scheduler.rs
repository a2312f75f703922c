//! Background jobs: run-once and fixed-interval.
//!
//! One-shot jobs go through a queue drained by a dispatcher task; each
//! interval job owns a loop. Every run is spawned onto its own task and
//! awaited through its `JoinHandle`, so an error or a panic is reported
//! against the job's name and goes no further.

use std::{
  future::Future,
  pin::Pin,
  sync::{Mutex, PoisonError},
  time::Duration,
};

use tokio::{
  sync::mpsc,
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};
use tracing::{debug, error, warn};

type Job = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Interval periods below this are raised to it; `tokio::time::interval`
/// rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct Queued {
  name: String,
  job:  Job,
}

pub struct Scheduler {
  queue: mpsc::UnboundedSender<Queued>,
  tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
  /// Start the dispatcher. Must be called from within a tokio runtime.
  pub fn start() -> Self {
    let (queue, mut rx) = mpsc::unbounded_channel::<Queued>();
    let dispatcher = tokio::spawn(async move {
      while let Some(Queued { name, job }) = rx.recv().await {
        tokio::spawn(run_guarded(name, job));
      }
    });
    Self { queue, tasks: Mutex::new(vec![dispatcher]) }
  }

  /// Run `job` once, as soon as possible.
  pub fn schedule_once<Fut>(&self, name: impl Into<String>, job: Fut)
  where
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    let queued = Queued { name: name.into(), job: Box::pin(job) };
    if let Err(rejected) = self.queue.send(queued) {
      warn!(job = %rejected.0.name, "scheduler is shut down, dropping job");
    }
  }

  /// Run the future produced by `job` every `period`, starting now. A run
  /// that overlaps the next tick delays it; missed ticks are skipped.
  pub fn schedule_interval<J, Fut>(&self, name: impl Into<String>, period: Duration, job: J)
  where
    J: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    let name = name.into();
    let period = period.max(MIN_PERIOD);
    let handle = tokio::spawn(async move {
      let mut ticker = time::interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticker.tick().await;
        run_guarded(name.clone(), Box::pin(job())).await;
      }
    });
    self.tasks().push(handle);
  }

  /// Stop the dispatcher and every interval loop. Runs already in flight
  /// finish on their own; queued one-shot jobs are dropped.
  pub fn shutdown(&self) {
    for handle in self.tasks().drain(..) {
      handle.abort();
    }
  }

  fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
    self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) { self.shutdown(); }
}

async fn run_guarded(name: String, job: Job) {
  match tokio::spawn(job).await {
    Ok(Ok(())) => debug!(job = %name, "job finished"),
    Ok(Err(e)) => warn!(job = %name, error = %format!("{e:#}"), "job failed"),
    Err(e) if e.is_panic() => error!(job = %name, "job panicked"),
    Err(_) => debug!(job = %name, "job cancelled"),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use tokio::sync::oneshot;

  use super::*;

  const WAIT: Duration = Duration::from_secs(5);

  async fn panics() -> anyhow::Result<()> { panic!("boom") }

  #[tokio::test]
  async fn failing_and_panicking_jobs_do_not_stop_later_ones() {
    let scheduler = Scheduler::start();
    let (tx, rx) = oneshot::channel();

    scheduler.schedule_once("fails", async { Err::<(), _>(anyhow::anyhow!("boom")) });
    scheduler.schedule_once("panics", panics());
    scheduler.schedule_once("succeeds", async move {
      let _ = tx.send(());
      Ok(())
    });

    time::timeout(WAIT, rx).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn interval_runs_immediately_and_repeats() {
    let scheduler = Scheduler::start();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    scheduler.schedule_interval("tick", Duration::from_millis(10), move || {
      let counter = Arc::clone(&counter);
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    });

    time::timeout(WAIT, async {
      while runs.load(Ordering::SeqCst) < 3 {
        time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn long_period_still_runs_first_tick_now() {
    let scheduler = Scheduler::start();
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));

    scheduler.schedule_interval("hourly", Duration::from_secs(3600), move || {
      if let Some(tx) = tx.lock().unwrap().take() {
        let _ = tx.send(());
      }
      async { Ok(()) }
    });

    time::timeout(WAIT, rx).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn failing_interval_job_keeps_ticking() {
    let scheduler = Scheduler::start();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    scheduler.schedule_interval("flaky", Duration::from_millis(10), move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if n % 2 == 0 {
          panic!("even run");
        }
        Err::<(), _>(anyhow::anyhow!("odd run"))
      }
    });

    time::timeout(WAIT, async {
      while runs.load(Ordering::SeqCst) < 4 {
        time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn shutdown_stops_interval_loops() {
    let scheduler = Scheduler::start();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    scheduler.schedule_interval("tick", Duration::from_millis(10), move || {
      let counter = Arc::clone(&counter);
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    });
    time::sleep(Duration::from_millis(50)).await;
    scheduler.shutdown();
    time::sleep(Duration::from_millis(20)).await;

    let after = runs.load(Ordering::SeqCst);
    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), after);
  }
}

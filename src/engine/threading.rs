//! Frame-level worker pool
//!
//! Jobs are numbered on submission and processed by any free worker. Results
//! are handed back strictly in submission order, so output order matches
//! input order regardless of which worker finished first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};

use super::{EngineError, EngineResult};

type Work<I, O> = Arc<dyn Fn(I) -> EngineResult<O> + Send + Sync>;

pub(crate) struct FrameThreadPool<I, O> {
  jobs: Option<Sender<(u64, I)>>,
  results: Receiver<(u64, EngineResult<O>)>,
  workers: Vec<JoinHandle<()>>,
  next_submit: u64,
  next_deliver: u64,
  finished: BTreeMap<u64, EngineResult<O>>,
}

impl<I: Send + 'static, O: Send + 'static> FrameThreadPool<I, O> {
  pub(crate) fn new<F>(threads: usize, name: &str, work: F) -> EngineResult<Self>
  where
    F: Fn(I) -> EngineResult<O> + Send + Sync + 'static,
  {
    let work: Work<I, O> = Arc::new(work);
    let (job_tx, job_rx) = channel::unbounded::<(u64, I)>();
    let (result_tx, result_rx) = channel::unbounded::<(u64, EngineResult<O>)>();

    let mut workers = Vec::with_capacity(threads);
    for id in 0..threads {
      let job_rx = job_rx.clone();
      let result_tx = result_tx.clone();
      let work = work.clone();
      let handle = std::thread::Builder::new()
        .name(format!("{}-frame-{}", name, id))
        .spawn(move || Self::worker_loop(job_rx, result_tx, work))
        .map_err(|e| EngineError::oom(format!("failed to spawn frame thread: {}", e)))?;
      workers.push(handle);
    }

    tracing::debug!(target: "codec_session", threads, name, "frame thread pool started");
    Ok(Self {
      jobs: Some(job_tx),
      results: result_rx,
      workers,
      next_submit: 0,
      next_deliver: 0,
      finished: BTreeMap::new(),
    })
  }

  fn worker_loop(
    jobs: Receiver<(u64, I)>,
    results: Sender<(u64, EngineResult<O>)>,
    work: Work<I, O>,
  ) {
    while let Ok((seq, job)) = jobs.recv() {
      if results.send((seq, work(job))).is_err() {
        break;
      }
    }
  }

  pub(crate) fn thread_count(&self) -> usize {
    self.workers.len()
  }

  /// Jobs submitted but not yet delivered
  pub(crate) fn in_flight(&self) -> usize {
    (self.next_submit - self.next_deliver) as usize
  }

  pub(crate) fn submit(&mut self, job: I) -> EngineResult<()> {
    let jobs = self
      .jobs
      .as_ref()
      .ok_or_else(|| EngineError::invalid("frame thread pool is shut down"))?;
    jobs
      .send((self.next_submit, job))
      .map_err(|_| EngineError::new(super::ERROR_BUG, "frame threads exited"))?;
    self.next_submit += 1;
    Ok(())
  }

  /// Block until the oldest in-flight job completes
  ///
  /// Returns `None` when nothing is in flight.
  pub(crate) fn wait_next(&mut self) -> Option<EngineResult<O>> {
    if self.in_flight() == 0 {
      return None;
    }
    let seq = self.next_deliver;
    loop {
      if let Some(result) = self.finished.remove(&seq) {
        self.next_deliver += 1;
        return Some(result);
      }
      match self.results.recv() {
        Ok((done, result)) => {
          self.finished.insert(done, result);
        }
        Err(_) => {
          self.next_deliver += 1;
          return Some(Err(EngineError::new(super::ERROR_BUG, "frame threads exited")));
        }
      }
    }
  }

  /// Wait for all in-flight work and discard it
  pub(crate) fn flush(&mut self) {
    let mut discarded = 0usize;
    while self.wait_next().is_some() {
      discarded += 1;
    }
    if discarded > 0 {
      tracing::trace!(target: "codec_session", discarded, "in-flight frames discarded");
    }
  }
}

impl<I, O> Drop for FrameThreadPool<I, O> {
  fn drop(&mut self) {
    // Closing the job channel stops the workers once the queue is empty
    self.jobs = None;
    for handle in self.workers.drain(..) {
      let _ = handle.join();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn test_results_in_submission_order() {
    let mut pool = FrameThreadPool::new(4, "test", |n: u64| {
      // Earlier jobs sleep longer so they finish last
      std::thread::sleep(Duration::from_millis(20 - n * 4));
      Ok(n * 10)
    })
    .unwrap();
    for n in 0..5 {
      pool.submit(n).unwrap();
    }
    assert_eq!(pool.in_flight(), 5);
    let out: Vec<u64> = std::iter::from_fn(|| pool.wait_next())
      .map(|r| r.unwrap())
      .collect();
    assert_eq!(out, vec![0, 10, 20, 30, 40]);
    assert_eq!(pool.in_flight(), 0);
  }

  #[test]
  fn test_errors_are_delivered_in_place() {
    let mut pool = FrameThreadPool::new(2, "test", |n: u32| {
      if n == 1 {
        Err(EngineError::invalid_data("bad"))
      } else {
        Ok(n)
      }
    })
    .unwrap();
    for n in 0..3 {
      pool.submit(n).unwrap();
    }
    assert_eq!(pool.wait_next().unwrap().unwrap(), 0);
    assert!(pool.wait_next().unwrap().is_err());
    assert_eq!(pool.wait_next().unwrap().unwrap(), 2);
    assert!(pool.wait_next().is_none());
  }

  #[test]
  fn test_flush_discards_in_flight() {
    let mut pool = FrameThreadPool::new(2, "test", |n: u32| Ok(n)).unwrap();
    pool.submit(1).unwrap();
    pool.submit(2).unwrap();
    pool.flush();
    assert_eq!(pool.in_flight(), 0);
    pool.submit(3).unwrap();
    assert_eq!(pool.wait_next().unwrap().unwrap(), 3);
    assert_eq!(pool.thread_count(), 2);
  }
}

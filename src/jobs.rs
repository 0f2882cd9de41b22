//! Bounded execution history for units of work.
//!
//! Every plugin run in a build is wrapped in a [`JobRecord`]: when it started,
//! when it ended, how long it took, and whether it succeeded. Records live in
//! a [`RingBuffer`] of fixed capacity so a long-running process that builds
//! over and over keeps a window of recent history without growing.
//!
//! ## Three-phase jobs
//!
//! [`JobTracker::run_phased`] splits a unit of work in three:
//!
//! ```text
//! prepare()          untracked: compute inputs, no record exists yet
//! execute(input)     tracked: timed, success/failure recorded
//! cleanup(&record)   always runs, sees the finalized record
//! ```
//!
//! A failing `execute` marks its record failed. The tracker itself is never
//! poisoned by a failure; the next job is accepted as usual.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Fixed-capacity circular buffer. Pushing into a full buffer evicts the
/// oldest element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    front: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            front: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn rear(&self) -> usize {
        (self.front + self.len) % self.capacity()
    }

    /// Append `item`, returning the evicted element if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.len == self.capacity() {
            let evicted = self.slots[self.front].replace(item);
            self.front = (self.front + 1) % self.capacity();
            evicted
        } else {
            let rear = self.rear();
            self.slots[rear] = Some(item);
            self.len += 1;
            None
        }
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len).filter_map(move |i| self.slots[(self.front + i) % self.capacity()].as_ref())
    }

    pub fn find_mut(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<&mut T> {
        let capacity = self.capacity();
        let front = self.front;
        let len = self.len;
        let index = (0..len)
            .map(|i| (front + i) % capacity)
            .find(|&idx| self.slots[idx].as_ref().is_some_and(&mut predicate))?;
        self.slots[index].as_mut()
    }

    pub fn newest(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.front + self.len - 1) % self.capacity();
        self.slots[idx].as_ref()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.front = 0;
        self.len = 0;
    }
}

/// Bounded FIFO for lightweight traces. Enqueueing past `max_size` silently
/// drops the oldest entry.
#[derive(Debug, Clone)]
pub struct Queue<T> {
    items: VecDeque<T>,
    max_size: usize,
}

impl<T> Queue<T> {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            items: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn enqueue(&mut self, item: T) {
        if self.items.len() == self.max_size {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// History entry for one unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub label: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobRecord {
    fn start(label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.to_string(),
            status: JobStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            exec_time_ms: None,
            response: None,
            failure_reason: None,
        }
    }

    /// Finalize once. Later calls are ignored.
    fn finish(&mut self, outcome: Result<String, String>, elapsed_ms: u64) {
        if self.status != JobStatus::Pending {
            return;
        }
        self.ended_at = Some(Utc::now());
        self.exec_time_ms = Some(elapsed_ms);
        match outcome {
            Ok(response) => {
                self.status = JobStatus::Success;
                self.response = Some(response);
            }
            Err(reason) => {
                self.status = JobStatus::Failed;
                self.failure_reason = Some(reason);
            }
        }
    }
}

/// Records units of work into a bounded history.
#[derive(Debug)]
pub struct JobTracker {
    history: RingBuffer<JobRecord>,
}

impl JobTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: RingBuffer::new(capacity),
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &JobRecord> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn last(&self) -> Option<&JobRecord> {
        self.history.newest()
    }

    /// Run `execute` as a tracked job.
    pub fn run<T, E>(
        &mut self,
        label: &str,
        execute: impl FnOnce() -> Result<T, E>,
    ) -> (JobRecord, Result<T, E>)
    where
        T: fmt::Display,
        E: fmt::Display,
    {
        self.track(label, || {
            let outcome = execute();
            let summary = match &outcome {
                Ok(value) => Ok(value.to_string()),
                Err(e) => Err(e.to_string()),
            };
            (summary, outcome)
        })
    }

    /// Run a job in prepare / execute / cleanup phases.
    ///
    /// `execute` reports its own summary: `Ok(response)` or
    /// `Err(failure_reason)`. Returns the finalized record.
    pub fn run_phased<I>(
        &mut self,
        label: &str,
        prepare: impl FnOnce() -> I,
        execute: impl FnOnce(I) -> Result<String, String>,
        cleanup: impl FnOnce(&JobRecord),
    ) -> JobRecord {
        let input = prepare();
        let (record, ()) = self.track(label, || (execute(input), ()));
        cleanup(&record);
        record
    }

    fn track<R>(
        &mut self,
        label: &str,
        execute: impl FnOnce() -> (Result<String, String>, R),
    ) -> (JobRecord, R) {
        let record = JobRecord::start(label);
        let id = record.id;
        self.history.push(record.clone());

        let started = Instant::now();
        let (outcome, value) = execute();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let finalized = match self.history.find_mut(|r| r.id == id) {
            Some(stored) => {
                stored.finish(outcome, elapsed_ms);
                stored.clone()
            }
            // Evicted while running (nested jobs on a tiny buffer).
            None => {
                let mut detached = record;
                detached.finish(outcome, elapsed_ms);
                detached
            }
        };
        (finalized, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // RingBuffer
    // =========================================================================

    #[test]
    fn ring_buffer_keeps_insertion_order() {
        let mut ring = RingBuffer::new(3);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ring.newest(), Some(&2));
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut ring = RingBuffer::new(3);
        for i in 1..=3 {
            assert_eq!(ring.push(i), None);
        }
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn ring_buffer_zero_capacity_holds_one() {
        let mut ring = RingBuffer::new(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn ring_buffer_find_mut_after_wrap() {
        let mut ring = RingBuffer::new(2);
        ring.push(10);
        ring.push(20);
        ring.push(30);
        *ring.find_mut(|v| *v == 30).unwrap() = 31;
        assert!(ring.find_mut(|v| *v == 10).is_none());
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![20, 31]);
    }

    #[test]
    fn ring_buffer_clear() {
        let mut ring = RingBuffer::new(2);
        ring.push(1);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.newest(), None);
    }

    // =========================================================================
    // Queue
    // =========================================================================

    #[test]
    fn queue_drops_oldest_beyond_max_size() {
        let mut q = Queue::new(2);
        q.enqueue(("ls", "a b"));
        q.enqueue(("pwd", "/"));
        q.enqueue(("echo", "hi"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue(), Some(("pwd", "/")));
        assert_eq!(q.dequeue(), Some(("echo", "hi")));
        assert!(q.is_empty());
    }

    // =========================================================================
    // JobTracker
    // =========================================================================

    #[test]
    fn tracker_records_success() {
        let mut tracker = JobTracker::new(4);
        let (record, result) = tracker.run("count", || Ok::<_, String>(42));
        assert_eq!(result, Ok(42));
        assert_eq!(record.status, JobStatus::Success);
        assert_eq!(record.response.as_deref(), Some("42"));
        assert!(record.ended_at.is_some());
        assert!(record.exec_time_ms.is_some());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn tracker_records_failure_and_keeps_accepting() {
        let mut tracker = JobTracker::new(4);
        let (record, _) = tracker.run("boom", || Err::<u32, _>("disk full"));
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("disk full"));

        let (next, _) = tracker.run("after", || Ok::<_, String>("ok"));
        assert_eq!(next.status, JobStatus::Success);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn tracker_capacity_two_keeps_latest_two() {
        let mut tracker = JobTracker::new(2);
        for label in ["first", "second", "third"] {
            tracker.run(label, || Ok::<_, String>(label));
        }
        let labels: Vec<&str> = tracker.history().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["second", "third"]);
    }

    #[test]
    fn phased_job_runs_cleanup_with_finalized_record() {
        let mut tracker = JobTracker::new(4);
        let mut seen = None;
        let record = tracker.run_phased(
            "phased",
            || 20,
            |n| if n > 10 { Err(format!("{n} too big")) } else { Ok("fine".into()) },
            |r| seen = Some((r.status, r.failure_reason.clone())),
        );
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(
            seen,
            Some((JobStatus::Failed, Some("20 too big".to_string())))
        );
        assert_eq!(tracker.last().unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn record_finalized_exactly_once() {
        let mut record = JobRecord::start("x");
        record.finish(Ok("first".into()), 1);
        record.finish(Err("second".into()), 2);
        assert_eq!(record.status, JobStatus::Success);
        assert_eq!(record.response.as_deref(), Some("first"));
        assert_eq!(record.exec_time_ms, Some(1));
    }

    #[test]
    fn job_ids_are_unique() {
        let mut tracker = JobTracker::new(8);
        tracker.run("a", || Ok::<_, String>(1));
        tracker.run("b", || Ok::<_, String>(2));
        let ids: Vec<Uuid> = tracker.history().map(|r| r.id).collect();
        assert_ne!(ids[0], ids[1]);
    }
}

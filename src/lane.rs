use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::CacheError;

type Job = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Worker pool (shared by every lane)
// ---------------------------------------------------------------------------

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    /// Jobs posted but not yet finished, across all lanes.
    pending: Arc<(Mutex<usize>, Condvar)>,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> Result<Arc<Self>, CacheError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        log::info!("Started {} decode workers", num_threads);
        Ok(Arc::new(Self {
            pool,
            pending: Arc::new((Mutex::new(0), Condvar::new())),
        }))
    }

    /// A new, empty FIFO sub-queue of this pool.
    pub fn lane(self: &Arc<Self>) -> Lane {
        Lane {
            pool: Arc::clone(self),
            queue: Arc::new(Mutex::new(LaneQueue::default())),
        }
    }

    /// Block until every posted job on every lane has run.
    pub fn wait_idle(&self) {
        let (lock, cvar) = &*self.pending;
        let mut pending = lock.lock().unwrap();
        while *pending > 0 {
            pending = cvar.wait(pending).unwrap();
        }
    }

    fn job_posted(&self) {
        let (lock, _) = &*self.pending;
        *lock.lock().unwrap() += 1;
    }
}

fn job_finished(pending: &(Mutex<usize>, Condvar)) {
    let (lock, cvar) = pending;
    let mut n = lock.lock().unwrap();
    *n -= 1;
    if *n == 0 {
        cvar.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Lane: jobs run one at a time, in the order they were posted
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LaneQueue {
    jobs: VecDeque<Job>,
    /// A drain task owns the queue on some worker.
    running: bool,
}

pub struct Lane {
    pool: Arc<WorkerPool>,
    queue: Arc<Mutex<LaneQueue>>,
}

impl Lane {
    /// Queue `job` behind everything already posted here. Never blocks on the job.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.job_posted();
        let start_drain = {
            let mut q = self.queue.lock().unwrap();
            q.jobs.push_back(Box::new(job));
            !std::mem::replace(&mut q.running, true)
        };

        if start_drain {
            let queue = Arc::clone(&self.queue);
            let pending = Arc::clone(&self.pool.pending);
            self.pool.pool.spawn(move || drain(&queue, &pending));
        }
    }
}

fn drain(queue: &Mutex<LaneQueue>, pending: &(Mutex<usize>, Condvar)) {
    loop {
        let job = {
            let mut q = queue.lock().unwrap();
            match q.jobs.pop_front() {
                Some(job) => job,
                None => {
                    q.running = false;
                    return;
                }
            }
        };
        job();
        job_finished(pending);
    }
}

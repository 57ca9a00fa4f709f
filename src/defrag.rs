//! One dedicated worker thread per trunk, compacting whichever segments
//! have fallen below the alive-ratio threshold. A trunk's allocator can
//! also wake its worker directly (via `request_defrag`) instead of waiting
//! for the next tick, so a burst of `StoreFull` pressure gets relieved
//! without waiting out the full interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use crate::trunk::Trunk;

pub struct Defragmenter {
    stop: Arc<AtomicBool>,
    wakers: Vec<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Defragmenter {
    /// Spawn one worker per trunk. `threshold` is the alive ratio below
    /// which a segment is compacted; `interval` is the fallback tick period
    /// between proactive sweeps.
    pub fn start(trunks: &[Arc<Trunk>], threshold: f64, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut wakers = Vec::with_capacity(trunks.len());
        let mut handles = Vec::with_capacity(trunks.len());

        for trunk in trunks {
            let (tx, rx) = bounded::<()>(1);
            let trunk = Arc::clone(trunk);
            let stop = Arc::clone(&stop);

            let waker_for_callback = tx.clone();
            trunk.set_request_defrag(Box::new(move || {
                let _ = waker_for_callback.try_send(());
            }));

            let handle = std::thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let _ = rx.recv_timeout(interval);
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    trunk.compact(threshold);
                }
            });

            wakers.push(tx);
            handles.push(handle);
        }

        Self { stop, wakers, handles }
    }

    /// Ask every worker to run a sweep now instead of waiting for its tick.
    pub fn wake_all(&self) {
        for tx in &self.wakers {
            let _ = tx.try_send(());
        }
    }

    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        self.wake_all();
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

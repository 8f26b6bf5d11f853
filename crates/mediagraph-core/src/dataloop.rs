use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A handle to a timer previously registered with a [`DataLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// The abstract "event loop" collaborator the spec requires (§1, §5): one
/// dedicated thread/loop that owns timer sources and serializes topology
/// mutation against scheduling via an "invoke with wait" operation. The
/// core only ever depends on this trait; a host is free to back it with a
/// real `epoll`/`kqueue`/IOCP reactor instead of the reference thread-based
/// implementation below.
pub trait DataLoop: Send + Sync {
    /// Register a new, initially-disabled timer. The callback runs on the
    /// data loop's own thread; it must not block.
    fn add_timer(&self, callback: Box<dyn FnMut() + Send>) -> TimerId;

    /// Enable or disable a timer. A disabled timer never fires, but its
    /// registration (and interval) is retained.
    fn set_enabled(&self, id: TimerId, interval: Duration, enabled: bool);

    fn remove_timer(&self, id: TimerId);

    /// Submit `f` to run on the data loop's thread, blocking the caller
    /// until it has finished. Hosts use this to serialize topology
    /// mutation against scheduling passes (spec §5).
    fn invoke_blocking(&self, f: Box<dyn FnOnce() + Send>);
}

enum ControlMsg {
    AddTimer {
        id: TimerId,
        callback: Box<dyn FnMut() + Send>,
    },
    SetEnabled {
        id: TimerId,
        interval: Duration,
        enabled: bool,
    },
    RemoveTimer {
        id: TimerId,
    },
    Invoke {
        f: Box<dyn FnOnce() + Send>,
        ack: mpsc::SyncSender<()>,
    },
    Stop,
}

struct TimerEntry {
    id: TimerId,
    interval: Duration,
    enabled: bool,
    next_fire: Instant,
    callback: Box<dyn FnMut() + Send>,
}

/// The reference [`DataLoop`]: a single background thread owning a list of
/// timers and a lock-free single-producer/single-consumer control queue
/// (the same `rtrb` ring buffer this codebase's lineage uses to hand
/// schedules between its real-time and control threads, repurposed here to
/// hand timer/invoke requests to the loop thread). Multiple caller threads
/// share the producer side behind a mutex, since `rtrb`'s ring buffer
/// itself is strictly single-producer.
pub struct ThreadDataLoop {
    control_tx: Mutex<rtrb::Producer<ControlMsg>>,
    next_id: AtomicU64,
    running: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

const CONTROL_QUEUE_CAPACITY: usize = 256;
const POLL_INTERVAL: Duration = Duration::from_micros(500);

impl ThreadDataLoop {
    /// Returns an `Rc` handle, not `Arc`: the loop's background thread and
    /// control queue are internally `Send`/`Sync`-safe, but the handle a
    /// host holds onto is meant to live on the same single cooperative
    /// thread as the `Graph` and `IoCell`s it paces, per [`Support`]'s
    /// `Rc<dyn DataLoop>` field.
    pub fn new() -> Rc<Self> {
        let (control_tx, mut control_rx) = rtrb::RingBuffer::<ControlMsg>::new(CONTROL_QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let join_handle = std::thread::Builder::new()
            .name("mediagraph-data-loop".into())
            .spawn(move || {
                let mut timers: Vec<TimerEntry> = Vec::new();

                while thread_running.load(Ordering::Acquire) {
                    while let Ok(msg) = control_rx.pop() {
                        match msg {
                            ControlMsg::AddTimer { id, callback } => {
                                timers.push(TimerEntry {
                                    id,
                                    interval: Duration::ZERO,
                                    enabled: false,
                                    next_fire: Instant::now(),
                                    callback,
                                });
                            }
                            ControlMsg::SetEnabled {
                                id,
                                interval,
                                enabled,
                            } => {
                                if let Some(t) = timers.iter_mut().find(|t| t.id == id) {
                                    t.interval = interval;
                                    t.enabled = enabled;
                                    t.next_fire = Instant::now() + interval;
                                }
                            }
                            ControlMsg::RemoveTimer { id } => {
                                timers.retain(|t| t.id != id);
                            }
                            ControlMsg::Invoke { f, ack } => {
                                f();
                                let _ = ack.send(());
                            }
                            ControlMsg::Stop => {
                                thread_running.store(false, Ordering::Release);
                            }
                        }
                    }

                    let now = Instant::now();
                    for t in timers.iter_mut() {
                        if t.enabled && now >= t.next_fire {
                            (t.callback)();
                            t.next_fire = now + t.interval;
                        }
                    }

                    std::thread::sleep(POLL_INTERVAL);
                }
            })
            .expect("failed to spawn data loop thread");

        Rc::new(Self {
            control_tx: Mutex::new(control_tx),
            next_id: AtomicU64::new(0),
            running,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    fn send(&self, msg: ControlMsg) {
        let mut tx = self.control_tx.lock().unwrap();
        if tx.push(msg).is_err() {
            log::error!(target: "mediagraph::dataloop", "control queue full, dropping message");
        }
    }
}

impl DataLoop for ThreadDataLoop {
    fn add_timer(&self, callback: Box<dyn FnMut() + Send>) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.send(ControlMsg::AddTimer { id, callback });
        id
    }

    fn set_enabled(&self, id: TimerId, interval: Duration, enabled: bool) {
        self.send(ControlMsg::SetEnabled {
            id,
            interval,
            enabled,
        });
    }

    fn remove_timer(&self, id: TimerId) {
        self.send(ControlMsg::RemoveTimer { id });
    }

    fn invoke_blocking(&self, f: Box<dyn FnOnce() + Send>) {
        let (ack_tx, ack_rx) = mpsc::sync_channel(0);
        self.send(ControlMsg::Invoke { f, ack: ack_tx });
        let _ = ack_rx.recv();
    }
}

impl Drop for ThreadDataLoop {
    fn drop(&mut self) {
        self.send(ControlMsg::Stop);
        if let Some(handle) = self.join_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

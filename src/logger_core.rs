//! Logger core: level filter, bounded buffer and dispatch worker
//!
//! Producers on any thread enqueue messages into a bounded channel. A single
//! worker thread drains the channel and fans every message out to the
//! registered sinks, so all sinks see the same order and no sink is ever
//! written from two threads.
//!
//! # Architecture
//!
//! 1. **Producers**: call [`LoggerCore::log`] (or a leveled helper). Calls below
//!    the threshold return before any stack walk or formatting.
//! 2. **Buffer**: a bounded `sync_channel`. A full buffer blocks the producer.
//! 3. **Worker**: owns the sink registry and processes commands in order.
//!    Sink registration travels through the same buffer as messages.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicIsize, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::callsite;
use crate::config::ConfigError;
use crate::diagnostic::diagnostic;
use crate::level::Level;
use crate::message::Message;
use crate::sink::Sink;

/// Default buffer capacity, large enough to absorb bursts without blocking
pub const BUFFER_CAPACITY: usize = 100_000;

/// Work items processed by the dispatch worker, in arrival order
enum Command {
    Write(Message),
    Register(String, Box<dyn Sink>),
    CloseAll,
}

/// Level threshold, bounded buffer and sink registry of one logger
pub struct LoggerCore {
    threshold: AtomicU8,
    position_offset: AtomicIsize,
    /// Sender used by producers; `None` while the buffer is closed
    sender: RwLock<Option<SyncSender<Command>>>,
    /// Worker of the open buffer, joined on close. Held across the whole of
    /// open and close so the two never interleave.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LoggerCore {
    /// Create an empty core: threshold `Debug`, buffer closed, no sinks
    pub fn new() -> Self {
        Self {
            threshold: AtomicU8::new(Level::Debug.rank()),
            position_offset: AtomicIsize::new(0),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Open a fresh buffer of [`BUFFER_CAPACITY`] with an empty registry.
    ///
    /// A previously open buffer is closed first and its sinks are closed once
    /// their pending messages are written.
    pub fn open(&self) {
        self.open_with_sinks(BUFFER_CAPACITY, HashMap::new());
    }

    /// Open a fresh buffer with the given capacity and an empty registry
    pub fn open_with_capacity(&self, capacity: usize) {
        self.open_with_sinks(capacity, HashMap::new());
    }

    /// Open a fresh buffer whose worker starts with `sinks` registered.
    ///
    /// The first message accepted by the new buffer is already written to
    /// every one of `sinks`.
    pub fn open_with_sinks(&self, capacity: usize, sinks: HashMap<String, Box<dyn Sink>>) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        self.shutdown(&mut worker);

        let (tx, rx) = mpsc::sync_channel::<Command>(capacity.max(1));
        let sink_count = sinks.len();
        let handle = match thread::Builder::new()
            .name("loglet-dispatch".into())
            .spawn(move || dispatch_loop(rx, sinks))
        {
            Ok(handle) => handle,
            Err(e) => {
                diagnostic!("can not start dispatch worker: {}", e);
                return;
            }
        };

        *worker = Some(handle);
        *self.sender.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        tracing::debug!(
            "Opened log buffer with capacity {} and {} sink(s)",
            capacity,
            sink_count
        );
    }

    /// Close the buffer.
    ///
    /// New messages are dropped from now on. Messages already buffered are
    /// still written, then every sink is closed. Blocks until the worker has
    /// finished. Closing a closed core does nothing.
    pub fn close(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        self.shutdown(&mut worker);
    }

    /// Drop the producer side and join the worker. Callers hold the worker lock.
    fn shutdown(&self, worker: &mut Option<JoinHandle<()>>) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                diagnostic!("dispatch worker panicked");
            }
        }
    }

    /// Whether the buffer currently accepts messages
    pub fn is_open(&self) -> bool {
        self.sender
            .read()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Current level threshold
    pub fn level(&self) -> Level {
        Level::from_rank(self.threshold.load(Ordering::Relaxed)).unwrap_or(Level::Debug)
    }

    /// Set the level threshold
    pub fn set_threshold(&self, level: Level) {
        self.threshold.store(level.rank(), Ordering::Relaxed);
    }

    /// Set the level threshold by name (case-insensitive).
    ///
    /// An unknown name is rejected and the current threshold is kept.
    pub fn set_level(&self, name: &str) -> Result<(), ConfigError> {
        let level = name.parse()?;
        self.set_threshold(level);
        Ok(())
    }

    /// Shift the reported call site by `offset` frames.
    ///
    /// A wrapper that adds one frame between its caller and this crate sets
    /// `1` so that its caller is reported instead of itself.
    pub fn set_position_offset(&self, offset: isize) {
        self.position_offset.store(offset, Ordering::Relaxed);
    }

    pub fn position_offset(&self) -> isize {
        self.position_offset.load(Ordering::Relaxed)
    }

    /// Whether a message at `level` passes the threshold
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level.rank() >= self.threshold.load(Ordering::Relaxed)
    }

    /// Log `content` at `level`.
    ///
    /// Returns immediately when `level` is below the threshold. Otherwise the
    /// call site is resolved, the content rendered and the message enqueued,
    /// blocking while the buffer is full. Nothing happens while the buffer
    /// is closed.
    pub fn log(&self, level: Level, content: impl Display) {
        if !self.enabled(level) {
            return;
        }
        let call_site = callsite::resolve(self.position_offset());
        let message = Message::new(level, call_site, content.to_string());
        self.send(Command::Write(message));
    }

    pub fn debug(&self, content: impl Display) {
        self.log(Level::Debug, content);
    }

    pub fn info(&self, content: impl Display) {
        self.log(Level::Info, content);
    }

    pub fn warn(&self, content: impl Display) {
        self.log(Level::Warn, content);
    }

    /// Log at ERROR. `content` may be formatted text or an error value, in
    /// which case its message is logged.
    pub fn error(&self, content: impl Display) {
        self.log(Level::Error, content);
    }

    pub fn fatal(&self, content: impl Display) {
        self.log(Level::Fatal, content);
    }

    /// Register `sink` under `name`, closing the sink it replaces.
    ///
    /// The registration is ordered with messages: it applies to every message
    /// enqueued after this call. With the buffer closed, the sink is closed
    /// and dropped.
    pub fn register_sink(&self, name: impl Into<String>, sink: Box<dyn Sink>) {
        let rejected = self.send(Command::Register(name.into(), sink));
        if let Some(Command::Register(_, mut sink)) = rejected {
            sink.close();
        }
    }

    /// Close every registered sink and empty the registry
    pub fn close_all_sinks(&self) {
        self.send(Command::CloseAll);
    }

    /// Enqueue a command, handing it back when the buffer is closed
    fn send(&self, command: Command) -> Option<Command> {
        // Clone the sender so a blocked send never holds the lock.
        let tx = match self.sender.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(tx) = tx else {
            return Some(command);
        };
        tx.send(command).err().map(|e| e.0)
    }
}

impl Default for LoggerCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drain the buffer until every sender is gone, then close all sinks
fn dispatch_loop(rx: Receiver<Command>, mut sinks: HashMap<String, Box<dyn Sink>>) {
    tracing::debug!("Starting log dispatch worker");

    while let Ok(command) = rx.recv() {
        match command {
            Command::Write(message) => {
                for sink in sinks.values_mut() {
                    sink.write(&message);
                }
            }
            Command::Register(name, sink) => {
                if let Some(mut previous) = sinks.insert(name, sink) {
                    previous.close();
                }
            }
            Command::CloseAll => close_sinks(&mut sinks),
        }
    }

    close_sinks(&mut sinks);
    tracing::debug!("Log dispatch worker stopped");
}

fn close_sinks(sinks: &mut HashMap<String, Box<dyn Sink>>) {
    for (_, mut sink) in sinks.drain() {
        sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Sink recording messages and close calls
    #[derive(Clone, Default)]
    struct MemorySink {
        messages: Arc<Mutex<Vec<Message>>>,
        closes: Arc<AtomicUsize>,
    }

    impl MemorySink {
        fn texts(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.text().to_string())
                .collect()
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl Sink for MemorySink {
        fn write(&mut self, message: &Message) {
            self.messages.lock().unwrap().push(message.clone());
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open_core(sink: &MemorySink) -> LoggerCore {
        let core = LoggerCore::new();
        core.open();
        core.register_sink("memory", Box::new(sink.clone()));
        core
    }

    #[test]
    fn test_threshold_filters_lower_levels() {
        for threshold in Level::ALL {
            let sink = MemorySink::default();
            let core = open_core(&sink);
            core.set_threshold(threshold);

            for level in Level::ALL {
                core.log(level, level.as_str());
            }
            core.close();

            let expected: Vec<String> = Level::ALL
                .iter()
                .filter(|l| **l >= threshold)
                .map(|l| l.as_str().to_string())
                .collect();
            assert_eq!(sink.texts(), expected, "threshold {}", threshold);
        }
    }

    #[test]
    fn test_leveled_helpers() {
        let sink = MemorySink::default();
        let core = open_core(&sink);
        core.debug("d");
        core.info(format_args!("i {}", 1));
        core.warn("w");
        core.error(std::io::Error::new(std::io::ErrorKind::Other, "broken pipe"));
        core.fatal("f");
        core.close();

        let messages = sink.messages.lock().unwrap();
        let levels: Vec<Level> = messages.iter().map(Message::level).collect();
        assert_eq!(levels, Level::ALL.to_vec());
        assert_eq!(messages[1].text(), "i 1");
        assert_eq!(messages[3].text(), "broken pipe");
    }

    #[test]
    fn test_set_level_by_name() {
        let core = LoggerCore::new();
        core.set_level("warn").unwrap();
        assert_eq!(core.level(), Level::Warn);
        assert!(!core.enabled(Level::Info));
        assert!(core.enabled(Level::Error));

        assert!(core.set_level("loud").is_err());
        assert_eq!(core.level(), Level::Warn);
    }

    #[test]
    fn test_order_is_preserved() {
        let sink = MemorySink::default();
        let other = MemorySink::default();
        let core = open_core(&sink);
        core.register_sink("other", Box::new(other.clone()));

        for i in 0..500 {
            core.info(i);
        }
        core.close();

        let expected: Vec<String> = (0..500).map(|i| i.to_string()).collect();
        assert_eq!(sink.texts(), expected);
        assert_eq!(other.texts(), expected);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2_000;

        let sink = MemorySink::default();
        let core = Arc::new(LoggerCore::new());
        core.open_with_capacity(64);
        core.register_sink("memory", Box::new(sink.clone()));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let core = Arc::clone(&core);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        core.info(format_args!("{}:{}", p, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        core.close();

        let texts = sink.texts();
        assert_eq!(texts.len(), PRODUCERS * PER_PRODUCER);

        let mut next = vec![0usize; PRODUCERS];
        for text in texts {
            let (p, i) = text.split_once(':').unwrap();
            let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
            assert_eq!(i, next[p], "producer {} out of order", p);
            next[p] += 1;
        }
    }

    #[test]
    fn test_closed_core_ignores_messages() {
        let core = LoggerCore::new();
        assert!(!core.is_open());
        core.info("nobody listens");

        let sink = MemorySink::default();
        core.register_sink("memory", Box::new(sink.clone()));
        assert_eq!(sink.closes(), 1);
        assert!(sink.texts().is_empty());
    }

    #[test]
    fn test_close_is_idempotent_and_closes_sinks() {
        let sink = MemorySink::default();
        let core = open_core(&sink);
        core.info("before");
        core.close();
        core.close();
        core.info("after");

        assert!(!core.is_open());
        assert_eq!(sink.texts(), vec!["before".to_string()]);
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn test_register_replaces_and_closes_previous() {
        let first = MemorySink::default();
        let second = MemorySink::default();
        let core = open_core(&first);

        core.info("one");
        core.register_sink("memory", Box::new(second.clone()));
        core.info("two");
        core.close();

        assert_eq!(first.texts(), vec!["one".to_string()]);
        assert_eq!(first.closes(), 1);
        assert_eq!(second.texts(), vec!["two".to_string()]);
        assert_eq!(second.closes(), 1);
    }

    #[test]
    fn test_close_all_sinks_clears_registry() {
        let sink = MemorySink::default();
        let core = open_core(&sink);
        core.info("kept");
        core.close_all_sinks();
        core.info("dropped");
        core.close();

        assert_eq!(sink.texts(), vec!["kept".to_string()]);
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn test_reopen_closes_previous_sinks() {
        let sink = MemorySink::default();
        let core = open_core(&sink);
        core.info("first buffer");
        core.open();
        core.info("second buffer");
        core.close();

        assert_eq!(sink.texts(), vec!["first buffer".to_string()]);
        assert_eq!(sink.closes(), 1);
    }

    fn seeded(sinks: &[(&str, &MemorySink)]) -> HashMap<String, Box<dyn Sink>> {
        sinks
            .iter()
            .map(|(name, sink)| (name.to_string(), Box::new((*sink).clone()) as Box<dyn Sink>))
            .collect()
    }

    #[test]
    fn test_seeded_sinks_receive_first_message() {
        let sink = MemorySink::default();
        let core = LoggerCore::new();
        core.open_with_sinks(16, seeded(&[("memory", &sink)]));
        assert!(core.is_open());
        core.info("first");
        core.close();

        assert_eq!(sink.texts(), vec!["first".to_string()]);
        assert_eq!(sink.closes(), 1);
    }

    #[test]
    fn test_reopen_while_producing_keeps_sinks_in_step() {
        const MESSAGES: usize = 5_000;

        let core = Arc::new(LoggerCore::new());
        let mut generations = vec![(MemorySink::default(), MemorySink::default())];
        let (a, b) = &generations[0];
        core.open_with_sinks(256, seeded(&[("a", a), ("b", b)]));

        let producer = {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                for i in 0..MESSAGES {
                    core.info(i);
                }
            })
        };
        for _ in 0..20 {
            let pair = (MemorySink::default(), MemorySink::default());
            core.open_with_sinks(256, seeded(&[("a", &pair.0), ("b", &pair.1)]));
            generations.push(pair);
            thread::yield_now();
        }
        producer.join().unwrap();
        core.close();

        let mut last = None;
        for (a, b) in &generations {
            let texts = a.texts();
            assert_eq!(texts, b.texts());
            assert_eq!(a.closes(), 1);
            for text in texts {
                let i: usize = text.parse().unwrap();
                assert!(last.map_or(true, |last| i > last), "{} after {:?}", i, last);
                last = Some(i);
            }
        }
    }

    #[test]
    fn test_concurrent_open_and_close_settle_closed() {
        let core = Arc::new(LoggerCore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let core = Arc::clone(&core);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if t % 2 == 0 {
                            core.open_with_capacity(8);
                        } else {
                            core.close();
                        }
                        core.info("racing");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        core.close();
        assert!(!core.is_open());
    }

    #[test]
    fn test_call_site_is_attached() {
        let sink = MemorySink::default();
        let core = open_core(&sink);
        core.info("where");
        core.close();

        let messages = sink.messages.lock().unwrap();
        let site = messages[0].call_site();
        assert!(site.ends_with(']'), "got {}", site);
        assert!(site.contains("() ["), "got {}", site);
    }
}

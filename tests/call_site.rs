//! Call-site resolution seen from a crate that uses the logger

use std::sync::{Arc, Mutex};

use loglet::callsite::current_thread_id;
use loglet::{LoggerCore, Message, Sink};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<Message>>>);

impl Sink for Capture {
    fn write(&mut self, message: &Message) {
        self.0.lock().unwrap().push(message.clone());
    }

    fn close(&mut self) {}
}

fn capture_core() -> (LoggerCore, Capture) {
    let capture = Capture::default();
    let core = LoggerCore::new();
    core.open();
    core.register_sink("capture", Box::new(capture.clone()));
    (core, capture)
}

fn call_sites(core: LoggerCore, capture: &Capture) -> Vec<String> {
    core.close();
    capture
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|m| m.call_site().to_string())
        .collect()
}

#[inline(never)]
fn log_from_wrapper(core: &LoggerCore) {
    core.info("wrapped");
}

#[test]
fn test_reports_calling_function() {
    let (core, capture) = capture_core();
    let line = line!() + 1;
    core.info("direct");

    let sites = call_sites(core, &capture);
    assert_eq!(sites.len(), 1);
    let expected = format!(
        "call_site.rs {} call_site::test_reports_calling_function() [{}]",
        line,
        current_thread_id()
    );
    assert_eq!(sites[0], expected);
}

#[test]
fn test_wrapper_without_offset_reports_wrapper() {
    let (core, capture) = capture_core();
    log_from_wrapper(&core);

    let sites = call_sites(core, &capture);
    assert!(sites[0].contains("call_site::log_from_wrapper()"), "got {}", sites[0]);
}

#[test]
fn test_offset_reports_wrapper_caller() {
    let (core, capture) = capture_core();
    core.set_position_offset(1);
    log_from_wrapper(&core);

    let sites = call_sites(core, &capture);
    assert!(
        sites[0].contains("call_site::test_offset_reports_wrapper_caller()"),
        "got {}",
        sites[0]
    );
}

#[test]
fn test_out_of_range_offset_is_ignored() {
    let (core, capture) = capture_core();
    core.set_position_offset(-1000);
    core.warn("far");

    let sites = call_sites(core, &capture);
    assert!(
        sites[0].contains("call_site::test_out_of_range_offset_is_ignored()"),
        "got {}",
        sites[0]
    );
}

#[test]
fn test_thread_id_of_producer() {
    let (core, capture) = capture_core();
    let core = Arc::new(core);
    let producer = {
        let core = Arc::clone(&core);
        std::thread::spawn(move || {
            core.error("from thread");
            current_thread_id()
        })
    };
    let producer_id = producer.join().unwrap();

    let core = Arc::try_unwrap(core).ok().unwrap();
    let sites = call_sites(core, &capture);
    assert!(
        sites[0].ends_with(&format!("[{}]", producer_id)),
        "got {}",
        sites[0]
    );
}

#[test]
fn test_macros_resolve_to_caller() {
    let (core, capture) = capture_core();
    loglet::info!(core, "formatted {}", 42);
    loglet::debug!(&core, "{}-{}", "a", "b");

    core.close();
    let messages = capture.0.lock().unwrap();
    assert_eq!(messages[0].text(), "formatted 42");
    assert_eq!(messages[1].text(), "a-b");
    for message in messages.iter() {
        assert!(
            message
                .call_site()
                .contains("call_site::test_macros_resolve_to_caller()"),
            "got {}",
            message.call_site()
        );
    }
}

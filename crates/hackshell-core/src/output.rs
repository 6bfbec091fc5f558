use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Where asynchronous messages (chat deliveries, macro echoes) go.
///
/// Cheap to clone; deferred sends run on a detached thread, so the sink must
/// be `Send + Sync`.
#[derive(Clone)]
pub struct OutputSink(Arc<dyn Fn(&str) + Send + Sync>);

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputSink(..)")
    }
}

impl OutputSink {
    pub fn new(handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(handler))
    }

    pub fn stdout() -> Self {
        Self::new(|message| println!("{message}"))
    }

    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, message: &str) {
        (self.0)(message);
    }

    /// Fire-and-forget delivery after `delay`. A zero delay delivers inline.
    pub fn send_after(&self, delay: Duration, message: String) {
        if delay.is_zero() {
            self.send(&message);
            return;
        }
        let sink = self.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            sink.send(&message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn zero_delay_is_synchronous() {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let sink = OutputSink::new(move |m| {
            let _ = tx.lock().map(|tx| tx.send(m.to_string()));
        });
        sink.send_after(Duration::ZERO, "now".into());
        assert_eq!(rx.try_recv().unwrap(), "now");
    }

    #[test]
    fn delayed_delivery_arrives() {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let sink = OutputSink::new(move |m| {
            let _ = tx.lock().map(|tx| tx.send(m.to_string()));
        });
        sink.send_after(Duration::from_millis(5), "later".into());
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "later"
        );
    }
}

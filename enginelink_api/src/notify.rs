/// Sink for user-visible error notifications. The web client renders these as
/// toasts; headless hosts keep the default and get structured logs instead.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, title: &str, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, title: &str, message: &str) {
        tracing::warn!(title, message, "user-facing error");
    }
}

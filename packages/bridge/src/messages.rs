//! Append-only collection of diagnostic messages.

use std::error::Error as StdError;
use std::fmt;

/// Placeholder appended by [`MessageSink::add_with_trace`] when there is no
/// error to report.
pub const NO_TRACE: &str = "<no error>";

/// Values that can be appended to a [`MessageSink`]: a single message or a
/// sequence of them.
pub trait IntoMessages {
    fn into_messages(self) -> Vec<String>;
}

impl IntoMessages for &str {
    fn into_messages(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoMessages for String {
    fn into_messages(self) -> Vec<String> {
        vec![self]
    }
}

impl<T: Into<String>> IntoMessages for Vec<T> {
    fn into_messages(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: AsRef<str>> IntoMessages for &[T] {
    fn into_messages(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<T: Into<String>, const N: usize> IntoMessages for [T; N] {
    fn into_messages(self) -> Vec<String> {
        self.into_iter().map(Into::into).collect()
    }
}

/// Ordered error or warning messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSink {
    messages: Vec<String>,
}

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Append one or more messages, in order.
    pub fn add<M: IntoMessages>(&mut self, msg: M) {
        self.messages.extend(msg.into_messages());
    }

    /// Append `msg` followed by the error and its chain of causes.
    pub fn add_with_trace(&mut self, msg: &str, error: Option<&(dyn StdError + 'static)>) {
        self.add(format!("{}\n{}", msg, format_trace(error)));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|s| s.as_str())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.messages
    }
}

/// Format an error and its sources, one per line.
pub fn format_trace(error: Option<&(dyn StdError + 'static)>) -> String {
    let Some(error) = error else {
        return NO_TRACE.to_string();
    };
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\nCaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}

impl Extend<String> for MessageSink {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.messages.extend(iter);
    }
}

impl IntoIterator for MessageSink {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl fmt::Display for MessageSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::runtime::ForeignError;

    #[test]
    fn add_single_and_many() {
        let mut sink = MessageSink::new();
        sink.add("first");
        sink.add(["a", "b"]);
        sink.add(vec!["c".to_string()]);
        sink.add(String::from("d"));
        let slice: &[&str] = &["e"];
        sink.add(slice);
        assert_eq!(sink.len(), 6);
        let all: Vec<_> = sink.iter().collect();
        assert_eq!(all, vec!["first", "a", "b", "c", "d", "e"]);
    }

    #[test]
    fn empty_sequence_is_noop() {
        let mut sink = MessageSink::new();
        sink.add(Vec::<String>::new());
        assert!(sink.is_empty());
    }

    #[test]
    fn clear_empties() {
        let mut sink = MessageSink::new();
        sink.add(["a", "b"]);
        assert_eq!(sink.len(), 2);
        sink.clear();
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn no_deduplication() {
        let mut sink = MessageSink::new();
        sink.add("same");
        sink.add("same");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn trace_includes_causes() {
        let mut sink = MessageSink::new();
        let error = BridgeError::Foreign(ForeignError::new("NullPointerException"));
        sink.add_with_trace("setUp failed", Some(&error));
        let msg = sink.iter().next().unwrap();
        assert!(msg.starts_with("setUp failed\n"));
        assert!(msg.contains("Caused by: NullPointerException"));
    }

    #[test]
    fn trace_without_error() {
        let mut sink = MessageSink::new();
        sink.add_with_trace("nothing failed", None);
        assert_eq!(sink.to_string(), format!("nothing failed\n{}", NO_TRACE));
    }
}

//! Captured exception values handed to the alerting pipeline.
//!
//! A [`CaughtException`] is a plain value: class name, message, a bounded
//! caused-by chain, and backtrace frames, all fixed at capture time. The
//! pipeline never introspects live error types after this point.

use serde::Serialize;

/// Maximum number of caused-by entries retained per exception.
pub const MAX_CAUSE_DEPTH: usize = 8;

/// One entry in an exception's caused-by chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cause {
    /// Class name of the causing error, when known at capture time.
    pub class_name: String,
    /// Message of the causing error.
    pub message: String,
}

/// A single backtrace frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub method: String,
}

impl std::fmt::Display for Frame {
    /// Formats as ``<file>:<line>:in `<method>'``.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:in `{}'", self.file, self.line, self.method)
    }
}

/// An error value captured for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CaughtException {
    /// Fully-qualified class name, matched exactly against ignore lists.
    pub class_name: String,
    /// Error message as raised.
    pub message: String,
    /// Caused-by chain, outermost cause first. Capped at [`MAX_CAUSE_DEPTH`].
    pub causes: Vec<Cause>,
    /// Captured stack frames, innermost first.
    pub backtrace: Vec<Frame>,
}

impl CaughtException {
    /// Create an exception value with no causes and no backtrace.
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            causes: Vec::new(),
            backtrace: Vec::new(),
        }
    }

    /// Capture an error and its `source()` chain.
    ///
    /// The class name is the error's Rust type path. Sources behind
    /// `dyn Error` carry no type identity, so chain entries are recorded
    /// with the class name `"Error"`.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let mut exception = Self::new(std::any::type_name::<E>(), err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            if exception.causes.len() >= MAX_CAUSE_DEPTH {
                break;
            }
            exception.causes.push(Cause {
                class_name: "Error".to_string(),
                message: cause.to_string(),
            });
            source = cause.source();
        }
        exception
    }

    /// Append a caused-by entry. Entries beyond [`MAX_CAUSE_DEPTH`] are dropped.
    pub fn caused_by(mut self, class_name: impl Into<String>, message: impl Into<String>) -> Self {
        if self.causes.len() < MAX_CAUSE_DEPTH {
            self.causes.push(Cause {
                class_name: class_name.into(),
                message: message.into(),
            });
        }
        self
    }

    /// Append a backtrace frame.
    pub fn frame(mut self, file: impl Into<String>, line: u32, method: impl Into<String>) -> Self {
        self.backtrace.push(Frame {
            file: file.into(),
            line,
            method: method.into(),
        });
        self
    }

    /// Backtrace frames formatted one per line.
    pub fn backtrace_lines(&self) -> Vec<String> {
        self.backtrace.iter().map(|f| f.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_display_format() {
        let frame = Frame {
            file: "app/controllers/posts.rs".to_string(),
            line: 42,
            method: "create".to_string(),
        };
        assert_eq!(frame.to_string(), "app/controllers/posts.rs:42:in `create'");
    }

    #[test]
    fn builder_accumulates_causes_and_frames() {
        let ex = CaughtException::new("NoMethodError", "undefined method 'nw'")
            .caused_by("KeyError", "missing key")
            .frame("lib/worker.rs", 10, "run");

        assert_eq!(ex.class_name, "NoMethodError");
        assert_eq!(ex.causes.len(), 1);
        assert_eq!(ex.causes[0].message, "missing key");
        assert_eq!(ex.backtrace_lines(), vec!["lib/worker.rs:10:in `run'"]);
    }

    #[test]
    fn cause_chain_is_bounded() {
        let mut ex = CaughtException::new("E", "m");
        for i in 0..(MAX_CAUSE_DEPTH + 4) {
            ex = ex.caused_by("E", format!("cause {i}"));
        }
        assert_eq!(ex.causes.len(), MAX_CAUSE_DEPTH);
    }

    #[test]
    fn from_error_walks_source_chain() {
        #[derive(Debug)]
        struct Inner;
        impl std::fmt::Display for Inner {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "inner failure")
            }
        }
        impl std::error::Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "outer failure")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let ex = CaughtException::from_error(&Outer(Inner));
        assert!(ex.class_name.ends_with("Outer"));
        assert_eq!(ex.message, "outer failure");
        assert_eq!(ex.causes.len(), 1);
        assert_eq!(ex.causes[0].message, "inner failure");
    }
}

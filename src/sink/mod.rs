//! Capture destinations.

use std::path::{Path, PathBuf};

/// Destination a capture subprocess writes into.
///
/// A sink is a descriptor, not an open handle: constructing one has no
/// filesystem side effects, and the same (directory, session id) pair always
/// resolves to the same paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    directory: PathBuf,
    session_id: String,
}

impl Sink {
    pub fn new(directory: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            session_id: session_id.into(),
        }
    }

    /// Path of the first capture segment.
    pub fn base_path(&self) -> PathBuf {
        self.segment_path(0)
    }

    /// Path for the nth capture segment.
    ///
    /// A restarted capture writes a numbered segment so the output of an
    /// earlier launch is never truncated.
    pub fn segment_path(&self, segment: u32) -> PathBuf {
        let file = if segment == 0 {
            format!("{}.mp4", self.session_id)
        } else {
            format!("{}.part{}.mp4", self.session_id, segment)
        };
        self.directory.join(file)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

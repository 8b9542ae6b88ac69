//! Blocking session contract for remote file-transfer hosts.
//!
//! Sessions are synchronous; [`super::connection::ConnectionManager`] drives them on the
//! blocking thread pool. Paths passed here are absolute paths on the host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("path already exists")]
    AlreadyExists,

    #[error("no such file")]
    NotFound,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// One open connection to the remote host
pub trait RemoteSession: Send {
    fn exists(&mut self, path: &str) -> Result<bool, SessionError>;

    fn is_dir(&mut self, path: &str) -> Result<bool, SessionError>;

    /// Create a single directory; its parent must exist
    fn mkdir(&mut self, path: &str, mode: i32) -> Result<(), SessionError>;

    /// Create or truncate `path` and write `data` to it
    fn write_file(&mut self, path: &str, data: &[u8], mode: i32) -> Result<(), SessionError>;

    /// Move `from` to `to`. Fails with [`SessionError::AlreadyExists`] instead of replacing
    /// an existing `to`.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError>;

    fn set_mode(&mut self, path: &str, mode: i32) -> Result<(), SessionError>;

    fn remove(&mut self, path: &str) -> Result<(), SessionError>;

    /// Release the connection. Called exactly once.
    fn close(&mut self);
}

/// Opens sessions to a fixed host
pub trait RemoteConnector: Send + Sync + 'static {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, SessionError>;
}

/// Owns a session for the duration of one operation and closes it on every exit path,
/// including unwinding.
pub struct ScopedSession {
    inner: Option<Box<dyn RemoteSession>>,
}

impl ScopedSession {
    pub fn new(session: Box<dyn RemoteSession>) -> Self {
        Self {
            inner: Some(session),
        }
    }

    pub fn session(&mut self) -> &mut dyn RemoteSession {
        // Only `Drop` takes the session out.
        match self.inner.as_mut() {
            Some(session) => session.as_mut(),
            None => unreachable!("session used after close"),
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.inner.take() {
            session.close();
        }
    }
}

/// Create `dir` and every missing ancestor.
///
/// "Already exists" is success at every level, and so is any other failure on a path that
/// turns out to be a directory (a concurrent creator won, or the server reports existing
/// directories with a generic failure code).
pub fn mkdir_recursive(
    session: &mut dyn RemoteSession,
    dir: &str,
    mode: i32,
) -> Result<(), SessionError> {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || session.is_dir(dir)? {
        return Ok(());
    }

    let absolute = dir.starts_with('/');
    let mut current = String::with_capacity(dir.len());
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);

        match session.mkdir(&current, mode) {
            Ok(()) | Err(SessionError::AlreadyExists) => {}
            Err(e) => {
                if !session.is_dir(&current)? {
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory host used by the remote backend tests.

    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct HostState {
        pub dirs: BTreeSet<String>,
        pub files: BTreeMap<String, (Vec<u8>, i32)>,
        pub open_sessions: i32,
        pub closed_sessions: u32,
        /// mkdir on an existing directory fails with a generic error instead of AlreadyExists
        pub generic_mkdir_errors: bool,
        /// Paths whose writes fail
        pub failing_writes: BTreeSet<String>,
        /// Paths whose removal fails
        pub failing_removes: BTreeSet<String>,
        /// Paths whose permission change fails
        pub failing_modes: BTreeSet<String>,
    }

    #[derive(Clone, Default)]
    pub struct FakeHost {
        pub state: Arc<Mutex<HostState>>,
        pub connect_calls: Arc<AtomicU32>,
        /// Number of initial connect calls that fail
        pub failing_connects: Arc<AtomicU32>,
    }

    impl FakeHost {
        pub fn new() -> Self {
            let host = FakeHost::default();
            host.state.lock().unwrap().dirs.insert("/".to_string());
            host
        }

        pub fn file(&self, path: &str) -> Option<(Vec<u8>, i32)> {
            self.state.lock().unwrap().files.get(path).cloned()
        }
    }

    struct FakeSession {
        host: FakeHost,
    }

    fn parent(path: &str) -> String {
        match path.rsplit_once('/') {
            Some(("", _)) => "/".to_string(),
            Some((p, _)) => p.to_string(),
            None => "/".to_string(),
        }
    }

    impl RemoteSession for FakeSession {
        fn exists(&mut self, path: &str) -> Result<bool, SessionError> {
            let state = self.host.state.lock().unwrap();
            Ok(state.files.contains_key(path) || state.dirs.contains(path))
        }

        fn is_dir(&mut self, path: &str) -> Result<bool, SessionError> {
            Ok(self.host.state.lock().unwrap().dirs.contains(path))
        }

        fn mkdir(&mut self, path: &str, _mode: i32) -> Result<(), SessionError> {
            let mut state = self.host.state.lock().unwrap();
            if state.files.contains_key(path) {
                return Err(SessionError::Protocol("failure".to_string()));
            }
            if state.dirs.contains(path) {
                return if state.generic_mkdir_errors {
                    Err(SessionError::Protocol("failure".to_string()))
                } else {
                    Err(SessionError::AlreadyExists)
                };
            }
            if !state.dirs.contains(&parent(path)) {
                return Err(SessionError::NotFound);
            }
            state.dirs.insert(path.to_string());
            Ok(())
        }

        fn write_file(&mut self, path: &str, data: &[u8], mode: i32) -> Result<(), SessionError> {
            let mut state = self.host.state.lock().unwrap();
            if !state.dirs.contains(&parent(path)) {
                return Err(SessionError::NotFound);
            }
            let target = path.split(".part-").next().unwrap_or(path);
            if state.failing_writes.contains(target) {
                // Partial bytes land before the failure.
                state.files.insert(path.to_string(), (data[..data.len() / 2].to_vec(), mode));
                return Err(SessionError::Protocol("write failed".to_string()));
            }
            state.files.insert(path.to_string(), (data.to_vec(), mode));
            Ok(())
        }

        fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
            let mut state = self.host.state.lock().unwrap();
            if state.files.contains_key(to) || state.dirs.contains(to) {
                return Err(SessionError::AlreadyExists);
            }
            let entry = state.files.remove(from).ok_or(SessionError::NotFound)?;
            state.files.insert(to.to_string(), entry);
            Ok(())
        }

        fn set_mode(&mut self, path: &str, mode: i32) -> Result<(), SessionError> {
            let mut state = self.host.state.lock().unwrap();
            if state.failing_modes.contains(path) {
                return Err(SessionError::Protocol("operation unsupported".to_string()));
            }
            let entry = state.files.get_mut(path).ok_or(SessionError::NotFound)?;
            entry.1 = mode;
            Ok(())
        }

        fn remove(&mut self, path: &str) -> Result<(), SessionError> {
            let mut state = self.host.state.lock().unwrap();
            if state.failing_removes.contains(path) {
                return Err(SessionError::Protocol("permission denied".to_string()));
            }
            state
                .files
                .remove(path)
                .map(|_| ())
                .ok_or(SessionError::NotFound)
        }

        fn close(&mut self) {
            let mut state = self.host.state.lock().unwrap();
            state.open_sessions -= 1;
            state.closed_sessions += 1;
        }
    }

    impl RemoteConnector for FakeHost {
        fn connect(&self) -> Result<Box<dyn RemoteSession>, SessionError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failing_connects.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_connects.store(remaining - 1, Ordering::SeqCst);
                return Err(SessionError::Connect("connection refused".to_string()));
            }
            self.state.lock().unwrap().open_sessions += 1;
            Ok(Box::new(FakeSession { host: self.clone() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeHost;
    use super::*;

    fn open(host: &FakeHost) -> ScopedSession {
        ScopedSession::new(host.connect().unwrap())
    }

    #[test]
    fn test_mkdir_recursive_creates_missing_ancestors() {
        let host = FakeHost::new();
        let mut scoped = open(&host);
        mkdir_recursive(scoped.session(), "/srv/media/videos", 0o755).unwrap();

        let state = host.state.lock().unwrap();
        assert!(state.dirs.contains("/srv"));
        assert!(state.dirs.contains("/srv/media"));
        assert!(state.dirs.contains("/srv/media/videos"));
    }

    #[test]
    fn test_mkdir_recursive_existing_path_is_ok() {
        let host = FakeHost::new();
        let mut scoped = open(&host);
        mkdir_recursive(scoped.session(), "/srv/media", 0o755).unwrap();
        mkdir_recursive(scoped.session(), "/srv/media", 0o755).unwrap();
        mkdir_recursive(scoped.session(), "/srv/media/", 0o755).unwrap();
    }

    #[test]
    fn test_mkdir_recursive_absorbs_generic_error_on_existing_dir() {
        let host = FakeHost::new();
        {
            let mut state = host.state.lock().unwrap();
            state.dirs.insert("/srv".to_string());
            state.generic_mkdir_errors = true;
        }
        let mut scoped = open(&host);
        mkdir_recursive(scoped.session(), "/srv/media/audios", 0o755).unwrap();
        assert!(host.state.lock().unwrap().dirs.contains("/srv/media/audios"));
    }

    #[test]
    fn test_mkdir_recursive_propagates_real_errors() {
        let host = FakeHost::new();
        host.state
            .lock()
            .unwrap()
            .files
            .insert("/srv".to_string(), (vec![], 0o644));
        let mut scoped = open(&host);
        let err = mkdir_recursive(scoped.session(), "/srv/media", 0o755).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[test]
    fn test_scoped_session_closes_on_drop() {
        let host = FakeHost::new();
        {
            let _a = open(&host);
            let _b = open(&host);
            assert_eq!(host.state.lock().unwrap().open_sessions, 2);
        }
        let state = host.state.lock().unwrap();
        assert_eq!(state.open_sessions, 0);
        assert_eq!(state.closed_sessions, 2);
    }

    #[test]
    fn test_scoped_session_closes_on_panic() {
        let host = FakeHost::new();
        let cloned = host.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scoped = open(&cloned);
            panic!("operation blew up");
        }));
        assert!(result.is_err());
        assert_eq!(host.state.lock().unwrap().open_sessions, 0);
    }
}

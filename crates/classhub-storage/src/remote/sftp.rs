//! SFTP connector built on libssh2.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use classhub_core::RemoteAuth;
use ssh2::{ErrorCode, FileStat, OpenFlags, OpenType, RenameFlags, Session, Sftp};

use super::session::{RemoteConnector, RemoteSession, SessionError};

// SSH_FX_* status codes
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_FILE_ALREADY_EXISTS: i32 = 11;

pub struct SftpConnector {
    host: String,
    port: u16,
    username: String,
    auth: RemoteAuth,
    timeout: Duration,
}

impl SftpConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        auth: RemoteAuth,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth,
            timeout,
        }
    }
}

fn map_err(err: ssh2::Error) -> SessionError {
    match err.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => SessionError::NotFound,
        ErrorCode::SFTP(SFTP_FILE_ALREADY_EXISTS) => SessionError::AlreadyExists,
        _ => SessionError::Protocol(err.message().to_string()),
    }
}

fn connect_err(stage: &str, err: impl std::fmt::Display) -> SessionError {
    SessionError::Connect(format!("{}: {}", stage, err))
}

impl RemoteConnector for SftpConnector {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, SessionError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| connect_err("resolve", e))?
            .next()
            .ok_or_else(|| SessionError::Connect("resolve: no address".to_string()))?;

        let tcp =
            TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| connect_err("tcp", e))?;

        let mut session = Session::new().map_err(|e| connect_err("session", e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| connect_err("handshake", e))?;

        match &self.auth {
            RemoteAuth::Password(password) => session
                .userauth_password(&self.username, password)
                .map_err(|e| connect_err("auth", e))?,
            RemoteAuth::PrivateKey { path, passphrase } => session
                .userauth_pubkey_file(&self.username, None, path, passphrase.as_deref())
                .map_err(|e| connect_err("auth", e))?,
        }
        if !session.authenticated() {
            return Err(SessionError::Connect("auth: rejected".to_string()));
        }

        let sftp = session.sftp().map_err(|e| connect_err("sftp", e))?;
        tracing::debug!(port = self.port, "SFTP session opened");

        Ok(Box::new(SftpSession {
            session,
            sftp: Some(sftp),
        }))
    }
}

struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
}

impl SftpSession {
    fn sftp(&self) -> Result<&Sftp, SessionError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| SessionError::Protocol("session closed".to_string()))
    }
}

impl RemoteSession for SftpSession {
    fn exists(&mut self, p: &str) -> Result<bool, SessionError> {
        match self.sftp()?.stat(Path::new(p)) {
            Ok(_) => Ok(true),
            Err(e) => match map_err(e) {
                SessionError::NotFound => Ok(false),
                other => Err(other),
            },
        }
    }

    fn is_dir(&mut self, p: &str) -> Result<bool, SessionError> {
        match self.sftp()?.stat(Path::new(p)) {
            Ok(stat) => Ok(stat.is_dir()),
            Err(e) => match map_err(e) {
                SessionError::NotFound => Ok(false),
                other => Err(other),
            },
        }
    }

    fn mkdir(&mut self, p: &str, mode: i32) -> Result<(), SessionError> {
        self.sftp()?.mkdir(Path::new(p), mode).map_err(map_err)
    }

    fn write_file(&mut self, p: &str, data: &[u8], mode: i32) -> Result<(), SessionError> {
        let mut file = self
            .sftp()?
            .open_mode(
                Path::new(p),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                mode,
                OpenType::File,
            )
            .map_err(map_err)?;
        file.write_all(data)
            .map_err(|e| SessionError::Protocol(format!("write: {}", e)))?;
        file.flush()
            .map_err(|e| SessionError::Protocol(format!("flush: {}", e)))?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        if self.exists(to)? {
            return Err(SessionError::AlreadyExists);
        }
        // no OVERWRITE: servers that honour flags refuse an existing target
        self.sftp()?
            .rename(
                Path::new(from),
                Path::new(to),
                Some(RenameFlags::ATOMIC | RenameFlags::NATIVE),
            )
            .map_err(map_err)
    }

    fn set_mode(&mut self, p: &str, mode: i32) -> Result<(), SessionError> {
        let stat = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode as u32),
            atime: None,
            mtime: None,
        };
        self.sftp()?.setstat(Path::new(p), stat).map_err(map_err)
    }

    fn remove(&mut self, p: &str) -> Result<(), SessionError> {
        self.sftp()?.unlink(Path::new(p)).map_err(map_err)
    }

    fn close(&mut self) {
        drop(self.sftp.take());
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            tracing::debug!(error = %e, "SFTP disconnect failed");
        }
    }
}

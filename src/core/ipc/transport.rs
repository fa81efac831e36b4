// Platform half of the single-instance channel: a Unix domain socket inside
// the data directory, or a named pipe derived from it on Windows.

#[cfg(unix)]
pub use unix::{claim, connect, lock_path, ChannelGuard, ClientStream, LocalListener, ServerStream};
#[cfg(windows)]
pub use windows::{claim, connect, ChannelGuard, ClientStream, LocalListener, ServerStream};

#[cfg(unix)]
mod unix {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};

    use fs2::FileExt;
    use tokio::net::{UnixListener, UnixStream};
    use tracing::{info, warn};

    pub type ServerStream = UnixStream;
    pub type ClientStream = UnixStream;

    pub struct LocalListener {
        listener: UnixListener,
        path: PathBuf,
        guard: Option<ChannelGuard>,
    }

    impl LocalListener {
        pub async fn accept(&mut self) -> io::Result<ServerStream> {
            let (stream, _) = self.listener.accept().await?;
            Ok(stream)
        }

        pub fn address(&self) -> &Path {
            &self.path
        }

        /// Detaches ownership of the channel from the accept side.
        pub fn take_guard(&mut self) -> Option<ChannelGuard> {
            self.guard.take()
        }
    }

    /// Ownership of the channel: an exclusive lock on `<socket>.lock` and the
    /// identity of the socket file bound under it. Dropping it removes that
    /// socket file, then unlocks.
    pub struct ChannelGuard {
        path: PathBuf,
        identity: (u64, u64),
        _lock: File,
    }

    impl Drop for ChannelGuard {
        fn drop(&mut self) {
            match std::fs::symlink_metadata(&self.path) {
                Ok(meta) if (meta.dev(), meta.ino()) == self.identity => {
                    match std::fs::remove_file(&self.path) {
                        Ok(()) => info!("Released launcher socket {:?}", self.path),
                        Err(err) => warn!("Cannot remove launcher socket {:?}: {}", self.path, err),
                    }
                }
                Ok(_) => warn!("Launcher socket {:?} was replaced, leaving it", self.path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("Cannot inspect launcher socket {:?}: {}", self.path, err),
            }
        }
    }

    pub fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// `Ok(None)` means another process owns the channel.
    ///
    /// The lock is held for the primary's whole lifetime, so with it held any
    /// socket file at `path` is left over from a dead primary.
    pub async fn claim(path: &Path) -> io::Result<Option<LocalListener>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path(path))?;
        if let Err(err) = lock.try_lock_exclusive() {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Ok(None);
            }
            return Err(err);
        }

        let listener = match UnixListener::bind(path) {
            Ok(listener) => listener,
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                warn!("Removing stale launcher socket {:?}", path);
                std::fs::remove_file(path)?;
                UnixListener::bind(path)?
            }
            Err(err) => return Err(err),
        };
        let meta = std::fs::symlink_metadata(path)?;

        Ok(Some(LocalListener {
            listener,
            path: path.to_path_buf(),
            guard: Some(ChannelGuard {
                path: path.to_path_buf(),
                identity: (meta.dev(), meta.ino()),
                _lock: lock,
            }),
        }))
    }

    pub async fn connect(path: &Path) -> io::Result<ClientStream> {
        UnixStream::connect(path).await
    }
}

#[cfg(windows)]
mod windows {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::io;
    use std::path::{Path, PathBuf};

    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    pub type ServerStream = NamedPipeServer;
    pub type ClientStream = NamedPipeClient;

    pub struct LocalListener {
        name: String,
        path: PathBuf,
        next: NamedPipeServer,
    }

    impl LocalListener {
        pub async fn accept(&mut self) -> io::Result<ServerStream> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }

        pub fn address(&self) -> &Path {
            &self.path
        }

        pub fn take_guard(&mut self) -> Option<ChannelGuard> {
            Some(ChannelGuard)
        }
    }

    /// Pipes vanish with their last handle, so there is nothing to clean up.
    pub struct ChannelGuard;

    fn pipe_name(path: &Path) -> String {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        format!(r"\\.\pipe\InterfaceOficial-{:016x}", hasher.finish())
    }

    pub async fn claim(path: &Path) -> io::Result<Option<LocalListener>> {
        let name = pipe_name(path);
        match ServerOptions::new().first_pipe_instance(true).create(&name) {
            Ok(next) => Ok(Some(LocalListener {
                name,
                path: path.to_path_buf(),
                next,
            })),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn connect(path: &Path) -> io::Result<ClientStream> {
        ClientOptions::new().open(pipe_name(path))
    }
}

use std::io;
use std::time::Duration;

/// Delay between a graceful termination signal and the forced kill.
pub(crate) const KILL_GRACE: Duration = Duration::from_secs(5);

#[cfg(unix)]
pub(crate) fn send_sigterm(pid: u32) -> io::Result<()> {
    use nix::sys::signal::Signal;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
pub(crate) fn send_sigterm(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "graceful termination is not supported on this platform",
    ))
}

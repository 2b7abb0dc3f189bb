//! Safe wrappers for platform-specific unsafe operations.
//!
//! Every `unsafe` block in the codebase lives here. Call sites use the safe
//! public API and never touch `unsafe` directly.

use std::io;

/// Check whether a process with the given pid exists.
///
/// Sends signal 0, which performs permission and existence checks without
/// delivering anything. `EPERM` means the process exists but belongs to
/// another user, so it still counts as alive.
///
/// # Safety
/// `kill` with signal 0 is a read-only POSIX call with no preconditions.
pub fn process_alive(pid: i32) -> bool {
    // SAFETY: kill(pid, 0) only performs existence/permission checks.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Request graceful shutdown of a process (SIGTERM).
///
/// Returns `Ok(())` if the process was already gone (`ESRCH`): the desired
/// outcome — the process not running — already holds.
pub fn terminate(pid: i32) -> io::Result<()> {
    send_signal(pid, libc::SIGTERM)
}

/// Forcibly kill a process (SIGKILL). Last-resort escalation only.
///
/// As with [`terminate`], an already-gone process is success.
pub fn kill_hard(pid: i32) -> io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}

/// Deliver a signal to a process.
///
/// # Safety
/// `kill` is a standard POSIX call; the return value is checked and errno
/// is read immediately on failure.
fn send_signal(pid: i32, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill is a standard POSIX call; pid and signal are plain values.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Run a closure with stderr temporarily redirected to `/dev/null`.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Safe as long as no other thread is concurrently manipulating fd 2.
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Set an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn set_env(key: &str, value: &str) {
    // SAFETY: Caller must ensure no other threads are reading environment
    // variables concurrently.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Remove an environment variable.
///
/// # Safety
/// Caller must ensure no other threads are reading environment variables concurrently.
pub fn remove_env(key: &str) {
    // SAFETY: Caller must ensure no other threads are reading environment
    // variables concurrently.
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var(key);
    }
}

/// Suppress noisy JACK/ALSA/PipeWire messages during audio backend probing.
///
/// Must be called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned.
    set_env("JACK_NO_START_SERVER", "1");
    set_env("JACK_NO_AUDIO_RESERVATION", "1");
    set_env("PIPEWIRE_DEBUG", "0");
    set_env("ALSA_DEBUG", "0");
    set_env("PW_LOG", "0");
}

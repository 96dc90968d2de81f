//! Operating system randomness.
//!
//! "random" designates the entropy backed source (`GRND_RANDOM`,
//! `/dev/random`) and "urandom" the faster pseudorandom one.

#[cfg(unix)]
pub mod device;

use crate::CryptoRandomError;
use std::io;
use tracing::debug;

#[cfg(unix)]
use device::DeviceFiles;

/// Where engines get their seeds from and where the passthrough engine
/// reads its bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` from the entropy backed source, waiting as long as needed
    fn random_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError>;

    /// Fill `dest` from the pseudorandom source, waiting as long as needed
    fn urandom_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError>;

    /// Write what the entropy backed source has available without waiting.
    ///
    /// Returns the number of bytes written, zero on starvation or error.
    fn random_nonblocking(&self, dest: &mut [u8]) -> usize;

    /// Write what the pseudorandom source has available without waiting.
    ///
    /// Returns the number of bytes written, zero on starvation or error.
    fn urandom_nonblocking(&self, dest: &mut [u8]) -> usize;
}

/// Errors after which a read is simply attempted again
pub(crate) fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

#[cfg(target_os = "linux")]
mod syscall {
    use super::is_transient;
    use std::io;

    fn getrandom(dest: &mut [u8], flags: libc::c_uint) -> io::Result<usize> {
        // SAFETY: `dest` is valid for `dest.len()` bytes of writes
        let ret = unsafe { libc::getrandom(dest.as_mut_ptr().cast(), dest.len(), flags) };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as usize)
        }
    }

    pub(super) fn fill(dest: &mut [u8], flags: libc::c_uint) -> io::Result<()> {
        let mut filled = 0;
        while filled < dest.len() {
            match getrandom(&mut dest[filled..], flags) {
                Ok(n) => filled += n,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub(super) fn fill_nonblocking(dest: &mut [u8], flags: libc::c_uint) -> usize {
        if dest.is_empty() {
            return 0;
        }
        getrandom(dest, flags | libc::GRND_NONBLOCK).unwrap_or(0)
    }
}

enum Backend {
    #[cfg(target_os = "linux")]
    Syscall,
    #[cfg(unix)]
    Devices(DeviceFiles),
    /// The `getrandom` crate, which has a single pseudorandom source
    Portable,
}

/// [`EntropySource`] of the running operating system.
///
/// Linux uses the `getrandom(2)` system call, other Unix systems the
/// `/dev/random` and `/dev/urandom` device files, and every other target
/// the `getrandom` crate.
pub struct OsEntropy {
    backend: Backend,
}

impl OsEntropy {
    #[must_use]
    pub fn new() -> Self {
        #[cfg(target_os = "linux")]
        let backend = Backend::Syscall;
        #[cfg(all(unix, not(target_os = "linux")))]
        let backend = Backend::Devices(DeviceFiles::default());
        #[cfg(not(unix))]
        let backend = Backend::Portable;
        Self { backend }
    }

    /// Read the device files even where a system call is available
    #[cfg(unix)]
    #[must_use]
    pub fn from_devices() -> Self {
        Self {
            backend: Backend::Devices(DeviceFiles::default()),
        }
    }

    /// Use the `getrandom` crate for every read, blocking and non-blocking
    /// alike
    #[must_use]
    pub fn portable() -> Self {
        Self {
            backend: Backend::Portable,
        }
    }

    fn read(&self, dest: &mut [u8], entropy_backed: bool) -> io::Result<()> {
        match &self.backend {
            #[cfg(target_os = "linux")]
            Backend::Syscall => {
                let flags = if entropy_backed { libc::GRND_RANDOM } else { 0 };
                syscall::fill(dest, flags)
            }
            #[cfg(unix)]
            Backend::Devices(devices) => {
                if entropy_backed {
                    devices.random.read_exact(dest)
                } else {
                    devices.urandom.read_exact(dest)
                }
            }
            Backend::Portable => portable_fill(dest),
        }
    }

    fn read_nonblocking(&self, dest: &mut [u8], entropy_backed: bool) -> usize {
        match &self.backend {
            #[cfg(target_os = "linux")]
            Backend::Syscall => {
                let flags = if entropy_backed { libc::GRND_RANDOM } else { 0 };
                syscall::fill_nonblocking(dest, flags)
            }
            #[cfg(unix)]
            Backend::Devices(devices) => {
                if entropy_backed {
                    devices.random_nonblocking.read_available(dest)
                } else {
                    devices.urandom_nonblocking.read_available(dest)
                }
            }
            Backend::Portable => match portable_fill(dest) {
                Ok(()) => dest.len(),
                Err(e) => {
                    debug!("non-blocking read failed: {e}");
                    0
                }
            },
        }
    }
}

fn portable_fill(dest: &mut [u8]) -> io::Result<()> {
    if dest.is_empty() {
        return Ok(());
    }
    getrandom::getrandom(dest).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for OsEntropy {
    fn random_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
        Ok(self.read(dest, true)?)
    }

    fn urandom_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
        Ok(self.read(dest, false)?)
    }

    fn random_nonblocking(&self, dest: &mut [u8]) -> usize {
        self.read_nonblocking(dest, true)
    }

    fn urandom_nonblocking(&self, dest: &mut [u8]) -> usize {
        self.read_nonblocking(dest, false)
    }
}

impl std::fmt::Debug for OsEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            #[cfg(target_os = "linux")]
            Backend::Syscall => "getrandom(2)",
            #[cfg(unix)]
            Backend::Devices(_) => "device files",
            Backend::Portable => "getrandom crate",
        };
        f.debug_struct("OsEntropy").field("backend", &backend).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{EntropySource, OsEntropy};
    use crate::CryptoRandomError;
    use std::{
        io,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    /// Hands out 0, 1, 2, ... and counts what was read from each source
    #[derive(Default)]
    pub(crate) struct CountingSource {
        next: Mutex<u8>,
        random: AtomicUsize,
        urandom: AtomicUsize,
    }

    impl CountingSource {
        fn produce(&self, dest: &mut [u8]) {
            let mut next = self.next.lock().unwrap();
            for b in dest {
                *b = *next;
                *next = next.wrapping_add(1);
            }
        }

        pub(crate) fn random_reads(&self) -> usize {
            self.random.load(Ordering::SeqCst)
        }

        pub(crate) fn urandom_reads(&self) -> usize {
            self.urandom.load(Ordering::SeqCst)
        }
    }

    impl EntropySource for CountingSource {
        fn random_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
            self.random_nonblocking(dest);
            Ok(())
        }

        fn urandom_blocking(&self, dest: &mut [u8]) -> Result<(), CryptoRandomError> {
            self.urandom_nonblocking(dest);
            Ok(())
        }

        fn random_nonblocking(&self, dest: &mut [u8]) -> usize {
            self.produce(dest);
            self.random.fetch_add(dest.len(), Ordering::SeqCst);
            dest.len()
        }

        fn urandom_nonblocking(&self, dest: &mut [u8]) -> usize {
            self.produce(dest);
            self.urandom.fetch_add(dest.len(), Ordering::SeqCst);
            dest.len()
        }
    }

    /// Always starved
    pub(crate) struct FailingSource;

    impl EntropySource for FailingSource {
        fn random_blocking(&self, _dest: &mut [u8]) -> Result<(), CryptoRandomError> {
            Err(io::Error::new(io::ErrorKind::Other, "no entropy").into())
        }

        fn urandom_blocking(&self, _dest: &mut [u8]) -> Result<(), CryptoRandomError> {
            Err(io::Error::new(io::ErrorKind::Other, "no entropy").into())
        }

        fn random_nonblocking(&self, _dest: &mut [u8]) -> usize {
            0
        }

        fn urandom_nonblocking(&self, _dest: &mut [u8]) -> usize {
            0
        }
    }

    fn check_source(source: &OsEntropy) {
        let mut a = [0_u8; 64];
        let mut b = [0_u8; 64];
        source.urandom_blocking(&mut a).unwrap();
        source.urandom_blocking(&mut b).unwrap();
        assert_ne!(a, b);

        let mut big = vec![0_u8; 100_000];
        source.urandom_blocking(&mut big).unwrap();
        assert!(big.iter().any(|b| *b != 0));

        source.random_blocking(&mut a).unwrap();
        assert_ne!(a, b);

        assert_eq!(64, source.urandom_nonblocking(&mut a));
        assert!(source.random_nonblocking(&mut a) <= 64);
        assert_eq!(0, source.urandom_nonblocking(&mut []));
    }

    #[test]
    fn test_os_entropy() {
        check_source(&OsEntropy::new());
    }

    #[test]
    #[cfg(unix)]
    fn test_device_files() {
        check_source(&OsEntropy::from_devices());
    }

    #[test]
    fn test_portable() {
        check_source(&OsEntropy::portable());
    }
}

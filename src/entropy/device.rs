//! Randomness device files, opened on first use and kept open.

use super::is_transient;
use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    marker::PhantomData,
    os::unix::fs::OpenOptionsExt,
    sync::{Mutex, PoisonError},
};
use tracing::debug;

/// A device file and the flags it is opened with
pub trait Device {
    const PATH: &'static str;
    const FLAGS: libc::c_int;
}

pub struct Random;
pub struct URandom;
pub struct RandomNonblocking;
pub struct URandomNonblocking;

impl Device for Random {
    const PATH: &'static str = "/dev/random";
    const FLAGS: libc::c_int = 0;
}

impl Device for URandom {
    const PATH: &'static str = "/dev/urandom";
    const FLAGS: libc::c_int = 0;
}

impl Device for RandomNonblocking {
    const PATH: &'static str = "/dev/random";
    const FLAGS: libc::c_int = libc::O_NONBLOCK;
}

impl Device for URandomNonblocking {
    const PATH: &'static str = "/dev/urandom";
    const FLAGS: libc::c_int = libc::O_NONBLOCK;
}

pub struct DeviceFile<D> {
    file: Mutex<Option<File>>,
    device: PhantomData<fn() -> D>,
}

impl<D: Device> DeviceFile<D> {
    fn with_file<R>(&self, read: impl FnOnce(&mut File) -> io::Result<R>) -> io::Result<R> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = match &mut *guard {
            Some(file) => file,
            slot @ None => {
                let file = OpenOptions::new()
                    .read(true)
                    .custom_flags(D::FLAGS)
                    .open(D::PATH)?;
                debug!("opened {} (flags {:#x})", D::PATH, D::FLAGS);
                slot.insert(file)
            }
        };
        read(file)
    }

    /// Fill `dest`, retrying on interruption
    pub fn read_exact(&self, dest: &mut [u8]) -> io::Result<()> {
        if dest.is_empty() {
            return Ok(());
        }
        self.with_file(|file| {
            let mut filled = 0;
            while filled < dest.len() {
                match file.read(&mut dest[filled..]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("{} returned no data", D::PATH),
                        ))
                    }
                    Ok(n) => filled += n,
                    Err(e) if is_transient(&e) => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
    }

    /// A single read, returning the number of bytes written or zero on error
    pub fn read_available(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() {
            return 0;
        }
        self.with_file(|file| file.read(dest)).unwrap_or(0)
    }
}

impl<D> Default for DeviceFile<D> {
    fn default() -> Self {
        Self {
            file: Mutex::new(None),
            device: PhantomData,
        }
    }
}

#[derive(Default)]
pub struct DeviceFiles {
    pub random: DeviceFile<Random>,
    pub urandom: DeviceFile<URandom>,
    pub random_nonblocking: DeviceFile<RandomNonblocking>,
    pub urandom_nonblocking: DeviceFile<URandomNonblocking>,
}

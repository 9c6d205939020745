//! Access to the observed process's memory
//!
//! Probes only ever read short, fixed-size ranges out of syscall buffers. A
//! failed read aborts the current probe invocation and nothing else.

use std::collections::BTreeMap;

use crate::domain::Pid;

/// A user buffer could not be read (unmapped, freed, or not permitted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFault {
    pub addr: u64,
    pub len: usize,
}

/// Reads bytes out of the traced task's address space
pub trait UserMemory {
    /// Fill `dst` with the bytes starting at `addr`
    ///
    /// # Errors
    /// Returns [`MemoryFault`] unless every byte of `dst` could be read.
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryFault>;

    /// Whether addresses seen by tasks of `pid` can be read through this backend
    fn covers(&self, _pid: Pid) -> bool {
        true
    }
}

impl<M: UserMemory + ?Sized> UserMemory for &M {
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryFault> {
        (**self).read_user(addr, dst)
    }

    fn covers(&self, pid: Pid) -> bool {
        (**self).covers(pid)
    }
}

/// Reads another process's memory with `process_vm_readv(2)`
///
/// Bound to one process: tasks of any other process are not covered. Requires
/// the same permissions as `ptrace` attach (root or `CAP_SYS_PTRACE`).
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }
}

impl UserMemory for ProcessMemory {
    #[allow(unsafe_code, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryFault> {
        let fault = MemoryFault { addr, len: dst.len() };
        if dst.is_empty() {
            return Ok(());
        }

        let local = libc::iovec { iov_base: dst.as_mut_ptr().cast(), iov_len: dst.len() };
        let remote = libc::iovec { iov_base: addr as *mut libc::c_void, iov_len: dst.len() };

        // SAFETY: `local` describes exactly `dst`, which is valid for writes for
        // its full length. The remote range is only read by the kernel.
        let copied =
            unsafe { libc::process_vm_readv(self.pid.0 as libc::pid_t, &local, 1, &remote, 1, 0) };

        // Partial reads count as faults.
        if copied < 0 || copied as usize != dst.len() {
            return Err(fault);
        }
        Ok(())
    }

    fn covers(&self, pid: Pid) -> bool {
        pid == self.pid
    }
}

/// Memory made of explicitly registered regions
///
/// Used to replay recorded syscall traffic through the engine: each buffer is
/// registered at the address the syscall saw it at. Reads that are not fully
/// contained in one region fault, like a read of an unmapped page.
#[derive(Debug, Default, Clone)]
pub struct RegionMemory {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl RegionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `addr`, replacing any region starting there
    pub fn map(&mut self, addr: u64, bytes: impl Into<Vec<u8>>) {
        self.regions.insert(addr, bytes.into());
    }

    /// Remove the region starting at `addr`
    pub fn unmap(&mut self, addr: u64) {
        self.regions.remove(&addr);
    }

    /// Overwrite the contents of an existing region, as a kernel `read` would
    ///
    /// Returns `false` if no region starts at `addr`.
    pub fn fill(&mut self, addr: u64, bytes: &[u8]) -> bool {
        let Some(region) = self.regions.get_mut(&addr) else {
            return false;
        };
        let n = bytes.len().min(region.len());
        region[..n].copy_from_slice(&bytes[..n]);
        true
    }
}

impl UserMemory for RegionMemory {
    #[allow(clippy::cast_possible_truncation)]
    fn read_user(&self, addr: u64, dst: &mut [u8]) -> Result<(), MemoryFault> {
        let fault = MemoryFault { addr, len: dst.len() };
        let (&start, region) = self.regions.range(..=addr).next_back().ok_or(fault)?;

        let offset = (addr - start) as usize;
        let end = offset.checked_add(dst.len()).ok_or(fault)?;
        let src = region.get(offset..end).ok_or(fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_read_inside() {
        let mut mem = RegionMemory::new();
        mem.map(0x1000, b"HTTP/1.1 200 OK".to_vec());

        let mut buf = [0u8; 4];
        mem.read_user(0x1005, &mut buf).unwrap();
        assert_eq!(&buf, b"1.1 ");
    }

    #[test]
    fn test_region_read_past_end_faults() {
        let mut mem = RegionMemory::new();
        mem.map(0x1000, b"GET".to_vec());

        let mut buf = [0u8; 4];
        assert_eq!(
            mem.read_user(0x1000, &mut buf),
            Err(MemoryFault { addr: 0x1000, len: 4 })
        );
    }

    #[test]
    fn test_region_read_unmapped_faults() {
        let mut mem = RegionMemory::new();
        mem.map(0x1000, vec![0u8; 16]);
        mem.unmap(0x1000);

        let mut buf = [0u8; 1];
        assert!(mem.read_user(0x1000, &mut buf).is_err());
        assert!(mem.read_user(0x10, &mut buf).is_err());
    }

    #[test]
    fn test_fill_overwrites_region() {
        let mut mem = RegionMemory::new();
        mem.map(0x2000, vec![0u8; 8]);
        assert!(mem.fill(0x2000, b"HTTP"));
        assert!(!mem.fill(0x3000, b"HTTP"));

        let mut buf = [0u8; 8];
        mem.read_user(0x2000, &mut buf).unwrap();
        assert_eq!(&buf, b"HTTP\0\0\0\0");
    }

    #[test]
    fn test_process_memory_reads_self() {
        let data = *b"POST /submit";
        let mem = ProcessMemory::new(Pid(std::process::id()));

        let mut buf = [0u8; 4];
        mem.read_user(data.as_ptr() as u64, &mut buf).unwrap();
        assert_eq!(&buf, b"POST");
    }

    #[test]
    fn test_process_memory_covers_only_its_pid() {
        let mem = ProcessMemory::new(Pid(42));
        assert!(mem.covers(Pid(42)));
        assert!(!mem.covers(Pid(43)));
        assert!(RegionMemory::new().covers(Pid(43)));
    }

    #[test]
    fn test_process_memory_null_faults() {
        let mem = ProcessMemory::new(Pid(std::process::id()));
        let mut buf = [0u8; 4];
        assert!(mem.read_user(0, &mut buf).is_err());
    }
}

//! Executable memory management (component A, §3.6/§4.6): page-granularity
//! regions that start out writable for emission and are flipped to
//! read+execute before the first call through them.
//!
//! Grounded directly on the original's platform layer — `platform/unix.c`'s
//! `alloc_page`/`protect_rw`/`protect_rx` (`mmap` with `PROT_READ|PROT_WRITE`,
//! then `mprotect`) and `platform/win-x86_64.c`'s `VirtualAlloc`/
//! `VirtualProtect` counterparts. Allocation stays on `libc`/`windows-sys`
//! directly, matching the raw syscalls the original issues one-for-one; the
//! W→X flip goes through the `region` crate (the same crate the teacher's
//! own JIT backends depend on) so the two platforms share one call site
//! instead of two hand-rolled `mprotect`/`VirtualProtect` wrappers.
//!
//! A region is never freed before the owning [`crate::context::Context`] is
//! dropped — functions may call each other across regions indefinitely, so
//! there is no safe point to reclaim one earlier.

use std::io;

use region::Protection;

/// One mmap'd (or `VirtualAlloc`'d) span of `size` bytes, writable until
/// [`ExecutableRegion::make_executable`] is called.
pub struct ExecutableRegion {
    ptr: *mut u8,
    size: usize,
    cursor: usize,
    executable: bool,
}

// The region is only ever mutated through `&mut self`, and the pointer is
// never shared with another thread without synchronization the caller
// provides (see DESIGN.md) — safe to move between threads.
unsafe impl Send for ExecutableRegion {}

impl ExecutableRegion {
    /// Reserve a fresh region of at least `min_size` bytes, rounded up to a
    /// whole number of pages.
    pub fn new(min_size: usize) -> io::Result<Self> {
        let page = page_size();
        let size = align_up(min_size.max(1), page);
        let ptr = alloc_pages(size)?;
        Ok(ExecutableRegion {
            ptr,
            size,
            cursor: 0,
            executable: false,
        })
    }

    /// Remaining writable capacity. Once a region has been made executable
    /// it must not be appended to again — a function's code buffer is
    /// copied into a fresh region, never into one already in flight for
    /// another function that has already gone live.
    pub fn remaining(&self) -> usize {
        self.size - self.cursor
    }

    /// Copy `code` to the end of the writable area and return its starting
    /// offset within the region.
    pub fn push(&mut self, code: &[u8]) -> usize {
        assert!(!self.executable, "cannot append to a region already made executable");
        assert!(code.len() <= self.remaining(), "executable region exhausted");
        let offset = self.cursor;
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr.add(offset), code.len());
        }
        self.cursor += code.len();
        offset
    }

    /// Flip the whole region read+execute. Idempotent — a context may
    /// publish several functions into the same region before the first
    /// call into any of them.
    pub fn make_executable(&mut self) -> io::Result<()> {
        if self.executable {
            return Ok(());
        }
        unsafe {
            region::protect(self.ptr, self.size, Protection::READ_EXECUTE)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        self.executable = true;
        Ok(())
    }

    /// Absolute address of `offset` bytes into the region, for resolving a
    /// function's entry point once compiled.
    pub fn address_of(&self, offset: usize) -> usize {
        assert!(offset <= self.size);
        self.ptr as usize + offset
    }

    /// Base address, used by the symbol table's backtrace walk to decide
    /// whether a return address falls inside this region.
    pub fn base(&self) -> usize {
        self.ptr as usize
    }

    pub fn len(&self) -> usize {
        self.size
    }
}

impl Drop for ExecutableRegion {
    fn drop(&mut self) {
        free_pages(self.ptr, self.size);
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(unix)]
fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(unix)]
fn alloc_pages(size: usize) -> io::Result<*mut u8> {
    unsafe {
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr as *mut u8)
    }
}

#[cfg(unix)]
fn free_pages(ptr: *mut u8, size: usize) {
    unsafe {
        libc::munmap(ptr as *mut libc::c_void, size);
    }
}

#[cfg(windows)]
fn page_size() -> usize {
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
    unsafe {
        let mut info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info.dwPageSize as usize
    }
}

#[cfg(windows)]
fn alloc_pages(size: usize) -> io::Result<*mut u8> {
    use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};
    unsafe {
        let ptr = VirtualAlloc(std::ptr::null(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE);
        if ptr.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr as *mut u8)
    }
}

#[cfg(windows)]
fn free_pages(ptr: *mut u8, _size: usize) {
    use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
    unsafe {
        VirtualFree(ptr as *mut _, 0, MEM_RELEASE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_execute_preserves_bytes() {
        let mut region = ExecutableRegion::new(16).unwrap();
        let code = [0xC3u8]; // ret
        let offset = region.push(&code);
        assert_eq!(offset, 0);
        region.make_executable().unwrap();
        let byte = unsafe { std::ptr::read(region.address_of(offset) as *const u8) };
        assert_eq!(byte, 0xC3);
    }

    #[test]
    fn remaining_shrinks_as_code_is_pushed() {
        let mut region = ExecutableRegion::new(4096).unwrap();
        let before = region.remaining();
        region.push(&[0x90, 0x90, 0x90]);
        assert_eq!(region.remaining(), before - 3);
    }
}

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the system page size, cached atomically.
pub fn page_size() -> usize {
    static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
            PAGE_SIZE.store(page_size, Ordering::Relaxed);
            page_size
        }
        page_size => page_size,
    }
}

pub fn map(size: usize) -> *mut u8 {
    let flags = libc::MAP_PRIVATE | libc::MAP_ANON;
    let prot = libc::PROT_READ | libc::PROT_WRITE;

    let addr = unsafe { libc::mmap(ptr::null_mut(), size, prot, flags, -1, 0) };

    if addr == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        addr.cast::<u8>()
    }
}

pub fn unmap(base: *mut u8, size: usize) -> bool {
    unsafe { libc::munmap(base.cast::<libc::c_void>(), size) == 0 }
}

pub fn advise_dont_need(base: *mut u8, size: usize) {
    unsafe {
        libc::madvise(base.cast::<libc::c_void>(), size, libc::MADV_DONTNEED);
    }
}

pub fn protect(base: *mut u8, size: usize) -> bool {
    unsafe { libc::mprotect(base.cast::<libc::c_void>(), size, libc::PROT_NONE) == 0 }
}

pub fn unprotect(base: *mut u8, size: usize) -> bool {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    unsafe { libc::mprotect(base.cast::<libc::c_void>(), size, prot) == 0 }
}

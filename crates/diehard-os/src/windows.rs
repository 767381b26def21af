use std::mem;
use std::ptr;

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE,
    PAGE_NOACCESS, PAGE_PROTECTION_FLAGS, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub fn page_size() -> usize {
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info);
        let size = info.dwPageSize as usize;
        if size == 0 {
            4096
        } else {
            size
        }
    }
}

pub fn map(size: usize) -> *mut u8 {
    let addr = unsafe {
        VirtualAlloc(
            ptr::null(),
            size,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        )
    };
    addr.cast::<u8>()
}

pub fn unmap(base: *mut u8, _size: usize) -> bool {
    unsafe { VirtualFree(base.cast::<std::ffi::c_void>(), 0, MEM_RELEASE) != 0 }
}

/// Decommits the range's physical backing; the reservation stays intact.
pub fn advise_dont_need(base: *mut u8, size: usize) {
    unsafe {
        VirtualFree(base.cast::<std::ffi::c_void>(), size, MEM_DECOMMIT);
    }
}

pub fn protect(base: *mut u8, size: usize) -> bool {
    let mut old: PAGE_PROTECTION_FLAGS = 0;
    unsafe { VirtualProtect(base.cast::<std::ffi::c_void>(), size, PAGE_NOACCESS, &mut old) != 0 }
}

pub fn unprotect(base: *mut u8, size: usize) -> bool {
    let mut old: PAGE_PROTECTION_FLAGS = 0;
    unsafe {
        VirtualProtect(base.cast::<std::ffi::c_void>(), size, PAGE_READWRITE, &mut old) != 0
    }
}

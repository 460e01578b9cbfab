//! Open-flag translation between bridged protocols and [`OpenOptions`]

use crate::vfs::OpenOptions;

/// 9P open mode: read only.
pub const OREAD: u8 = 0;
/// 9P open mode: write only.
pub const OWRITE: u8 = 1;
/// 9P open mode: read and write.
pub const ORDWR: u8 = 2;
/// 9P open mode: execute. Treated as read.
pub const OEXEC: u8 = 3;
/// 9P flag: truncate on open.
pub const OTRUNC: u8 = 0x10;

const NINEP_ACCESS_MASK: u8 = 0x03;

/// Translate a 9P open mode byte.
pub fn ninep_to_options(mode: u8) -> OpenOptions {
    let options = match mode & NINEP_ACCESS_MASK {
        OWRITE => OpenOptions::new().write(true),
        ORDWR => OpenOptions::new().read(true).write(true),
        _ => OpenOptions::new().read(true),
    };
    options.truncate(mode & OTRUNC != 0)
}

/// Project options onto a 9P open mode byte.
///
/// 9P carries no create or append bits on open; those are dropped.
pub fn options_to_ninep(options: &OpenOptions) -> u8 {
    let access = match (options.is_read(), options.is_write()) {
        (true, true) => ORDWR,
        (false, true) => OWRITE,
        _ => OREAD,
    };
    if options.is_truncate() {
        access | OTRUNC
    } else {
        access
    }
}

/// Guest (WASI-style, Linux-valued) open flags.
pub mod guest {
    pub const O_RDONLY: u32 = 0;
    pub const O_WRONLY: u32 = 0o1;
    pub const O_RDWR: u32 = 0o2;
    pub const O_CREAT: u32 = 0o100;
    pub const O_EXCL: u32 = 0o200;
    pub const O_TRUNC: u32 = 0o1000;
    pub const O_APPEND: u32 = 0o2000;
    pub const O_ACCMODE: u32 = 0o3;
}

/// Translate guest `O_*` flags.
pub fn guest_to_options(oflags: u32) -> OpenOptions {
    let options = match oflags & guest::O_ACCMODE {
        guest::O_WRONLY => OpenOptions::new().write(true),
        guest::O_RDWR => OpenOptions::new().read(true).write(true),
        _ => OpenOptions::new().read(true),
    };
    let exclusive = oflags & guest::O_CREAT != 0 && oflags & guest::O_EXCL != 0;
    options
        .append(oflags & guest::O_APPEND != 0)
        .truncate(oflags & guest::O_TRUNC != 0)
        .create(oflags & guest::O_CREAT != 0 && !exclusive)
        .create_new(exclusive)
}

/// Project options onto guest `O_*` flags.
pub fn options_to_guest(options: &OpenOptions) -> u32 {
    let mut oflags = match (options.is_read(), options.is_write()) {
        (true, true) => guest::O_RDWR,
        (false, true) => guest::O_WRONLY,
        _ => guest::O_RDONLY,
    };
    if options.is_append() {
        oflags |= guest::O_APPEND;
    }
    if options.is_truncate() {
        oflags |= guest::O_TRUNC;
    }
    if options.is_create_new() {
        oflags |= guest::O_CREAT | guest::O_EXCL;
    } else if options.is_create() {
        oflags |= guest::O_CREAT;
    }
    oflags
}

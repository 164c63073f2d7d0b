//! Region lifecycle: creating, attaching and tearing down the mapping.

use std::ffi::CString;
use std::io;
use std::ptr;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RegionConfig;
use crate::error::{ShmError, ShmResult};
use crate::layout::{arena_offset, min_region_size, RegionHeader};
use crate::sync;

fn region_cname(name: &str) -> ShmResult<CString> {
    CString::new(name).map_err(|_| ShmError::invalid_config("region name must not contain NUL"))
}

/// Release a mapping whose header never finished initializing.
///
/// # Safety
///
/// `base`/`size` must describe a live mapping of the region named `name`;
/// nothing may use either afterwards.
unsafe fn discard_mapping(base: *mut u8, size: usize, name: &CString) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::munmap(base.cast(), size);
        libc::shm_unlink(name.as_ptr());
    }
}

/// Initialize a freshly mapped header; `is_valid` is published last.
///
/// On failure every resource taken so far, the mapping included, is released
/// so the caller has nothing left to clean up.
///
/// # Safety
///
/// `base` must be the exclusively-owned, writable mapping of `config.size`
/// bytes created for `name`.
unsafe fn init_header(base: *mut u8, config: &RegionConfig, name: &CString) -> ShmResult<()> {
    let hdr = base.cast::<RegionHeader>();
    // SAFETY: hdr points at our fresh mapping per the caller's contract.
    unsafe {
        (*hdr)
            .is_valid
            .store(false, std::sync::atomic::Ordering::Release);
        (*hdr)
            .version
            .store(rand::thread_rng().gen(), std::sync::atomic::Ordering::Relaxed);
        (*hdr)
            .size
            .store(config.size as u32, std::sync::atomic::Ordering::Relaxed);

        if let Err(err) = sync::init_robust_mutex(&raw mut (*hdr).mutex) {
            discard_mapping(base, config.size, name);
            return Err(err);
        }
        if let Err(err) = sync::init_shared_cond(&raw mut (*hdr).cond_packet_ready) {
            sync::destroy_mutex(&raw mut (*hdr).mutex);
            discard_mapping(base, config.size, name);
            return Err(err);
        }
        if let Err(err) = sync::init_shared_cond(&raw mut (*hdr).cond_slot_available) {
            sync::destroy_cond(&raw mut (*hdr).cond_packet_ready);
            sync::destroy_mutex(&raw mut (*hdr).mutex);
            discard_mapping(base, config.size, name);
            return Err(err);
        }

        (*hdr).capacity = config.capacity;
        (*hdr).count = 0;
        (*hdr).head = 0;
        (*hdr).tail = 0;
        (*hdr).write_offset = arena_offset(config.capacity) as u64;

        (*hdr)
            .is_valid
            .store(true, std::sync::atomic::Ordering::Release);
    }
    Ok(())
}

/// A region created and owned by a publisher.
///
/// Creation is create-or-replace: any prior region of the same name is
/// unlinked first, so a restarted publisher always hands subscribers a fresh
/// session. Dropping the region invalidates the header, wakes any waiters,
/// destroys the sync objects, unmaps and unlinks.
pub struct OwnedRegion {
    base: *mut u8,
    len: usize,
    name: CString,
}

// The raw pointer is only a mapping base; all mutation happens under the
// region mutex.
unsafe impl Send for OwnedRegion {}

impl OwnedRegion {
    /// Create the region described by `config`, replacing any prior one.
    pub fn create(config: &RegionConfig) -> ShmResult<Self> {
        config.validate()?;
        if config.size < min_region_size(config.capacity) {
            return Err(ShmError::invalid_config(format!(
                "size {} cannot hold the header and {} slots",
                config.size, config.capacity
            )));
        }
        let name = region_cname(&config.name)?;

        // SAFETY: plain POSIX calls on a name we own; failure paths unwind
        // every resource acquired so far.
        unsafe {
            libc::shm_unlink(name.as_ptr());
            let fd = libc::shm_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
                0o666,
            );
            if fd < 0 {
                return Err(ShmError::Create {
                    name: config.name.clone(),
                    source: io::Error::last_os_error(),
                });
            }
            if libc::ftruncate(fd, config.size as libc::off_t) != 0 {
                let source = io::Error::last_os_error();
                libc::close(fd);
                libc::shm_unlink(name.as_ptr());
                return Err(ShmError::Map {
                    name: config.name.clone(),
                    source,
                });
            }
            let base = libc::mmap(
                ptr::null_mut(),
                config.size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            libc::close(fd);
            if base == libc::MAP_FAILED {
                let source = io::Error::last_os_error();
                libc::shm_unlink(name.as_ptr());
                return Err(ShmError::Map {
                    name: config.name.clone(),
                    source,
                });
            }

            init_header(base.cast(), config, &name)?;
            debug!(region = %config.name, size = config.size, capacity = config.capacity,
                   "shared memory region created");
            Ok(OwnedRegion {
                base: base.cast(),
                len: config.size,
                name,
            })
        }
    }

    /// Header pointer.
    pub fn header(&self) -> *mut RegionHeader {
        self.base.cast()
    }

    /// Mapping base.
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// Mapping length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for OwnedRegion {
    fn drop(&mut self) {
        let hdr = self.header();
        // Invalidate under the lock and wake both sides so blocked peers
        // observe the teardown promptly, then destroy and unlink.
        // SAFETY: we own the mapping; nothing in this process uses it after
        // drop, and peers are fenced off by is_valid.
        unsafe {
            sync::lock(&raw mut (*hdr).mutex);
            (*hdr).is_valid.store(false, std::sync::atomic::Ordering::Release);
            sync::signal(&raw mut (*hdr).cond_packet_ready);
            sync::signal(&raw mut (*hdr).cond_slot_available);
            sync::unlock(&raw mut (*hdr).mutex);
            sync::destroy_cond(&raw mut (*hdr).cond_packet_ready);
            sync::destroy_cond(&raw mut (*hdr).cond_slot_available);
            sync::destroy_mutex(&raw mut (*hdr).mutex);
            libc::munmap(self.base.cast(), self.len);
            libc::shm_unlink(self.name.as_ptr());
        }
        debug!("shared memory region destroyed");
    }
}

/// A subscriber-side view of a region created elsewhere.
///
/// Dropping detaches (unmaps) only; the creating publisher owns unlink.
pub struct AttachedRegion {
    base: *mut u8,
    len: usize,
}

// As for OwnedRegion: the pointer is shared state guarded by the region
// mutex.
unsafe impl Send for AttachedRegion {}

impl AttachedRegion {
    /// Open and map an existing region, rejecting it unless `is_valid`.
    pub fn open(name: &str) -> ShmResult<Self> {
        let cname = region_cname(name)?;

        // SAFETY: plain POSIX calls; failure paths release what was taken.
        unsafe {
            let fd = libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0o666);
            if fd < 0 {
                return Err(ShmError::Open {
                    name: name.to_string(),
                    source: io::Error::last_os_error(),
                });
            }
            let mut stat = std::mem::zeroed::<libc::stat>();
            if libc::fstat(fd, &mut stat) != 0 {
                let source = io::Error::last_os_error();
                libc::close(fd);
                return Err(ShmError::Open {
                    name: name.to_string(),
                    source,
                });
            }
            let len = stat.st_size as usize;
            if len < min_region_size(0) {
                libc::close(fd);
                return Err(ShmError::RegionInvalid {
                    name: name.to_string(),
                });
            }
            let base = libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            libc::close(fd);
            if base == libc::MAP_FAILED {
                return Err(ShmError::Map {
                    name: name.to_string(),
                    source: io::Error::last_os_error(),
                });
            }

            let region = AttachedRegion {
                base: base.cast(),
                len,
            };
            let hdr = region.header();
            if !(*hdr).is_valid.load(std::sync::atomic::Ordering::Acquire) {
                warn!(region = name, "region exists but is not valid yet");
                return Err(ShmError::RegionInvalid {
                    name: name.to_string(),
                });
            }
            Ok(region)
        }
    }

    /// Header pointer.
    pub fn header(&self) -> *mut RegionHeader {
        self.base.cast()
    }

    /// Mapping base.
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// Mapping length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for AttachedRegion {
    fn drop(&mut self) {
        // SAFETY: base/len describe our live mapping.
        unsafe {
            libc::munmap(self.base.cast(), self.len);
        }
        debug!("shared memory region detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::slots_offset;

    fn unique_name(tag: &str) -> String {
        format!("flowline-region-{tag}-{}", std::process::id())
    }

    fn test_config(tag: &str) -> RegionConfig {
        RegionConfig::builder(unique_name(tag))
            .size(4096)
            .capacity(4)
            .build()
            .expect("valid config")
    }

    #[test]
    fn test_create_then_attach() {
        let config = test_config("create");
        let owned = OwnedRegion::create(&config).expect("create");

        // SAFETY: reading header fields of our own region.
        unsafe {
            let hdr = owned.header();
            assert!((*hdr).is_valid.load(std::sync::atomic::Ordering::Acquire));
            assert_eq!((*hdr).capacity, 4);
            assert_eq!((*hdr).count, 0);
            assert_eq!((*hdr).write_offset, arena_offset(4) as u64);
        }

        let attached = AttachedRegion::open(&config.name).expect("attach");
        assert_eq!(attached.len(), config.size);
        // SAFETY: header of a mapped, valid region.
        unsafe {
            let ours = (*owned.header()).version.load(std::sync::atomic::Ordering::Relaxed);
            let theirs = (*attached.header())
                .version
                .load(std::sync::atomic::Ordering::Relaxed);
            assert_eq!(ours, theirs);
        }
    }

    #[test]
    fn test_drop_unlinks() {
        let config = test_config("unlink");
        let owned = OwnedRegion::create(&config).expect("create");
        drop(owned);
        assert!(matches!(
            AttachedRegion::open(&config.name),
            Err(ShmError::Open { .. })
        ));
    }

    #[test]
    fn test_create_replaces_previous_region() {
        let config = test_config("replace");
        let first = OwnedRegion::create(&config).expect("first create");
        // SAFETY: reading our own header.
        let first_version =
            unsafe { (*first.header()).version.load(std::sync::atomic::Ordering::Relaxed) };

        let second = OwnedRegion::create(&config).expect("replacing create");
        // SAFETY: reading our own header.
        let second_version =
            unsafe { (*second.header()).version.load(std::sync::atomic::Ordering::Relaxed) };

        // Freshly rolled nonce marks the new session.
        assert_ne!(first_version, second_version);

        // The name resolves to the replacement while the stale mapping is
        // still alive.
        let attached = AttachedRegion::open(&config.name).expect("attach to replacement");
        // SAFETY: header of a mapped, valid region.
        unsafe {
            assert_eq!(
                (*attached.header())
                    .version
                    .load(std::sync::atomic::Ordering::Relaxed),
                second_version
            );
        }
        drop(first);
    }

    #[test]
    fn test_rejects_undersized_config() {
        let config = RegionConfig::builder(unique_name("small"))
            .size(slots_offset())
            .capacity(1)
            .build()
            .expect("config validates without layout knowledge");
        assert!(matches!(
            OwnedRegion::create(&config),
            Err(ShmError::InvalidConfig(_))
        ));
    }
}

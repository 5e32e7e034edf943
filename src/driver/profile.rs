//! Optional CPU and heap profiling around a single program run.
//!
//! The two profiles are independent guards. CPU sampling starts before the
//! run and is written out as soon as it returns; the heap snapshot is taken
//! afterwards, once the interpreter's state has been dropped.

use std::alloc::{GlobalAlloc, Layout, System};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_BLOCKS: AtomicU64 = AtomicU64::new(0);
static PEAK_BYTES: AtomicU64 = AtomicU64::new(0);
static TOTAL_BYTES: AtomicU64 = AtomicU64::new(0);
static TOTAL_BLOCKS: AtomicU64 = AtomicU64::new(0);

/// Global allocator that counts allocations for heap snapshots. The binary
/// installs it; without it snapshots report zeros.
pub struct TrackingAllocator;

impl TrackingAllocator {
    fn record_alloc(size: usize) {
        let size = size as u64;
        let live = LIVE_BYTES.fetch_add(size, Ordering::Relaxed) + size;
        LIVE_BLOCKS.fetch_add(1, Ordering::Relaxed);
        TOTAL_BYTES.fetch_add(size, Ordering::Relaxed);
        TOTAL_BLOCKS.fetch_add(1, Ordering::Relaxed);
        PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
    }

    fn record_dealloc(size: usize) {
        LIVE_BYTES.fetch_sub(size as u64, Ordering::Relaxed);
        LIVE_BLOCKS.fetch_sub(1, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        Self::record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            Self::record_dealloc(layout.size());
            Self::record_alloc(new_size);
        }
        new_ptr
    }
}

/// Allocation counters at one point in time, written as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapSnapshot {
    pub live_bytes: u64,
    pub live_blocks: u64,
    pub peak_bytes: u64,
    pub total_bytes: u64,
    pub total_blocks: u64,
}

impl HeapSnapshot {
    pub fn capture() -> Self {
        Self {
            live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
            live_blocks: LIVE_BLOCKS.load(Ordering::Relaxed),
            peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
            total_bytes: TOTAL_BYTES.load(Ordering::Relaxed),
            total_blocks: TOTAL_BLOCKS.load(Ordering::Relaxed),
        }
    }
}

/// Destination for a heap snapshot taken after the run.
pub struct HeapProfile {
    path: PathBuf,
}

impl HeapProfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(self) -> Result<()> {
        let snapshot = HeapSnapshot::capture();
        let file = File::create(&self.path)
            .map_err(|e| Error::profile(format!("could not create memory profile: {}", e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot)
            .map_err(|e| Error::profile(format!("could not write memory profile: {}", e)))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| Error::profile(format!("could not write memory profile: {}", e)))?;
        debug!(path = %self.path.display(), live_bytes = snapshot.live_bytes, "wrote heap snapshot");
        Ok(())
    }
}

/// A running CPU profile, written to its file by [`CpuProfile::finish`].
#[cfg(unix)]
pub struct CpuProfile {
    guard: pprof::ProfilerGuard<'static>,
    file: File,
}

#[cfg(unix)]
impl CpuProfile {
    const FREQUENCY: i32 = 1000;

    pub fn start(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::profile(format!("could not create CPU profile: {}", e)))?;
        let guard = pprof::ProfilerGuardBuilder::default()
            .frequency(Self::FREQUENCY)
            .blocklist(&["libc", "libgcc", "pthread", "vdso"])
            .build()
            .map_err(|e| Error::profile(format!("could not start CPU profile: {}", e)))?;
        debug!(path = %path.display(), "started CPU profile");
        Ok(Self { guard, file })
    }

    /// Stops sampling and writes the profile in pprof format.
    pub fn finish(mut self) -> Result<()> {
        use pprof::protos::Message;

        let failed = |e: &dyn std::fmt::Display| Error::profile(format!("could not write CPU profile: {}", e));
        let report = self.guard.report().build().map_err(|e| failed(&e))?;
        drop(self.guard);
        let profile = report.pprof().map_err(|e| failed(&e))?;
        let mut content = Vec::new();
        profile.encode(&mut content).map_err(|e| failed(&e))?;
        self.file.write_all(&content).map_err(|e| failed(&e))?;
        debug!(bytes = content.len(), "stopped CPU profile");
        Ok(())
    }
}

#[cfg(not(unix))]
pub struct CpuProfile;

#[cfg(not(unix))]
impl CpuProfile {
    pub fn start(_path: &Path) -> Result<Self> {
        Err(Error::profile("CPU profiling is not supported on this platform"))
    }

    pub fn finish(self) -> Result<()> {
        Ok(())
    }
}

/// Runs `exec` inside the requested profiles. Profile output is written
/// whether or not `exec` fails; a profile failure takes precedence over
/// the run's own result.
pub fn run_profiled<F>(cpu: Option<&Path>, heap: Option<&Path>, exec: F) -> Result<i32>
where
    F: FnOnce() -> Result<i32>,
{
    let cpu = cpu.map(CpuProfile::start).transpose()?;
    let result = exec();
    let cpu_written = cpu.map_or(Ok(()), CpuProfile::finish);
    finish(result, cpu_written, heap)
}

/// Writes the heap snapshot however the run and the CPU profile ended, then
/// picks the error to report.
fn finish(result: Result<i32>, cpu_written: Result<()>, heap: Option<&Path>) -> Result<i32> {
    let heap_written = heap.map_or(Ok(()), |path| HeapProfile::new(path).write());
    match cpu_written.and(heap_written) {
        Ok(()) => result,
        Err(err) => {
            if let Err(run_err) = &result {
                warn!(error = %run_err, "run failed before the profile error");
            }
            Err(err)
        }
    }
}

//! Peak memory while streaming a large document
//!
//! Runs in its own test binary so the counting allocator only sees this
//! scan.

use std::alloc::{GlobalAlloc, Layout, System};
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

use xmlsplit::{ExtractOptions, Fragments};

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
            PEAK_ALLOCATED.fetch_max(current, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

fn reset_peak() -> usize {
    let current = ALLOCATED.load(Ordering::SeqCst);
    PEAK_ALLOCATED.store(current, Ordering::SeqCst);
    current
}

/// Generates `<feed><entry>...</entry>...</feed>` on the fly
struct FeedGenerator {
    entries: usize,
    /// Put a stray `<'` in the first entry's title
    malformed: bool,
    next: usize,
    pending: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl FeedGenerator {
    fn new(entries: usize, malformed: bool) -> Self {
        Self {
            entries,
            malformed,
            next: 0,
            pending: b"<feed>".to_vec(),
            pos: 0,
            closed: false,
        }
    }

    fn entry(i: usize, malformed: bool) -> String {
        let title = if malformed { "Entry <'quoted" } else { "Entry" };
        format!(
            "<entry id=\"{i}\"><title>{title} {i}</title><body lang=\"en\">{}</body></entry>\n",
            "lorem ipsum &amp; dolor sit amet ".repeat(4)
        )
    }
}

impl Read for FeedGenerator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            self.pending.clear();
            self.pos = 0;
            if self.next < self.entries {
                let malformed = self.malformed && self.next == 0;
                self.pending
                    .extend_from_slice(Self::entry(self.next, malformed).as_bytes());
                self.next += 1;
            } else if !self.closed {
                self.pending.extend_from_slice(b"</feed>");
                self.closed = true;
            } else {
                return Ok(0);
            }
        }
        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Stream the feed, returning (fragments, bytes of fragments, peak allocation)
fn stream_feed(entries: usize, malformed: bool) -> (usize, usize, usize) {
    let baseline = reset_peak();
    let stream = Fragments::from_reader(
        FeedGenerator::new(entries, malformed),
        "entry",
        ExtractOptions::default(),
    )
    .unwrap();

    let mut count = 0;
    let mut total = 0;
    for fragment in stream {
        let fragment = fragment.unwrap();
        assert!(fragment.starts_with("<entry id=\""));
        total += fragment.len();
        count += 1;
    }

    let peak = PEAK_ALLOCATED.load(Ordering::SeqCst) - baseline;
    (count, total, peak)
}

// Both feeds run in one test: the allocator counters are process-wide
#[test]
fn test_peak_memory_is_bounded() {
    // About 20 MB of XML each
    let entries = 100_000;
    let expected_len = FeedGenerator::entry(1, false).len() - 1;

    for malformed in [false, true] {
        let (count, total, peak) = stream_feed(entries, malformed);
        assert_eq!(count, entries, "malformed: {malformed}");
        assert!(total > entries * expected_len / 2, "malformed: {malformed}");
        assert!(
            peak < 1024 * 1024,
            "peak allocation {peak} bytes, malformed: {malformed}"
        );
    }
}

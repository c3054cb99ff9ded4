use std::fs;
use std::io;
use std::mem;
use std::ops;
use std::str;
use std::sync::OnceLock;

use libc::c_int;
use membrane_address::{align_up, Address, Region};

const PROC_SELF_MAPS: &str = "/proc/self/maps";
const MAPS_BUFFER_SIZE: usize = 4096;
const FALLBACK_PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

/// Size of the SysV shared memory segment `shmid`, rounded up to whole pages. Returns 0 if the
/// segment cannot be queried.
pub fn shm_segment_size(shmid: c_int) -> usize {
    let mut info: libc::shmid_ds = unsafe { mem::zeroed() };

    if unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut info) } != 0 {
        return 0;
    }

    align_up(info.shm_segsz as usize, page_size())
}

/// Number of bytes from `address` to the end of the mapping containing it, or 0 if `address` is
/// not mapped. Reads the kernel's mapping table without touching the heap.
pub fn mapping_size(address: Address) -> usize {
    match fs::File::open(PROC_SELF_MAPS) {
        Ok(file) => mapping_size_in(MapsReader::new(file), address),
        Err(_) => 0,
    }
}

pub fn mapping_size_in<R: io::Read>(mut reader: MapsReader<R>, address: Address) -> usize {
    while let Some(region) = reader.next_region() {
        if region.contains(address) {
            return region.end().as_usize() - address.as_usize();
        }
    }

    0
}

/// Line reader over a `/proc/<pid>/maps` style table using a fixed-size buffer.
pub struct MapsReader<R> {
    source: R,
    buffer: [u8; MAPS_BUFFER_SIZE],
    start: usize,
    end: usize,
    exhausted: bool,
    discarding: bool,
}

impl<R: io::Read> MapsReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: [0; MAPS_BUFFER_SIZE],
            start: 0,
            end: 0,
            exhausted: false,
            discarding: false,
        }
    }

    /// Yields the address range of the next well-formed entry, skipping lines that don't parse.
    pub fn next_region(&mut self) -> Option<Region> {
        loop {
            let line = self.next_line()?;
            if let Some(region) = parse_region(&self.buffer[line]) {
                return Some(region);
            }
        }
    }

    fn next_line(&mut self) -> Option<ops::Range<usize>> {
        loop {
            let pending = &self.buffer[self.start..self.end];
            if let Some(position) = pending.iter().position(|b| *b == b'\n') {
                let line = self.start..self.start + position;
                self.start += position + 1;

                if self.discarding {
                    self.discarding = false;
                    continue;
                }

                return Some(line);
            }

            if self.exhausted {
                if self.start < self.end && !self.discarding {
                    let line = self.start..self.end;
                    self.start = self.end;
                    return Some(line);
                }

                return None;
            }

            self.buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;

            // Only the leading range of an entry matters, so an overlong line is handed out
            // truncated and its tail is dropped.
            if self.end == self.buffer.len() {
                self.start = self.end;
                if self.discarding {
                    continue;
                }
                self.discarding = true;
                return Some(0..self.end);
            }

            self.fill();
        }
    }

    fn fill(&mut self) {
        loop {
            match self.source.read(&mut self.buffer[self.end..]) {
                Ok(0) => self.exhausted = true,
                Ok(read) => self.end += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => self.exhausted = true,
            }

            return;
        }
    }
}

/// Parses the `start-end` prefix of a maps entry.
pub fn parse_region(line: &[u8]) -> Option<Region> {
    let dash = line.iter().position(|b| *b == b'-')?;
    let rest = &line[dash + 1..];
    let space = rest.iter().position(|b| *b == b' ').unwrap_or(rest.len());

    let start = parse_hex(&line[..dash])?;
    let end = parse_hex(&rest[..space])?;
    if end < start {
        return None;
    }

    Some(Region::new(start, end - start))
}

fn parse_hex(digits: &[u8]) -> Option<usize> {
    let digits = str::from_utf8(digits).ok()?;
    usize::from_str_radix(digits, 16).ok()
}

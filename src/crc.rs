//! Incremental CRC sessions
//!
//! A [`CrcSession`] consumes bytes in any number of `put` calls and can report
//! `(checksum, total length)` at any point. CRC-32 is the ZIP checksum and is
//! backed by `crc32fast`; CRC-24 is the OpenPGP variant.

use crc32fast::Hasher;

/// Incremental checksum accumulator.
pub trait CrcSession {
    /// Feed `data` into the checksum.
    fn put(&mut self, data: &[u8]);

    /// `(checksum, bytes consumed so far)`
    fn result(&self) -> (u32, u64);

    /// Start over as if nothing had been fed.
    fn reset(&mut self);
}

/// CRC-32 (IEEE 802.3, as used by ZIP)
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: Hasher,
    length: u64,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot checksum of `data`
    pub fn checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

impl CrcSession for Crc32 {
    fn put(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.length = self.length.saturating_add(data.len() as u64);
    }

    fn result(&self) -> (u32, u64) {
        (self.hasher.clone().finalize(), self.length)
    }

    fn reset(&mut self) {
        self.hasher.reset();
        self.length = 0;
    }
}

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0086_4CFB;
const CRC24_MASK: u32 = 0x00FF_FFFF;

const CRC24_TABLE: [u32; 256] = build_crc24_table();

const fn build_crc24_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
            bit += 1;
        }
        table[i] = crc & CRC24_MASK;
        i += 1;
    }
    table
}

/// CRC-24 (OpenPGP, polynomial 0x864CFB, initial value 0xB704CE)
#[derive(Clone)]
pub struct Crc24 {
    state: u32,
    length: u64,
}

impl Crc24 {
    pub fn new() -> Self {
        Self {
            state: CRC24_INIT,
            length: 0,
        }
    }

    /// One-shot checksum of `data`
    pub fn checksum(data: &[u8]) -> u32 {
        let mut session = Self::new();
        session.put(data);
        session.result().0
    }
}

impl Default for Crc24 {
    fn default() -> Self {
        Self::new()
    }
}

impl CrcSession for Crc24 {
    fn put(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            let index = (((crc >> 16) ^ byte as u32) & 0xFF) as usize;
            crc = ((crc << 8) ^ CRC24_TABLE[index]) & CRC24_MASK;
        }
        self.state = crc;
        self.length = self.length.saturating_add(data.len() as u64);
    }

    fn result(&self) -> (u32, u64) {
        (self.state, self.length)
    }

    fn reset(&mut self) {
        self.state = CRC24_INIT;
        self.length = 0;
    }
}

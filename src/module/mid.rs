//! Typed module identity and serial-number generation.
//!
//! A module id carries a role letter (`D`/`A`/`P`), a decimal serial, and an
//! optional network address, rendered as `<letter><serial>` or
//! `<letter><serial>|<ip:port>`. The wire form only shows up in logs and
//! summary JSON, but it must round-trip.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::error::CrawlerError;

/// The role of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    Downloader,
    Analyzer,
    Pipeline,
}

impl ModuleType {
    /// The id letter for this role.
    pub fn letter(&self) -> char {
        match self {
            ModuleType::Downloader => 'D',
            ModuleType::Analyzer => 'A',
            ModuleType::Pipeline => 'P',
        }
    }

    /// The role for an id letter, if the letter is legal.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'D' => Some(ModuleType::Downloader),
            'A' => Some(ModuleType::Analyzer),
            'P' => Some(ModuleType::Pipeline),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleType::Downloader => "downloader",
            ModuleType::Analyzer => "analyzer",
            ModuleType::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// A module id: role letter, serial number, optional network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mid {
    mtype: ModuleType,
    sn: u64,
    addr: Option<SocketAddr>,
}

impl Mid {
    /// Builds an id from its parts.
    pub fn new(mtype: ModuleType, sn: u64, addr: Option<SocketAddr>) -> Self {
        Mid { mtype, sn, addr }
    }

    pub fn module_type(&self) -> ModuleType {
        self.mtype
    }

    pub fn sn(&self) -> u64 {
        self.sn
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// The network address in string form, empty when the module is local.
    pub fn addr_string(&self) -> String {
        self.addr.map(|a| a.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(addr) => write!(f, "{}{}|{}", self.mtype.letter(), self.sn, addr),
            None => write!(f, "{}{}", self.mtype.letter(), self.sn),
        }
    }
}

impl FromStr for Mid {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() <= 1 {
            return Err(CrawlerError::illegal_parameter(format!(
                "insufficient MID: {s:?}"
            )));
        }
        let letter = match s.chars().next() {
            Some(letter) => letter,
            None => {
                return Err(CrawlerError::illegal_parameter(format!(
                    "insufficient MID: {s:?}"
                )))
            }
        };
        let mtype = ModuleType::from_letter(letter).ok_or_else(|| {
            CrawlerError::illegal_parameter(format!("illegal module type letter: {letter}"))
        })?;
        let rest = &s[letter.len_utf8()..];
        let (sn_str, addr_str) = match rest.rsplit_once('|') {
            Some((sn, addr)) => (sn, Some(addr)),
            None => (rest, None),
        };
        let sn = sn_str.parse::<u64>().map_err(|_| {
            CrawlerError::illegal_parameter(format!("illegal module SN: {sn_str}"))
        })?;
        let addr = match addr_str {
            Some(addr) => Some(addr.parse::<SocketAddr>().map_err(|_| {
                CrawlerError::illegal_parameter(format!("illegal module address: {addr}"))
            })?),
            None => None,
        };
        Ok(Mid { mtype, sn, addr })
    }
}

impl Serialize for Mid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Generates module serial numbers, wrapping from `max` back to `start`.
#[derive(Debug)]
pub struct SnGenerator {
    start: u64,
    max: u64,
    // next and cycle_count have to move together on wraparound.
    state: Mutex<SnState>,
}

#[derive(Debug)]
struct SnState {
    next: u64,
    cycle_count: u64,
}

impl SnGenerator {
    /// Creates a generator starting at `start`. A `max` of zero means the
    /// full `u64` range.
    pub fn new(start: u64, max: u64) -> Self {
        let max = if max == 0 { u64::MAX } else { max };
        SnGenerator {
            start,
            max,
            state: Mutex::new(SnState {
                next: start,
                cycle_count: 0,
            }),
        }
    }

    /// The smallest serial this generator yields.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The largest serial this generator yields.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// The serial the next `get` will return.
    pub fn next(&self) -> u64 {
        self.state.lock().next
    }

    /// How many times the generator has wrapped around.
    pub fn cycle_count(&self) -> u64 {
        self.state.lock().cycle_count
    }

    /// Returns a serial and advances the generator.
    pub fn get(&self) -> u64 {
        let mut state = self.state.lock();
        let id = state.next;
        if id == self.max {
            state.next = self.start;
            state.cycle_count += 1;
        } else {
            state.next += 1;
        }
        id
    }
}

impl Default for SnGenerator {
    fn default() -> Self {
        SnGenerator::new(1, 0)
    }
}

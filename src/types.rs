use derive_more::{Display, From, Into};
use serde::Deserialize;
use std::num::ParseIntError;
use std::str::FromStr;

/// Size in bytes of the local read buffer bound to each per-CPU perf ring.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, From, Into, Display,
)]
#[repr(transparent)]
pub struct BufferSize(pub usize);

impl BufferSize {
    /// Number of pages to request from the kernel.
    ///
    /// Perf rings must be a power-of-two number of pages, so the byte size is
    /// rounded up to whole pages and then to the next power of two.
    pub fn page_count(self, page_size: usize) -> Option<usize> {
        if self.0 == 0 || page_size == 0 {
            return None;
        }
        let pages = self.0.div_ceil(page_size);
        pages.checked_next_power_of_two()
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        BufferSize(page_size())
    }
}

impl FromStr for BufferSize {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BufferSize(s.trim().parse::<usize>()?))
    }
}

/// Maximum number of bytes captured per packet.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, From, Into, Display,
)]
#[repr(transparent)]
pub struct Snaplen(pub u32);

impl Default for Snaplen {
    fn default() -> Self {
        Snaplen(262144)
    }
}

impl FromStr for Snaplen {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Snaplen(s.trim().parse::<u32>()?))
    }
}

/// Resolution of the sub-second field in emitted capture frames.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    #[default]
    #[display(fmt = "micro")]
    Micro,
    #[display(fmt = "nano")]
    Nano,
}

impl TimestampUnit {
    /// Divisor applied to the nanosecond component of a timestamp.
    pub const fn scale(self) -> u32 {
        match self {
            TimestampUnit::Micro => 1000,
            TimestampUnit::Nano => 1,
        }
    }
}

impl FromStr for TimestampUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "micro" | "us" => Ok(TimestampUnit::Micro),
            "nano" | "ns" => Ok(TimestampUnit::Nano),
            other => Err(format!(
                "unknown timestamp unit '{other}', expected 'micro' or 'nano'"
            )),
        }
    }
}

pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn page_count_rounds_to_power_of_two() {
        assert_eq!(BufferSize(0).page_count(4096), None);
        assert_eq!(BufferSize(1).page_count(4096), Some(1));
        assert_eq!(BufferSize(4096).page_count(4096), Some(1));
        assert_eq!(BufferSize(4097).page_count(4096), Some(2));
        assert_eq!(BufferSize(3 * 4096).page_count(4096), Some(4));
        assert_eq!(BufferSize(64 * 4096).page_count(4096), Some(64));
    }

    #[test]
    fn timestamp_unit_parse() {
        assert_eq!("micro".parse::<TimestampUnit>(), Ok(TimestampUnit::Micro));
        assert_eq!(" NS ".parse::<TimestampUnit>(), Ok(TimestampUnit::Nano));
        assert!("milli".parse::<TimestampUnit>().is_err());
        assert_eq!(TimestampUnit::default().scale(), 1000);
        assert_eq!(TimestampUnit::Nano.scale(), 1);
    }
}

//! Mirrors captured packets into a classic pcap per-packet stream.
//!
//! Every frame is a 16-byte little-endian header
//! `{ts_sec: u32, ts_frac: u32, incl_len: u32, orig_len: u32}` followed by
//! `incl_len` bytes of packet data. The header and the payload are two
//! independent writes: if the payload write fails the header has already
//! been emitted, and the stream is left holding a partial frame. Callers must
//! not retry mid-frame.

use crate::config::ReplayConfig;
use crate::error::Error;
use crate::types::{Snaplen, TimestampUnit};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const FRAME_HEADER_SIZE: usize = 16;

/// Size of the classic pcap file header.
pub const FILE_HEADER_SIZE: usize = 24;
pub const PCAP_MAGIC_MICROS: u32 = 0xa1b2_c3d4;
pub const PCAP_MAGIC_NANOS: u32 = 0xa1b2_3c4d;
pub const LINKTYPE_ETHERNET: u32 = 1;

/// Metadata describing one captured packet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureInfo {
    /// Capture time, `None` means "stamp with the time of the write".
    pub timestamp: Option<SystemTime>,
    /// Number of bytes actually captured.
    pub capture_length: u32,
    /// Length of the packet on the wire, may exceed `capture_length`.
    pub length: u32,
}

/// A single-writer sink for raw frame bytes.
pub trait PacketWriter {
    fn write_packet_data(&mut self, data: &[u8]) -> Result<(), Error>;
}

/// Serializes captured packets into timestamped frames.
///
/// Not internally synchronized; concurrent writers must serialize access.
#[derive(Debug)]
pub struct CaptureReplayEncoder<W> {
    writer: W,
    buf: [u8; FRAME_HEADER_SIZE],
    unit: TimestampUnit,
}

impl CaptureReplayEncoder<LivePacketWriter> {
    /// Open a live capture handle on `iface` and encode microsecond frames into it.
    pub fn open_live(iface: &str, snaplen: Snaplen) -> Result<Self, Error> {
        Ok(Self::new(LivePacketWriter::open(iface, snaplen)?))
    }

    pub fn from_config(cfg: &ReplayConfig, iface: &str) -> Result<Self, Error> {
        let mut enc = Self::open_live(iface, cfg.snaplen)?;
        enc.set_timestamp_unit(cfg.timestamp_unit);
        Ok(enc)
    }
}

impl<W: io::Write> CaptureReplayEncoder<PcapFileWriter<W>> {
    /// Encode into a pcap file whose global header matches the encoder's timestamp unit.
    pub fn pcap_file(
        inner: W,
        unit: TimestampUnit,
        snaplen: Snaplen,
        link_type: u32,
    ) -> Result<Self, Error> {
        let mut enc = Self::new(PcapFileWriter::new(inner, unit, snaplen, link_type)?);
        enc.set_timestamp_unit(unit);
        Ok(enc)
    }
}

impl<W: PacketWriter> CaptureReplayEncoder<W> {
    pub fn new(writer: W) -> Self {
        CaptureReplayEncoder {
            writer,
            buf: [0; FRAME_HEADER_SIZE],
            unit: TimestampUnit::Micro,
        }
    }

    /// Encode sub-second fractions as microseconds for subsequent writes.
    pub fn set_scale_micro(&mut self) {
        self.unit = TimestampUnit::Micro;
    }

    /// Encode sub-second fractions as nanoseconds for subsequent writes.
    pub fn set_scale_nano(&mut self) {
        self.unit = TimestampUnit::Nano;
    }

    pub fn set_timestamp_unit(&mut self, unit: TimestampUnit) {
        self.unit = unit;
    }

    pub fn timestamp_unit(&self) -> TimestampUnit {
        self.unit
    }

    /// Write one frame: the header, then the packet bytes.
    ///
    /// A header failure returns before the payload is attempted. A payload
    /// failure leaves the header written.
    pub fn write(&mut self, ci: &CaptureInfo, data: &[u8]) -> Result<(), Error> {
        self.write_frame_header(ci)?;
        self.writer.write_packet_data(data)
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame_header(&mut self, ci: &CaptureInfo) -> Result<(), Error> {
        let ts = ci.timestamp.unwrap_or_else(SystemTime::now);
        let since_epoch = ts
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::TimestampBeforeEpoch)?;

        // Classic pcap seconds are 32 bits wide
        let secs = since_epoch.as_secs() as u32;
        let frac = since_epoch.subsec_nanos() / self.unit.scale();

        self.buf[0..4].copy_from_slice(&secs.to_le_bytes());
        self.buf[4..8].copy_from_slice(&frac.to_le_bytes());
        self.buf[8..12].copy_from_slice(&ci.capture_length.to_le_bytes());
        self.buf[12..16].copy_from_slice(&ci.length.to_le_bytes());
        self.writer.write_packet_data(&self.buf)
    }
}

/// Injects frame bytes into a live capture handle, one send per write.
pub struct LivePacketWriter {
    handle: pcap::Capture<pcap::Active>,
}

impl LivePacketWriter {
    /// Promiscuous, with `snaplen` bytes per packet and no read timeout.
    pub fn open(iface: &str, snaplen: Snaplen) -> Result<Self, Error> {
        let handle = pcap::Capture::from_device(iface)?
            .promisc(true)
            .snaplen(i32::try_from(snaplen.0).unwrap_or(i32::MAX))
            .timeout(0)
            .open()?;
        debug!(iface, %snaplen, "Opened live capture handle");
        Ok(LivePacketWriter { handle })
    }
}

impl std::fmt::Debug for LivePacketWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePacketWriter").finish_non_exhaustive()
    }
}

impl PacketWriter for LivePacketWriter {
    fn write_packet_data(&mut self, data: &[u8]) -> Result<(), Error> {
        Ok(self.handle.sendpacket(data)?)
    }
}

/// Writes frames to any [`io::Write`] after a classic pcap file header.
#[derive(Debug)]
pub struct PcapFileWriter<W> {
    inner: W,
}

impl<W: io::Write> PcapFileWriter<W> {
    pub fn new(
        mut inner: W,
        unit: TimestampUnit,
        snaplen: Snaplen,
        link_type: u32,
    ) -> Result<Self, Error> {
        let magic = match unit {
            TimestampUnit::Micro => PCAP_MAGIC_MICROS,
            TimestampUnit::Nano => PCAP_MAGIC_NANOS,
        };
        let mut hdr = [0_u8; FILE_HEADER_SIZE];
        hdr[0..4].copy_from_slice(&magic.to_le_bytes());
        hdr[4..6].copy_from_slice(&2_u16.to_le_bytes());
        hdr[6..8].copy_from_slice(&4_u16.to_le_bytes());
        // thiszone and sigfigs stay zero
        hdr[16..20].copy_from_slice(&snaplen.0.to_le_bytes());
        hdr[20..24].copy_from_slice(&link_type.to_le_bytes());
        inner.write_all(&hdr)?;
        Ok(PcapFileWriter { inner })
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        Ok(self.inner.flush()?)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> PacketWriter for PcapFileWriter<W> {
    fn write_packet_data(&mut self, data: &[u8]) -> Result<(), Error> {
        Ok(self.inner.write_all(data)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Records each write attempt and optionally fails the Nth one (0-based).
    #[derive(Debug, Default)]
    struct RecordingWriter {
        attempts: Vec<Vec<u8>>,
        fail_at: Option<usize>,
    }

    impl PacketWriter for RecordingWriter {
        fn write_packet_data(&mut self, data: &[u8]) -> Result<(), Error> {
            let n = self.attempts.len();
            self.attempts.push(data.to_vec());
            if self.fail_at == Some(n) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected").into());
            }
            Ok(())
        }
    }

    fn u32_at(b: &[u8], off: usize) -> u32 {
        u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
    }

    fn at(secs: u64, nanos: u32) -> Option<SystemTime> {
        Some(UNIX_EPOCH + Duration::new(secs, nanos))
    }

    #[test]
    fn frame_layout() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter::default());
        let data = [0xde, 0xad, 0xbe, 0xef, 0x01];
        let ci = CaptureInfo {
            timestamp: at(1_700_000_000, 123_456_789),
            capture_length: data.len() as u32,
            length: 1514,
        };
        enc.write(&ci, &data).unwrap();

        let w = enc.into_inner();
        assert_eq!(w.attempts.len(), 2);
        let hdr = &w.attempts[0];
        assert_eq!(hdr.len(), FRAME_HEADER_SIZE);
        assert_eq!(u32_at(hdr, 0), 1_700_000_000);
        assert_eq!(u32_at(hdr, 4), 123_456);
        assert_eq!(u32_at(hdr, 8), 5);
        assert_eq!(u32_at(hdr, 12), 1514);
        assert_eq!(w.attempts[1], data.to_vec());
        assert_eq!(
            w.attempts.iter().map(Vec::len).sum::<usize>(),
            FRAME_HEADER_SIZE + data.len()
        );
    }

    #[test]
    fn scale_switch_is_not_retroactive() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter::default());
        let ci = CaptureInfo {
            timestamp: at(10, 987_654_321),
            capture_length: 0,
            length: 0,
        };
        assert_eq!(enc.timestamp_unit(), TimestampUnit::Micro);
        enc.write(&ci, &[]).unwrap();
        enc.set_scale_nano();
        enc.write(&ci, &[]).unwrap();
        enc.set_scale_micro();
        enc.write(&ci, &[]).unwrap();

        let w = enc.into_inner();
        assert_eq!(u32_at(&w.attempts[0], 4), 987_654);
        assert_eq!(u32_at(&w.attempts[2], 4), 987_654_321);
        assert_eq!(u32_at(&w.attempts[4], 4), 987_654);
    }

    #[test]
    fn unset_timestamp_uses_now() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter::default());
        enc.write(&CaptureInfo::default(), &[]).unwrap();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let secs = u32_at(&enc.get_ref().attempts[0], 0) as i64;
        assert!((now - secs).abs() <= 5, "now {now}, header {secs}");
    }

    #[test]
    fn header_failure_skips_payload() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter {
            fail_at: Some(0),
            ..Default::default()
        });
        let ci = CaptureInfo {
            timestamp: at(1, 0),
            capture_length: 3,
            length: 3,
        };
        assert!(enc.write(&ci, &[1, 2, 3]).is_err());
        assert_eq!(enc.get_ref().attempts.len(), 1);
    }

    #[test]
    fn payload_failure_leaves_header_written() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter {
            fail_at: Some(1),
            ..Default::default()
        });
        let ci = CaptureInfo {
            timestamp: at(1, 0),
            capture_length: 3,
            length: 3,
        };
        assert!(matches!(enc.write(&ci, &[1, 2, 3]), Err(Error::Io(_))));
        let w = enc.into_inner();
        assert_eq!(w.attempts.len(), 2);
        assert_eq!(w.attempts[0].len(), FRAME_HEADER_SIZE);
    }

    #[test]
    fn timestamp_before_epoch() {
        let mut enc = CaptureReplayEncoder::new(RecordingWriter::default());
        let ci = CaptureInfo {
            timestamp: Some(UNIX_EPOCH - Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(matches!(
            enc.write(&ci, &[]),
            Err(Error::TimestampBeforeEpoch)
        ));
        assert!(enc.get_ref().attempts.is_empty());
    }

    #[test]
    fn pcap_file_stream() {
        let mut enc = CaptureReplayEncoder::pcap_file(
            Vec::new(),
            TimestampUnit::Nano,
            Snaplen(65535),
            LINKTYPE_ETHERNET,
        )
        .unwrap();
        let ci = CaptureInfo {
            timestamp: at(2, 5),
            capture_length: 2,
            length: 60,
        };
        enc.write(&ci, &[0xaa, 0xbb]).unwrap();

        let out = enc.into_inner().into_inner();
        assert_eq!(out.len(), FILE_HEADER_SIZE + FRAME_HEADER_SIZE + 2);
        assert_eq!(u32_at(&out, 0), PCAP_MAGIC_NANOS);
        assert_eq!(&out[4..8], &[2, 0, 4, 0]);
        assert_eq!(u32_at(&out, 16), 65535);
        assert_eq!(u32_at(&out, 20), LINKTYPE_ETHERNET);

        let frame = &out[FILE_HEADER_SIZE..];
        assert_eq!(u32_at(frame, 0), 2);
        assert_eq!(u32_at(frame, 4), 5);
        assert_eq!(u32_at(frame, 8), 2);
        assert_eq!(u32_at(frame, 12), 60);
        assert_eq!(&frame[FRAME_HEADER_SIZE..], &[0xaa, 0xbb]);
    }
}

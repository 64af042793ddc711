//! Binding to the kernel's per-CPU perf event array.
//!
//! The probes write log records into a `BPF_MAP_TYPE_PERF_EVENT_ARRAY` that is
//! pinned by the loader. Each online CPU gets its own ring, so one reader task
//! per CPU drains its ring and forwards events into a shared [`EventChannel`].

use crate::error::Error;
use crate::record::LOG_RECORD_SIZE;
use crate::ring::{EventChannel, EventFeeder, RawEvent, ReadError};
use crate::types::{page_size, BufferSize};
use aya::maps::perf::{AsyncPerfEventArray, AsyncPerfEventArrayBuffer, Events};
use aya::maps::{Map, MapData};
use aya::util::online_cpus;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tracing::debug;

/// Number of samples drained from a CPU ring per wakeup.
const EVENTS_PER_READ: usize = 16;

/// Open the perf event array pinned at `path` and start draining it.
///
/// Must be called from within a tokio runtime.
pub fn open_pinned<P: AsRef<Path>>(
    path: P,
    buffer_size: BufferSize,
) -> Result<EventChannel, Error> {
    let map = MapData::from_pin(path.as_ref())?;
    open(Map::PerfEventArray(map), buffer_size)
}

/// Start one reader task per online CPU for the given perf event array map.
pub fn open(map: Map, buffer_size: BufferSize) -> Result<EventChannel, Error> {
    let pages = buffer_size
        .page_count(page_size())
        .ok_or(Error::InvalidBufferSize(buffer_size))?;
    let mut array = AsyncPerfEventArray::try_from(map)?;
    let cpus = online_cpus().map_err(|(msg, source)| Error::OnlineCpus { msg, source })?;

    // Bind every CPU ring before spawning so a failure leaves nothing running
    let buffers = cpus
        .into_iter()
        .map(|cpu| array.open(cpu, Some(pages)).map(|buf| (cpu, buf)))
        .collect::<Result<Vec<_>, _>>()?;

    let (feeder, channel) = EventChannel::new(buffers.len() * EVENTS_PER_READ);
    debug!(cpus = buffers.len(), pages, "Bound perf buffers");
    for (cpu, buf) in buffers {
        tokio::spawn(drain_cpu(cpu, buf, feeder.clone()));
    }

    Ok(channel)
}

async fn drain_cpu(
    cpu: u32,
    mut buf: AsyncPerfEventArrayBuffer<MapData>,
    mut feeder: EventFeeder,
) {
    let mut buffers = (0..EVENTS_PER_READ)
        .map(|_| BytesMut::with_capacity(LOG_RECORD_SIZE))
        .collect::<Vec<_>>();

    'read: loop {
        let res = tokio::select! {
            biased;
            _ = feeder.closed() => break 'read,
            res = buf.read_events(&mut buffers) => res,
        };

        let Events { read, lost } = match res {
            Ok(events) => events,
            Err(source) => {
                let _ = feeder.send(Err(ReadError::Perf { cpu, source })).await;
                break 'read;
            }
        };

        if lost > 0 && !feeder.send(Ok(RawEvent::Lost(lost as u64))).await {
            break 'read;
        }

        for sample in buffers.iter_mut().take(read) {
            let raw = Bytes::copy_from_slice(sample);
            sample.clear();
            if !feeder.send(Ok(RawEvent::Sample(raw))).await {
                break 'read;
            }
        }
    }

    debug!(cpu, "Perf buffer reader exited");
}

use {
    bytes::BytesMut,
    std::sync::{Arc, Mutex, MutexGuard},
    xmpegts::define::ts::{TS_PACKET_SIZE, TS_SYNC_BYTE},
};

/// Consecutive sync bytes that must line up before a position counts as a
/// packet boundary.
const RESYNC_CHECK_PACKETS: usize = 5;

fn find_sync_offset(data: &[u8]) -> Option<usize> {
    let need = TS_PACKET_SIZE * (RESYNC_CHECK_PACKETS - 1) + 1;
    (0..TS_PACKET_SIZE)
        .take_while(|start| start + need <= data.len())
        .find(|start| {
            (0..RESYNC_CHECK_PACKETS).all(|k| data[start + k * TS_PACKET_SIZE] == TS_SYNC_BYTE)
        })
}

struct RingState {
    data: BytesMut,
    capacity: usize,
    overflow: u64,
}

/// Bounded byte queue between a receiver callback, which may run on any
/// thread, and the TS worker. Reads always hand out whole packets starting
/// at a sync byte.
#[derive(Clone)]
pub struct TsRingBuffer {
    state: Arc<Mutex<RingState>>,
}

impl TsRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(TS_PACKET_SIZE * RESYNC_CHECK_PACKETS);
        Self {
            state: Arc::new(Mutex::new(RingState {
                data: BytesMut::with_capacity(capacity),
                capacity,
                overflow: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends as much of `data` as fits and returns how many bytes were
    /// taken. The rest is dropped.
    pub fn put(&self, data: &[u8]) -> usize {
        let mut state = self.lock();
        let free = state.capacity - state.data.len();
        let count = data.len().min(free);
        state.data.extend_from_slice(&data[..count]);

        if count < data.len() {
            state.overflow += (data.len() - count) as u64;
            log::warn!(
                "ts ring buffer overflow, dropped {} bytes ({} total)",
                data.len() - count,
                state.overflow
            );
        }
        count
    }

    /// Takes up to `max_packets` aligned packets, `None` when not even one
    /// is available.
    pub fn get(&self, max_packets: usize) -> Option<BytesMut> {
        let mut state = self.lock();

        if state.data.first().copied() != Some(TS_SYNC_BYTE) {
            match find_sync_offset(&state.data) {
                Some(offset) => {
                    log::debug!("ts ring buffer resync, dropping {} bytes", offset);
                    let _ = state.data.split_to(offset);
                }
                None => {
                    //keep the tail so a boundary can still be found later
                    let len = state.data.len();
                    if len >= TS_PACKET_SIZE * RESYNC_CHECK_PACKETS {
                        let _ = state.data.split_to(len - TS_PACKET_SIZE);
                    }
                    return None;
                }
            }
        }

        let packets = (state.data.len() / TS_PACKET_SIZE).min(max_packets);
        if packets == 0 {
            return None;
        }
        Some(state.data.split_to(packets * TS_PACKET_SIZE))
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().data.clear();
    }
}

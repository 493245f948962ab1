use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SAMPLE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_VOICE_HANDLE: AtomicU64 = AtomicU64::new(1);

// identifies a buffer registered with the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(pub u64);

// identifies one triggered voice; handles only ever increase, so a lower handle is an older voice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u64);

// fancy atomic counters let us generate unique ids from any thread
pub fn next_sample_id() -> SampleId {
    SampleId(NEXT_SAMPLE_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn next_voice_handle() -> VoiceHandle {
    VoiceHandle(NEXT_VOICE_HANDLE.fetch_add(1, Ordering::Relaxed))
}

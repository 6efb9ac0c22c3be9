/// Current wall-clock time as Unix epoch milliseconds. This is the clock
/// shared with clients via the `startAt` countdown anchor.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

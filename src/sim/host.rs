use super::SimChip;

/// The world around a [super::Simulator]: audio output, keyboard and persistence.
///
/// Every method has a no-op default.
pub trait SimHost: Send {
    /// Called at the start of every frame, before any chip is evaluated.
    fn begin_frame(&mut self) {}

    /// Called once per frame by every buzzer with its pitch index and volume.
    fn register_note(&mut self, _frequency_index: u32, _volume: u32) {}

    /// Called at the end of every frame, and of every paused update, with the wall clock time
    /// elapsed since the previous call.
    fn end_frame(&mut self, _delta_secs: f64) {}

    /// Called when an EEPROM has been written to during simulation.
    fn rom_contents_edited(&mut self, _chip: &SimChip) {}

    /// Returns true while the keyboard key `key` is held.
    fn key_is_held(&self, _key: char) -> bool {
        false
    }
}

/// A host that ignores everything.
#[derive(Debug, Default, Copy, Clone)]
pub struct NullHost;
impl SimHost for NullHost {}

use super::{ChipIndex, Circuit, Simulator};
use crate::data_structures::BitState;
use indexmap::IndexMap;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

const NO_FRAME: u64 = u64::MAX;
/// Combinations evaluated between progress updates.
const PROGRESS_STRIDE: usize = 256;

/// Precomputed outputs of a combinational chip for every combination of its input bits.
///
/// Inputs are concatenated with the first input pin in the lowest bits, every cell holds the
/// packed (value, tristate) representation of one output, see [BitState::to_short].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    num_input_bits: usize,
    num_outputs: usize,
    cells: Vec<u32>,
}
impl LookupTable {
    pub fn num_input_bits(&self) -> usize {
        self.num_input_bits
    }

    pub fn num_entries(&self) -> usize {
        1 << self.num_input_bits
    }

    /// Packed output states for the concatenated input `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [LookupTable::num_entries].
    pub fn outputs(&self, index: usize) -> &[u32] {
        let start = index * self.num_outputs;
        &self.cells[start..start + self.num_outputs]
    }
}

/// Caching state of one chip instance.
#[derive(Debug, Clone, Default)]
pub enum LutState {
    /// The chip hasn't been considered for caching yet.
    #[default]
    NotBuilt,
    Uncacheable,
    Ready(Arc<LookupTable>),
}

/// Lookup tables shared between the instances of a chip, keyed by chip name.
///
/// Instances edited after they were built are keyed by name and arena slot instead.
///
/// Every entry is stamped with the frame it was built in, an entry older than one of its
/// descendants' entries is stale and gets rebuilt.
#[derive(Debug, Clone, Default)]
pub struct CacheRegistry {
    entries: IndexMap<String, CacheEntry>,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub frame: u64,
    /// [None] if the chip can't be cached.
    pub table: Option<Arc<LookupTable>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: String, frame: u64, table: Option<Arc<LookupTable>>) {
        self.entries.insert(name, CacheEntry { frame, table });
    }

    /// Forgets the table of `name`, returns true if there was one.
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.entries.shift_remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returned when a lookup table build is aborted through [CacheMonitor::abort].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lookup table build aborted")]
pub struct CacheAborted;

/// Progress of lookup table builds, shared with other threads.
///
/// A build runs inside a simulation tick and can take a while, [CacheMonitor::abort] stops every
/// build of the tick that is currently running.
#[derive(Debug)]
pub struct CacheMonitor {
    current_frame: AtomicU64,
    disabled_frame: AtomicU64,
    building: AtomicBool,
    progress: AtomicU32,
    chip_name: Mutex<String>,
}
impl Default for CacheMonitor {
    fn default() -> Self {
        CacheMonitor {
            current_frame: AtomicU64::new(0),
            disabled_frame: AtomicU64::new(NO_FRAME),
            building: AtomicBool::new(false),
            progress: AtomicU32::new(0f32.to_bits()),
            chip_name: Mutex::new(String::new()),
        }
    }
}
impl CacheMonitor {
    pub fn new() -> Self {
        Default::default()
    }

    /// Aborts every lookup table build of the current frame.
    pub fn abort(&self) {
        let frame = self.current_frame.load(Ordering::SeqCst);
        self.disabled_frame.store(frame, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.disabled_frame.load(Ordering::SeqCst) == self.current_frame.load(Ordering::SeqCst)
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Fraction of the current build already evaluated, in [0, 1].
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    /// Name of the chip being built, if any.
    pub fn chip_name(&self) -> Option<String> {
        if !self.is_building() {
            return None;
        }
        let name = self.chip_name.lock().unwrap_or_else(PoisonError::into_inner);
        Some(name.clone())
    }

    pub(crate) fn set_frame(&self, frame: u64) {
        self.current_frame.store(frame, Ordering::SeqCst);
    }

    fn begin(&self, name: &str) {
        {
            let mut current = self.chip_name.lock().unwrap_or_else(PoisonError::into_inner);
            current.clear();
            current.push_str(name);
        }
        self.set_progress(0.0);
        self.building.store(true, Ordering::SeqCst);
    }

    fn set_progress(&self, progress: f32) {
        self.progress.store(progress.to_bits(), Ordering::Relaxed);
    }

    fn finish(&self) {
        self.building.store(false, Ordering::SeqCst);
        self.set_progress(1.0);
    }
}

/// Returns the key `chip` shares its lookup table under.
///
/// Unedited instances share the table of their definition, an edited instance gets its own.
pub(super) fn registry_key(circuit: &Circuit, chip: ChipIndex) -> String {
    let c = circuit.chip(chip);
    if c.edited {
        format!("{}@{}", c.name, chip)
    } else {
        c.name.clone()
    }
}

/// Makes sure `chip` and every custom chip below it have an up to date [LutState].
///
/// Returns the frame stamp of the registry entry of `chip`.
pub(super) fn calculate_lut(sim: &mut Simulator, chip: ChipIndex) -> Result<u64, CacheAborted> {
    let mut newest_descendant = 0;
    for i in 0..sim.circuit.chip(chip).sub_chips.len() {
        let sub = sim.circuit.chip(chip).sub_chips[i];
        if !sim.circuit.chip(sub).is_builtin() {
            newest_descendant = newest_descendant.max(calculate_lut(sim, sub)?);
        }
    }

    let name = registry_key(&sim.circuit, chip);
    if let Some(entry) = sim.cache.get(&name) {
        if entry.frame >= newest_descendant {
            let frame = entry.frame;
            sim.circuit.chip_mut(chip).lut = match &entry.table {
                Some(table) => LutState::Ready(table.clone()),
                None => LutState::Uncacheable,
            };
            return Ok(frame);
        }
    }

    let table = if sim.circuit.can_cache(chip, &sim.config) {
        let table = Arc::new(build_table(sim, chip)?);
        info!(
            "Built lookup table for {} ({} entries)",
            name,
            table.num_entries()
        );
        Some(table)
    } else {
        debug!("{} can't be cached", name);
        None
    };

    let frame = sim.frame;
    sim.circuit.chip_mut(chip).lut = match &table {
        Some(table) => LutState::Ready(table.clone()),
        None => LutState::Uncacheable,
    };
    sim.cache.insert(name, frame, table);
    Ok(frame)
}

/// Evaluates `chip` once for every combination of its input bits.
///
/// The input pins and their receive counters are restored afterwards, so the build is invisible to
/// the running tick.
fn build_table(sim: &mut Simulator, chip: ChipIndex) -> Result<LookupTable, CacheAborted> {
    let inputs = sim.circuit.chip(chip).inputs.clone();
    let outputs = sim.circuit.chip(chip).outputs.clone();
    let widths: Vec<usize> = inputs.iter().map(|p| sim.circuit.pin(*p).width()).collect();
    let num_input_bits: usize = widths.iter().sum();
    let num_entries = 1usize << num_input_bits;

    let saved: Vec<(BitState, usize, u64)> = inputs
        .iter()
        .map(|p| {
            let pin = sim.circuit.pin(*p);
            (
                pin.state.clone(),
                pin.num_inputs_received_this_frame,
                pin.last_updated_frame,
            )
        })
        .collect();
    let can_dynamic_reorder = sim.can_dynamic_reorder;
    sim.can_dynamic_reorder = false;
    let monitor = sim.monitor.clone();
    monitor.begin(&sim.circuit.chip(chip).name);

    let mut cells = vec![0; num_entries * outputs.len()];
    let mut result = Ok(());
    for combination in 0..num_entries {
        if monitor.is_aborted() {
            result = Err(CacheAborted);
            break;
        }
        if combination % PROGRESS_STRIDE == 0 {
            monitor.set_progress(combination as f32 / num_entries as f32);
        }

        let mut shift = 0;
        for (pin, width) in inputs.iter().zip(&widths) {
            let mask = ((1u64 << width) - 1) as u32;
            let value = (combination >> shift) as u32 & mask;
            sim.circuit.pin_mut(*pin).state.set_value(value);
            shift += width;
        }

        sim.circuit.reset_received(chip);
        if combination == 0 {
            sim.step_chip_reorder(chip);
        } else {
            sim.step_chip(chip);
        }

        let row = &mut cells[combination * outputs.len()..(combination + 1) * outputs.len()];
        for (cell, pin) in row.iter_mut().zip(&outputs) {
            *cell = sim.circuit.pin(*pin).state.to_short();
        }
    }

    sim.circuit.reset_received(chip);
    for (pin, (state, received, frame)) in inputs.iter().zip(saved) {
        let p = sim.circuit.pin_mut(*pin);
        p.state = state;
        p.num_inputs_received_this_frame = received;
        p.last_updated_frame = frame;
    }
    sim.can_dynamic_reorder = can_dynamic_reorder;
    monitor.finish();

    result.map(|_| LookupTable {
        num_input_bits,
        num_outputs: outputs.len(),
        cells,
    })
}

/// Evaluates `chip` through its lookup table, building it first if needed.
///
/// Returns false if the chip has to be simulated normally: it can't be cached, its table build
/// was aborted or one of its input bits is disconnected.
pub(super) fn try_processing_from_cache(sim: &mut Simulator, chip: ChipIndex) -> bool {
    let table = match &sim.circuit.chip(chip).lut {
        LutState::Ready(table) => table.clone(),
        LutState::Uncacheable => return false,
        LutState::NotBuilt => {
            if calculate_lut(sim, chip).is_err() {
                return false;
            }
            match &sim.circuit.chip(chip).lut {
                LutState::Ready(table) => table.clone(),
                _ => return false,
            }
        }
    };

    let c = sim.circuit.chip(chip);
    let mut index = 0usize;
    let mut shift = 0;
    for pin in &c.inputs {
        let state = &sim.circuit.pin(*pin).state;
        if state.has_tristate() {
            return false;
        }
        index |= (state.value() as usize) << shift;
        shift += state.width();
    }

    let outputs = c.outputs.clone();
    for (pin, cell) in outputs.iter().zip(table.outputs(index)) {
        sim.circuit.pin_mut(*pin).state.set_short(*cell);
    }
    true
}

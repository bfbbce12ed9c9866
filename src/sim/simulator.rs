use super::builtin::process_builtin_chip;
use super::cache::{
    registry_key, try_processing_from_cache, CacheMonitor, CacheRegistry, LutState,
};
use super::{
    ChipIndex, ChipPath, Circuit, PinAddress, SimCommand, SimCommandSender, SimConfig, SimHost,
};
use crate::data_structures::BitState;
use crate::description::{ChipDescription, ChipLibrary};
use crate::error::SimResult;
use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::sync::Arc;
use std::time::Instant;

/// Steps a [Circuit] one tick at a time.
///
/// Every tick drains the queued [SimCommand]s, copies the dev inputs into the root chip and then
/// evaluates the chip tree depth first. The first tick, and every tick after a structural edit,
/// runs a discovery pass that evaluates subchips as they become ready and records that order.
/// Every other tick replays the recorded order, occasionally perturbed at random so that race
/// conditions don't always resolve the same way.
///
/// Lookup tables of combinational custom chips are kept in a [CacheRegistry] owned by the
/// simulator. It is only touched from the simulation thread.
///
/// # Example
///
/// ```
/// # use chipsim::circuits;
/// # use chipsim::data_structures::BitState;
/// # use chipsim::sim::{NullHost, PinAddress, SimConfig, Simulator};
/// let library = circuits::library();
/// let not = library.get("NOT").unwrap();
/// let mut sim = Simulator::build(not, &library, SimConfig::seeded(1), NullHost).unwrap();
///
/// sim.set_dev_input(0, BitState::from_value(1, 1));
/// sim.run_simulation_step();
/// assert_eq!(sim.output(1).unwrap().value(), 0);
/// ```
pub struct Simulator {
    pub(super) circuit: Circuit,
    pub(super) config: SimConfig,
    pub(super) frame: u64,
    master_rng: StdRng,
    /// Re-seeded from `master_rng` at the start of every tick.
    pub(super) rng: Xoshiro256StarStar,
    pub(super) can_dynamic_reorder: bool,
    needs_order_pass: bool,
    pub(super) cache: CacheRegistry,
    pub(super) monitor: Arc<CacheMonitor>,
    pub(super) host: Box<dyn SimHost>,
    /// Externally driven states of the root input pins, by pin id.
    pub(super) dev_inputs: IndexMap<i32, BitState>,
    commands: Receiver<SimCommand>,
    sender: Sender<SimCommand>,
    last_step: Option<Instant>,
}

fn master_rng(config: &SimConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl Simulator {
    /// Returns a simulator for an already built `circuit`.
    pub fn new<H: SimHost + 'static>(circuit: Circuit, config: SimConfig, host: H) -> Simulator {
        let master_rng = master_rng(&config);
        Simulator::with_rng(circuit, config, Box::new(host), master_rng)
    }

    /// Builds `desc` and returns a simulator for it.
    ///
    /// The power-on contents of memories come from the master random generator, so a seeded
    /// configuration builds the same circuit every time.
    pub fn build<H: SimHost + 'static>(
        desc: &ChipDescription,
        library: &ChipLibrary,
        config: SimConfig,
        host: H,
    ) -> SimResult<Simulator> {
        let mut master_rng = master_rng(&config);
        let circuit = Circuit::build(desc, library, &mut master_rng)?;
        Ok(Simulator::with_rng(circuit, config, Box::new(host), master_rng))
    }

    fn with_rng(
        circuit: Circuit,
        config: SimConfig,
        host: Box<dyn SimHost>,
        mut master_rng: StdRng,
    ) -> Simulator {
        let rng = Xoshiro256StarStar::seed_from_u64(master_rng.gen());
        let (sender, commands) = unbounded();
        Simulator {
            circuit,
            config,
            frame: 0,
            master_rng,
            rng,
            can_dynamic_reorder: false,
            needs_order_pass: true,
            cache: CacheRegistry::new(),
            monitor: Arc::new(CacheMonitor::new()),
            host,
            dev_inputs: IndexMap::new(),
            commands,
            sender,
            last_step: None,
        }
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of ticks run since construction or the last [Simulator::reset].
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn cache_registry(&self) -> &CacheRegistry {
        &self.cache
    }

    /// Progress and abort handle of lookup table builds, usable from any thread.
    pub fn monitor(&self) -> Arc<CacheMonitor> {
        self.monitor.clone()
    }

    /// Returns a handle that queues commands for this simulator from any thread.
    pub fn command_sender(&self) -> SimCommandSender {
        SimCommandSender {
            sender: self.sender.clone(),
        }
    }

    pub fn set_steps_per_clock_transition(&mut self, steps: u64) {
        self.config.steps_per_clock_transition = steps;
    }

    /// Replaces the simulated tree, the next tick rediscovers the evaluation order.
    pub fn set_circuit(&mut self, circuit: Circuit) {
        self.circuit = circuit;
        self.circuit.frame = self.frame;
        self.dev_inputs.clear();
        self.cache.clear();
        self.needs_order_pass = true;
    }

    /// Sets the state the root input pin `pin_id` is driven with from the next tick on.
    pub fn set_dev_input(&mut self, pin_id: i32, state: BitState) {
        self.dev_inputs.insert(pin_id, state);
    }

    /// Returns the state of the pin at `address` inside the chip at `path`.
    pub fn pin_state(&self, path: &ChipPath, address: PinAddress) -> SimResult<&BitState> {
        let scope = self.circuit.chip_at(path)?;
        self.circuit.pin_state(scope, address)
    }

    /// Returns the state of the root pin `pin_id`.
    pub fn output(&self, pin_id: i32) -> SimResult<&BitState> {
        self.circuit.pin_state(self.circuit.root(), PinAddress::boundary(pin_id))
    }

    /// Forgets every lookup table and restarts the frame counter.
    ///
    /// Pin states and internal states are kept.
    pub fn reset(&mut self) {
        self.frame = 0;
        self.circuit.reset_frame_stamps();
        self.monitor.set_frame(0);
        self.cache.clear();
        for (_, chip) in self.circuit.chips.iter_mut() {
            chip.lut = LutState::NotBuilt;
        }
        self.needs_order_pass = true;
        self.last_step = None;
    }

    /// Forgets the lookup tables of `chip` and of every chip containing it.
    ///
    /// The edited chips no longer match their definition, so from now on they build and share
    /// tables under their own instance key. Other instances of the same definitions keep theirs.
    pub(super) fn invalidate_cache(&mut self, chip: ChipIndex) {
        let mut current = Some(chip);
        while let Some(c) = current {
            if !self.circuit.chip(c).is_builtin() {
                let sim_chip = self.circuit.chip_mut(c);
                sim_chip.lut = LutState::NotBuilt;
                sim_chip.edited = true;
                let key = registry_key(&self.circuit, c);
                if self.cache.invalidate(&key) {
                    debug!("Invalidated lookup table of {}", key);
                }
            }
            current = self.circuit.chip(c).parent;
        }
    }

    /// Applies every queued command, in order.
    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let structural = command.is_structural();
            let description = command.to_string();
            match command.apply(self) {
                Ok(()) => {
                    if structural {
                        debug!("Applied {}", description);
                        self.needs_order_pass = true;
                    }
                }
                Err(e) => warn!("Failed to apply {}: {}", description, e),
            }
        }
    }

    /// Copies the dev inputs into the root input pins, skipping pins that don't exist.
    fn inject_dev_inputs(&mut self) {
        let root = self.circuit.root();
        for (pin_id, state) in &self.dev_inputs {
            match self.circuit.find_pin(root, PinAddress::boundary(*pin_id)) {
                Ok(pin)
                    if self.circuit.pin(pin).is_input
                        && self.circuit.pin(pin).width() == state.width() =>
                {
                    self.circuit.pin_mut(pin).state.copy_from(state);
                }
                _ => trace!("Skipping dev input {}", pin_id),
            }
        }
    }

    /// Seconds since the previous tick or paused update, 0 on the first one.
    fn elapsed(&mut self) -> f64 {
        let now = Instant::now();
        let delta = self
            .last_step
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_step = Some(now);
        delta
    }

    /// Runs one tick.
    pub fn run_simulation_step(&mut self) {
        self.apply_commands();

        self.rng = Xoshiro256StarStar::seed_from_u64(self.master_rng.gen());
        self.can_dynamic_reorder =
            self.config.reorder_period != 0 && self.frame % self.config.reorder_period == 0;
        self.frame += 1;
        self.circuit.frame = self.frame;
        self.monitor.set_frame(self.frame);
        trace!("Frame {}", self.frame);

        self.host.begin_frame();
        self.inject_dev_inputs();

        let root = self.circuit.root();
        if self.circuit.chip(root).is_builtin() {
            self.circuit.propagate_inputs(root, &mut self.rng);
            process_builtin_chip(self, root);
            self.needs_order_pass = false;
        } else if self.needs_order_pass {
            debug!("Discovering evaluation order of {}", self.circuit.chip(root).name);
            self.step_chip_reorder(root);
            self.needs_order_pass = false;
        } else {
            self.step_chip(root);
        }

        let delta = self.elapsed();
        self.host.end_frame(delta);
    }

    /// Keeps the host ticking while the simulation is paused.
    pub fn update_paused(&mut self) {
        self.host.begin_frame();
        let delta = self.elapsed();
        self.host.end_frame(delta);
    }

    /// Evaluates a subchip, through its lookup table when possible.
    fn process_chip(&mut self, chip: ChipIndex, reorder: bool) {
        if self.circuit.chip(chip).is_builtin() {
            process_builtin_chip(self, chip);
        } else if reorder {
            self.step_chip_reorder(chip);
        } else if !(self.config.cache_enabled && try_processing_from_cache(self, chip)) {
            self.step_chip(chip);
        }
    }

    /// Evaluates `chip` in the order recorded by the last discovery pass, last subchip first.
    pub(super) fn step_chip(&mut self, chip: ChipIndex) {
        self.circuit.propagate_inputs(chip, &mut self.rng);

        let frame = self.circuit.frame;
        for i in (0..self.circuit.chip(chip).sub_chips.len()).rev() {
            let mut next = self.circuit.chip(chip).sub_chips[i];

            // Swapping a chip that isn't ready yet with its predecessor varies the outcome of races.
            if self.can_dynamic_reorder
                && i > 0
                && !self.circuit.chip(next).is_ready(frame)
                && self.rng.gen::<bool>()
            {
                let previous = self.circuit.chip(chip).sub_chips[i - 1];
                if !self.circuit.chip(previous).chip_type.is_bus_origin() {
                    self.circuit.chip_mut(chip).sub_chips.swap(i, i - 1);
                    next = previous;
                }
            }

            self.process_chip(next, false);
            self.circuit.propagate_outputs(next, &mut self.rng);
        }
    }

    /// Evaluates `chip` picking ready subchips first, and records the order it used.
    ///
    /// Evaluated subchips are moved to the end of [super::SimChip::sub_chips], so the array ends
    /// up holding the evaluation order reversed.
    pub(super) fn step_chip_reorder(&mut self, chip: ChipIndex) {
        self.circuit.propagate_inputs(chip, &mut self.rng);

        let mut remaining = self.circuit.chip(chip).sub_chips.len();
        while remaining > 0 {
            let chosen = self.choose_next_sub_chip(chip, remaining);
            let sub_chips = &mut self.circuit.chip_mut(chip).sub_chips;
            sub_chips.swap(chosen, remaining - 1);
            let next = sub_chips[remaining - 1];
            remaining -= 1;

            self.process_chip(next, true);
            self.circuit.propagate_outputs(next, &mut self.rng);
        }
    }

    /// Picks the next subchip among the first `num` subchips of `chip`.
    ///
    /// The first ready subchip wins. If none is ready one is picked at random, skipping bus
    /// origins as long as anything else remains.
    fn choose_next_sub_chip(&mut self, chip: ChipIndex, num: usize) -> usize {
        let frame = self.circuit.frame;
        let circuit = &self.circuit;
        let sub_chips = &circuit.chip(chip).sub_chips[..num];
        if let Some(ready) = sub_chips
            .iter()
            .position(|s| circuit.chip(*s).is_ready(frame))
        {
            return ready;
        }

        let is_bus_origin = |i: usize| circuit.chip(sub_chips[i]).chip_type.is_bus_origin();
        let mut next = self.rng.gen_range(0..num);
        if (0..num).any(|i| !is_bus_origin(i)) {
            while is_bus_origin(next) {
                next = (next + 1) % num;
            }
        }
        next
    }
}

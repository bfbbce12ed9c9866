use super::config::{SimConfig, MAX_PIN_WIDTH_WHEN_CACHING};
use super::handles::{ci, pi};
use super::pin::NEVER;
use super::{ChipIndex, ChipPath, ChipType, PinAddress, PinIndex, SimChip, SimPin};
use crate::data_structures::{BitState, Slab};
use crate::description::{ChipDescription, ChipLibrary, PinDescription, WireDescription};
use crate::error::{SimError, SimResult};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rand::Rng;
use std::collections::VecDeque;
use std::io::{self, Write};

/// Arena owning every chip and pin of one simulated chip tree.
///
/// Chips and pins refer to each other through [ChipIndex] and [PinIndex] handles, so subtrees
/// and wires can be added and removed while the simulation runs.
///
/// # Example
///
/// ```
/// # use chipsim::description::{ChipDescription, ChipLibrary};
/// # use chipsim::sim::{Circuit, PinAddress};
/// let library = ChipLibrary::with_builtins();
/// let not = ChipDescription::custom("NOT")
///     .with_input("IN", 0, 1)
///     .with_output("OUT", 1, 1)
///     .with_sub_chip("NAND", 0)
///     .with_wire(PinAddress::boundary(0), PinAddress::new(0, 0))
///     .with_wire(PinAddress::boundary(0), PinAddress::new(0, 1))
///     .with_wire(PinAddress::new(0, 2), PinAddress::boundary(1));
///
/// let circuit = Circuit::build(&not, &library, &mut rand::thread_rng()).unwrap();
/// assert_eq!(circuit.chip(circuit.root()).sub_chips().len(), 1);
/// assert!(circuit.is_combinational(circuit.root()));
/// ```
#[derive(Debug, Clone)]
pub struct Circuit {
    pub(crate) chips: Slab<SimChip>,
    pub(crate) pins: Slab<SimPin>,
    root: ChipIndex,
    /// Frame stamp used by pins and chips to tell stale receive counters apart.
    pub(crate) frame: u64,
}

impl Circuit {
    /// Builds the chip tree of `desc`, looking up every subchip definition in `library`.
    ///
    /// `rng` provides the power-on contents of memories.
    pub fn build<R: Rng>(
        desc: &ChipDescription,
        library: &ChipLibrary,
        rng: &mut R,
    ) -> SimResult<Circuit> {
        let mut circuit = Circuit {
            chips: Slab::new(),
            pins: Slab::new(),
            root: ci!(Default::default()),
            frame: 0,
        };
        let mut stack = Vec::new();
        circuit.root = circuit.build_chip(desc, library, -1, None, None, &mut stack, rng)?;
        Ok(circuit)
    }

    /// Builds one chip and, recursively, its subchips and wires.
    ///
    /// Nothing is left behind in the arena if building fails.
    #[allow(clippy::too_many_arguments)]
    fn build_chip<R: Rng>(
        &mut self,
        desc: &ChipDescription,
        library: &ChipLibrary,
        id: i32,
        parent: Option<ChipIndex>,
        internal_data: Option<&[u32]>,
        stack: &mut Vec<String>,
        rng: &mut R,
    ) -> SimResult<ChipIndex> {
        if stack.contains(&desc.name) {
            return Err(SimError::RecursiveDefinition(desc.name.clone()));
        }
        desc.validate_pins()?;
        check_builtin_layout(desc)?;

        let chip = ci!(self.chips.insert(SimChip::new(
            desc.name.clone(),
            id,
            desc.chip_type,
            parent,
            desc.should_be_cached,
        )));
        for p in &desc.input_pins {
            let pin = pi!(self.pins.insert(SimPin::new(p.id, true, chip, p.width)));
            self.chip_mut(chip).inputs.push(pin);
        }
        for p in &desc.output_pins {
            let pin = pi!(self.pins.insert(SimPin::new(p.id, false, chip, p.width)));
            self.chip_mut(chip).outputs.push(pin);
        }

        if desc.chip_type == ChipType::Ram8 {
            let memory = &mut self.chip_mut(chip).internal_state;
            let len = memory.len() - 1;
            for cell in &mut memory[..len] {
                *cell = rng.gen::<u8>() as u32;
            }
        }
        if let Some(data) = internal_data {
            self.chip_mut(chip).set_internal_state(data);
        }

        stack.push(desc.name.clone());
        let result = self.build_contents(chip, desc, library, stack, rng);
        stack.pop();
        if let Err(e) = result {
            self.free_subtree(chip);
            return Err(e);
        }
        Ok(chip)
    }

    fn build_contents<R: Rng>(
        &mut self,
        chip: ChipIndex,
        desc: &ChipDescription,
        library: &ChipLibrary,
        stack: &mut Vec<String>,
        rng: &mut R,
    ) -> SimResult<()> {
        for sub in &desc.sub_chips {
            let sub_desc = library.lookup(&sub.name)?;
            let sub_chip = self.build_chip(
                sub_desc,
                library,
                sub.id,
                Some(chip),
                sub.internal_data.as_deref(),
                stack,
                rng,
            )?;
            self.chip_mut(chip).sub_chips.push(sub_chip);
        }
        for wire in &desc.wires {
            self.connect(chip, *wire)?;
        }
        Ok(())
    }

    /// Removes `chip`, its pins and its whole subtree from the arena without touching any wire.
    fn free_subtree(&mut self, chip: ChipIndex) {
        if let Some(c) = self.chips.remove(chip.idx) {
            for pin in c.inputs.iter().chain(&c.outputs) {
                self.pins.remove(pin.idx);
            }
            for sub in c.sub_chips {
                self.free_subtree(sub);
            }
        }
    }

    pub fn root(&self) -> ChipIndex {
        self.root
    }

    /// # Panics
    ///
    /// Panics if `chip` has been removed.
    pub fn chip(&self, chip: ChipIndex) -> &SimChip {
        &self.chips[chip.idx]
    }

    /// # Panics
    ///
    /// Panics if `pin` has been removed.
    pub fn pin(&self, pin: PinIndex) -> &SimPin {
        &self.pins[pin.idx]
    }

    pub(crate) fn chip_mut(&mut self, chip: ChipIndex) -> &mut SimChip {
        &mut self.chips[chip.idx]
    }

    pub(crate) fn pin_mut(&mut self, pin: PinIndex) -> &mut SimPin {
        &mut self.pins[pin.idx]
    }

    /// Returns the number of live chips in the tree.
    pub fn num_chips(&self) -> usize {
        self.chips.len()
    }

    /// Returns the number of live pins in the tree.
    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    /// Returns the subchip of `scope` with id `sub_chip_id`.
    pub fn sub_chip(&self, scope: ChipIndex, sub_chip_id: i32) -> SimResult<ChipIndex> {
        let c = self.chip(scope);
        c.sub_chips
            .iter()
            .copied()
            .find(|s| self.chip(*s).id == sub_chip_id)
            .ok_or_else(|| SimError::SubChipNotFound {
                chip: c.name.clone(),
                sub_chip_id,
            })
    }

    /// Returns the chip reached by following `path` from the root.
    pub fn chip_at(&self, path: &ChipPath) -> SimResult<ChipIndex> {
        let mut chip = self.root;
        for id in &path.0 {
            chip = self
                .sub_chip(chip, *id)
                .map_err(|_| SimError::ChipPathNotFound(path.0.to_vec()))?;
        }
        Ok(chip)
    }

    fn find_pin_of(&self, chip: ChipIndex, pin_id: i32) -> Option<PinIndex> {
        let c = self.chip(chip);
        c.inputs
            .iter()
            .chain(&c.outputs)
            .copied()
            .find(|p| self.pin(*p).id == pin_id)
    }

    /// Resolves `address` inside the scope of `scope`.
    ///
    /// An address whose owner is not a subchip falls back to the boundary pin with the owner's id,
    /// which is how wires refer to the dev pins of a chip. An address naming an existing subchip
    /// never falls back.
    pub fn find_pin(&self, scope: ChipIndex, address: PinAddress) -> SimResult<PinIndex> {
        let found = if address.is_boundary() {
            self.find_pin_of(scope, address.pin_id)
        } else {
            match self.sub_chip(scope, address.owner_id) {
                Ok(sub) => self.find_pin_of(sub, address.pin_id),
                Err(_) => self.find_pin_of(scope, address.owner_id),
            }
        };
        found.ok_or_else(|| SimError::PinNotFound {
            chip: self.chip(scope).name.clone(),
            owner_id: address.owner_id,
            pin_id: address.pin_id,
        })
    }

    /// Returns the state of the pin at `address` inside `scope`.
    pub fn pin_state(&self, scope: ChipIndex, address: PinAddress) -> SimResult<&BitState> {
        Ok(&self.pin(self.find_pin(scope, address)?).state)
    }

    /// Adds a wire inside `scope`.
    pub fn connect(&mut self, scope: ChipIndex, wire: WireDescription) -> SimResult<()> {
        let source = self.find_pin(scope, wire.source)?;
        let target = self.find_pin(scope, wire.target)?;
        let width = self.pin(source).width();
        if width != self.pin(target).width() {
            return Err(SimError::InvalidPinWidth {
                chip: self.chip(scope).name.clone(),
                pin_id: wire.target.pin_id,
                width,
            });
        }

        self.pin_mut(source).targets.push(target);
        let t = self.pin_mut(target);
        t.num_input_connections += 1;
        if t.num_input_connections == 1 && t.is_input {
            let parent = t.parent;
            self.chip_mut(parent).num_connected_inputs += 1;
        }
        Ok(())
    }

    /// Removes a wire inside `scope`, a pin left without drivers becomes disconnected.
    pub fn disconnect(&mut self, scope: ChipIndex, wire: WireDescription) -> SimResult<()> {
        let source = self.find_pin(scope, wire.source)?;
        let target = self.find_pin(scope, wire.target)?;
        let targets = &mut self.pin_mut(source).targets;
        match targets.iter().position(|t| *t == target) {
            Some(i) => {
                targets.remove(i);
                self.drop_driver(target);
            }
            None => debug!("No wire {} -> {} to remove", wire.source, wire.target),
        }
        Ok(())
    }

    fn drop_driver(&mut self, target: PinIndex) {
        let t = self.pin_mut(target);
        if t.drop_driver() && t.is_input {
            let parent = t.parent;
            let c = self.chip_mut(parent);
            c.num_connected_inputs = c.num_connected_inputs.saturating_sub(1);
        }
    }

    /// Detaches every wire touching `removed`, which are about to be freed.
    fn scrub_wires(&mut self, removed: &IndexSet<PinIndex>) {
        let mut orphaned = Vec::new();
        for pin in removed {
            orphaned.extend(
                self.pin(*pin)
                    .targets
                    .iter()
                    .filter(|t| !removed.contains(*t))
                    .copied(),
            );
        }
        for target in orphaned {
            self.drop_driver(target);
        }
        for (_, pin) in self.pins.iter_mut() {
            pin.targets.retain(|t| !removed.contains(t));
        }
    }

    /// Collects the pins of `chip` and of its whole subtree.
    fn subtree_pins(&self, chip: ChipIndex, out: &mut IndexSet<PinIndex>) {
        let c = self.chip(chip);
        out.extend(c.inputs.iter().chain(&c.outputs).copied());
        for sub in &c.sub_chips {
            self.subtree_pins(*sub, out);
        }
    }

    /// Builds `desc` as a new subchip of `scope` with id `sub_chip_id`.
    pub fn add_sub_chip<R: Rng>(
        &mut self,
        scope: ChipIndex,
        desc: &ChipDescription,
        library: &ChipLibrary,
        sub_chip_id: i32,
        internal_data: Option<&[u32]>,
        rng: &mut R,
    ) -> SimResult<ChipIndex> {
        if self.sub_chip(scope, sub_chip_id).is_ok() {
            return Err(SimError::DuplicateSubChipId {
                chip: self.chip(scope).name.clone(),
                sub_chip_id,
            });
        }
        let mut stack = Vec::new();
        let mut ancestor = Some(scope);
        while let Some(a) = ancestor {
            stack.push(self.chip(a).name.clone());
            ancestor = self.chip(a).parent;
        }
        let chip = self.build_chip(
            desc,
            library,
            sub_chip_id,
            Some(scope),
            internal_data,
            &mut stack,
            rng,
        )?;
        self.chip_mut(scope).sub_chips.push(chip);
        Ok(chip)
    }

    /// Removes the subchip `sub_chip_id` of `scope` and every wire touching it.
    pub fn remove_sub_chip(&mut self, scope: ChipIndex, sub_chip_id: i32) -> SimResult<()> {
        let sub = self.sub_chip(scope, sub_chip_id)?;
        self.chip_mut(scope).sub_chips.retain(|s| *s != sub);

        let mut removed = IndexSet::new();
        self.subtree_pins(sub, &mut removed);
        self.scrub_wires(&removed);
        self.free_subtree(sub);
        Ok(())
    }

    /// Adds a boundary pin to the custom chip `chip`.
    ///
    /// Built-in chips keep the pin layout of their type.
    pub fn add_pin(
        &mut self,
        chip: ChipIndex,
        pin_id: i32,
        is_input: bool,
        width: usize,
    ) -> SimResult<PinIndex> {
        self.check_pins_editable(chip)?;
        let name = self.chip(chip).name.clone();
        if width == 0 {
            return Err(SimError::InvalidPinWidth {
                chip: name,
                pin_id,
                width,
            });
        }
        if self.find_pin_of(chip, pin_id).is_some() {
            return Err(SimError::DuplicatePinId { chip: name, pin_id });
        }
        let pin = pi!(self.pins.insert(SimPin::new(pin_id, is_input, chip, width)));
        let c = self.chip_mut(chip);
        if is_input {
            c.inputs.push(pin);
        } else {
            c.outputs.push(pin);
        }
        Ok(pin)
    }

    /// Removes the pin `pin_id` of the custom chip `chip` and every wire touching it.
    pub fn remove_pin(&mut self, chip: ChipIndex, pin_id: i32) -> SimResult<()> {
        self.check_pins_editable(chip)?;
        let pin = self
            .find_pin_of(chip, pin_id)
            .ok_or_else(|| SimError::PinNotFound {
                chip: self.chip(chip).name.clone(),
                owner_id: self.chip(chip).id,
                pin_id,
            })?;
        let p = self.pin(pin);
        let was_connected_input = p.is_input && p.num_input_connections > 0;

        let mut removed = IndexSet::new();
        removed.insert(pin);
        self.scrub_wires(&removed);

        let c = self.chip_mut(chip);
        c.inputs.retain(|p| *p != pin);
        c.outputs.retain(|p| *p != pin);
        if was_connected_input {
            c.num_connected_inputs = c.num_connected_inputs.saturating_sub(1);
        }
        self.pins.remove(pin.idx);
        Ok(())
    }

    fn check_pins_editable(&self, chip: ChipIndex) -> SimResult<()> {
        let c = self.chip(chip);
        if c.is_builtin() {
            return Err(SimError::InvalidPinLayout {
                chip: c.name.clone(),
                chip_type: c.chip_type,
            });
        }
        Ok(())
    }

    /// Sends the state of `pin` to every pin it drives.
    pub(crate) fn propagate_signal<R: Rng>(&mut self, pin: PinIndex, rng: &mut R) {
        let mut i = 0;
        while i < self.pin(pin).targets.len() {
            let target = self.pin(pin).targets[i];
            self.receive_input(target, pin, rng);
            i += 1;
        }
    }

    /// Delivers the state of `source` to `target`.
    ///
    /// The first driver of a frame is copied, every further driver is resolved against the current
    /// state with a random choice between OR and AND.
    fn receive_input<R: Rng>(&mut self, target: PinIndex, source: PinIndex, rng: &mut R) {
        let frame = self.frame;
        let source_parent_id = self.chip(self.pin(source).parent).id;
        let (t, s) = match self.pins.get_pair_mut(target.idx, source.idx) {
            Some(pair) => pair,
            None => return,
        };

        if t.last_updated_frame != frame {
            t.last_updated_frame = frame;
            t.num_inputs_received_this_frame = 0;
        }

        let changed = if t.num_inputs_received_this_frame == 0 {
            t.state.copy_from(&s.state);
            true
        } else {
            t.state.handle_conflict(&s.state, rng.gen())
        };
        if changed {
            t.latest_source_id = s.id;
            t.latest_source_parent_chip_id = source_parent_id;
        }

        t.num_inputs_received_this_frame += 1;
        if t.is_input && t.num_inputs_received_this_frame == t.num_input_connections {
            let parent = t.parent;
            self.chip_mut(parent).mark_input_ready(frame);
        }
    }

    pub(crate) fn propagate_inputs<R: Rng>(&mut self, chip: ChipIndex, rng: &mut R) {
        for i in 0..self.chip(chip).inputs.len() {
            let pin = self.chip(chip).inputs[i];
            self.propagate_signal(pin, rng);
        }
    }

    pub(crate) fn propagate_outputs<R: Rng>(&mut self, chip: ChipIndex, rng: &mut R) {
        for i in 0..self.chip(chip).outputs.len() {
            let pin = self.chip(chip).outputs[i];
            self.propagate_signal(pin, rng);
        }
        self.chip_mut(chip).reset_ready();
    }

    /// Forgets every receive counter inside `chip`, including its own pins.
    pub(crate) fn reset_received(&mut self, chip: ChipIndex) {
        let c = self.chip_mut(chip);
        c.reset_ready();
        let pins: Vec<_> = c.inputs.iter().chain(&c.outputs).copied().collect();
        for pin in pins {
            self.pin_mut(pin).reset_received();
        }
        for i in 0..self.chip(chip).sub_chips.len() {
            let sub = self.chip(chip).sub_chips[i];
            self.reset_received(sub);
        }
    }

    /// Sum of the widths of the input pins of `chip`.
    pub fn num_input_bits(&self, chip: ChipIndex) -> usize {
        self.chip(chip)
            .inputs
            .iter()
            .map(|p| self.pin(*p).width())
            .sum()
    }

    /// Width of the widest input or output pin of `chip`, 0 if it has none.
    pub fn biggest_pin_width(&self, chip: ChipIndex) -> usize {
        let c = self.chip(chip);
        c.inputs
            .iter()
            .chain(&c.outputs)
            .map(|p| self.pin(*p).width())
            .max()
            .unwrap_or(0)
    }

    /// Returns true if the outputs of `chip` only depend on its current inputs.
    ///
    /// A custom chip is combinational when no subchip input has more than one driver, every
    /// subchip is combinational and the wiring between subchips has no cycle.
    pub fn is_combinational(&self, chip: ChipIndex) -> bool {
        let c = self.chip(chip);
        if let Some(combinational) = c.chip_type.is_combinational_builtin() {
            return combinational;
        }

        for sub in &c.sub_chips {
            if self
                .chip(*sub)
                .inputs
                .iter()
                .any(|p| self.pin(*p).num_input_connections > 1)
            {
                return false;
            }
        }
        if !c.sub_chips.iter().all(|sub| self.is_combinational(*sub)) {
            return false;
        }

        let mut graph = DiGraph::<ChipIndex, ()>::new();
        let nodes: IndexMap<ChipIndex, NodeIndex> = c
            .sub_chips
            .iter()
            .map(|sub| (*sub, graph.add_node(*sub)))
            .collect();
        for sub in &c.sub_chips {
            for out in &self.chip(*sub).outputs {
                for target in &self.pin(*out).targets {
                    let target_chip = self.pin(*target).parent;
                    if target_chip == chip {
                        continue;
                    }
                    if target_chip == *sub {
                        return false;
                    }
                    if let Some(to) = nodes.get(&target_chip) {
                        graph.add_edge(nodes[sub], *to, ());
                    }
                }
            }
        }
        is_acyclic_kahn(&graph)
    }

    /// Returns true if `chip` may be evaluated through a lookup table.
    pub fn can_cache(&self, chip: ChipIndex, config: &SimConfig) -> bool {
        let c = self.chip(chip);
        if c.is_builtin() {
            return false;
        }
        let input_bits = self.num_input_bits(chip);
        if input_bits > config.max_auto_cache_input_bits && !c.should_be_cached {
            return false;
        }
        if input_bits > config.max_user_cache_input_bits {
            return false;
        }
        if self.biggest_pin_width(chip) > MAX_PIN_WIDTH_WHEN_CACHING {
            return false;
        }
        self.is_combinational(chip)
    }

    /// Writes the wiring of the scope of `chip` as a Graphviz dot graph.
    pub fn dump_dot<W: Write>(&self, chip: ChipIndex, out: &mut W) -> io::Result<()> {
        use petgraph::dot::{Config, Dot};
        let c = self.chip(chip);
        let mut graph = petgraph::Graph::<String, ()>::new();
        let boundary = graph.add_node(c.name.clone());
        let mut index = IndexMap::new();
        index.insert(chip, boundary);
        for sub in &c.sub_chips {
            let s = self.chip(*sub);
            index.insert(*sub, graph.add_node(format!("{}#{}", s.name, s.id)));
        }

        let mut sources: Vec<PinIndex> = c.inputs.clone();
        for sub in &c.sub_chips {
            sources.extend(self.chip(*sub).outputs.iter().copied());
        }
        for source in sources {
            let from = index[&self.pin(source).parent];
            for target in &self.pin(source).targets {
                if let Some(to) = index.get(&self.pin(*target).parent) {
                    graph.add_edge(from, *to, ());
                }
            }
        }
        write!(out, "{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }

    /// Resets the frame stamps of every pin and chip, used when the frame counter restarts.
    pub(crate) fn reset_frame_stamps(&mut self) {
        self.frame = 0;
        for (_, pin) in self.pins.iter_mut() {
            pin.last_updated_frame = NEVER;
            pin.num_inputs_received_this_frame = 0;
        }
        for (_, chip) in self.chips.iter_mut() {
            chip.reset_ready();
        }
    }
}

/// Kahn's algorithm, returns true if every node can be removed in topological order.
fn is_acyclic_kahn(graph: &DiGraph<ChipIndex, ()>) -> bool {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .collect();
    let mut visited = 0;
    while let Some(n) = queue.pop_front() {
        visited += 1;
        for next in graph.neighbors_directed(n, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                queue.push_back(next);
            }
        }
    }
    visited == graph.node_count()
}

/// Built-in chips read and write their pins by position, so their pins must follow the layout
/// of their type.
fn check_builtin_layout(desc: &ChipDescription) -> SimResult<()> {
    fn widths(pins: &[PinDescription]) -> Vec<usize> {
        pins.iter().map(|p| p.width).collect()
    }
    let matches = match desc.chip_type {
        ChipType::Split | ChipType::Merge => return check_split_merge_widths(desc),
        ChipType::Bus => {
            let (inputs, outputs) = (widths(&desc.input_pins), widths(&desc.output_pins));
            inputs.len() == 1 && inputs == outputs
        }
        chip_type => match chip_type.fixed_pin_widths() {
            Some((inputs, outputs)) => {
                widths(&desc.input_pins) == inputs && widths(&desc.output_pins) == outputs
            }
            None => true,
        },
    };
    if !matches {
        return Err(SimError::InvalidPinLayout {
            chip: desc.name.clone(),
            chip_type: desc.chip_type,
        });
    }
    Ok(())
}

/// Split and merge chips move bits between pins, so their widths must add up.
fn check_split_merge_widths(desc: &ChipDescription) -> SimResult<()> {
    let (wide, narrow) = match desc.chip_type {
        ChipType::Split => (&desc.input_pins, &desc.output_pins),
        ChipType::Merge => (&desc.output_pins, &desc.input_pins),
        _ => return Ok(()),
    };
    let wide_bits: usize = wide.iter().map(|p| p.width).sum();
    let narrow_bits: usize = narrow.iter().map(|p| p.width).sum();
    if wide.len() != 1 || wide_bits != narrow_bits {
        return Err(SimError::InvalidPinWidth {
            chip: desc.name.clone(),
            pin_id: wide.first().map(|p| p.id).unwrap_or(-1),
            width: wide_bits,
        });
    }
    Ok(())
}

//! Configuration groups and the (parity, 2J) symmetry index.

use super::config::Configuration;
use super::error::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Number of addressable symmetry blocks; composite indices are
/// `parity + 2 * (2J)`.
pub const MAX_SYMMETRIES: usize = 0x200;

/// Encodes parity `p` and doubled momentum `j2` into a symmetry index.
#[must_use]
pub const fn encode_pj(p: i32, j2: i32) -> usize {
    (p + 2 * j2) as usize
}

/// Recovers (parity, 2J) from a composite symmetry index.
#[must_use]
pub const fn decode_pj(index: usize) -> (i32, i32) {
    ((index & 1) as i32, (index >> 1) as i32)
}

/// A basis-state descriptor: which CSF of which configuration of which group.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StateIndex {
    /// Index of the configuration group.
    pub group: usize,
    /// Index of the configuration within the group.
    pub config: usize,
    /// Index of the CSF within the configuration.
    pub csf: usize,
}

/// The ordered basis states of one (parity, 2J) block.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Symmetry {
    states: Vec<StateIndex>,
}

impl Symmetry {
    /// The registered basis states, in registration order.
    #[must_use]
    pub fn states(&self) -> &[StateIndex] {
        &self.states
    }

    /// Number of registered basis states.
    #[must_use]
    pub fn n_states(&self) -> usize {
        self.states.len()
    }
}

/// A named container of configurations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConfigGroup {
    name: String,
    configs: Vec<Configuration>,
}

impl ConfigGroup {
    /// The unique name of the group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configurations added to this group, in insertion order.
    #[must_use]
    pub fn configs(&self) -> &[Configuration] {
        &self.configs
    }

    /// Number of configurations in the group.
    #[must_use]
    pub fn n_configs(&self) -> usize {
        self.configs.len()
    }
}

/// Registry of configuration groups, partitioning every CSF into symmetry
/// blocks as configurations are added.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GroupStore {
    groups: Vec<ConfigGroup>,
    #[serde(skip)]
    names: FxHashMap<String, usize>,
    symmetries: Vec<Symmetry>,
}

impl Default for GroupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore {
    /// Constructor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            names: FxHashMap::default(),
            symmetries: vec![Symmetry::default(); MAX_SYMMETRIES],
        }
    }

    /// Returns the index of the group called `name`, creating the group if it
    /// does not exist yet.
    pub fn add_group(&mut self, name: &str) -> usize {
        if let Some(&index) = self.names.get(name) {
            return index;
        }
        let index = self.groups.len();
        self.groups.push(ConfigGroup {
            name: name.to_owned(),
            configs: Vec::new(),
        });
        self.names.insert(name.to_owned(), index);
        index
    }

    /// Returns the index of the group called `name` if it exists.
    #[must_use]
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// The group with index `index`.
    ///
    /// # Errors
    ///
    /// Fails if no group has this index.
    pub fn group(&self, index: usize) -> Result<&ConfigGroup> {
        self.groups.get(index).ok_or(Error::InvalidGroup(index))
    }

    /// Number of registered groups.
    #[must_use]
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Inserts `config` into the group with index `group` and registers every
    /// one of its CSFs in the appropriate symmetry block.
    ///
    /// # Errors
    ///
    /// Fails if no group has index `group`.
    pub fn add_config_to_group(&mut self, group: usize, config: Configuration) -> Result<usize> {
        if group >= self.groups.len() {
            return Err(Error::InvalidGroup(group));
        }

        let parity = config.parity();
        let config_index = self.groups[group].configs.len();
        for csf in 0..config.n_csfs() {
            let sym = encode_pj(parity, config.total_j(csf));
            self.symmetries[sym].states.push(StateIndex {
                group,
                config: config_index,
                csf,
            });
        }
        self.groups[group].configs.push(config);
        Ok(config_index)
    }

    /// The symmetry block with composite index `index`.
    #[must_use]
    pub fn symmetry(&self, index: usize) -> Option<&Symmetry> {
        self.symmetries.get(index)
    }

    /// All symmetry blocks, indexed by `p + 2 * (2J)`.
    #[must_use]
    pub fn symmetries(&self) -> &[Symmetry] {
        &self.symmetries
    }

    /// The configuration a basis-state descriptor points at.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor points outside the registry.
    pub fn config(&self, state: &StateIndex) -> Result<&Configuration> {
        self.group(state.group)?
            .configs
            .get(state.config)
            .ok_or(Error::InvalidGroup(state.group))
    }

    /// Rebuilds the name lookup; used after deserialization, which skips the
    /// map.
    pub fn rebuild_names(&mut self) {
        self.names = self
            .groups
            .iter()
            .enumerate()
            .map(|(index, group)| (group.name.clone(), index))
            .collect();
    }
}

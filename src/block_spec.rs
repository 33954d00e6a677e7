//! Hashable block descriptions used as palette keys.
//!
//! A `BlockSpec` is either a plain block state (name plus properties) or a
//! legacy envelope: a block translated from a numeric id/data pair that still
//! needs neighbor context before its final state is known.

use crate::nbt::{scalar_string, CompoundExt};
use quartz_nbt::{NbtCompound, NbtTag};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Name prefix marking a legacy envelope tag.
pub const LEGACY_PREFIX: &str = "#legacy_";

pub const MINECRAFT_NAMESPACE: &str = "minecraft:";

/// A block name with its properties.
///
/// Properties are kept sorted by key so two states built in a different
/// order compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub name: SmolStr,
    pub properties: Vec<(SmolStr, SmolStr)>,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[")?;
            for (i, (key, value)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl BlockState {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        BlockState {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// A state in the `minecraft:` namespace.
    pub fn minecraft(short_name: &str) -> Self {
        BlockState::new(format!("{}{}", MINECRAFT_NAMESPACE, short_name))
    }

    pub fn air() -> Self {
        BlockState::minecraft("air")
    }

    /// Name without the `minecraft:` namespace. Names in other namespaces are
    /// returned unchanged.
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(MINECRAFT_NAMESPACE)
            .unwrap_or(self.name.as_str())
    }

    pub fn is_minecraft(&self) -> bool {
        self.name.starts_with(MINECRAFT_NAMESPACE)
    }

    pub fn with_property(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        let key = key.into();
        let value = value.into();
        match self.properties.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(i) => self.properties[i].1 = value,
            Err(i) => self.properties.insert(i, (key, value)),
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|i| self.properties[i].1.as_str())
    }

    pub fn property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_property(key).unwrap_or(default)
    }

    pub fn is_true(&self, key: &str) -> bool {
        self.get_property(key) == Some("true")
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("Name", self.name.to_string());

        if !self.properties.is_empty() {
            let mut properties = NbtCompound::new();
            for (key, value) in &self.properties {
                properties.insert(key.to_string(), value.to_string());
            }
            compound.insert("Properties", properties);
        }

        compound
    }

    /// Read a state tag. A missing name reads as air.
    pub fn from_nbt(compound: &NbtCompound) -> Self {
        let mut state = BlockState::new(compound.str_or("Name", "minecraft:air"));
        if let Some(props) = compound.compound_at("Properties") {
            for (key, value) in props.inner() {
                if let Some(value) = scalar_string(value) {
                    state.set_property(key.as_str(), value);
                }
            }
        }
        state
    }
}

/// A block that was translated from a legacy numeric id but still needs
/// neighbor context to finish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacySpec {
    pub id: u8,
    pub data: u8,
    /// Best-effort state used when no finalization happens.
    pub block: BlockState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockSpec {
    State(BlockState),
    Legacy(LegacySpec),
}

impl BlockSpec {
    pub fn air() -> Self {
        BlockSpec::State(BlockState::air())
    }

    pub fn stone() -> Self {
        BlockSpec::State(BlockState::minecraft("stone"))
    }

    /// Read a palette or translator tag, recognising legacy envelopes.
    pub fn from_nbt(tag: &NbtCompound) -> Self {
        let name = tag.str_or("Name", "minecraft:air");
        if name.starts_with(LEGACY_PREFIX) {
            let block = tag
                .compound_at("Block")
                .map(BlockState::from_nbt)
                .unwrap_or_else(BlockState::air);
            BlockSpec::Legacy(LegacySpec {
                id: tag.int_or("Id", 0) as u8,
                data: tag.int_or("Data", 0) as u8,
                block,
            })
        } else {
            BlockSpec::State(BlockState::from_nbt(tag))
        }
    }

    pub fn to_nbt(&self) -> NbtCompound {
        match self {
            BlockSpec::State(state) => state.to_nbt(),
            BlockSpec::Legacy(legacy) => {
                let mut tag = NbtCompound::new();
                tag.insert("Name", format!("{}{}", LEGACY_PREFIX, legacy.block.name));
                tag.insert("Id", NbtTag::Int(legacy.id as i32));
                tag.insert("Data", NbtTag::Int(legacy.data as i32));
                tag.insert("Block", legacy.block.to_nbt());
                tag
            }
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, BlockSpec::Legacy(_))
    }

    /// The state this spec resolves to when no finalization is applied.
    pub fn state(&self) -> &BlockState {
        match self {
            BlockSpec::State(state) => state,
            BlockSpec::Legacy(legacy) => &legacy.block,
        }
    }
}

impl From<BlockState> for BlockSpec {
    fn from(state: BlockState) -> Self {
        BlockSpec::State(state)
    }
}

impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSpec::State(state) => write!(f, "{}", state),
            BlockSpec::Legacy(legacy) => {
                write!(f, "legacy({}:{}){}", legacy.id, legacy.data, legacy.block)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_state_creation() {
        let block = BlockState::minecraft("oak_log").with_property("axis", "x");

        assert_eq!(block.name, "minecraft:oak_log");
        assert_eq!(block.short_name(), "oak_log");
        assert_eq!(block.get_property("axis"), Some("x"));
        assert_eq!(block.to_string(), "minecraft:oak_log[axis=x]");
    }

    #[test]
    fn test_property_order_does_not_matter() {
        let a = BlockState::minecraft("oak_stairs")
            .with_property("facing", "east")
            .with_property("half", "top");
        let b = BlockState::minecraft("oak_stairs")
            .with_property("half", "top")
            .with_property("facing", "east");
        assert_eq!(a, b);
        assert_eq!(BlockSpec::from(a), BlockSpec::from(b));
    }

    #[test]
    fn test_legacy_envelope_is_detected() {
        let inner = BlockState::minecraft("oak_fence");
        let mut tag = NbtCompound::new();
        tag.insert("Name", "#legacy_oak_fence".to_string());
        tag.insert("Id", NbtTag::Int(85));
        tag.insert("Data", NbtTag::Int(0));
        tag.insert("Block", inner.to_nbt());

        match BlockSpec::from_nbt(&tag) {
            BlockSpec::Legacy(legacy) => {
                assert_eq!(legacy.id, 85);
                assert_eq!(legacy.block, inner);
            }
            other => panic!("expected legacy spec, got {}", other),
        }
    }

    #[test]
    fn test_missing_name_reads_as_air() {
        let spec = BlockSpec::from_nbt(&NbtCompound::new());
        assert_eq!(spec, BlockSpec::air());
    }

    #[test]
    fn test_numeric_properties_become_strings() {
        let mut props = NbtCompound::new();
        props.insert("level", NbtTag::Int(3));
        let mut tag = NbtCompound::new();
        tag.insert("Name", "minecraft:water".to_string());
        tag.insert("Properties", props);

        let state = BlockState::from_nbt(&tag);
        assert_eq!(state.get_property("level"), Some("3"));
    }
}

//! Small accessors over `quartz_nbt` compounds.
//!
//! Chunk documents written by different game versions disagree on which
//! numeric type a field uses (`Y` is a byte in some versions and an int in
//! others), so these helpers read any integer variant and fall back to a
//! caller-supplied default instead of failing.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};

pub trait CompoundExt {
    fn tag(&self, name: &str) -> Option<&NbtTag>;

    /// Follow a path of nested compound names.
    fn path(&self, path: &[&str]) -> Option<&NbtTag>;

    /// Return the first present tag among several alternative paths.
    fn first_of(&self, paths: &[&[&str]]) -> Option<&NbtTag> {
        paths.iter().find_map(|p| self.path(p))
    }

    fn int_or(&self, name: &str, default: i32) -> i32 {
        self.tag(name)
            .and_then(int_value)
            .map(|v| v as i32)
            .unwrap_or(default)
    }

    fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.tag(name) {
            Some(NbtTag::String(s)) => s.as_str(),
            _ => default,
        }
    }

    fn compound_at(&self, name: &str) -> Option<&NbtCompound> {
        match self.tag(name) {
            Some(NbtTag::Compound(c)) => Some(c),
            _ => None,
        }
    }

    fn list_at(&self, name: &str) -> Option<&NbtList> {
        match self.tag(name) {
            Some(NbtTag::List(l)) => Some(l),
            _ => None,
        }
    }

    fn is_compound(&self, name: &str) -> bool {
        matches!(self.tag(name), Some(NbtTag::Compound(_)))
    }
}

impl CompoundExt for NbtCompound {
    fn tag(&self, name: &str) -> Option<&NbtTag> {
        self.inner().get(name)
    }

    fn path(&self, path: &[&str]) -> Option<&NbtTag> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for name in parents {
            current = current.compound_at(name)?;
        }
        current.tag(last)
    }
}

/// Integer value of any numeric tag.
pub fn int_value(tag: &NbtTag) -> Option<i64> {
    match tag {
        NbtTag::Byte(v) => Some(*v as i64),
        NbtTag::Short(v) => Some(*v as i64),
        NbtTag::Int(v) => Some(*v as i64),
        NbtTag::Long(v) => Some(*v),
        _ => None,
    }
}

/// String form of a scalar tag. Block-state properties are strings in
/// modern saves but some writers store them as numbers.
pub fn scalar_string(tag: &NbtTag) -> Option<String> {
    match tag {
        NbtTag::String(s) => Some(s.clone()),
        NbtTag::Byte(_) | NbtTag::Short(_) | NbtTag::Int(_) | NbtTag::Long(_) => {
            int_value(tag).map(|v| v.to_string())
        }
        _ => None,
    }
}

pub fn byte_array(tag: Option<&NbtTag>) -> Option<&[i8]> {
    match tag {
        Some(NbtTag::ByteArray(v)) => Some(v.as_slice()),
        _ => None,
    }
}

pub fn int_array(tag: Option<&NbtTag>) -> Option<&[i32]> {
    match tag {
        Some(NbtTag::IntArray(v)) => Some(v.as_slice()),
        _ => None,
    }
}

pub fn long_array(tag: Option<&NbtTag>) -> Option<&[i64]> {
    match tag {
        Some(NbtTag::LongArray(v)) => Some(v.as_slice()),
        _ => None,
    }
}

pub fn list(tag: Option<&NbtTag>) -> Option<&NbtList> {
    match tag {
        Some(NbtTag::List(l)) => Some(l),
        _ => None,
    }
}

/// Iterate the compound entries of a list, skipping anything else.
pub fn compounds(list: &NbtList) -> impl Iterator<Item = &NbtCompound> {
    list.iter().filter_map(|tag| match tag {
        NbtTag::Compound(c) => Some(c),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_defaults() {
        let mut level = NbtCompound::new();
        level.insert("Y", NbtTag::Byte(3));
        level.insert("Name", "minecraft:stone".to_string());

        let mut root = NbtCompound::new();
        root.insert("Level", level);

        let level = root.compound_at("Level").unwrap();
        assert_eq!(level.int_or("Y", -1), 3);
        assert_eq!(level.int_or("Missing", -1), -1);
        assert_eq!(level.str_or("Name", "minecraft:air"), "minecraft:stone");
        assert_eq!(level.str_or("Y", "fallback"), "fallback");
        assert!(root.is_compound("Level"));
        assert!(!level.is_compound("Y"));
        assert!(root.path(&["Level", "Y"]).is_some());
        assert!(root.first_of(&[&["sections"], &["Level", "Name"]]).is_some());
    }
}

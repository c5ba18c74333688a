//! Wheels encode the Python interpreter, ABI, and platform they support in their filenames using
//! platform compatibility tags. This module ranks a wheel's tags against an ordered, best-first
//! list of tags supported by the current environment (see [`crate::env`]).

use indexmap::IndexSet;
use itertools::Itertools;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A representation of a tag triple for a wheel.
#[derive(Debug, Clone, Hash, Eq, PartialEq, SerializeDisplay, DeserializeFromStr)]
pub struct CompatTag {
    /// The interpreter name, e.g. "py3", "cp311".
    pub interpreter: String,

    /// The ABI a wheel supports, e.g. "cp311", "abi3", "none".
    pub abi: String,

    /// The OS/platform a wheel supports, e.g. "manylinux_2_17_x86_64", "any".
    pub platform: String,
}

impl FromStr for CompatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((interpreter, abi, platform)) =
            s.split('-').map(ToOwned::to_owned).collect_tuple()
        else {
            return Err(String::from("not enough '-' separators"));
        };
        Ok(Self {
            interpreter,
            abi,
            platform,
        })
    }
}

impl Display for CompatTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", &self.interpreter, &self.abi, &self.platform)
    }
}

/// An ordered, best-first set of tags supported by the current environment. Wheel compatibility
/// ranking is a lookup into this ordering: the earlier a tag appears, the more specific (and
/// therefore preferred) it is.
#[derive(Debug, Clone)]
pub struct CompatTags {
    tags: IndexSet<CompatTag>,
}

impl CompatTags {
    /// Returns an iterator over the supported tags, best first.
    pub fn tags(&self) -> impl Iterator<Item = &'_ CompatTag> + '_ {
        self.tags.iter()
    }

    /// Determines the compatibility rank of `tag`. Returns `None` if `tag` is not supported by
    /// this environment. Otherwise returns a score where higher is more preferred; the most
    /// specific (first-listed) tag scores `0`, later/more-general tags score progressively more
    /// negative.
    pub fn compatibility(&self, tag: &CompatTag) -> Option<i32> {
        self.tags.get_index_of(tag).map(|score| -(score as i32))
    }

    /// Returns true if `tag` is supported by this environment.
    pub fn is_compatible(&self, tag: &CompatTag) -> bool {
        self.tags.contains(tag)
    }

    /// Returns the best (highest-ranked) compatible tag among `candidates`, if any are
    /// compatible.
    pub fn best_match<'a>(
        &self,
        candidates: impl Iterator<Item = CompatTag>,
    ) -> Option<(CompatTag, i32)> {
        candidates
            .filter_map(|tag| self.compatibility(&tag).map(|score| (tag, score)))
            .max_by_key(|(_, score)| *score)
    }
}

impl FromIterator<CompatTag> for CompatTags {
    fn from_iter<T: IntoIterator<Item = CompatTag>>(iter: T) -> Self {
        Self {
            tags: FromIterator::from_iter(iter),
        }
    }
}

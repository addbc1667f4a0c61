//! Stage transition tables.

use core::{fmt, hash::Hash};

use rustc_hash::FxHashMap;

/// The rules of a conversation: which message ids are legal in which stage, and
/// where they lead.
///
/// The same table is consulted for sent and received messages, ids being unique
/// across both directions.
pub trait StageTable {
    type Stage: Copy + Eq + fmt::Debug;

    /// The stage a fresh conversation starts in.
    fn start(&self) -> Self::Stage;

    /// The stage reached by exchanging message `id` in `stage`, or `None` if `id`
    /// is not legal there.
    fn transition(&self, stage: Self::Stage, id: u16) -> Option<Self::Stage>;
}

/// A [`StageTable`] stored as data.
#[derive(Debug, Clone)]
pub struct Transitions<S> {
    start: S,
    edges: FxHashMap<(S, u16), S>,
}

impl<S: Copy + Eq + Hash> Transitions<S> {
    pub fn new(start: S) -> Self {
        Self {
            start,
            edges: FxHashMap::default(),
        }
    }

    /// Adds the edge `from --id--> to`.
    pub fn with(mut self, from: S, id: u16, to: S) -> Self {
        self.edges.insert((from, id), to);
        self
    }

    /// Message ids legal in `stage`.
    pub fn legal(&self, stage: S) -> impl Iterator<Item = u16> + '_ {
        self.edges
            .keys()
            .filter(move |&&(from, _)| from == stage)
            .map(|&(_, id)| id)
    }
}

impl<S: Copy + Eq + Hash + fmt::Debug> StageTable for Transitions<S> {
    type Stage = S;

    #[inline(always)]
    fn start(&self) -> S {
        self.start
    }

    #[inline(always)]
    fn transition(&self, stage: S, id: u16) -> Option<S> {
        self.edges.get(&(stage, id)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
    }

    #[test]
    fn unknown_edges_are_illegal() {
        let table = Transitions::new(Light::Red)
            .with(Light::Red, 1, Light::Green)
            .with(Light::Green, 2, Light::Red);

        assert_eq!(table.start(), Light::Red);
        assert_eq!(table.transition(Light::Red, 1), Some(Light::Green));
        assert_eq!(table.transition(Light::Red, 2), None);
        assert_eq!(table.legal(Light::Green).collect::<Vec<_>>(), [2]);
    }
}

//! Positional ordering for Routes-in-Trek and Markers-in-Route
//!
//! [`PositionalList`] stores each member together with an explicit position.
//! Every mutation renumbers only the slots it displaced, so after each call the
//! positions are exactly `0..len` in iteration order. Mutations never trigger
//! recomputation; invalidating derived data is the caller's job.

use crate::{Result, TrekError};
use std::ops::RangeInclusive;

/// A member and its 0-based position
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slot<T> {
    pub position: usize,
    pub value: T,
}

/// Ordered collection with contiguous, automatically maintained positions
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PositionalList<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for PositionalList<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> PositionalList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Members in position order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().map(|slot| &slot.value)
    }

    /// `(position, member)` pairs in position order
    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).map(|slot| &slot.value)
    }

    /// Append at the end and return the assigned position
    pub fn append(&mut self, value: T) -> usize {
        let position = self.slots.len();
        self.slots.push(Slot { position, value });
        self.debug_check();
        position
    }

    /// Insert at `index`, shifting the members at and after it by one
    ///
    /// `index == len` appends.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.slots.len();
        if index > len {
            return Err(TrekError::OutOfRange { index, len });
        }
        self.slots.insert(
            index,
            Slot {
                position: index,
                value,
            },
        );
        self.renumber(index..=len);
        Ok(())
    }

    /// Remove the member at `index` and return it
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        let len = self.slots.len();
        if index >= len {
            return Err(TrekError::OutOfRange { index, len });
        }
        let slot = self.slots.remove(index);
        if index + 1 < len {
            self.renumber(index..=len - 2);
        }
        self.debug_check();
        Ok(slot.value)
    }

    /// Move the member at `from` so that it ends up at position `to`
    ///
    /// Valid targets are `0..=len`, the same range [`insert`](Self::insert)
    /// accepts. `len` and `len - 1` both mean "last".
    pub fn move_at(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.slots.len();
        if from >= len {
            return Err(TrekError::OutOfRange { index: from, len });
        }
        if to > len {
            return Err(TrekError::OutOfRange { index: to, len });
        }
        let to = to.min(len - 1);
        if from == to {
            return Ok(());
        }
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
        self.renumber(from.min(to)..=from.max(to));
        Ok(())
    }

    /// Drop every member for which `keep` returns false; returns the count removed
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| keep(&slot.value));
        let removed = before - self.slots.len();
        if removed > 0 && !self.slots.is_empty() {
            self.renumber(0..=self.slots.len() - 1);
        }
        self.debug_check();
        removed
    }

    /// Whether positions are exactly `0..len` in iteration order
    pub fn is_contiguous(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(index, slot)| slot.position == index)
    }

    fn renumber(&mut self, range: RangeInclusive<usize>) {
        for index in range {
            self.slots[index].position = index;
        }
        self.debug_check();
    }

    #[inline]
    fn debug_check(&self) {
        debug_assert!(
            self.is_contiguous(),
            "positional list lost contiguity: {:?}",
            self.slots.iter().map(|s| s.position).collect::<Vec<_>>()
        );
    }
}

impl<T: PartialEq> PositionalList<T> {
    /// Position of the first occurrence of `value`
    pub fn position_of(&self, value: &T) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.value == value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.position_of(value).is_some()
    }

    /// Remove the first occurrence of `value`, returning its old position
    pub fn remove(&mut self, value: &T) -> Result<usize> {
        let index = self
            .position_of(value)
            .ok_or_else(|| TrekError::NotFound("member of ordered collection".to_string()))?;
        self.remove_at(index)?;
        Ok(index)
    }

    /// Move the first occurrence of `value` to position `to`
    pub fn move_item(&mut self, value: &T, to: usize) -> Result<()> {
        let from = self
            .position_of(value)
            .ok_or_else(|| TrekError::NotFound("member of ordered collection".to_string()))?;
        self.move_at(from, to)
    }
}

impl<T> FromIterator<T> for PositionalList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        for value in iter {
            list.append(value);
        }
        list
    }
}

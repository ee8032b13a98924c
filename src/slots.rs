// ABOUTME: Fixed-capacity client slot table with evict-all-on-overflow install policy
//
// Each slot is either Empty or Occupied by one connection. Taking an occupant
// out of its slot hands ownership back to the caller; dropping it closes it.

use std::mem;

/// One entry of the slot table
#[derive(Debug)]
pub enum Slot<C> {
    Empty,
    Occupied(C),
}

impl<C> Slot<C> {
    /// Whether the slot holds a connection
    pub fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }

    /// Empty the slot, returning its previous occupant
    pub fn take(&mut self) -> Option<C> {
        match mem::replace(self, Self::Empty) {
            Self::Occupied(conn) => Some(conn),
            Self::Empty => None,
        }
    }
}

/// Result of installing a connection
#[derive(Debug)]
pub struct Installed<C> {
    /// Slot the new connection now occupies
    pub index: usize,
    /// Occupants evicted to make room, with the slots they held
    pub displaced: Vec<(usize, C)>,
}

/// Fixed-capacity table of client connections
#[derive(Debug)]
pub struct SlotTable<C> {
    slots: Vec<Slot<C>>,
}

impl<C> SlotTable<C> {
    /// Create a table with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_occupied()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_occupied())
    }

    pub fn get(&self, index: usize) -> Option<&C> {
        match self.slots.get(index) {
            Some(Slot::Occupied(conn)) => Some(conn),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(conn)) => Some(conn),
            _ => None,
        }
    }

    /// Occupied slots in index order
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(conn) => Some((index, conn)),
                Slot::Empty => None,
            })
    }

    /// Empty every slot, returning the evicted occupants in index order.
    ///
    /// Calling it on an empty table is a no-op.
    pub fn evict_all(&mut self) -> Vec<(usize, C)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|conn| (index, conn)))
            .collect()
    }

    /// Put `conn` into the first empty slot.
    ///
    /// When every slot is occupied the whole table is evicted first, so a new
    /// connection always gets in. `Err(conn)` is returned only by a table with
    /// zero capacity.
    pub fn try_install(&mut self, conn: C) -> Result<Installed<C>, C> {
        let displaced = if self.slots.iter().all(Slot::is_occupied) {
            self.evict_all()
        } else {
            Vec::new()
        };

        match self.slots.iter().position(|slot| !slot.is_occupied()) {
            Some(index) => {
                self.slots[index] = Slot::Occupied(conn);
                Ok(Installed { index, displaced })
            }
            None => Err(conn),
        }
    }

    /// Empty one slot, returning its occupant
    pub fn clear(&mut self, index: usize) -> Option<C> {
        self.slots.get_mut(index).and_then(Slot::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_table_is_empty() {
        let table: SlotTable<u32> = SlotTable::new(3);
        assert_eq!(table.capacity(), 3);
        assert_eq!(table.occupied(), 0);
        assert!(table.is_empty());
        assert!(table.get(0).is_none());
        assert!(table.get(7).is_none());
    }

    #[test]
    fn test_install_fills_first_empty_slot() {
        let mut table = SlotTable::new(3);

        let installed = table.try_install("a").unwrap();
        assert_eq!(installed.index, 0);
        assert!(installed.displaced.is_empty());

        let installed = table.try_install("b").unwrap();
        assert_eq!(installed.index, 1);

        table.clear(0);
        let installed = table.try_install("c").unwrap();
        assert_eq!(installed.index, 0);
        assert_eq!(table.get(0), Some(&"c"));
        assert_eq!(table.get(1), Some(&"b"));
    }

    #[test]
    fn test_single_slot_new_connection_displaces_previous() {
        let mut table = SlotTable::new(1);
        table.try_install("a").unwrap();

        let installed = table.try_install("b").unwrap();
        assert_eq!(installed.index, 0);
        assert_eq!(installed.displaced, vec![(0, "a")]);
        assert_eq!(table.occupied(), 1);
        assert_eq!(table.get(0), Some(&"b"));
    }

    #[test]
    fn test_full_table_evicts_everyone() {
        let mut table = SlotTable::new(2);
        table.try_install("a").unwrap();
        table.try_install("b").unwrap();

        let installed = table.try_install("c").unwrap();
        assert_eq!(installed.index, 0);
        assert_eq!(installed.displaced, vec![(0, "a"), (1, "b")]);
        assert_eq!(table.occupied(), 1);
        assert!(table.get(1).is_none());
    }

    #[test]
    fn test_evict_all_is_idempotent() {
        let mut table = SlotTable::new(2);
        table.try_install(1).unwrap();

        assert_eq!(table.evict_all(), vec![(0, 1)]);
        assert!(table.evict_all().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_clear_only_touches_one_slot() {
        let mut table = SlotTable::new(3);
        table.try_install('x').unwrap();
        table.try_install('y').unwrap();
        table.try_install('z').unwrap();

        assert_eq!(table.clear(1), Some('y'));
        assert_eq!(table.clear(1), None);
        assert_eq!(table.clear(9), None);

        let remaining: Vec<_> = table.iter_occupied().map(|(i, c)| (i, *c)).collect();
        assert_eq!(remaining, vec![(0, 'x'), (2, 'z')]);
    }

    #[test]
    fn test_zero_capacity_rejects_install() {
        let mut table = SlotTable::new(0);
        assert_eq!(table.try_install(5).unwrap_err(), 5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_get_mut_updates_occupant() {
        let mut table = SlotTable::new(1);
        table.try_install(10_u64).unwrap();
        *table.get_mut(0).unwrap() += 5;
        assert_eq!(table.get(0), Some(&15));
    }

    #[test]
    fn test_occupancy_never_exceeds_capacity() {
        // Deterministic pseudo-random stream of installs, clears and evictions
        let mut seed: u64 = 0x5EED;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            seed >> 33
        };

        for capacity in 1..=4 {
            let mut table = SlotTable::new(capacity);
            for id in 0..500_u64 {
                match next() % 5 {
                    0 => {
                        table.evict_all();
                    }
                    1 => {
                        let index = usize::try_from(next()).unwrap() % capacity;
                        table.clear(index);
                    }
                    _ => {
                        let before = table.occupied();
                        let installed = table.try_install(id).unwrap();
                        assert_eq!(table.get(installed.index), Some(&id));
                        if before == capacity {
                            assert_eq!(installed.displaced.len(), capacity);
                            assert_eq!(table.occupied(), 1);
                        } else {
                            assert!(installed.displaced.is_empty());
                            assert_eq!(table.occupied(), before + 1);
                        }
                    }
                }
                assert!(table.occupied() <= capacity);
            }
        }
    }
}

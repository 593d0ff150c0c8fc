use starling_api::{ActorKey, SlotId};

#[derive(Debug)]
struct Entry {
    generation: u32,
    slot: Option<SlotId>,
}

/// Maps actor identity to the slot it lives on.
///
/// Indices of stopped actors are reused; the generation bump on release keeps
/// stale keys from resolving to the newcomer.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl Registry {
    pub(crate) fn allocate(&mut self, slot: SlotId) -> Option<ActorKey> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.entries.len()).ok()?;
                self.entries.push(Entry {
                    generation: 0,
                    slot: None,
                });
                index
            }
        };
        let entry = &mut self.entries[index as usize];
        entry.slot = Some(slot);
        self.live += 1;
        Some(ActorKey::new(index, entry.generation))
    }

    pub(crate) fn release(&mut self, key: ActorKey) -> bool {
        match self.entries.get_mut(key.index as usize) {
            Some(entry) if entry.generation == key.generation && entry.slot.is_some() => {
                entry.slot = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(key.index);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn slot_of(&self, key: ActorKey) -> Option<SlotId> {
        self.entries
            .get(key.index as usize)
            .filter(|entry| entry.generation == key.generation)
            .and_then(|entry| entry.slot)
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }
}

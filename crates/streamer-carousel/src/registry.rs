//! CarouselRegistry (§4.5): a fixed set of carousels, each pre-allocated
//! with id=0 and no gateway, plus its own module cache. There is no
//! eviction — a registry slot lives for the process's lifetime once a
//! gateway adopts an id for it.

use crate::module::ModuleRecord;

/// Compile-time cap on the number of carousels tracked at once (§4.5).
pub const MAXCAROUSELS: usize = 8;

/// The BIOP gateway fields a DSI fills in (§3 `Carousel`: "a pointer to the
/// BIOP gateway descriptor (nullable; null ⇒ gateway not yet received)").
#[derive(Debug, Clone, Copy, Default)]
pub struct Gateway {
    pub module_id: u16,
    pub assoc_tag: u16,
}

/// Per-carousel state (§3 `Carousel`). `id == 0` means "not yet assigned" —
/// only a DSI's gateway IOR adopts a real id for a freshly allocated slot.
#[derive(Debug, Default)]
pub struct Carousel {
    pub id: u32,
    pub gateway: Option<Gateway>,
    modules: Vec<ModuleRecord>,
}

impl Carousel {
    pub fn modules(&self) -> &[ModuleRecord] {
        &self.modules
    }

    pub(crate) fn modules_mut(&mut self) -> &mut Vec<ModuleRecord> {
        &mut self.modules
    }

    pub fn find_module(&self, module_id: u16) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.module_id == module_id)
    }
}

/// Fixed array of [`MAXCAROUSELS`] entries (§4.5). Construction pre-fills
/// every slot the way `dsmcc_init` does, so lookups never need to
/// distinguish "slot doesn't exist" from "slot unassigned".
pub struct CarouselRegistry {
    carousels: Vec<Carousel>,
}

impl Default for CarouselRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CarouselRegistry {
    pub fn new() -> Self {
        let mut carousels = Vec::with_capacity(MAXCAROUSELS);
        carousels.resize_with(MAXCAROUSELS, Carousel::default);
        Self { carousels }
    }

    /// Linear scan for the carousel whose `id` matches (§4.5 `find_by_id`).
    pub fn find_by_id(&self, carousel_id: u32) -> Option<&Carousel> {
        self.carousels.iter().find(|c| c.id == carousel_id)
    }

    pub fn find_by_id_mut(&mut self, carousel_id: u32) -> Option<&mut Carousel> {
        self.carousels.iter_mut().find(|c| c.id == carousel_id)
    }

    /// Fills the first entry whose id is still 0 (§4.5 `allocate_for`) —
    /// used when a gateway IOR assigns an id to a carousel this registry
    /// hasn't seen before.
    pub fn allocate_for(&mut self, carousel_id: u32) -> Option<&mut Carousel> {
        let slot = self.carousels.iter_mut().find(|c| c.id == 0)?;
        slot.id = carousel_id;
        Some(slot)
    }

    /// The carousel a DSI's gateway message targets (§4.6.1): reuse an
    /// existing entry with a matching non-zero id, otherwise claim the
    /// first still-unassigned slot. Returns `None` only when every slot is
    /// already claimed by a different carousel (§4.5 "There is no
    /// eviction").
    pub fn find_or_allocate_gateway(&mut self, carousel_id: u32) -> Option<&mut Carousel> {
        if carousel_id != 0 {
            if let Some(pos) = self.carousels.iter().position(|c| c.id == carousel_id) {
                return Some(&mut self.carousels[pos]);
            }
        }
        if let Some(pos) = self.carousels.iter().position(|c| c.id == 0 && c.gateway.is_none()) {
            return Some(&mut self.carousels[pos]);
        }
        self.allocate_for(carousel_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.carousels.len()
    }
}

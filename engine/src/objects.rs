use serde::{Serialize, Deserialize};
use image::RgbaImage;
use kurbo::{Point, Rect, Size};
use std::rc::Rc;
use crate::filters::{ActiveFilter, FilterSet};
use crate::geometry::Placement;
use crate::image_ops;
use crate::scene::{ImageKey, ImageStore};

/// The single raster being edited.
///
/// `natural_width`/`natural_height` are the decoded pixel dimensions and never
/// change for the lifetime of the element; the on-screen size comes from the
/// placement scale.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImageElement {
    pub id: u32,
    pub source: ImageKey,
    pub natural_width: u32,
    pub natural_height: u32,
    pub placement: Placement,
    pub draggable: bool,
    pub filters: FilterSet,
    #[serde(skip)]
    pub(crate) filter_cache: Option<FilterCache>,
}

#[derive(Clone, Debug)]
pub(crate) struct FilterCache {
    source: ImageKey,
    filters: Vec<ActiveFilter>,
    pixels: Rc<RgbaImage>,
}

impl ImageElement {
    /// Creates an element centered on its own middle so rotations and flips
    /// pivot around the image center.
    pub fn new(id: u32, source: ImageKey, natural_width: u32, natural_height: u32) -> Self {
        ImageElement {
            id,
            source,
            natural_width,
            natural_height,
            placement: Placement {
                offset_x: natural_width as f64 / 2.0,
                offset_y: natural_height as f64 / 2.0,
                ..Placement::default()
            },
            draggable: true,
            filters: FilterSet::default(),
            filter_cache: None,
        }
    }

    pub fn natural_size(&self) -> Size {
        Size::new(self.natural_width as f64, self.natural_height as f64)
    }

    pub fn client_rect(&self) -> Rect {
        self.placement.client_rect(self.natural_size())
    }

    pub fn displayed_size(&self) -> Size {
        Size::new(
            self.natural_width as f64 * self.placement.scale_x.abs(),
            self.natural_height as f64 * self.placement.scale_y.abs(),
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        let local = self.placement.to_image_space(point);
        local.x >= 0.0 && local.y >= 0.0
            && local.x <= self.natural_width as f64 && local.y <= self.natural_height as f64
    }

    /// Pixels with the current filter list applied, recomputed only when the
    /// list or the source changed.
    pub fn filtered_pixels(&mut self, store: &ImageStore) -> Option<Rc<RgbaImage>> {
        self.refresh_filter_cache(store);
        self.filter_cache.as_ref().map(|cache| cache.pixels.clone())
    }

    pub(crate) fn refresh_filter_cache(&mut self, store: &ImageStore) {
        let filters = self.filters.active();
        if let Some(cache) = &self.filter_cache {
            if cache.source == self.source && cache.filters == filters { return; }
        }
        let Some(source) = store.get(self.source) else {
            self.filter_cache = None;
            return;
        };
        let pixels = if filters.is_empty() { source } else { Rc::new(image_ops::apply_filters(&source, &filters)) };
        self.filter_cache = Some(FilterCache { source: self.source, filters, pixels });
    }

    pub(crate) fn clear_filter_cache(&mut self) {
        self.filter_cache = None;
    }

    #[cfg(test)]
    pub(crate) fn has_filter_cache(&self) -> bool {
        self.filter_cache.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransformHandles {
    pub id: u32,
    pub attached_to: Option<u32>,
    pub visible: bool,
    pub keep_ratio: bool,
}

impl TransformHandles {
    pub fn new(id: u32) -> Self {
        TransformHandles { id, attached_to: None, visible: true, keep_ratio: true }
    }

    pub fn attach(&mut self, node_id: u32) {
        self.attached_to = Some(node_id);
        self.visible = true;
    }

    pub fn detach(&mut self) {
        self.attached_to = None;
    }
}

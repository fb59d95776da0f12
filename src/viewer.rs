use image::RgbaImage;
use rand::{rngs::StdRng, SeedableRng};

use crate::activity_log::ActivityLog;
use crate::errors::{Result, ViewerError};
use crate::interaction::{DragState, InputEvent, Offset, Point, SurfaceRect, RESET_KEY};
use crate::mask::{Mask, Tint};
use crate::scene::{self, Layer};

/// Session state of one viewer: the base buffer, the mask collection and the
/// drag gesture in progress.
///
/// Event handlers take `&mut self` and run to completion, so no two of them
/// ever touch the session at once.
#[derive(Debug)]
pub struct Viewer {
    /// Decoded upload, kept pristine for cutting pieces.
    original: Option<RgbaImage>,
    /// Background layer with every mask footprint erased.
    base: Option<RgbaImage>,
    masks: Vec<Mask>,
    drag: DragState,
    surface: SurfaceRect,
    log: ActivityLog,
    rng: StdRng,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Viewer whose overlay tints are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            original: None,
            base: None,
            masks: Vec::new(),
            drag: DragState::Idle,
            surface: SurfaceRect::identity(0, 0),
            log: ActivityLog::new(),
            rng,
        }
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    pub fn original(&self) -> Option<&RgbaImage> {
        self.original.as_ref()
    }

    pub fn base(&self) -> Option<&RgbaImage> {
        self.base.as_ref()
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    /// Natural size of the loaded image, `(0, 0)` before any upload.
    pub fn dimensions(&self) -> (u32, u32) {
        self.original
            .as_ref()
            .map_or((0, 0), |image| image.dimensions())
    }

    pub fn surface(&self) -> SurfaceRect {
        self.surface
    }

    /// Record where the rendering surface is displayed, for pointer mapping.
    pub fn set_surface(&mut self, surface: SurfaceRect) {
        self.surface = surface;
    }

    /// Install a freshly decoded upload as both the pristine source and the
    /// background layer. The surface is sized pixel-for-pixel to the image.
    pub fn set_base_image(&mut self, image: RgbaImage) {
        let (width, height) = image.dimensions();
        self.surface = SurfaceRect::identity(width, height);
        self.base = Some(image.clone());
        self.original = Some(image);
    }

    pub fn clear_masks(&mut self) {
        self.masks.clear();
        self.drag = DragState::Idle;
    }

    /// Process a decoded mask and append it to the collection.
    pub fn add_mask(&mut self, name: &str, url: &str, source: RgbaImage) -> Result<&Mask> {
        let (Some(original), Some(base)) = (self.original.as_ref(), self.base.as_mut()) else {
            return Err(ViewerError::NoBaseImage);
        };
        let tint = Tint::random(&mut self.rng);
        let mask = Mask::process(name, url, source, original, base, tint);
        log::debug!(
            "mask {} covers {} pixels (inverted: {})",
            name,
            mask.footprint_len(),
            mask.inverted
        );
        self.masks.push(mask);
        Ok(&self.masks[self.masks.len() - 1])
    }

    /// Indices of every mask covering `at`, at their current offsets.
    pub fn masks_at(&self, at: Point) -> Vec<usize> {
        self.masks
            .iter()
            .enumerate()
            .filter(|(_, mask)| mask.hit(at))
            .map(|(i, _)| i)
            .collect()
    }

    /// Start dragging every mask under `at`. Returns whether anything was hit.
    pub fn pointer_down(&mut self, at: Point) -> bool {
        let selection = self.masks_at(at);
        log::debug!("pointer down at {:?} selects {:?}", at, selection);
        self.drag.press(selection, at)
    }

    /// Translate the selected masks by the movement since the last event.
    pub fn pointer_move(&mut self, at: Point) {
        let Some(delta) = self.drag.advance(at) else {
            return;
        };
        for &i in self.drag.selection() {
            self.masks[i].offset += delta;
        }
    }

    pub fn pointer_up(&mut self) {
        let released = self.drag.release();
        if !released.is_empty() {
            log::debug!("released {:?}", released);
        }
    }

    /// Move every piece back to where it was cut out. Erased base pixels
    /// stay erased.
    pub fn reset(&mut self) {
        for mask in &mut self.masks {
            mask.offset = Offset::ZERO;
        }
        self.log.info("Reset mask positions");
    }

    pub fn handle_event(&mut self, event: &InputEvent) {
        let natural = self.dimensions();
        let map = |surface: &SurfaceRect, x: f64, y: f64| surface.to_image(x, y, natural);
        match event {
            InputEvent::PointerDown { client_x, client_y } => {
                let at = map(&self.surface, *client_x, *client_y);
                self.pointer_down(at);
            }
            InputEvent::PointerMove { client_x, client_y } => {
                let at = map(&self.surface, *client_x, *client_y);
                self.pointer_move(at);
            }
            InputEvent::TouchStart { touches } => {
                if let Some(touch) = touches.first() {
                    let at = map(&self.surface, touch.client_x, touch.client_y);
                    self.pointer_down(at);
                }
            }
            InputEvent::TouchMove { touches } => {
                if let Some(touch) = touches.first() {
                    let at = map(&self.surface, touch.client_x, touch.client_y);
                    self.pointer_move(at);
                }
            }
            InputEvent::PointerUp | InputEvent::TouchEnd => self.pointer_up(),
            InputEvent::Key(key) if *key == RESET_KEY => self.reset(),
            InputEvent::Key(_) => {}
        }
    }

    pub fn draw_order(&self) -> Vec<Layer> {
        scene::draw_order(self.masks.len(), self.drag.selection())
    }

    /// Current scene as a single image, `None` before any upload.
    pub fn composite(&self) -> Option<RgbaImage> {
        self.base
            .as_ref()
            .map(|base| scene::compose(base, &self.masks, &self.draw_order()))
    }
}

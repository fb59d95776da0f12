//! Segmentation viewer: upload an image to an inference endpoint, cut the
//! returned masks out of it as movable pieces, and drag overlapping pieces
//! as a group.

pub mod activity_log;
pub mod config;
pub mod errors;
pub mod http;
pub mod interaction;
pub mod loader;
pub mod mask;
pub mod scene;
pub mod traits;
pub mod upload;
pub mod viewer;

pub mod mocks;

pub use activity_log::ActivityLog;
pub use config::{Config, DragGesture};
pub use errors::{Result, ViewerError};
pub use http::HttpBackend;
pub use interaction::{InputEvent, Offset, Point, SurfaceRect};
pub use mask::Mask;
pub use traits::*;
pub use upload::{UploadController, UploadRequest};
pub use viewer::Viewer;

/// Replay a scripted press-move-release on the viewer, in image coordinates.
///
/// Returns whether the press landed on any mask.
pub fn apply_gesture(viewer: &mut Viewer, gesture: &DragGesture) -> bool {
    let Point { x, y } = gesture.start;
    let end = gesture.start + gesture.delta;
    viewer.handle_event(&InputEvent::PointerDown {
        client_x: x as f64,
        client_y: y as f64,
    });
    let hit = viewer.drag_state().is_dragging();
    viewer.handle_event(&InputEvent::PointerMove {
        client_x: end.x as f64,
        client_y: end.y as f64,
    });
    viewer.handle_event(&InputEvent::PointerUp);
    hit
}

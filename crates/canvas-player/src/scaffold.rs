//! Wrapper, canvas and overlay element construction.

use canvas_player_types::{CanvasTarget, ElementId};

use crate::button_view::{PLAY_BUTTON, UNMUTE_BUTTON};
use crate::dom::Dom;
use crate::error::PlayerError;

/// Class names applied to generated elements.
pub mod style {
    pub const CANVAS: &str = "canvas-player-canvas";
    pub const PLAY_BUTTON: &str = "canvas-player-play-button";
    pub const UNMUTE_BUTTON: &str = "canvas-player-unmute-button";
    pub const POSTER: &str = "canvas-player-poster";
    pub const HIDDEN: &str = "canvas-player-hidden";
}

/// How the caller identifies the wrapper element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WrapperTarget {
    Selector(String),
    Element(ElementId),
}

impl From<&str> for WrapperTarget {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for WrapperTarget {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<ElementId> for WrapperTarget {
    fn from(el: ElementId) -> Self {
        Self::Element(el)
    }
}

pub fn resolve_wrapper(dom: &dyn Dom, target: &WrapperTarget) -> Result<ElementId, PlayerError> {
    match target {
        WrapperTarget::Selector(selector) => dom
            .query_selector(selector)
            .ok_or_else(|| PlayerError::WrapperNotFound(selector.clone())),
        WrapperTarget::Element(el) if dom.contains(*el) => Ok(*el),
        WrapperTarget::Element(el) => {
            Err(PlayerError::WrapperNotFound(format!("element {}", el.0)))
        }
    }
}

/// Give the wrapper a positioning context so overlays can be absolutely placed.
///
/// Returns `true` when the inline style was changed.
pub fn ensure_positioned(dom: &dyn Dom, wrapper: ElementId) -> bool {
    if dom.computed_style(wrapper, "position") == "static" {
        dom.set_style(wrapper, "position", "relative");
        true
    } else {
        false
    }
}

/// Reuse the configured canvas or create one inside the wrapper.
pub fn init_canvas(
    dom: &dyn Dom,
    wrapper: ElementId,
    target: Option<&CanvasTarget>,
) -> Result<ElementId, PlayerError> {
    match target {
        Some(CanvasTarget::Selector(selector)) => dom
            .query_selector(selector)
            .ok_or_else(|| PlayerError::CanvasNotFound(selector.clone())),
        Some(CanvasTarget::Element(el)) if dom.contains(*el) => Ok(*el),
        Some(CanvasTarget::Element(el)) => {
            Err(PlayerError::CanvasNotFound(format!("element {}", el.0)))
        }
        None => {
            let canvas = dom.create_element("canvas");
            dom.add_class(canvas, style::CANVAS);
            dom.append_child(wrapper, canvas);
            Ok(canvas)
        }
    }
}

pub fn create_play_button(dom: &dyn Dom, wrapper: ElementId) -> ElementId {
    let button = dom.create_element("div");
    dom.add_class(button, style::PLAY_BUTTON);
    dom.set_inner_html(button, PLAY_BUTTON);
    dom.append_child(wrapper, button);
    button
}

pub fn create_poster(dom: &dyn Dom, wrapper: ElementId, src: &str) -> ElementId {
    let poster = dom.create_element("img");
    dom.set_attribute(poster, "src", src);
    dom.add_class(poster, style::POSTER);
    dom.append_child(wrapper, poster);
    poster
}

pub fn create_unmute_button(dom: &dyn Dom, wrapper: ElementId) -> ElementId {
    let button = dom.create_element("div");
    dom.set_inner_html(button, UNMUTE_BUTTON);
    dom.add_class(button, style::UNMUTE_BUTTON);
    dom.append_child(wrapper, button);
    button
}

pub fn hide(dom: &dyn Dom, el: ElementId) {
    dom.add_class(el, style::HIDDEN);
}

pub fn show(dom: &dyn Dom, el: ElementId) {
    dom.remove_class(el, style::HIDDEN);
}

pub fn is_visible(dom: &dyn Dom, el: ElementId) -> bool {
    dom.contains(el) && !dom.has_class(el, style::HIDDEN)
}

//! DOM environment capability.
//!
//! The coordinator never touches a real document directly; it talks to a
//! [`Dom`] handed in at construction. [`MemoryDom`] is a small in-process
//! document with capture/bubble event dispatch, used headless and in tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

pub use canvas_player_types::{ElementId, Rect};

/// Gesture kinds the player shell listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    TouchStart,
}

/// Registration options for a listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Run during the capture phase instead of bubbling.
    pub capture: bool,
}

/// Identifies one registered listener for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Event passed to listeners.
#[derive(Debug)]
pub struct DomEvent {
    pub kind: EventKind,
    pub target: ElementId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    pub fn new(kind: EventKind, target: ElementId) -> Self {
        Self {
            kind,
            target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub type Listener = Rc<dyn Fn(&mut DomEvent)>;

/// Document operations the player shell relies on.
pub trait Dom {
    fn query_selector(&self, selector: &str) -> Option<ElementId>;
    fn contains(&self, el: ElementId) -> bool;
    fn create_element(&self, tag: &str) -> ElementId;
    fn append_child(&self, parent: ElementId, child: ElementId);
    /// Remove every descendant of `el` (`innerHTML = ''`).
    fn clear_children(&self, el: ElementId);
    /// Detach `child` from `parent` and drop its subtree.
    fn remove_child(&self, parent: ElementId, child: ElementId);
    fn children(&self, el: ElementId) -> Vec<ElementId>;
    fn computed_style(&self, el: ElementId, property: &str) -> String;
    fn style(&self, el: ElementId, property: &str) -> Option<String>;
    fn set_style(&self, el: ElementId, property: &str, value: &str);
    fn bounding_rect(&self, el: ElementId) -> Rect;
    fn add_class(&self, el: ElementId, class: &str);
    fn remove_class(&self, el: ElementId, class: &str);
    fn has_class(&self, el: ElementId, class: &str) -> bool;
    fn set_attribute(&self, el: ElementId, name: &str, value: &str);
    fn attribute(&self, el: ElementId, name: &str) -> Option<String>;
    fn set_inner_html(&self, el: ElementId, html: &str);
    fn add_listener(
        &self,
        el: ElementId,
        kind: EventKind,
        options: ListenerOptions,
        listener: Listener,
    ) -> ListenerId;
    fn remove_listener(&self, el: ElementId, id: ListenerId);
    /// Player session currently bound to `el`, if any.
    fn session(&self, el: ElementId) -> Option<u64>;
    fn set_session(&self, el: ElementId, session: Option<u64>);
}

struct Registered {
    id: ListenerId,
    kind: EventKind,
    capture: bool,
    listener: Listener,
}

#[derive(Default)]
struct Node {
    tag: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    classes: BTreeSet<String>,
    styles: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    inner_html: String,
    rect: Rect,
    listeners: Vec<Registered>,
    session: Option<u64>,
}

/// In-memory document.
pub struct MemoryDom {
    nodes: RefCell<HashMap<ElementId, Node>>,
    root: ElementId,
    next_id: Cell<u64>,
    next_listener: Cell<u64>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let root = ElementId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                tag: "body".to_string(),
                ..Node::default()
            },
        );
        Self {
            nodes: RefCell::new(nodes),
            root,
            next_id: Cell::new(1),
            next_listener: Cell::new(0),
        }
    }

    pub fn body(&self) -> ElementId {
        self.root
    }

    /// Create an element with an `id` attribute and attach it to `parent`.
    pub fn create_with_id(&self, parent: ElementId, tag: &str, id: &str) -> ElementId {
        let el = self.create_element(tag);
        self.set_attribute(el, "id", id);
        self.append_child(parent, el);
        el
    }

    /// Set the layout box reported by [`Dom::bounding_rect`].
    pub fn set_rect(&self, el: ElementId, rect: Rect) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.rect = rect;
        }
    }

    pub fn tag(&self, el: ElementId) -> Option<String> {
        self.nodes.borrow().get(&el).map(|n| n.tag.clone())
    }

    pub fn inner_html(&self, el: ElementId) -> Option<String> {
        self.nodes.borrow().get(&el).map(|n| n.inner_html.clone())
    }

    /// Number of listeners of `kind` attached to `el`.
    pub fn listener_count(&self, el: ElementId, kind: EventKind) -> usize {
        self.nodes
            .borrow()
            .get(&el)
            .map(|n| n.listeners.iter().filter(|l| l.kind == kind).count())
            .unwrap_or(0)
    }

    /// Dispatch `kind` at `target` through capture, target and bubble phases.
    pub fn dispatch(&self, target: ElementId, kind: EventKind) -> DomEvent {
        let mut event = DomEvent::new(kind, target);
        let path = self.path_to_root(target);

        // Capture: root -> target.
        for el in path.iter().rev() {
            self.invoke(*el, &mut event, |l| l.capture || *el == target);
            if event.propagation_stopped {
                return event;
            }
        }
        // Bubble: parent of target -> root.
        for el in path.iter().skip(1) {
            self.invoke(*el, &mut event, |l| !l.capture);
            if event.propagation_stopped {
                break;
            }
        }
        event
    }

    pub fn click(&self, target: ElementId) -> DomEvent {
        self.dispatch(target, EventKind::Click)
    }

    pub fn touch_start(&self, target: ElementId) -> DomEvent {
        self.dispatch(target, EventKind::TouchStart)
    }

    fn path_to_root(&self, target: ElementId) -> Vec<ElementId> {
        let nodes = self.nodes.borrow();
        let mut path = Vec::new();
        let mut cur = Some(target);
        while let Some(el) = cur {
            if !nodes.contains_key(&el) {
                break;
            }
            path.push(el);
            cur = nodes.get(&el).and_then(|n| n.parent);
        }
        path
    }

    fn invoke(&self, el: ElementId, event: &mut DomEvent, phase: impl Fn(&Registered) -> bool) {
        let selected: Vec<(ListenerId, Listener)> = {
            let nodes = self.nodes.borrow();
            let Some(node) = nodes.get(&el) else {
                return;
            };
            let mut at_target: Vec<&Registered> = node
                .listeners
                .iter()
                .filter(|l| l.kind == event.kind && phase(l))
                .collect();
            // Capture listeners run before bubble listeners on the target itself.
            at_target.sort_by_key(|l| !l.capture);
            at_target.iter().map(|l| (l.id, l.listener.clone())).collect()
        };
        for (id, listener) in selected {
            // A listener removed by an earlier one in this phase does not run.
            if !self.has_listener(el, id) {
                continue;
            }
            listener(event);
        }
    }

    fn has_listener(&self, el: ElementId, id: ListenerId) -> bool {
        self.nodes
            .borrow()
            .get(&el)
            .is_some_and(|n| n.listeners.iter().any(|l| l.id == id))
    }

    fn matches(node: &Node, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            node.attributes.get("id").is_some_and(|v| v == id)
        } else if let Some(class) = selector.strip_prefix('.') {
            node.classes.contains(class)
        } else {
            node.tag.eq_ignore_ascii_case(selector)
        }
    }

    fn remove_subtree(nodes: &mut HashMap<ElementId, Node>, el: ElementId) {
        if let Some(node) = nodes.remove(&el) {
            for child in node.children {
                Self::remove_subtree(nodes, child);
            }
        }
    }
}

impl Dom for MemoryDom {
    fn query_selector(&self, selector: &str) -> Option<ElementId> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        let nodes = self.nodes.borrow();
        // Document order: depth-first from the root.
        let mut stack = vec![self.root];
        while let Some(el) = stack.pop() {
            let node = nodes.get(&el)?;
            if Self::matches(node, selector) {
                return Some(el);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    fn contains(&self, el: ElementId) -> bool {
        self.nodes.borrow().contains_key(&el)
    }

    fn create_element(&self, tag: &str) -> ElementId {
        let id = ElementId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.nodes.borrow_mut().insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                ..Node::default()
            },
        );
        id
    }

    fn append_child(&self, parent: ElementId, child: ElementId) {
        let mut nodes = self.nodes.borrow_mut();
        if !nodes.contains_key(&parent) || parent == child {
            return;
        }
        let old_parent = match nodes.get_mut(&child) {
            Some(node) => node.parent.replace(parent),
            None => return,
        };
        if let Some(old) = old_parent.and_then(|p| nodes.get_mut(&p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(node) = nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    fn clear_children(&self, el: ElementId) {
        let mut nodes = self.nodes.borrow_mut();
        let children = match nodes.get_mut(&el) {
            Some(node) => {
                node.inner_html.clear();
                std::mem::take(&mut node.children)
            }
            None => return,
        };
        for child in children {
            Self::remove_subtree(&mut nodes, child);
        }
    }

    fn remove_child(&self, parent: ElementId, child: ElementId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(node) = nodes.get_mut(&parent) else {
            return;
        };
        let before = node.children.len();
        node.children.retain(|c| *c != child);
        if node.children.len() != before {
            Self::remove_subtree(&mut nodes, child);
        }
    }

    fn children(&self, el: ElementId) -> Vec<ElementId> {
        self.nodes
            .borrow()
            .get(&el)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn computed_style(&self, el: ElementId, property: &str) -> String {
        if let Some(value) = self.style(el, property) {
            return value;
        }
        match property {
            "position" => "static".to_string(),
            _ => String::new(),
        }
    }

    fn style(&self, el: ElementId, property: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&el)
            .and_then(|n| n.styles.get(property).cloned())
    }

    fn set_style(&self, el: ElementId, property: &str, value: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn bounding_rect(&self, el: ElementId) -> Rect {
        self.nodes
            .borrow()
            .get(&el)
            .map(|n| n.rect)
            .unwrap_or_default()
    }

    fn add_class(&self, el: ElementId, class: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.classes.insert(class.to_string());
        }
    }

    fn remove_class(&self, el: ElementId, class: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.classes.remove(class);
        }
    }

    fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.nodes
            .borrow()
            .get(&el)
            .is_some_and(|n| n.classes.contains(class))
    }

    fn set_attribute(&self, el: ElementId, name: &str, value: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn attribute(&self, el: ElementId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(&el)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_inner_html(&self, el: ElementId, html: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.inner_html = html.to_string();
        }
    }

    fn add_listener(
        &self,
        el: ElementId,
        kind: EventKind,
        options: ListenerOptions,
        listener: Listener,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(id.0);
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.listeners.push(Registered {
                id,
                kind,
                capture: options.capture,
                listener,
            });
        }
        id
    }

    fn remove_listener(&self, el: ElementId, id: ListenerId) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.listeners.retain(|l| l.id != id);
        }
    }

    fn session(&self, el: ElementId) -> Option<u64> {
        self.nodes.borrow().get(&el).and_then(|n| n.session)
    }

    fn set_session(&self, el: ElementId, session: Option<u64>) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&el) {
            node.session = session;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (MemoryDom, ElementId, ElementId) {
        let dom = MemoryDom::new();
        let wrapper = dom.create_with_id(dom.body(), "div", "player");
        let button = dom.create_element("div");
        dom.append_child(wrapper, button);
        (dom, wrapper, button)
    }

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Listener {
        let log = log.clone();
        Rc::new(move |_ev: &mut DomEvent| log.borrow_mut().push(tag))
    }

    #[test]
    fn query_selector_supports_id_class_and_tag() {
        let (dom, wrapper, button) = tree();
        dom.add_class(button, "play");
        assert_eq!(dom.query_selector("#player"), Some(wrapper));
        assert_eq!(dom.query_selector(".play"), Some(button));
        assert_eq!(dom.query_selector("DIV"), Some(wrapper));
        assert_eq!(dom.query_selector("#missing"), None);
        assert_eq!(dom.query_selector(""), None);
    }

    #[test]
    fn position_defaults_to_static() {
        let (dom, wrapper, _) = tree();
        assert_eq!(dom.computed_style(wrapper, "position"), "static");
        dom.set_style(wrapper, "position", "absolute");
        assert_eq!(dom.computed_style(wrapper, "position"), "absolute");
    }

    #[test]
    fn dispatch_runs_capture_then_bubble() {
        let (dom, wrapper, button) = tree();
        let log = Rc::new(RefCell::new(Vec::new()));
        dom.add_listener(
            wrapper,
            EventKind::Click,
            ListenerOptions::default(),
            record(&log, "wrapper-bubble"),
        );
        dom.add_listener(
            wrapper,
            EventKind::Click,
            ListenerOptions { capture: true },
            record(&log, "wrapper-capture"),
        );
        dom.add_listener(
            button,
            EventKind::Click,
            ListenerOptions::default(),
            record(&log, "button"),
        );

        dom.click(button);
        assert_eq!(*log.borrow(), vec!["wrapper-capture", "button", "wrapper-bubble"]);
    }

    #[test]
    fn stop_propagation_blocks_ancestors() {
        let (dom, wrapper, button) = tree();
        let log = Rc::new(RefCell::new(Vec::new()));
        dom.add_listener(
            wrapper,
            EventKind::Click,
            ListenerOptions::default(),
            record(&log, "wrapper"),
        );
        dom.add_listener(
            button,
            EventKind::Click,
            ListenerOptions { capture: true },
            Rc::new(|ev: &mut DomEvent| {
                ev.prevent_default();
                ev.stop_propagation();
            }),
        );
        let ev = dom.click(button);
        assert!(ev.default_prevented());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn listener_can_remove_itself_during_dispatch() {
        let (dom, wrapper, _) = tree();
        let dom = Rc::new(dom);
        let hits = Rc::new(Cell::new(0));
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let (d, h, s) = (Rc::downgrade(&dom), hits.clone(), slot.clone());
        let id = dom.add_listener(
            wrapper,
            EventKind::TouchStart,
            ListenerOptions::default(),
            Rc::new(move |_ev: &mut DomEvent| {
                h.set(h.get() + 1);
                if let (Some(dom), Some(id)) = (d.upgrade(), s.get()) {
                    dom.remove_listener(wrapper, id);
                }
            }),
        );
        slot.set(Some(id));
        dom.touch_start(wrapper);
        dom.touch_start(wrapper);
        assert_eq!(hits.get(), 1);
        assert_eq!(dom.listener_count(wrapper, EventKind::TouchStart), 0);
    }

    #[test]
    fn clear_children_drops_subtree() {
        let (dom, wrapper, button) = tree();
        let icon = dom.create_element("svg");
        dom.append_child(button, icon);
        dom.set_inner_html(wrapper, "<p>x</p>");
        dom.clear_children(wrapper);
        assert!(dom.children(wrapper).is_empty());
        assert!(!dom.contains(button));
        assert!(!dom.contains(icon));
        assert_eq!(dom.inner_html(wrapper).as_deref(), Some(""));
        assert!(dom.contains(wrapper));
    }

    #[test]
    fn remove_child_only_detaches_direct_children() {
        let (dom, wrapper, button) = tree();
        let other = dom.create_with_id(dom.body(), "div", "other");
        dom.remove_child(other, button);
        assert!(dom.contains(button));

        dom.remove_child(wrapper, button);
        assert!(!dom.contains(button));
        assert!(dom.children(wrapper).is_empty());
    }
}

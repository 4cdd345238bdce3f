//! Collapsible lists and card grids with a "Show more" toggle

use std::cell::Cell;
use std::rc::Rc;

use super::{Enhancement, EnhancementScope, SetupContext};
use crate::dom::{Document, EventTarget, Handler, NodeId};
use crate::util::parse_leading_int;

const SHOW_MORE_TEXT: &str = "Show more";
const SHOW_LESS_TEXT: &str = "Show less";

/// Insert an expand toggle button right after `container`. Clicking it
/// toggles `container-expanded` on both the button and the container.
pub fn attach_expand_toggle_button(ctx: &mut SetupContext<'_>, container: NodeId) -> NodeId {
    let doc = &mut *ctx.doc;
    let button = doc.create_element("button");
    doc.add_class(button, "expand-toggle-button");
    let text = doc.create_text(SHOW_MORE_TEXT);
    doc.append_child(button, text);
    let icon = doc.create_element("span");
    doc.add_class(icon, "expand-toggle-button-icon");
    doc.append_child(button, icon);
    doc.insert_after(container, button);

    let expanded = Rc::new(Cell::new(false));
    let toggle: Handler = Rc::new(move |doc: &mut Document| {
        let now_expanded = !expanded.get();
        expanded.set(now_expanded);

        if now_expanded {
            doc.add_class(container, "container-expanded");
            doc.add_class(button, "container-expanded");
            doc.set_node_value(text, SHOW_LESS_TEXT);
        } else {
            doc.remove_class(container, "container-expanded");
            doc.remove_class(button, "container-expanded");
            doc.set_node_value(text, SHOW_MORE_TEXT);
        }
    });
    ctx.listen(EventTarget::Node(button), "click", toggle);

    button
}

/// Read a collapse threshold attribute. `None` for missing, unparsable or
/// negative values (`-1` means "never collapse").
fn collapse_threshold(doc: &Document, node: NodeId, attr: &str) -> Option<usize> {
    let value = parse_leading_int(doc.attr(node, attr)?)?;
    usize::try_from(value).ok()
}

/// `.list.collapsible-container[data-collapse-after=N]`: items past the
/// first N collapse behind a toggle, staggered 20 ms apart
pub struct CollapsibleLists;

impl Enhancement for CollapsibleLists {
    fn name(&self) -> &'static str {
        "collapsible-lists"
    }

    fn scope(&self) -> EnhancementScope {
        EnhancementScope::Subtree
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        let lists = ctx.query_all(|d, n| d.has_classes(n, &["list", "collapsible-container"]));

        for list in lists {
            let Some(collapse_after) = collapse_threshold(ctx.doc, list, "data-collapse-after")
            else {
                continue;
            };

            let children = ctx.doc.element_children(list);
            if children.len() <= collapse_after {
                continue;
            }

            attach_expand_toggle_button(ctx, list);

            for (index, &child) in children.iter().enumerate().skip(collapse_after) {
                ctx.doc.add_class(child, "collapsible-item");
                let delay = (index - collapse_after) * 20;
                ctx.doc.set_style(child, "animation-delay", &format!("{}ms", delay));
            }
        }

        Ok(())
    }
}

/// `.cards-grid.collapsible-container[data-collapse-after-rows=N]`: cards
/// past N rows collapse. Cards per row come from `--cards-per-row`, so the
/// split is resolved after content ready and again whenever it changes.
pub struct CollapsibleGrids;

impl Enhancement for CollapsibleGrids {
    fn name(&self) -> &'static str {
        "collapsible-grids"
    }

    fn scope(&self) -> EnhancementScope {
        EnhancementScope::Subtree
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        let grids =
            ctx.query_all(|d, n| d.has_classes(n, &["cards-grid", "collapsible-container"]));

        for grid in grids {
            let Some(collapse_after_rows) =
                collapse_threshold(ctx.doc, grid, "data-collapse-after-rows")
            else {
                continue;
            };

            let button = attach_expand_toggle_button(ctx, grid);
            let cards_per_row: Rc<Cell<Option<usize>>> = Rc::new(Cell::new(None));

            let observe: Handler = Rc::new(move |doc: &mut Document| {
                if !doc.is_connected(grid) {
                    return;
                }
                let current = read_cards_per_row(doc, grid);
                if current == cards_per_row.get() {
                    return;
                }
                cards_per_row.set(current);

                let Some(per_row) = current else {
                    return;
                };
                doc.request_animation_frame(move |doc| {
                    resolve_collapsible_items(doc, grid, button, per_row, collapse_after_rows)
                });
            });

            let initial = Rc::clone(&observe);
            ctx.after_content_ready(move |doc| initial(doc));
            ctx.listen(EventTarget::Window, "resize", observe);
        }

        Ok(())
    }
}

/// `--cards-per-row` from the nearest element declaring it (custom
/// properties inherit). Zero or unparsable reads as `None`.
pub fn read_cards_per_row(doc: &Document, grid: NodeId) -> Option<usize> {
    let declared = doc.closest(grid, |d, n| d.style(n, "--cards-per-row").is_some())?;
    let value = parse_leading_int(&doc.style(declared, "--cards-per-row")?)?;
    usize::try_from(value).ok().filter(|&n| n > 0)
}

fn resolve_collapsible_items(
    doc: &mut Document,
    grid: NodeId,
    button: NodeId,
    cards_per_row: usize,
    collapse_after_rows: usize,
) {
    let hide_items_after = cards_per_row.saturating_mul(collapse_after_rows);
    let children = doc.element_children(grid);

    if hide_items_after >= children.len() {
        doc.set_style(button, "display", "none");
    } else {
        doc.remove_style(button, "display");
    }

    let mut row = 0;
    for (index, child) in children.into_iter().enumerate() {
        if index >= hide_items_after {
            doc.add_class(child, "collapsible-item");
            doc.set_style(child, "animation-delay", &format!("{}ms", row * 40));
            if index % cards_per_row + 1 == cards_per_row {
                row += 1;
            }
        } else {
            doc.remove_class(child, "collapsible-item");
            doc.remove_style(child, "animation-delay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ListenerSet;
    use crate::page::ReadyCallbacks;

    fn run(enhancement: &dyn Enhancement, html: &str) -> (Document, ReadyCallbacks, ListenerSet) {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, html).unwrap();
        let mut ready = ReadyCallbacks::new();
        let mut listeners = ListenerSet::new();
        let root = doc.root();
        let mut ctx = SetupContext::new(&mut doc, root, &mut ready, &mut listeners);
        enhancement.setup(&mut ctx).unwrap();
        (doc, ready, listeners)
    }

    fn toggle_buttons(doc: &Document) -> Vec<NodeId> {
        doc.query_all(doc.root(), |d, n| d.has_class(n, "expand-toggle-button"))
    }

    #[test]
    fn test_list_collapses_items_after_threshold() {
        let (doc, _, _) = run(
            &CollapsibleLists,
            r#"<ul id="l" class="list collapsible-container" data-collapse-after="2"><li>a</li><li>b</li><li>c</li><li>d</li></ul>"#,
        );
        let list = doc.element_by_id("l").unwrap();
        let items = doc.element_children(list);

        assert!(!doc.has_class(items[1], "collapsible-item"));
        assert!(doc.has_class(items[2], "collapsible-item"));
        assert_eq!(doc.style(items[2], "animation-delay").as_deref(), Some("0ms"));
        assert_eq!(doc.style(items[3], "animation-delay").as_deref(), Some("20ms"));

        let buttons = toggle_buttons(&doc);
        assert_eq!(buttons.len(), 1);
        assert_eq!(doc.parent(buttons[0]), doc.parent(list));
        assert_eq!(doc.text_content(buttons[0]), "Show more");
    }

    #[test]
    fn test_list_skips_disabled_and_short_lists() {
        let (doc, _, listeners) = run(
            &CollapsibleLists,
            r#"<ul class="list collapsible-container" data-collapse-after="-1"><li>a</li><li>b</li></ul>
               <ul class="list collapsible-container" data-collapse-after="2"><li>a</li><li>b</li></ul>
               <ul class="list collapsible-container"><li>a</li><li>b</li></ul>"#,
        );
        assert!(toggle_buttons(&doc).is_empty());
        assert!(listeners.is_empty());
        assert!(doc
            .query_all(doc.root(), |d, n| d.has_class(n, "collapsible-item"))
            .is_empty());
    }

    #[test]
    fn test_toggle_button_flips_expanded_state() {
        let (mut doc, _, _) = run(
            &CollapsibleLists,
            r#"<ul id="l" class="list collapsible-container" data-collapse-after="1"><li>a</li><li>b</li></ul>"#,
        );
        let list = doc.element_by_id("l").unwrap();
        let button = toggle_buttons(&doc)[0];
        let icon = doc.first_element_child(button).unwrap();
        assert!(doc.has_class(icon, "expand-toggle-button-icon"));

        doc.dispatch(EventTarget::Node(button), "click");
        assert!(doc.has_class(list, "container-expanded"));
        assert!(doc.has_class(button, "container-expanded"));
        assert_eq!(doc.text_content(button), "Show less");

        doc.dispatch(EventTarget::Node(button), "click");
        assert!(!doc.has_class(list, "container-expanded"));
        assert_eq!(doc.text_content(button), "Show more");
    }

    const GRID: &str = r#"<div id="wrap" style="--cards-per-row: 2"><div id="g" class="cards-grid collapsible-container" data-collapse-after-rows="1"><div>1</div><div>2</div><div>3</div><div>4</div><div>5</div></div></div>"#;

    #[tokio::test(start_paused = true)]
    async fn test_grid_resolves_after_ready_and_frame() {
        let (mut doc, mut ready, listeners) = run(&CollapsibleGrids, GRID);
        let grid = doc.element_by_id("g").unwrap();
        let cards = doc.element_children(grid);
        assert_eq!(listeners.len(), 2); // toggle click + window resize

        // Nothing resolved until ready callbacks and the animation frame run
        assert!(!doc.has_class(cards[4], "collapsible-item"));
        ready.flush(&mut doc);
        assert!(!doc.has_class(cards[4], "collapsible-item"));
        doc.settle().await;

        assert!(!doc.has_class(cards[1], "collapsible-item"));
        for &card in &cards[2..] {
            assert!(doc.has_class(card, "collapsible-item"));
        }
        assert_eq!(doc.style(cards[2], "animation-delay").as_deref(), Some("0ms"));
        assert_eq!(doc.style(cards[3], "animation-delay").as_deref(), Some("0ms"));
        assert_eq!(doc.style(cards[4], "animation-delay").as_deref(), Some("40ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grid_reresolves_when_cards_per_row_changes() {
        let (mut doc, mut ready, _) = run(&CollapsibleGrids, GRID);
        let grid = doc.element_by_id("g").unwrap();
        let wrap = doc.element_by_id("wrap").unwrap();
        let button = toggle_buttons(&doc)[0];
        ready.flush(&mut doc);
        doc.settle().await;

        // Wider layout: everything fits in one row, the toggle hides
        doc.set_style(wrap, "--cards-per-row", "5");
        doc.dispatch(EventTarget::Window, "resize");
        doc.settle().await;

        let cards = doc.element_children(grid);
        assert!(cards.iter().all(|&c| !doc.has_class(c, "collapsible-item")));
        assert!(cards.iter().all(|&c| doc.style(c, "animation-delay").is_none()));
        assert_eq!(doc.style(button, "display").as_deref(), Some("none"));

        // Same value again schedules nothing
        doc.dispatch(EventTarget::Window, "resize");
        assert_eq!(doc.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grid_with_huge_row_threshold_shows_everything() {
        let html = r#"<div style="--cards-per-row: 3"><div id="g" class="cards-grid collapsible-container" data-collapse-after-rows="9223372036854775807"><div>1</div><div>2</div></div></div>"#;
        let (mut doc, mut ready, _) = run(&CollapsibleGrids, html);
        let grid = doc.element_by_id("g").unwrap();
        let button = toggle_buttons(&doc)[0];
        ready.flush(&mut doc);
        doc.settle().await;

        let cards = doc.element_children(grid);
        assert!(cards.iter().all(|&c| !doc.has_class(c, "collapsible-item")));
        assert_eq!(doc.style(button, "display").as_deref(), Some("none"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_grid_is_ignored() {
        let (mut doc, mut ready, _) = run(&CollapsibleGrids, GRID);
        let body = doc.body();
        let grid = doc.element_by_id("g").unwrap();
        doc.set_inner_html(body, "<p>replaced</p>").unwrap();

        ready.flush(&mut doc);
        assert_eq!(doc.pending_timers(), 0);
        assert!(doc
            .element_children(grid)
            .iter()
            .all(|&c| !doc.has_class(c, "collapsible-item")));
    }

    #[test]
    fn test_read_cards_per_row() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, r#"<div id="a" style="--cards-per-row: 3px"><div id="b"></div></div><div id="c" style="--cards-per-row: 0"></div><div id="d"></div>"#)
            .unwrap();
        let id = |doc: &Document, s: &str| doc.element_by_id(s).unwrap();
        assert_eq!(read_cards_per_row(&doc, id(&doc, "b")), Some(3));
        assert_eq!(read_cards_per_row(&doc, id(&doc, "c")), None);
        assert_eq!(read_cards_per_row(&doc, id(&doc, "d")), None);
    }
}

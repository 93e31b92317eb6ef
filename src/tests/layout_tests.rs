use super::*;

fn tokens(items: &[&str]) -> LayoutNode {
    LayoutNode::Tokens(items.iter().map(|item| (*item).to_owned()).collect())
}

fn rect(slug: &str, top: f64, left: f64, width: f64, height: f64) -> Rect {
    Rect {
        slug: slug.to_owned(),
        top,
        left,
        width,
        height,
    }
}

fn row_constraint() -> Constraint {
    Constraint {
        axis: Axis::Row,
        ..Constraint::root()
    }
}

#[test]
fn two_row_grid_matches_expected_rects() {
    let layout = LayoutNode::Stack(vec![tokens(&["a:30", "b"]), tokens(&["c"])]);

    let rects = compile_layout(&layout).expect("compile");

    assert_eq!(
        rects,
        vec![
            rect("a", 0.0, 0.0, 30.0, 50.0),
            rect("b", 0.0, 30.0, 70.0, 50.0),
            rect("c", 50.0, 0.0, 100.0, 50.0),
        ]
    );
}

#[test]
fn grid_parses_from_json_array_of_rows() {
    let layout: LayoutNode = serde_json::from_str(r#"[["a:30", "b"], ["c"]]"#).expect("parse");
    assert_eq!(
        layout,
        LayoutNode::Stack(vec![tokens(&["a:30", "b"]), tokens(&["c"])])
    );
}

#[test]
fn unsized_tokens_split_remaining_space_evenly() {
    let rects = compile(&tokens(&["a", "b", "c"]), row_constraint()).expect("compile");

    let widths = rects.iter().map(|rect| rect.width).collect::<Vec<f64>>();
    assert_eq!(widths, vec![33.33, 33.33, 33.33]);
    let total = widths.iter().sum::<f64>();
    assert!((total - 100.0).abs() <= 0.1, "total width was {total}");
}

#[test]
fn sibling_sizes_sum_to_hundred_for_assorted_rows() {
    let rows: &[&[&str]] = &[
        &["a"],
        &["a", "b"],
        &["a:10", "b", "c", "d"],
        &["a:25", "b:25", "c:50"],
        &["a", "b", "c", "d", "e", "f", "g"],
        &["a:12.5", "b", "c:33.3"],
    ];
    for row in rows {
        let rects = compile(&tokens(row), row_constraint()).expect("compile");
        let total = rects.iter().map(|rect| rect.width).sum::<f64>();
        assert!((total - 100.0).abs() <= 0.1, "{row:?} summed to {total}");
        for pair in rects.windows(2) {
            assert!(
                pair[0].left + pair[0].width <= pair[1].left + 0.011,
                "{row:?} overlaps: {pair:?}"
            );
        }
    }
}

#[test]
fn column_axis_varies_top_and_keeps_width() {
    let rects = compile(&tokens(&["top:20", "bottom"]), Constraint::root()).expect("compile");
    assert_eq!(
        rects,
        vec![
            rect("top", 0.0, 0.0, 100.0, 20.0),
            rect("bottom", 20.0, 0.0, 100.0, 80.0),
        ]
    );
}

#[test]
fn td_split_places_cells_side_by_side_and_stacks_their_content() {
    let layout: LayoutNode = serde_json::from_str(
        r#"{
            "td:40": ["lint", "test"],
            "td": ["server"]
        }"#,
    )
    .expect("parse");

    let rects = compile_layout(&layout).expect("compile");

    assert_eq!(
        rects,
        vec![
            rect("lint", 0.0, 0.0, 40.0, 50.0),
            rect("server", 0.0, 40.0, 60.0, 100.0),
            rect("test", 50.0, 0.0, 40.0, 50.0),
        ]
    );
}

#[test]
fn tr_split_places_rows_and_lays_content_horizontally() {
    let layout: LayoutNode = serde_json::from_str(
        r#"{
            "tr:25": ["status"],
            "tr": {"td": ["left"], "td:30": ["right"]}
        }"#,
    )
    .expect("parse");

    let rects = compile_layout(&layout).expect("compile");

    assert_eq!(
        rects,
        vec![
            rect("status", 0.0, 0.0, 100.0, 25.0),
            rect("left", 25.0, 0.0, 70.0, 75.0),
            rect("right", 25.0, 70.0, 30.0, 75.0),
        ]
    );
}

#[test]
fn compile_is_deterministic() {
    let layout: LayoutNode = serde_json::from_str(
        r#"{"td:35": [["a", "b"], ["c:70", "d"]], "td": ["e", "f:10", "g"]}"#,
    )
    .expect("parse");

    let first = compile_layout(&layout).expect("first");
    let second = compile_layout(&layout).expect("second");
    assert_eq!(first, second);
}

#[test]
fn output_is_sorted_by_top_then_left() {
    let layout = LayoutNode::Stack(vec![tokens(&["x", "y"]), tokens(&["z"])]);
    let constraint = Constraint {
        axis: Axis::Row,
        ..Constraint::root()
    };

    let rects = compile(&layout, constraint).expect("compile");

    let order = rects
        .iter()
        .map(|rect| rect.slug.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(order, vec!["x", "z", "y"]);
}

#[test]
fn duplicate_slug_is_reported() {
    let layout = LayoutNode::Stack(vec![tokens(&["a", "b"]), tokens(&["a"])]);
    assert_eq!(
        compile_layout(&layout),
        Err(LayoutError::DuplicateSlug {
            slug: "a".to_owned()
        })
    );
}

#[test]
fn malformed_sizes_are_reported_with_token() {
    for bad in ["a:0", "a:-5", "a:wide", "a:", "a:inf"] {
        let err = compile_layout(&tokens(&[bad, "b"])).expect_err(bad);
        assert_eq!(
            err,
            LayoutError::InvalidSize {
                path: "layout".to_owned(),
                token: bad.to_owned(),
            }
        );
    }
}

#[test]
fn explicit_sizes_over_hundred_are_rejected() {
    let err = compile_layout(&tokens(&["a:70", "b:40"])).expect_err("overflow");
    assert!(matches!(err, LayoutError::Overflow { total, .. } if total == 110.0));

    let err = compile_layout(&tokens(&["a:100", "b"])).expect_err("no room");
    assert!(matches!(err, LayoutError::Overflow { .. }));
}

#[test]
fn fully_sized_group_short_of_hundred_is_rejected() {
    let err = compile(&tokens(&["a:30", "b:30"]), row_constraint()).expect_err("gap");
    assert_eq!(
        err,
        LayoutError::Underflow {
            path: "layout".to_owned(),
            total: 60.0,
        }
    );

    let split: LayoutNode =
        serde_json::from_str(r#"{"td:40": ["a"], "td:50": ["b"]}"#).expect("parse");
    let err = compile_layout(&split).expect_err("split gap");
    assert!(matches!(err, LayoutError::Underflow { total, .. } if total == 90.0));

    // within rounding of 100 is accepted
    let rects = compile(&tokens(&["a:33.33", "b:33.33", "c:33.34"]), row_constraint())
        .expect("compile");
    let total = rects.iter().map(|rect| rect.width).sum::<f64>();
    assert!((total - 100.0).abs() <= 0.1, "summed to {total}");
}

#[test]
fn all_explicit_sizes_do_not_need_wildcard_share() {
    let rects = compile(&tokens(&["a:60", "b:40"]), row_constraint()).expect("compile");
    assert_eq!(rects[0].width, 60.0);
    assert_eq!(rects[1].width, 40.0);
    assert!(rects.iter().all(|rect| rect.width.is_finite()));
}

#[test]
fn empty_groups_and_names_are_rejected() {
    assert_eq!(
        compile_layout(&LayoutNode::Tokens(Vec::new())),
        Err(LayoutError::EmptyGroup {
            path: "layout".to_owned()
        })
    );
    let err = compile_layout(&tokens(&[":20", "b"])).expect_err("empty name");
    assert!(matches!(err, LayoutError::EmptyName { .. }));
}

#[test]
fn split_keys_must_use_known_prefix_and_one_orientation() {
    let unknown: LayoutNode = serde_json::from_str(r#"{"col": ["a"]}"#).expect("parse");
    assert!(matches!(
        compile_layout(&unknown),
        Err(LayoutError::UnknownPrefix { key, .. }) if key == "col"
    ));

    let mixed: LayoutNode =
        serde_json::from_str(r#"{"td": ["a"], "tr": ["b"]}"#).expect("parse");
    assert!(matches!(
        compile_layout(&mixed),
        Err(LayoutError::MixedOrientation { .. })
    ));
}

#[test]
fn nested_error_path_names_offending_group() {
    let layout: LayoutNode =
        serde_json::from_str(r#"{"td": [["a"], ["b:zero"]]}"#).expect("parse");
    assert_eq!(
        compile_layout(&layout),
        Err(LayoutError::InvalidSize {
            path: "layout.td[1]".to_owned(),
            token: "b:zero".to_owned(),
        })
    );
}

#[test]
fn rect_projects_onto_cells_without_gaps() {
    let area = ratatui::layout::Rect::new(0, 0, 101, 40);
    let left = rect("a", 0.0, 0.0, 33.33, 50.0).to_cells(area);
    let right = rect("b", 0.0, 33.33, 66.67, 50.0).to_cells(area);

    assert_eq!(left.x + left.width, right.x);
    assert_eq!(right.x + right.width, 101);
    assert_eq!(left.height, 20);
}

#[test]
fn full_rect_covers_area() {
    let area = ratatui::layout::Rect::new(2, 1, 80, 24);
    assert_eq!(Rect::full("a").to_cells(area), area);
}

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

/// Nested layout description as it appears in the config file.
///
/// Three shapes are accepted:
/// - `["a:30", "b"]` lays tokens out along the current axis
/// - `[["a", "b"], ["c"]]` stacks nested nodes evenly along the current axis
/// - `{"td:40": [...], "td": [...]}` splits into explicitly oriented cells
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LayoutNode {
    Tokens(Vec<String>),
    Stack(Vec<LayoutNode>),
    Split(IndexMap<String, LayoutNode>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Children advance left to right.
    Row,
    /// Children advance top to bottom.
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub axis: Axis,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Constraint {
    pub fn root() -> Self {
        Self {
            axis: Axis::Column,
            top: 0.0,
            left: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub slug: String,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn full(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            top: 0.0,
            left: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }

    /// Projects the percentage rect onto a cell area. Edges are rounded
    /// independently so neighbouring panes share a border column instead of
    /// leaving a gap.
    pub fn to_cells(&self, area: ratatui::layout::Rect) -> ratatui::layout::Rect {
        let x0 = scale(self.left, area.width);
        let x1 = scale(self.left + self.width, area.width);
        let y0 = scale(self.top, area.height);
        let y1 = scale(self.top + self.height, area.height);
        ratatui::layout::Rect {
            x: area.x.saturating_add(x0),
            y: area.y.saturating_add(y0),
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

fn scale(percent: f64, extent: u16) -> u16 {
    let cells = (percent.clamp(0.0, 100.0) / 100.0 * f64::from(extent)).round();
    (cells as u16).min(extent)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout group `{path}` is empty")]
    EmptyGroup { path: String },
    #[error("layout token `{token}` at `{path}` has an empty name")]
    EmptyName { path: String, token: String },
    #[error("layout token `{token}` at `{path}` has an invalid size (expected a positive number)")]
    InvalidSize { path: String, token: String },
    #[error("explicit sizes under `{path}` add up to {total}%, leaving no room for the remaining entries")]
    Overflow { path: String, total: f64 },
    #[error("every entry under `{path}` is sized but the sizes add up to {total}%, not 100%")]
    Underflow { path: String, total: f64 },
    #[error("layout key `{key}` at `{path}` must start with `td` or `tr`")]
    UnknownPrefix { path: String, key: String },
    #[error("layout group `{path}` mixes `td` and `tr` keys")]
    MixedOrientation { path: String },
    #[error("pane `{slug}` appears more than once in the layout")]
    DuplicateSlug { slug: String },
}

/// Compiles a layout against the full screen and returns rects in focus order.
pub fn compile_layout(node: &LayoutNode) -> Result<Vec<Rect>, LayoutError> {
    compile(node, Constraint::root())
}

/// Compiles `node` inside `constraint`. The result is sorted by `top`, then
/// `left`, which is also the tab order of the dashboard.
pub fn compile(node: &LayoutNode, constraint: Constraint) -> Result<Vec<Rect>, LayoutError> {
    let mut rects = Vec::new();
    compile_into(node, constraint, "layout", &mut rects)?;

    let mut seen = HashSet::with_capacity(rects.len());
    for rect in &rects {
        if !seen.insert(rect.slug.as_str()) {
            return Err(LayoutError::DuplicateSlug {
                slug: rect.slug.clone(),
            });
        }
    }

    rects.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));
    Ok(rects)
}

fn compile_into(
    node: &LayoutNode,
    constraint: Constraint,
    path: &str,
    out: &mut Vec<Rect>,
) -> Result<(), LayoutError> {
    match node {
        LayoutNode::Tokens(tokens) => lay_out_tokens(tokens, constraint, path, out),
        LayoutNode::Stack(children) => lay_out_stack(children, constraint, path, out),
        LayoutNode::Split(cells) => lay_out_split(cells, constraint, path, out),
    }
}

fn lay_out_tokens(
    tokens: &[String],
    constraint: Constraint,
    path: &str,
    out: &mut Vec<Rect>,
) -> Result<(), LayoutError> {
    if tokens.is_empty() {
        return Err(LayoutError::EmptyGroup {
            path: path.to_owned(),
        });
    }
    let parsed = tokens
        .iter()
        .map(|token| parse_token(token, path))
        .collect::<Result<Vec<(&str, Option<f64>)>, LayoutError>>()?;
    let shares = share_out(parsed.iter().map(|(_, size)| *size), path)?;

    let extent = match constraint.axis {
        Axis::Row => constraint.width,
        Axis::Column => constraint.height,
    };
    let mut cursor = match constraint.axis {
        Axis::Row => constraint.left,
        Axis::Column => constraint.top,
    };
    for ((name, _), share) in parsed.iter().zip(shares) {
        let size = percent_of(share, extent);
        let rect = match constraint.axis {
            Axis::Row => Rect {
                slug: (*name).to_owned(),
                top: constraint.top,
                left: cursor,
                width: size,
                height: constraint.height,
            },
            Axis::Column => Rect {
                slug: (*name).to_owned(),
                top: cursor,
                left: constraint.left,
                width: constraint.width,
                height: size,
            },
        };
        out.push(rect);
        cursor = round2(cursor + size);
    }
    Ok(())
}

fn lay_out_stack(
    children: &[LayoutNode],
    constraint: Constraint,
    path: &str,
    out: &mut Vec<Rect>,
) -> Result<(), LayoutError> {
    if children.is_empty() {
        return Err(LayoutError::EmptyGroup {
            path: path.to_owned(),
        });
    }
    let share = 100.0 / children.len() as f64;
    let mut cursor = match constraint.axis {
        Axis::Row => constraint.left,
        Axis::Column => constraint.top,
    };
    for (index, child) in children.iter().enumerate() {
        let child_path = format!("{path}[{index}]");
        let child_constraint = match constraint.axis {
            Axis::Row => {
                let size = percent_of(share, constraint.width);
                let next = Constraint {
                    axis: Axis::Column,
                    top: constraint.top,
                    left: cursor,
                    width: size,
                    height: constraint.height,
                };
                cursor = round2(cursor + size);
                next
            }
            Axis::Column => {
                let size = percent_of(share, constraint.height);
                let next = Constraint {
                    axis: Axis::Row,
                    top: cursor,
                    left: constraint.left,
                    width: constraint.width,
                    height: size,
                };
                cursor = round2(cursor + size);
                next
            }
        };
        compile_into(child, child_constraint, &child_path, out)?;
    }
    Ok(())
}

fn lay_out_split(
    cells: &IndexMap<String, LayoutNode>,
    constraint: Constraint,
    path: &str,
    out: &mut Vec<Rect>,
) -> Result<(), LayoutError> {
    if cells.is_empty() {
        return Err(LayoutError::EmptyGroup {
            path: path.to_owned(),
        });
    }

    let mut orientation: Option<Axis> = None;
    let mut sizes = Vec::with_capacity(cells.len());
    for key in cells.keys() {
        let (prefix, size) = parse_token(key, path)?;
        // `td` cells sit side by side and stack their content; `tr` cells the reverse.
        let advance = match prefix {
            "td" => Axis::Row,
            "tr" => Axis::Column,
            _ => {
                return Err(LayoutError::UnknownPrefix {
                    path: path.to_owned(),
                    key: key.clone(),
                })
            }
        };
        match orientation {
            Some(existing) if existing != advance => {
                return Err(LayoutError::MixedOrientation {
                    path: path.to_owned(),
                })
            }
            _ => orientation = Some(advance),
        }
        sizes.push(size);
    }
    let advance = orientation.unwrap_or(constraint.axis);
    let shares = share_out(sizes.into_iter(), path)?;

    let mut cursor = match advance {
        Axis::Row => constraint.left,
        Axis::Column => constraint.top,
    };
    for ((key, child), share) in cells.iter().zip(shares) {
        let child_path = format!("{path}.{key}");
        let child_constraint = match advance {
            Axis::Row => {
                let size = percent_of(share, constraint.width);
                let next = Constraint {
                    axis: Axis::Column,
                    top: constraint.top,
                    left: cursor,
                    width: size,
                    height: constraint.height,
                };
                cursor = round2(cursor + size);
                next
            }
            Axis::Column => {
                let size = percent_of(share, constraint.height);
                let next = Constraint {
                    axis: Axis::Row,
                    top: cursor,
                    left: constraint.left,
                    width: constraint.width,
                    height: size,
                };
                cursor = round2(cursor + size);
                next
            }
        };
        compile_into(child, child_constraint, &child_path, out)?;
    }
    Ok(())
}

fn parse_token<'a>(token: &'a str, path: &str) -> Result<(&'a str, Option<f64>), LayoutError> {
    let (name, size) = match token.split_once(':') {
        Some((name, raw_size)) => {
            let size = raw_size
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|size| size.is_finite() && *size > 0.0)
                .ok_or_else(|| LayoutError::InvalidSize {
                    path: path.to_owned(),
                    token: token.to_owned(),
                })?;
            (name.trim(), Some(size))
        }
        None => (token.trim(), None),
    };
    if name.is_empty() {
        return Err(LayoutError::EmptyName {
            path: path.to_owned(),
            token: token.to_owned(),
        });
    }
    Ok((name, size))
}

/// Resolves each entry to a percentage of its parent. Explicit sizes are kept;
/// the remainder is split evenly between unsized entries. A fully sized group
/// must cover its parent to within 0.1%.
fn share_out<I>(sizes: I, path: &str) -> Result<Vec<f64>, LayoutError>
where
    I: Iterator<Item = Option<f64>>,
{
    let sizes = sizes.collect::<Vec<Option<f64>>>();
    let explicit = sizes.iter().flatten().sum::<f64>();
    let unsized_count = sizes.iter().filter(|size| size.is_none()).count();
    let overflows = explicit > 100.0 + f64::EPSILON * 100.0;
    let starves = unsized_count > 0 && explicit >= 100.0;
    if overflows || starves {
        return Err(LayoutError::Overflow {
            path: path.to_owned(),
            total: round2(explicit),
        });
    }
    if unsized_count == 0 {
        if (explicit - 100.0).abs() > 0.1 {
            return Err(LayoutError::Underflow {
                path: path.to_owned(),
                total: round2(explicit),
            });
        }
        return Ok(sizes.into_iter().flatten().collect());
    }
    let wildcard = (100.0 - explicit) / unsized_count as f64;
    Ok(sizes
        .into_iter()
        .map(|size| size.unwrap_or(wildcard))
        .collect())
}

fn percent_of(share: f64, extent: f64) -> f64 {
    round2(share / 100.0 * extent)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;

use crate::path::is_index_segment;
use crate::tree::Value;

/// Largest sequence index that creation may pad up to.
pub const MAX_CREATED_INDEX: usize = 10_000;

/// Read-only walk along `path`, invoking thunks met on the way.
///
/// Returns `None` as soon as a segment is missing. The tree itself is never
/// touched; forced thunk results live only in the returned copy.
pub fn lookup(root: &Value, path: &[String]) -> Option<Value> {
    let mut cursor = Cursor::Borrowed(root).forced();
    for segment in path {
        cursor = cursor.child(segment)?.forced();
    }
    Some(cursor.into_owned())
}

/// Walk `root` along `path`, optionally creating missing intermediate
/// containers, and return a copy of the value found.
///
/// A missing slot becomes a sequence when the segment after it is an index
/// and a mapping otherwise. The final segment is never created: a missing
/// leaf yields `None`. Thunks met on the way are replaced in place with
/// their result so anything created beneath them persists.
pub fn navigate(root: &mut Value, path: &[String], create_missing: bool) -> Option<Value> {
    navigate_mut(root, path, create_missing).map(|v| v.clone())
}

/// Like [`navigate`], but hands back the slot itself.
pub fn navigate_mut<'a>(
    root: &'a mut Value,
    path: &[String],
    create_missing: bool,
) -> Option<&'a mut Value> {
    walk_mut(root, path, None, create_missing)
}

/// Write `value` at `path`, creating intermediate containers.
///
/// Writing past the end of a sequence pads it with nulls. Returns `false`
/// when the path is empty or runs into a scalar.
pub fn set_path(root: &mut Value, path: &[String], value: Value) -> bool {
    let Some((leaf, parents)) = path.split_last() else {
        return false;
    };
    let Some(parent) = walk_mut(root, parents, Some(leaf), true) else {
        return false;
    };
    match parent {
        Value::Mapping(map) => {
            map.insert(leaf.clone(), value);
            true
        }
        Value::Sequence(items) => {
            let Some(idx) = parse_index(leaf) else {
                return false;
            };
            if idx >= items.len() {
                if !may_pad_to(idx) {
                    return false;
                }
                items.resize(idx + 1, Value::Null);
            }
            items[idx] = value;
            true
        }
        _ => false,
    }
}

/// `lookahead` is the segment that follows the last element of `path`; it
/// decides the shape of a container created for that last element.
fn walk_mut<'a>(
    root: &'a mut Value,
    path: &[String],
    lookahead: Option<&str>,
    create_missing: bool,
) -> Option<&'a mut Value> {
    let mut current = root.force_in_place();
    for (i, segment) in path.iter().enumerate() {
        let next = path.get(i + 1).map(String::as_str).or(lookahead);
        current = step_mut(current, segment, next, create_missing)?.force_in_place();
    }
    Some(current)
}

fn step_mut<'a>(
    container: &'a mut Value,
    segment: &str,
    next: Option<&str>,
    create_missing: bool,
) -> Option<&'a mut Value> {
    match container {
        Value::Mapping(map) => {
            if !map.contains_key(segment) {
                if !create_missing {
                    return None;
                }
                map.insert(segment.to_string(), empty_container_for(next?));
            }
            map.get_mut(segment)
        }
        Value::Sequence(items) => {
            let idx = parse_index(segment)?;
            if idx >= items.len() {
                if !create_missing || !may_pad_to(idx) {
                    return None;
                }
                let fresh = empty_container_for(next?);
                items.resize(idx + 1, Value::Null);
                items[idx] = fresh;
            }
            items.get_mut(idx)
        }
        _ => None,
    }
}

fn empty_container_for(next: &str) -> Value {
    if is_index_segment(next) {
        Value::Sequence(Vec::new())
    } else {
        Value::mapping()
    }
}

fn may_pad_to(idx: usize) -> bool {
    if idx > MAX_CREATED_INDEX {
        tracing::warn!(index = idx, "refusing to grow a sequence that far");
        return false;
    }
    true
}

fn parse_index(segment: &str) -> Option<usize> {
    if is_index_segment(segment) {
        segment.parse().ok()
    } else {
        None
    }
}

/// A position in a read-only walk: borrowed from the tree until a thunk
/// produces a value that only exists locally.
enum Cursor<'a> {
    Borrowed(&'a Value),
    Owned(Value),
}

impl<'a> Cursor<'a> {
    fn forced(self) -> Self {
        match self {
            Cursor::Borrowed(v) if v.is_thunk() => Cursor::Owned(v.clone().force()),
            Cursor::Owned(v) if v.is_thunk() => Cursor::Owned(v.force()),
            other => other,
        }
    }

    fn child(self, segment: &str) -> Option<Cursor<'a>> {
        match self {
            Cursor::Borrowed(v) => match v {
                Value::Mapping(map) => map.get(segment).map(Cursor::Borrowed),
                Value::Sequence(items) => items.get(parse_index(segment)?).map(Cursor::Borrowed),
                _ => None,
            },
            Cursor::Owned(v) => match v {
                Value::Mapping(mut map) => map.remove(segment).map(Cursor::Owned),
                Value::Sequence(mut items) => {
                    let idx = parse_index(segment)?;
                    if idx < items.len() {
                        Some(Cursor::Owned(items.swap_remove(idx)))
                    } else {
                        None
                    }
                }
                _ => None,
            },
        }
    }

    fn into_owned(self) -> Value {
        match self {
            Cursor::Borrowed(v) => v.clone(),
            Cursor::Owned(v) => v,
        }
    }
}

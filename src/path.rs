//! Path addressing (C1): read/write values by dotted path into
//! heterogeneous documents (spec §4.1).

use crate::core::Value;

/// Strip a leading `$`/`.` root sigil, matching the aliasing spec §4.1 and
/// §4.6 describe for `$`/leading-dot paths ("$"/"." denote the document
/// root" — ported from `DeleteAssignment.Run`'s
/// `strings.TrimLeft(strings.TrimLeft(key, "$"), ".")`).
pub fn normalize(path: &str) -> &str {
    let path = path.trim_start_matches('$');
    path.trim_start_matches('.')
}

fn segments(path: &str) -> Vec<&str> {
    let path = normalize(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Read `root` at `path`. Returns `(value, found)`. When `creating` is
/// true, absent map keys along the traversal (not the final segment) are
/// filled with new empty maps so a subsequent write can succeed; sequences
/// are never auto-created (spec §4.1).
pub fn read<'a>(root: &'a Value, path: &str, creating: bool) -> (Option<&'a Value>, bool) {
    let segs = segments(path);
    if segs.is_empty() {
        return (Some(root), true);
    }

    let mut current = root;
    for seg in &segs {
        match current {
            Value::Map(m) => match m.get(*seg) {
                Some(v) => current = v,
                None => return (None, false),
            },
            Value::Array(a) => match seg.parse::<usize>() {
                Ok(idx) if idx < a.len() => current = &a[idx],
                _ => return (None, false),
            },
            _ => return (None, false),
        }
    }

    let _ = creating; // read never mutates; creating only matters for read_mut
    (Some(current), true)
}

/// Like [`read`] but traverses through mutable references, auto-creating
/// absent intermediate map entries when `creating` is true. Used by the `=`
/// and `+` assignments to make deep writes succeed.
pub fn read_mut<'a>(
    root: &'a mut Value,
    path: &str,
    creating: bool,
) -> Option<&'a mut Value> {
    let segs = segments(path);
    let mut current = root;
    for seg in &segs {
        match current {
            Value::Map(m) => {
                if creating && !m.contains_key(*seg) {
                    m.insert(seg.to_string(), Value::map());
                }
                current = m.get_mut(*seg)?;
            }
            Value::Array(a) => {
                let idx = seg.parse::<usize>().ok()?;
                current = a.get_mut(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Write `value` at `path` under `root`. Traverses `path[..-1]` in
/// creating mode, then sets the last segment as a map key or sequence
/// index. Out-of-range sequence indices are a silent no-op (spec §4.1).
pub fn write(root: &mut Value, path: &str, value: Value) {
    let segs = segments(path);
    if segs.is_empty() {
        *root = value;
        return;
    }

    let (parent_segs, last) = segs.split_at(segs.len() - 1);
    let last = last[0];

    let parent_path = parent_segs.join(".");
    let parent = if parent_segs.is_empty() {
        Some(root)
    } else {
        read_mut(root, &parent_path, true)
    };

    let Some(parent) = parent else { return };

    match parent {
        Value::Map(m) => {
            m.insert(last.to_string(), value);
        }
        Value::Array(a) => {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < a.len() {
                    a[idx] = value;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn doc() -> Value {
        let mut area = HashMap::new();
        area.insert("zipcode".to_string(), Value::Number(200211.0));
        area.insert("city".to_string(), Value::String("shanghai".to_string()));
        let mut root = HashMap::new();
        root.insert("area".to_string(), Value::Map(area));
        Value::Map(root)
    }

    #[test]
    fn reads_nested_path() {
        let d = doc();
        let (v, found) = read(&d, "area.city", false);
        assert!(found);
        assert_eq!(v.unwrap().as_str(), Some("shanghai"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let d = doc();
        let (v, found) = read(&d, "area.country", false);
        assert!(!found);
        assert!(v.is_none());
    }

    #[test]
    fn write_creates_missing_prefix() {
        let mut d = Value::map();
        write(&mut d, "assets.house.area", Value::Number(100.0));
        let (v, found) = read(&d, "assets.house.area", false);
        assert!(found);
        assert_eq!(v.unwrap().as_number(), Some(100.0));
    }

    #[test]
    fn write_out_of_range_index_is_noop() {
        let mut d = Value::Array(vec![Value::Number(1.0)]);
        write(&mut d, "5", Value::Number(2.0));
        assert_eq!(d, Value::Array(vec![Value::Number(1.0)]));
    }

    #[test]
    fn root_sigil_addresses_document_root() {
        let mut d = doc();
        write(&mut d, "$", Value::map());
        assert_eq!(d, Value::map());
    }
}

//! Indented text rendering of decoded values.

use std::fmt::Write;

use tilepack_codec::Value;
use tilepack_level::{Entity, Map, TileLayer};

const INDENT: &str = "  ";

/// Render `value` as an indented tree, collapsing containers nested deeper
/// than `max_depth`.
pub fn render(value: &Value, max_depth: Option<usize>) -> String {
    let mut out = String::new();
    let mut printer = Printer {
        out: &mut out,
        max_depth: max_depth.unwrap_or(usize::MAX),
    };
    printer.value(value, 0);
    out
}

struct Printer<'a> {
    out: &'a mut String,
    max_depth: usize,
}

impl Printer<'_> {
    fn line(&mut self, depth: usize, text: impl std::fmt::Display) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        let _ = writeln!(self.out, "{text}");
    }

    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::List(items) | Value::Tuple(items) => {
                self.container(value.kind(), items.iter(), items.len(), depth)
            }
            Value::Set(set) => self.container("set", set.iter(), set.len(), depth),
            Value::Map(map) => {
                self.line(depth, format_args!("map ({} entries)", map.len()));
                if depth >= self.max_depth {
                    return self.collapsed(map.len(), depth);
                }
                for (key, value) in map.iter() {
                    if is_leaf(value) {
                        self.line(depth + 1, format_args!("{}: {}", scalar(key), scalar(value)));
                    } else {
                        self.line(depth + 1, format_args!("{}:", scalar(key)));
                        self.value(value, depth + 2);
                    }
                }
            }
            Value::Record(_) | Value::Packed(_) => self.object(value, depth),
            scalar_value => self.line(depth, scalar(scalar_value)),
        }
    }

    fn container<'v>(
        &mut self,
        kind: &str,
        items: impl Iterator<Item = &'v Value>,
        len: usize,
        depth: usize,
    ) {
        self.line(depth, format_args!("{kind} ({len} items)"));
        if depth >= self.max_depth {
            return self.collapsed(len, depth);
        }
        for item in items {
            self.value(item, depth + 1);
        }
    }

    fn collapsed(&mut self, len: usize, depth: usize) {
        if len > 0 {
            self.line(depth + 1, "...");
        }
    }

    fn object(&mut self, value: &Value, depth: usize) {
        if let Some(map) = value.downcast_ref::<Map>() {
            self.map(map, depth);
        } else if let Some(layer) = value.downcast_ref::<TileLayer>() {
            self.layer(layer, depth);
        } else if let Some(entity) = value.downcast_ref::<Entity>() {
            self.entity(entity, depth);
        } else if let Value::Record(object) | Value::Packed(object) = value {
            self.line(depth, format_args!("{} {}", value.kind(), object.type_name()));
        }
    }

    fn map(&mut self, map: &Map, depth: usize) {
        self.line(
            depth,
            format_args!(
                "Map ({} layers, {} entities)",
                map.layers().len(),
                map.entities().len()
            ),
        );
        if depth >= self.max_depth {
            return self.collapsed(map.layers().len() + map.entities().len(), depth);
        }
        for layer in map.layers() {
            self.layer(layer, depth + 1);
        }
        for entity in map.entities() {
            self.entity(entity, depth + 1);
        }
    }

    fn layer(&mut self, layer: &TileLayer, depth: usize) {
        self.line(
            depth,
            format_args!(
                "TileLayer {}x{} on \"{}\"",
                layer.width(),
                layer.height(),
                layer.tileset().name()
            ),
        );
        if depth >= self.max_depth {
            return self.collapsed(layer.height(), depth);
        }
        for row in layer.rows() {
            let cells: Vec<String> = row.iter().map(u32::to_string).collect();
            self.line(depth + 1, cells.join(" "));
        }
    }

    fn entity(&mut self, entity: &Entity, depth: usize) {
        let script = if entity.script_name().is_empty() {
            "no script".to_owned()
        } else {
            format!("script \"{}\"", entity.script_name())
        };
        self.line(depth, format_args!("Entity \"{}\" ({script})", entity.name()));
        if depth >= self.max_depth {
            return self.collapsed(entity.attributes().len(), depth);
        }
        for (key, value) in entity.attributes().iter() {
            if is_leaf(value) {
                self.line(depth + 1, format_args!("{}: {}", scalar(key), scalar(value)));
            } else {
                self.line(depth + 1, format_args!("{}:", scalar(key)));
                self.value(value, depth + 2);
            }
        }
    }
}

fn is_leaf(value: &Value) -> bool {
    !matches!(
        value,
        Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Map(_) | Value::Record(_) | Value::Packed(_)
    )
}

/// One-line form of a leaf value; containers get a short summary.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::Text(s) => format!("{s:?}"),
        Value::Bytes(bytes) => format!("bytes[{}]", bytes.len()),
        Value::Tuple(items) => {
            let items: Vec<String> = items.iter().map(scalar).collect();
            format!("({})", items.join(", "))
        }
        other => other.kind().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tilepack_codec::ValueMap;
    use tilepack_level::Tileset;

    #[test]
    fn scalars_and_nesting() {
        let mut map = ValueMap::new();
        map.insert("name", "café");
        map.insert("xs", Value::List(vec![Value::Int(1), Value::Float(0.5)]));
        let text = render(&Value::Map(map), None);
        assert_eq!(
            text,
            "map (2 entries)\n  \"name\": \"café\"\n  \"xs\":\n    list (2 items)\n      1\n      0.5\n"
        );
    }

    #[test]
    fn depth_limit_collapses() {
        let value = Value::List(vec![Value::List(vec![Value::Null])]);
        assert_eq!(render(&value, Some(1)), "list (1 items)\n  list (1 items)\n    ...\n");
    }

    #[test]
    fn level_objects() {
        let tileset = Arc::new(Tileset::new("blue", "blue.png"));
        let mut layer = TileLayer::new(2, 1, tileset);
        layer.set(1, 0, 5);
        let map = Map::new(
            vec![layer],
            vec![Entity::new("hero", "walk", ValueMap::new())],
        );
        assert_eq!(
            render(&Value::packed(map), None),
            "Map (1 layers, 1 entities)\n  TileLayer 2x1 on \"blue\"\n    0 5\n  Entity \"hero\" (script \"walk\")\n"
        );
    }
}

//! Path probes over untyped JSON.
//!
//! TikTok's embedded page state is deeply nested and its shape drifts, so the
//! extraction code probes a list of candidate paths instead of deserializing
//! into structs. Paths look like `.data.user.items[0].id`. Keys that themselves
//! contain dots (TikTok uses scope keys like `webapp.user-detail`) are written
//! in brackets: `.__DEFAULT_SCOPE__[webapp.user-detail].userInfo`.

use serde_json::Value;

pub fn pluck<'a>(mut value: &'a Value, mut path: &str) -> Option<&'a Value> {
    loop {
        let (segment, rest) = consume(path);
        path = rest;
        match segment {
            Segment::Key(key) => value = value.as_object()?.get(key)?,
            Segment::Literal(key) => match key.parse::<usize>() {
                Ok(idx) => value = value.as_array()?.get(idx)?,
                Err(_) => value = value.as_object()?.get(key)?,
            },
            Segment::End => return Some(value),
        }
    }
}

enum Segment<'a> {
    /// `.name`
    Key(&'a str),
    /// `[name]`: an array index if numeric, otherwise a raw object key
    Literal(&'a str),
    End,
}

fn consume(path: &str) -> (Segment<'_>, &str) {
    let mut chars = path.char_indices();
    match chars.next() {
        Some((_, '.')) => {
            let rest = &path[1..];
            let end = rest
                .char_indices()
                .find(|(_, c)| *c == '.' || *c == '[')
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            (Segment::Key(&rest[..end]), &rest[end..])
        }
        Some((_, '[')) => {
            let rest = &path[1..];
            match rest.find(']') {
                Some(end) => (Segment::Literal(&rest[..end]), &rest[end + 1..]),
                None => (Segment::End, ""),
            }
        }
        _ => (Segment::End, path),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::pluck;

    #[test]
    fn pluck_objects() {
        let data = json!({"a": {"b": {"c": 1}, "d": 2}});

        assert_eq!(pluck(&data, ".a.b.c"), Some(&json!(1)));
        assert_eq!(pluck(&data, ".a.d"), Some(&json!(2)));
        assert_eq!(pluck(&data, ".a.e"), None);
        assert_eq!(pluck(&data, ".a.b.c.d"), None);
    }

    #[test]
    fn pluck_arrays() {
        let data = json!({"a": [1, 2], "b": {"c": [{"d": 3}, {"e": 4}]}});

        assert_eq!(pluck(&data, ".a[0]"), Some(&json!(1)));
        assert_eq!(pluck(&data, ".a[1]"), Some(&json!(2)));
        assert_eq!(pluck(&data, ".a[2]"), None);
        assert_eq!(pluck(&data, ".b.c[0].d"), Some(&json!(3)));
        assert_eq!(pluck(&data, ".b.c[1].e"), Some(&json!(4)));
    }

    #[test]
    fn pluck_dotted_keys() {
        let data = json!({
            "__DEFAULT_SCOPE__": {
                "webapp.user-detail": {"userInfo": {"user": {"uniqueId": "bob"}}}
            }
        });

        assert_eq!(
            pluck(&data, ".__DEFAULT_SCOPE__[webapp.user-detail].userInfo.user.uniqueId"),
            Some(&json!("bob"))
        );
    }

    #[test]
    fn pluck_whole_document() {
        let data = json!([1, 2]);

        assert_eq!(pluck(&data, "[0]"), Some(&json!(1)));
        assert_eq!(pluck(&data, ""), Some(&data));
    }
}

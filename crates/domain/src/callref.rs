//! Grammar and parser for the `${callId.path.to.field}` parameter
//! reference expression language (spec §9).
//!
//! A reference is a string value of the exact form `${<call-id>.<path>}`
//! where `<call-id>` is any non-empty run of characters other than `.` or
//! `}`, and `<path>` is one or more dot-separated segments, each a bare
//! identifier or an array index (`[n]`). Shared by the planner (which
//! checks references resolve to a `dependsOn` id) and the executor (which
//! evaluates them against the result graph).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRef {
    pub call_id: String,
    pub path: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Parses `${callId.path.to.field}` / `${callId.items[0].name}`. Returns
/// `None` for any string that is not *exactly* a single reference
/// expression (no surrounding text, no nested `${`).
pub fn parse(value: &str) -> Option<CallRef> {
    let inner = value.strip_prefix("${")?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains("${") {
        return None;
    }
    let (call_id, rest) = inner.split_once('.')?;
    if call_id.is_empty() {
        return None;
    }
    let mut path = Vec::new();
    for raw_segment in rest.split('.') {
        if raw_segment.is_empty() {
            return None;
        }
        if let Some(bracket) = raw_segment.find('[') {
            let (field, bracketed) = raw_segment.split_at(bracket);
            if !field.is_empty() {
                path.push(PathSegment::Field(field.to_string()));
            }
            let digits = bracketed.strip_prefix('[')?.strip_suffix(']')?;
            let index: usize = digits.parse().ok()?;
            path.push(PathSegment::Index(index));
        } else {
            path.push(PathSegment::Field(raw_segment.to_string()));
        }
    }
    if path.is_empty() {
        return None;
    }
    Some(CallRef {
        call_id: call_id.to_string(),
        path,
    })
}

/// Evaluates a parsed reference against a JSON result value, returning
/// `None` on any missing field, wrong shape, or out-of-bounds index — a
/// dangling reference resolves to `undefined`, never an error (spec §4.8).
pub fn resolve<'a>(path: &[PathSegment], value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path {
        current = match segment {
            PathSegment::Field(name) => current.get(name)?,
            PathSegment::Index(idx) => current.get(*idx)?,
        };
    }
    Some(current)
}

//! Parser for roster lines of the form `name[/weight][*count]`.

/// One parsed roster line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    pub name: String,
    /// Raw, unnormalized weight.
    pub weight: f64,
    /// Number of marbles carrying this name.
    pub count: usize,
}

/// Parses a roster line.
///
/// The suffixes may appear in either order and each at most once.
/// Returns `None` for an empty name, a malformed suffix or a zero count.
pub fn parse_name(line: &str) -> Option<ParsedName> {
    let line = line.trim();
    let split = line.find(['/', '*']).unwrap_or(line.len());
    let name = line[..split].trim();
    if name.is_empty() {
        return None;
    }

    let mut weight = None;
    let mut count = None;
    let mut rest = &line[split..];
    while let Some(marker) = rest.chars().next() {
        let body = &rest[1..];
        let end = body.find(['/', '*']).unwrap_or(body.len());
        let value = body[..end].trim();
        match marker {
            '/' if weight.is_none() => {
                let parsed: f64 = value.parse().ok()?;
                if !parsed.is_finite() {
                    return None;
                }
                weight = Some(parsed);
            }
            '*' if count.is_none() => count = Some(value.parse::<usize>().ok()?),
            _ => return None,
        }
        rest = &body[end..];
    }

    let count = count.unwrap_or(1);
    if count == 0 {
        return None;
    }
    Some(ParsedName {
        name: name.to_string(),
        weight: weight.unwrap_or(1.0),
        count,
    })
}

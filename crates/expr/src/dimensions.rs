use std::collections::BTreeSet;

use cloudwatch::Dimension;
use errors::ErrorMetadata;

const WILDCARD: char = '*';

/// True if any dimension value in `dims` is a wildcard that must be resolved
/// into concrete dimension groups before querying.
pub fn has_wildcard(dims: &str) -> bool {
    dims.contains(WILDCARD)
}

/// Parse a comma separated list of `name:value` pairs into a single
/// dimension group. An empty list is one empty group.
pub fn parse_dimensions(dims: &str) -> anyhow::Result<Vec<Vec<Dimension>>> {
    if dims.trim().is_empty() {
        return Ok(vec![vec![]]);
    }
    let mut group = Vec::new();
    for entry in dims.split(',') {
        let Some((name, value)) = entry.split_once(':') else {
            anyhow::bail!(ErrorMetadata::bad_request(
                "DimensionParseError",
                format!("Could not parse dimension {entry:?}: expected name:value"),
            ));
        };
        group.push(Dimension::new(name.trim(), value.trim()));
    }
    Ok(vec![group])
}

/// Tag keys a query with this dimension list produces.
pub fn cloudwatch_tag_query(dims: &str) -> BTreeSet<String> {
    dims.split(',')
        .filter_map(|entry| {
            let name = entry.split(':').next()?.trim();
            (!name.is_empty()).then(|| name.to_owned())
        })
        .collect()
}
